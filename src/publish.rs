//! Single-writer publication cell.
//!
//! Every value that crosses a thread boundary in the pipeline (latest frame,
//! latest detections, FPS figures) is handed over through a `Published<T>`:
//! the owning worker stores a whole new snapshot, readers load an `Arc` to
//! whichever snapshot was current. A reader therefore sees either the old or the
//! new value, never a mix of the two.

use std::sync::Arc;

use arc_swap::ArcSwap;

/// A published value together with the number of stores that preceded it.
#[derive(Debug)]
pub struct Snapshot<T> {
    pub version: u64,
    pub value: T,
}

/// Versioned snapshot cell. One writer, any number of readers.
pub struct Published<T> {
    cell: ArcSwap<Snapshot<T>>,
}

impl<T> Published<T> {
    pub fn new(initial: T) -> Self {
        Self {
            cell: ArcSwap::from_pointee(Snapshot {
                version: 0,
                value: initial,
            }),
        }
    }

    /// Replace the current snapshot. Must only be called from the owning worker.
    pub fn publish(&self, value: T) {
        let version = self.cell.load().version + 1;
        self.cell.store(Arc::new(Snapshot { version, value }));
    }

    /// Latest snapshot, including its version.
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        self.cell.load_full()
    }

    pub fn version(&self) -> u64 {
        self.cell.load().version
    }
}

impl<T: Clone> Published<T> {
    /// Owned copy of the latest value.
    pub fn get(&self) -> T {
        self.cell.load().value.clone()
    }
}

impl<T: Default> Default for Published<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
