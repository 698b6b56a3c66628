/// Camera or actuator hardware is unreachable or unresponsive.
///
/// Fatal for the loop that owns the device. Attached to `anyhow` errors so the
/// control loop can tell hardware faults from other failures via `downcast_ref`.
#[derive(Clone, Debug)]
pub struct DeviceFault {
    pub device: String,
    pub message: String,
}

impl DeviceFault {
    pub fn new(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for DeviceFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "device fault on {}: {}", self.device, self.message)
    }
}

impl std::error::Error for DeviceFault {}

/// True when `err` (or anything in its chain) is a `DeviceFault`.
pub fn is_device_fault(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.downcast_ref::<DeviceFault>().is_some())
}

/// Tag a failed hardware call as a `DeviceFault` on `device`.
///
/// Errors that already carry a fault only gain `action` as context.
pub fn device_error(device: &str, action: &str, err: anyhow::Error) -> anyhow::Error {
    if is_device_fault(&err) {
        err.context(format!("{} on {}", action, device))
    } else {
        DeviceFault::new(device, format!("{}: {:#}", action, err)).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn plain_errors_become_device_faults() {
        let err = device_error("motor B", "set duty cycle", anyhow::anyhow!("timeout"));
        let fault = err.downcast_ref::<DeviceFault>().map(|f| f.device.clone());
        assert_eq!(fault.as_deref(), Some("motor B"));
        assert_eq!(err.to_string(), "device fault on motor B: set duty cycle: timeout");
    }

    #[test]
    fn device_fault_is_found_through_context() {
        let err: anyhow::Result<()> = Err(DeviceFault::new("motor A", "no reply").into());
        let err = err.context("horizontal axis command").unwrap_err();
        assert!(is_device_fault(&err));
        assert!(!is_device_fault(&anyhow::anyhow!("plain failure")));
    }
}
