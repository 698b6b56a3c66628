use crate::detect::result::Region;

/// Greedy non-maximum suppression.
///
/// Keeps regions in descending score order, dropping any that overlaps an
/// already kept region by more than `iou_threshold`. At most `top_k` survive.
pub fn non_max_suppression(
    mut regions: Vec<Region>,
    iou_threshold: f32,
    top_k: usize,
) -> Vec<Region> {
    regions.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<Region> = Vec::with_capacity(top_k.min(regions.len()));
    for region in regions {
        if kept.len() >= top_k {
            break;
        }
        if kept.iter().all(|k| k.iou(&region) <= iou_threshold) {
            kept.push(region);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_lower_scores_are_suppressed() {
        let regions = vec![
            Region::new(0.0, 0.0, 10.0, 10.0).with_score(0.8),
            Region::new(1.0, 1.0, 10.0, 10.0).with_score(0.9),
            Region::new(50.0, 50.0, 10.0, 10.0).with_score(0.75),
        ];
        let kept = non_max_suppression(regions, 0.3, 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.75);
    }

    #[test]
    fn top_k_bounds_the_result() {
        let regions = (0..5)
            .map(|i| Region::new(i as f32 * 20.0, 0.0, 10.0, 10.0).with_score(0.1 * i as f32))
            .collect();
        let kept = non_max_suppression(regions, 0.3, 2);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].score - 0.4).abs() < 1e-6);
    }
}
