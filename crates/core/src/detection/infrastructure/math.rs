//! Shared math utilities for the inference adapter.

/// IoU between two bounding boxes represented as `[x1, y1, x2, y2]`.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}

/// Greedy non-maximum suppression over `(box, score)` pairs.
///
/// Returns the kept entries ordered by descending score.
pub fn nms(mut dets: Vec<([f64; 4], f64)>, iou_thresh: f64) -> Vec<([f64; 4], f64)> {
    dets.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep: Vec<([f64; 4], f64)> = Vec::new();
    for det in dets {
        if keep.iter().all(|k| bbox_iou(&k.0, &det.0) <= iou_thresh) {
            keep.push(det);
        }
    }
    keep
}

pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![1.0 / logits.len().max(1) as f32; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_iou_identical() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(bbox_iou(&a, &a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = [0.0, 0.0, 100.0, 100.0];
        let b = [50.0, 0.0, 150.0, 100.0];
        assert_relative_eq!(bbox_iou(&a, &b), 5000.0 / 15000.0);
    }

    #[test]
    fn test_iou_disjoint() {
        assert_relative_eq!(
            bbox_iou(&[0.0, 0.0, 10.0, 10.0], &[20.0, 20.0, 30.0, 30.0]),
            0.0
        );
    }

    #[test]
    fn test_nms_suppresses_overlapping_lower_score() {
        let dets = vec![
            ([0.0, 0.0, 100.0, 100.0], 0.6),
            ([5.0, 5.0, 105.0, 105.0], 0.9),
            ([300.0, 300.0, 350.0, 350.0], 0.7),
        ];
        let kept = nms(dets, 0.4);
        assert_eq!(kept.len(), 2);
        assert_relative_eq!(kept[0].1, 0.9);
        assert_relative_eq!(kept[1].1, 0.7);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.4).is_empty());
    }

    #[test]
    fn test_sigmoid_midpoint() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(p.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn test_softmax_large_logits_stay_finite() {
        let p = softmax(&[1000.0, 1000.0]);
        assert_relative_eq!(p[0], 0.5, epsilon = 1e-6);
    }
}
