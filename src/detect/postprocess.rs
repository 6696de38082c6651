//! Detection post-processing shared by backends.

use super::result::{DetectParams, Detection};

/// Drop detections below `threshold`.
pub fn filter_confidence(detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| d.confidence >= threshold)
        .collect()
}

/// Greedy per-label non-maximum suppression.
///
/// Detections are visited in descending confidence; a detection is dropped when
/// its IoU with an already kept detection of the same label exceeds
/// `threshold`. Output is ordered by descending confidence.
pub fn non_max_suppression(mut detections: Vec<Detection>, threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept
            .iter()
            .any(|k| k.label == candidate.label && k.bbox.iou(&candidate.bbox) > threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Apply confidence filtering, then suppression when enabled.
pub fn apply(detections: Vec<Detection>, params: &DetectParams) -> Vec<Detection> {
    let filtered = filter_confidence(detections, params.confidence);
    match params.overlap {
        Some(threshold) => non_max_suppression(filtered, threshold),
        None => filtered,
    }
}
