//! Non-maximum suppression.

use crate::processors::geometry::{BBox, Point};
use std::cmp::Ordering;

/// Indices sorted by descending score; ties keep their input order.
fn sorted_by_score(scores: &[f32]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..scores.len()).collect();
    indices.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));
    indices
}

/// Greedy NMS. Returns the kept indices in descending score order.
///
/// A box is suppressed when its IoU with an already kept box is strictly
/// greater than `iou_threshold`.
pub fn nms(boxes: &[BBox], scores: &[f32], iou_threshold: f32, max_keep: usize) -> Vec<usize> {
    let classes = vec![0usize; boxes.len()];
    class_aware_nms(boxes, scores, &classes, iou_threshold, max_keep)
}

/// NMS where boxes only suppress boxes of the same class.
pub fn class_aware_nms(
    boxes: &[BBox],
    scores: &[f32],
    classes: &[usize],
    iou_threshold: f32,
    max_keep: usize,
) -> Vec<usize> {
    let n = boxes.len().min(scores.len()).min(classes.len());
    if n == 0 || max_keep == 0 {
        return Vec::new();
    }

    let indices = sorted_by_score(&scores[..n]);
    let mut keep = Vec::new();
    let mut suppressed = vec![false; n];

    for &i in &indices {
        if suppressed[i] {
            continue;
        }

        keep.push(i);
        if keep.len() >= max_keep {
            break;
        }

        for &j in &indices {
            if i != j
                && !suppressed[j]
                && classes[i] == classes[j]
                && boxes[i].iou(&boxes[j]) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// A candidate region for [`weighted_nms`].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRegion {
    pub bbox: BBox,
    pub keypoints: Vec<Point>,
    pub score: f32,
}

/// Blending NMS as used by the MediaPipe detectors.
///
/// The highest scoring candidate absorbs every remaining candidate whose IoU
/// with it exceeds `iou_threshold`. The result's box and keypoints are the
/// score-weighted mean of the cluster; its score is the top candidate's.
pub fn weighted_nms(
    candidates: &[ScoredRegion],
    iou_threshold: f32,
    max_keep: usize,
) -> Vec<ScoredRegion> {
    let scores: Vec<f32> = candidates.iter().map(|c| c.score).collect();
    let mut remaining = sorted_by_score(&scores);
    let mut output = Vec::new();

    while let Some(&top) = remaining.first() {
        if output.len() >= max_keep {
            break;
        }
        let anchor = &candidates[top];

        let (cluster, rest): (Vec<usize>, Vec<usize>) = remaining
            .iter()
            .partition(|&&idx| idx == top || anchor.bbox.iou(&candidates[idx].bbox) > iou_threshold);
        remaining = rest;

        if cluster.len() == 1 {
            output.push(anchor.clone());
            continue;
        }

        let total: f32 = cluster.iter().map(|&i| candidates[i].score).sum();
        if total <= 0.0 {
            output.push(anchor.clone());
            continue;
        }

        let mut bbox = BBox::default();
        let mut keypoints = vec![Point::default(); anchor.keypoints.len()];
        for &i in &cluster {
            let c = &candidates[i];
            let w = c.score / total;
            bbox.x1 += c.bbox.x1 * w;
            bbox.y1 += c.bbox.y1 * w;
            bbox.x2 += c.bbox.x2 * w;
            bbox.y2 += c.bbox.y2 * w;
            for (acc, kp) in keypoints.iter_mut().zip(&c.keypoints) {
                acc.x += kp.x * w;
                acc.y += kp.y * w;
            }
        }

        output.push(ScoredRegion {
            bbox,
            keypoints,
            score: anchor.score,
        });
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nms_suppresses_overlaps() {
        let boxes = vec![
            BBox::new(0.0, 0.0, 10.0, 10.0),
            BBox::new(1.0, 1.0, 11.0, 11.0),
            BBox::new(50.0, 50.0, 60.0, 60.0),
        ];
        let scores = vec![0.8, 0.9, 0.7];
        assert_eq!(nms(&boxes, &scores, 0.5, 10), vec![1, 2]);
        assert_eq!(nms(&boxes, &scores, 0.5, 1), vec![1]);
        assert!(nms(&[], &[], 0.5, 10).is_empty());
    }

    #[test]
    fn test_nms_threshold_is_strict() {
        let boxes = vec![BBox::new(0.0, 0.0, 10.0, 10.0), BBox::new(0.0, 0.0, 10.0, 10.0)];
        let scores = vec![0.5, 0.5];
        assert_eq!(nms(&boxes, &scores, 1.0, 10), vec![0, 1]);
        assert_eq!(nms(&boxes, &scores, 0.99, 10), vec![0]);
    }

    #[test]
    fn test_class_aware_keeps_other_classes() {
        let boxes = vec![BBox::new(0.0, 0.0, 10.0, 10.0), BBox::new(0.0, 0.0, 10.0, 10.0)];
        let scores = vec![0.9, 0.8];
        assert_eq!(class_aware_nms(&boxes, &scores, &[0, 1], 0.5, 10), vec![0, 1]);
        assert_eq!(class_aware_nms(&boxes, &scores, &[2, 2], 0.5, 10), vec![0]);
    }

    #[test]
    fn test_weighted_nms_blends_cluster() {
        let candidates = vec![
            ScoredRegion {
                bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
                keypoints: vec![Point::new(0.0, 0.0)],
                score: 0.75,
            },
            ScoredRegion {
                bbox: BBox::new(2.0, 0.0, 12.0, 10.0),
                keypoints: vec![Point::new(4.0, 0.0)],
                score: 0.25,
            },
            ScoredRegion {
                bbox: BBox::new(100.0, 100.0, 110.0, 110.0),
                keypoints: vec![Point::new(105.0, 105.0)],
                score: 0.5,
            },
        ];

        let out = weighted_nms(&candidates, 0.3, 10);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].score, 0.75);
        assert!((out[0].bbox.x1 - 0.5).abs() < 1e-5);
        assert!((out[0].bbox.x2 - 10.5).abs() < 1e-5);
        assert!((out[0].keypoints[0].x - 1.0).abs() < 1e-5);
        assert_eq!(out[1], candidates[2]);

        assert_eq!(weighted_nms(&candidates, 0.3, 1).len(), 1);
    }
}
