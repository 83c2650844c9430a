use crate::models::BoundingBox;

/// A scored box before class names are attached
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// Decode a YOLOv8/YOLO11 output tensor of shape `[4 + nc, n_boxes]`
/// (batch dimension already dropped), stored row-major.
///
/// Each column holds `cx, cy, w, h` followed by one score per class. Only the
/// best class of each box is kept, and only if it reaches `conf_threshold`.
pub fn decode_predictions(
    output: &[f32],
    num_attrs: usize,
    num_boxes: usize,
    conf_threshold: f32,
) -> Vec<Candidate> {
    if num_attrs <= 4 || output.len() < num_attrs * num_boxes {
        return Vec::new();
    }
    let at = |attr: usize, i: usize| output[attr * num_boxes + i];

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let mut best_class = 0;
        let mut best_score = f32::MIN;
        for class_id in 0..num_attrs - 4 {
            let score = at(4 + class_id, i);
            if score > best_score {
                best_score = score;
                best_class = class_id;
            }
        }

        if best_score < conf_threshold {
            continue;
        }

        candidates.push(Candidate {
            class_id: best_class,
            confidence: best_score,
            bbox: BoundingBox::from_center(at(0, i), at(1, i), at(2, i), at(3, i)),
        });
    }
    candidates
}

/// Per-class non-maximum suppression.
///
/// Returns at most `max_detections` candidates sorted by descending confidence.
pub fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
