use std::path::Path;

use image::RgbImage;
use rten::{Dimension, Model};
use rten_tensor::{NdTensor, NdTensorView};
use rten_tensor::prelude::*;
use tracing::{debug, info};

use crate::detection::postprocess::{decode_predictions, non_max_suppression};
use crate::detection::preprocessing::{Letterbox, prepare_input};
use crate::detection::{Annotator, DetectError, Detection, Detector};
use crate::models::DetectedRegion;

/// Post-processing parameters for YOLO models
#[derive(Debug, Clone)]
pub struct YoloOptions {
    /// Square model input size in pixels
    pub input_size: u32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloOptions {
    fn default() -> Self {
        Self {
            input_size: 640,
            iou_threshold: 0.7,
            max_detections: 300,
        }
    }
}

/// YOLOv8/YOLO11 detector running an `.rten` model
pub struct YoloDetector {
    model: Model,
    class_names: Vec<String>,
    options: YoloOptions,
    annotator: Annotator,
}

impl std::fmt::Debug for YoloDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YoloDetector")
            .field("class_names", &self.class_names)
            .field("options", &self.options)
            .field("annotator", &self.annotator)
            .finish()
    }
}

/// Read class names, one per line; line index is the class id
pub fn load_class_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>, DetectError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| DetectError::LabelsLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let names: Vec<String> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(DetectError::LabelsLoad {
            path: path.to_path_buf(),
            reason: "no class names".to_string(),
        });
    }
    Ok(names)
}

/// Check a model's per-box attribute count against the class list
fn check_attribute_count(num_attrs: usize, num_classes: usize) -> Result<(), String> {
    if num_attrs == 4 + num_classes {
        return Ok(());
    }
    Err(format!(
        "model predicts {} attributes per box, expected {} for {} classes",
        num_attrs,
        4 + num_classes,
        num_classes
    ))
}

/// Static attribute count of the model output `[1, 4 + nc, N]`, when the
/// model declares it
fn declared_attribute_count(model: &Model) -> Option<usize> {
    let output_id = *model.output_ids().first()?;
    let shape = model.node_info(output_id)?.shape()?;
    match shape.as_slice() {
        [_, Dimension::Fixed(num_attrs), _] => Some(*num_attrs),
        _ => None,
    }
}

/// Convert a raw `[1, 4 + nc, N]` output tensor into regions in source
/// image pixels.
///
/// Boxes are decoded, filtered by `confidence_threshold`, reduced by NMS,
/// mapped back through the letterbox and clamped to `image_size`.
pub fn regions_from_output(
    output: NdTensorView<'_, f32, 3>,
    letterbox: &Letterbox,
    image_size: (u32, u32),
    class_names: &[String],
    confidence_threshold: f32,
    options: &YoloOptions,
) -> Result<Vec<DetectedRegion>, DetectError> {
    let [_batch, num_attrs, num_boxes] = output.shape();
    check_attribute_count(num_attrs, class_names.len()).map_err(DetectError::Inference)?;

    let flat = output.to_vec();
    let candidates = decode_predictions(&flat, num_attrs, num_boxes, confidence_threshold);
    let raw_count = candidates.len();
    let kept = non_max_suppression(candidates, options.iou_threshold, options.max_detections);
    debug!("{} candidate boxes, {} after NMS", raw_count, kept.len());

    let (width, height) = image_size;
    Ok(kept
        .into_iter()
        .map(|c| DetectedRegion {
            class_id: c.class_id,
            class_label: label_for(class_names, c.class_id),
            confidence: c.confidence,
            bbox: letterbox.to_source(&c.bbox).clamp(width, height),
        })
        .collect())
}

fn label_for(class_names: &[String], class_id: usize) -> String {
    class_names
        .get(class_id)
        .cloned()
        .unwrap_or_else(|| format!("class_{}", class_id))
}

impl YoloDetector {
    /// Load model weights and class names.
    ///
    /// Fails when the model declares an output width that does not match the
    /// number of class names.
    pub fn load<P: AsRef<Path>>(
        model_path: P,
        class_names: Vec<String>,
        options: YoloOptions,
    ) -> Result<Self, DetectError> {
        let model_path = model_path.as_ref();
        if !model_path.is_file() {
            return Err(DetectError::ModelLoad {
                path: model_path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let model = Model::load_file(model_path).map_err(|e| DetectError::ModelLoad {
            path: model_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if let Some(num_attrs) = declared_attribute_count(&model) {
            check_attribute_count(num_attrs, class_names.len()).map_err(|reason| {
                DetectError::ModelLoad {
                    path: model_path.to_path_buf(),
                    reason,
                }
            })?;
        }

        info!(
            "Loaded detection model {:?} ({} classes, input {}px)",
            model_path,
            class_names.len(),
            options.input_size
        );

        Ok(Self {
            model,
            class_names,
            options,
            annotator: Annotator::new(),
        })
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    fn infer(&self, img: &RgbImage) -> Result<(NdTensor<f32, 3>, Letterbox), DetectError> {
        if img.width() == 0 || img.height() == 0 {
            return Err(DetectError::Inference("image has no pixels".to_string()));
        }

        let input = prepare_input(img, self.options.input_size);
        let size = input.size as usize;
        let tensor = NdTensor::from_data([1, 3, size, size], input.data);

        let output = self
            .model
            .run_one(tensor.view().into(), None)
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| DetectError::Inference(format!("unexpected model output: {:?}", e)))?;

        Ok((output, input.letterbox))
    }
}

impl Detector for YoloDetector {
    fn detect(&self, image: &RgbImage, confidence_threshold: f32) -> Result<Detection, DetectError> {
        let (output, letterbox) = self.infer(image)?;
        let regions = regions_from_output(
            output.view(),
            &letterbox,
            image.dimensions(),
            &self.class_names,
            confidence_threshold,
            &self.options,
        )?;

        let annotated = self.annotator.annotate(image, &regions);
        Ok(Detection { annotated, regions })
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(labels: &[&str]) -> Vec<String> {
        labels.iter().map(|l| l.to_string()).collect()
    }

    /// One box per column: cx, cy, w, h, then one score per class
    fn output(columns: &[[f32; 6]]) -> NdTensor<f32, 3> {
        let n = columns.len();
        let mut data = vec![0.0; 6 * n];
        for (i, column) in columns.iter().enumerate() {
            for (attr, value) in column.iter().enumerate() {
                data[attr * n + i] = *value;
            }
        }
        NdTensor::from_data([1, 6, n], data)
    }

    #[test]
    fn attribute_count_must_match_class_names() {
        let tensor = output(&[[320.0, 320.0, 50.0, 50.0, 0.9, 0.1]]);
        let letterbox = Letterbox { ratio: 1.0, pad_x: 0, pad_y: 0 };

        let result = regions_from_output(
            tensor.view(),
            &letterbox,
            (640, 640),
            &names(&["BlackSpot", "Anthracnose", "RingSpot"]),
            0.25,
            &YoloOptions::default(),
        );

        assert!(matches!(result, Err(DetectError::Inference(_))));
        assert!(check_attribute_count(6, 2).is_ok());
        assert!(check_attribute_count(6, 3).is_err());
    }

    #[test]
    fn boxes_are_mapped_to_source_pixels_and_labelled() -> anyhow::Result<()> {
        // 1280x640 source letterboxed into 640: ratio 0.5, 160px padding on top
        let letterbox = Letterbox { ratio: 0.5, pad_x: 0, pad_y: 160 };
        let tensor = output(&[
            [200.0, 300.0, 100.0, 100.0, 0.9, 0.1],
            [500.0, 400.0, 40.0, 40.0, 0.2, 0.7],
            [600.0, 300.0, 40.0, 40.0, 0.1, 0.1],
        ]);

        let regions = regions_from_output(
            tensor.view(),
            &letterbox,
            (1280, 640),
            &names(&["BlackSpot", "Anthracnose"]),
            0.25,
            &YoloOptions::default(),
        )?;

        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].class_label, "BlackSpot");
        assert_eq!(regions[0].bbox.as_array(), [300.0, 180.0, 500.0, 380.0]);
        assert_eq!(regions[1].class_label, "Anthracnose");
        assert_eq!(regions[1].class_id, 1);
        assert_eq!(regions[1].bbox.as_array(), [960.0, 440.0, 1040.0, 520.0]);
        Ok(())
    }

    #[test]
    fn boxes_are_clamped_to_the_source_image() -> anyhow::Result<()> {
        let letterbox = Letterbox { ratio: 1.0, pad_x: 0, pad_y: 0 };
        let tensor = output(&[[10.0, 630.0, 60.0, 60.0, 0.8, 0.0]]);

        let regions = regions_from_output(
            tensor.view(),
            &letterbox,
            (640, 640),
            &names(&["BlackSpot", "Anthracnose"]),
            0.25,
            &YoloOptions::default(),
        )?;

        assert_eq!(regions[0].bbox.as_array(), [0.0, 600.0, 40.0, 640.0]);
        Ok(())
    }

    #[test]
    fn class_names_are_read_one_per_line() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "BlackSpot

  Anthracnose 
")?;
        assert_eq!(load_class_names(&path)?, names(&["BlackSpot", "Anthracnose"]));

        std::fs::write(&path, "
")?;
        assert!(matches!(load_class_names(&path), Err(DetectError::LabelsLoad { .. })));
        Ok(())
    }
}
