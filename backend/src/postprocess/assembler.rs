use shared::{Prediction, PredictionsResponse};

use super::labels::ClassLabelTable;
use super::polygon::MaskPolygonExtractor;
use crate::model::Detections;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Filters raw detections and turns the survivors into labeled polygons.
#[derive(Debug, Clone)]
pub struct PredictionAssembler {
    confidence_threshold: f32,
    labels: ClassLabelTable,
    extractor: MaskPolygonExtractor,
}

impl PredictionAssembler {
    pub fn new(confidence_threshold: f32, labels: ClassLabelTable) -> Self {
        Self {
            confidence_threshold,
            labels,
            extractor: MaskPolygonExtractor::new(),
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn labels(&self) -> &ClassLabelTable {
        &self.labels
    }

    /// Keeps the engine's detection order; nothing is sorted or merged.
    pub fn assemble(&self, detections: &Detections) -> PredictionsResponse {
        let items = match detections {
            Detections::NoDetections => return PredictionsResponse::default(),
            Detections::Found(items) => items,
        };

        let mut predictions = Vec::with_capacity(items.len());
        for (idx, detection) in items.iter().enumerate() {
            if detection.confidence < self.confidence_threshold {
                continue;
            }

            let polygon = match self.extractor.extract(&detection.mask) {
                Ok(polygon) => polygon,
                Err(e) => {
                    log::warn!("Skipping detection {}: {}", idx, e);
                    continue;
                }
            };
            if polygon.is_empty() {
                log::debug!("Detection {} has no usable contour", idx);
                continue;
            }

            predictions.push(Prediction {
                class_name: self.labels.resolve(detection.class_index),
                confidence: detection.confidence,
                polygon: polygon.to_vertices(),
            });
        }

        PredictionsResponse { predictions }
    }
}

impl Default for PredictionAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, ClassLabelTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MaskGrid, RawDetection};

    fn square_mask() -> MaskGrid {
        MaskGrid::from_fn(10, 10, |r, c| {
            if (2..6).contains(&r) && (3..8).contains(&c) { 1.0 } else { 0.0 }
        })
    }

    fn detection(confidence: f32, class_index: i64, mask: MaskGrid) -> RawDetection {
        RawDetection {
            mask,
            confidence,
            class_index,
        }
    }

    #[test]
    fn no_detections_short_circuits() {
        let response = PredictionAssembler::default().assemble(&Detections::NoDetections);
        assert!(response.predictions.is_empty());
    }

    #[test]
    fn below_threshold_is_dropped_regardless_of_mask() {
        let detections = Detections::Found(vec![detection(0.2499, 0, square_mask())]);
        let response = PredictionAssembler::default().assemble(&detections);
        assert!(response.predictions.is_empty());
    }

    #[test]
    fn equal_to_threshold_is_kept() {
        let detections = Detections::Found(vec![detection(0.25, 1, square_mask())]);
        let response = PredictionAssembler::default().assemble(&detections);
        assert_eq!(response.predictions.len(), 1);
        assert_eq!(response.predictions[0].class_name, "Backsaw");
    }

    #[test]
    fn empty_masks_are_dropped() {
        let detections = Detections::Found(vec![
            detection(0.9, 0, MaskGrid::zeros(10, 10)),
            detection(0.8, 2, square_mask()),
        ]);
        let response = PredictionAssembler::default().assemble(&detections);
        assert_eq!(response.predictions.len(), 1);
        assert_eq!(response.predictions[0].class_name, "Calipers");
    }

    #[test]
    fn unknown_class_indices_fall_back_to_decimal() {
        let assembler = PredictionAssembler::new(0.25, ClassLabelTable::new(vec!["only".into()]));
        let detections = Detections::Found(vec![
            detection(0.5, 1, square_mask()),
            detection(0.5, -3, square_mask()),
            detection(0.5, 0, square_mask()),
        ]);
        let labels: Vec<String> = assembler
            .assemble(&detections)
            .predictions
            .into_iter()
            .map(|p| p.class_name)
            .collect();
        assert_eq!(labels, vec!["1", "-3", "only"]);
    }

    #[test]
    fn input_order_is_preserved() {
        let detections = Detections::Found(vec![
            detection(0.3, 4, square_mask()),
            detection(0.1, 5, square_mask()),
            detection(0.95, 6, square_mask()),
            detection(0.6, 7, square_mask()),
        ]);
        let response = PredictionAssembler::default().assemble(&detections);
        let confidences: Vec<f32> = response.predictions.iter().map(|p| p.confidence).collect();
        assert_eq!(confidences, vec![0.3, 0.95, 0.6]);
    }

    #[test]
    fn single_rectangle_detection_end_to_end() {
        let table = ClassLabelTable::default();
        let detections = Detections::Found(vec![detection(0.9, 3, square_mask())]);
        let response = PredictionAssembler::new(0.25, table.clone()).assemble(&detections);

        assert_eq!(response.predictions.len(), 1);
        let prediction = &response.predictions[0];
        assert_eq!(Some(prediction.class_name.as_str()), table.get(3));
        assert_eq!(prediction.confidence, 0.9);

        let mut polygon = prediction.polygon.clone();
        polygon.sort();
        assert_eq!(polygon, vec![[3, 2], [3, 5], [7, 2], [7, 5]]);
    }
}
