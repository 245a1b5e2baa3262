use shared::PredictionsResponse;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("predictions[{0}].class: label must not be empty")]
    EmptyLabel(usize),
    #[error("predictions[{index}].confidence: {value} is not within [0, 1]")]
    Confidence { index: usize, value: f32 },
    #[error("predictions[{index}].polygon: expected at least 3 points, got {points}")]
    Polygon { index: usize, points: usize },
}

/// Structural checks on a response before it is serialized.
pub fn validate_response(response: &PredictionsResponse) -> Result<(), ValidationError> {
    for (index, prediction) in response.predictions.iter().enumerate() {
        if prediction.class_name.is_empty() {
            return Err(ValidationError::EmptyLabel(index));
        }
        let value = prediction.confidence;
        if !value.is_finite() || !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::Confidence { index, value });
        }
        if prediction.polygon.len() < 3 {
            return Err(ValidationError::Polygon {
                index,
                points: prediction.polygon.len(),
            });
        }
    }
    Ok(())
}
