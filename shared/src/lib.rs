use serde::{Deserialize, Serialize};

/// A single polygon vertex as `[x, y]` in source-image pixels.
pub type Vertex = [i32; 2];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Prediction {
    #[serde(rename = "class")]
    pub class_name: String,
    pub confidence: f32,
    pub polygon: Vec<Vertex>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct PredictionsResponse {
    pub predictions: Vec<Prediction>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_uses_class_key_on_the_wire() {
        let response = PredictionsResponse {
            predictions: vec![Prediction {
                class_name: "Hammer".into(),
                confidence: 0.5,
                polygon: vec![[0, 0], [0, 3], [3, 3], [3, 0]],
            }],
        };

        let value = serde_json::to_value(&response).unwrap();
        let first = &value["predictions"][0];
        assert_eq!(first["class"], "Hammer");
        assert_eq!(first["confidence"], 0.5);
        assert_eq!(first["polygon"][2], serde_json::json!([3, 3]));
        assert!(first.get("class_name").is_none());
    }
}
