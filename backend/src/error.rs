use std::time::Duration;

use actix_multipart::MultipartError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use shared::ErrorResponse;

use crate::model::InferenceError;
use crate::postprocess::ValidationError;

const INTERNAL_ERROR_MESSAGE: &str = "Internal Server Error";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unsupported file type")]
    UnsupportedMediaType,
    #[error("Missing upload field '{0}'")]
    MissingUpload(&'static str),
    #[error("Upload error: {0}")]
    Upload(#[from] MultipartError),
    #[error("Image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),
    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("Inference timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    OutputValidation(#[from] ValidationError),
}

impl AppError {
    /// Message sent to the client; internal details stay in the logs.
    fn client_message(&self) -> String {
        match self {
            AppError::UnsupportedMediaType
            | AppError::MissingUpload(_)
            | AppError::OutputValidation(_) => self.to_string(),
            _ => INTERNAL_ERROR_MESSAGE.to_string(),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::MissingUpload(_) | AppError::OutputValidation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Upload(_)
            | AppError::ImageDecode(_)
            | AppError::Inference(_)
            | AppError::Timeout(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.client_message(),
        })
    }
}
