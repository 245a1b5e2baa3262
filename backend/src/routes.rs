use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use log::{error, info};
use shared::HealthResponse;
use uuid::Uuid;

use crate::error::AppError;
use crate::postprocess::validate_response;
use crate::state::AppState;

const UPLOAD_FIELD: &str = "file";

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(predict)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse::ok())
}

async fn predict(state: web::Data<AppState>, payload: Multipart) -> Result<HttpResponse, AppError> {
    let request_id = Uuid::new_v4();
    let result = run_prediction(&state, payload, request_id).await;
    if let Err(e) = &result {
        error!("[{}] Prediction failed: {}", request_id, e);
    }
    result
}

async fn run_prediction(
    state: &AppState,
    mut payload: Multipart,
    request_id: Uuid,
) -> Result<HttpResponse, AppError> {
    let upload = read_upload(&mut payload).await?;
    let image = image::load_from_memory(&upload)?.to_rgb8();
    info!(
        "[{}] Received {} byte upload, {}x{} image",
        request_id,
        upload.len(),
        image.width(),
        image.height()
    );

    let detections = state.detect(Arc::new(image)).await?;
    let response = state.assembler.assemble(&detections);
    validate_response(&response)?;

    info!(
        "[{}] {} raw detections, {} predictions",
        request_id,
        detections.len(),
        response.predictions.len()
    );
    Ok(HttpResponse::Ok().json(response))
}

/// Returns the bytes of the `file` field. The content type is checked before
/// anything is read.
async fn read_upload(payload: &mut Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(mut field) = payload.try_next().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let is_image = field
            .content_type()
            .is_some_and(|mime| mime.type_().as_str() == "image");
        if !is_image {
            return Err(AppError::UnsupportedMediaType);
        }

        let mut data = Vec::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }
        return Ok(data);
    }
    Err(AppError::MissingUpload(UPLOAD_FIELD))
}
