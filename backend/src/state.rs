use std::sync::Arc;
use std::time::Duration;

use actix_web::web;
use image::RgbImage;
use tokio::sync::Semaphore;

use crate::config::ServiceConfig;
use crate::error::AppError;
use crate::model::{Detections, InferenceEngine, InferenceError};
use crate::postprocess::PredictionAssembler;
use crate::retry::RetryPolicy;

/// Everything a request needs, built once at startup and shared read-only.
pub struct AppState {
    engine: Arc<dyn InferenceEngine>,
    pub assembler: PredictionAssembler,
    retry: RetryPolicy,
    request_timeout: Option<Duration>,
    permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        assembler: PredictionAssembler,
        retry: RetryPolicy,
        request_timeout: Option<Duration>,
        max_concurrent_inferences: usize,
    ) -> Self {
        Self {
            engine,
            assembler,
            retry,
            request_timeout,
            permits: Arc::new(Semaphore::new(max_concurrent_inferences.max(1))),
        }
    }

    pub fn from_config(engine: Arc<dyn InferenceEngine>, config: &ServiceConfig) -> Self {
        Self::new(
            engine,
            PredictionAssembler::new(config.confidence_threshold, config.label_table()),
            config.retry.policy(),
            config.request_timeout(),
            config.max_concurrent_inferences,
        )
    }

    /// Runs the engine under the retry policy and the optional time limit.
    pub async fn detect(&self, image: Arc<RgbImage>) -> Result<Detections, AppError> {
        let attempts = self.retry.run(|| self.attempt(image.clone()));
        match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, attempts)
                .await
                .map_err(|_| AppError::Timeout(limit))?
                .map_err(AppError::from),
            None => attempts.await.map_err(AppError::from),
        }
    }

    // The permit covers one engine call, never a backoff wait. It moves into
    // the blocking task so it is held until the engine returns, even when the
    // request gives up first.
    async fn attempt(&self, image: Arc<RgbImage>) -> Result<Detections, InferenceError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| InferenceError::Cancelled)?;
        let engine = self.engine.clone();
        web::block(move || {
            let _permit = permit;
            engine.infer(&image)
        })
        .await
        .map_err(|_| InferenceError::Cancelled)?
    }
}
