mod config;
mod error;
mod model;
mod postprocess;
mod retry;
mod routes;
mod state;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use config::ServiceConfig;
use model::{InferenceEngine, ModelLoadError};
use routes::configure_routes;
use state::AppState;
use std::env;
use std::sync::Arc;

#[cfg(feature = "torch")]
fn load_engine(config: &ServiceConfig) -> Result<Arc<dyn InferenceEngine>, ModelLoadError> {
    let engine = model::torch::TorchEngine::load(&config.model_path, config.decoder.clone())?;
    Ok(Arc::new(engine))
}

#[cfg(not(feature = "torch"))]
fn load_engine(_config: &ServiceConfig) -> Result<Arc<dyn InferenceEngine>, ModelLoadError> {
    Err(ModelLoadError::BackendUnavailable("torch"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = ServiceConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration error: {}", e))
    })?;

    let engine = load_engine(&config).map_err(|e| {
        log::error!("Failed to load model at startup: {}", e);
        std::io::Error::other(format!("Model loading failed: {}", e))
    })?;

    let state = web::Data::new(AppState::from_config(engine, &config));
    log::info!(
        "Model ready: {} class labels, confidence threshold {}",
        state.assembler.labels().len(),
        state.assembler.confidence_threshold()
    );

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
