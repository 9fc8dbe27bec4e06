use std::{process::exit, sync::Arc};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use cfmwrap::Predictor;
use clap::Parser;
use config::Config;
use log::{error, info};

mod config;
mod error;
mod handlers;
mod templates;

/// Serve CFM-ID predictions over HTTP.
#[derive(Parser)]
struct Cli {
    /// A TOML configuration file. The defaults are used for anything it
    /// leaves out, or for everything if it isn't given.
    config: Option<String>,
}

pub(crate) struct AppState {
    pub(crate) predictor: Predictor,

    /// the default probability threshold
    pub(crate) prob_thresh: f64,

    pub(crate) max_upload_bytes: usize,
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    let limit = DefaultBodyLimit::max(state.max_upload_bytes);
    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(handlers::healthz))
        .route("/predict", post(handlers::predict))
        .route("/predict/batch", post(handlers::predict_batch).layer(limit))
        .with_state(state)
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| {
            error!("{e}");
            exit(1);
        }),
        None => Config::default(),
    };

    let state = Arc::new(AppState {
        predictor: config.predictor(),
        prob_thresh: config.prob_thresh,
        max_upload_bytes: config.max_upload_bytes,
    });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            exit(1);
        }
    };

    info!("CFM-ID wrapper listening on http://{addr}");
    if let Err(e) = axum::serve(listener, router(state)).await {
        error!("server error: {e}");
        exit(1);
    }
}
