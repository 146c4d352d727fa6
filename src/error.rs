use thiserror::Error;

use crate::x_api::ApiError;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("A job is already running: {0}")]
    AlreadyRunning(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("X API error: {0}")]
    Api(#[from] ApiError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// A fault that ends the running job with `Phase::Error`.
///
/// Ordinary per-item failures are outcomes, not errors; anything surfacing
/// here could not be classified as OK/NG and stops the run.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("request failed: {0}")]
    Api(#[from] ApiError),

    #[error("malformed response for item {item_id}: {detail}")]
    Malformed { item_id: String, detail: String },

    #[error("audit log write failed: {0}")]
    AuditLog(#[from] std::io::Error),
}
