use thiserror::Error;

/// Failures surfaced by the detection engine.
///
/// Only `Configuration` and `NotLoaded` describe whole-pipeline preconditions.
/// The per-item variants are produced internally, logged, and folded into a
/// skip or a risk signal before a verdict is returned.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("classifier model is not loaded")]
    NotLoaded,

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("worker pool is closed")]
    PoolClosed,

    #[error("attachment inspection failed: {0}")]
    AttachmentInspection(String),

    #[error("domain analysis failed: {0}")]
    DomainAnalysis(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
