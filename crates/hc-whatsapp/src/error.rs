//! Error types for hc-whatsapp

use thiserror::Error;

/// hc-whatsapp error type
#[derive(Error, Debug)]
pub enum WhatsAppError {
    #[error("Verification failed: token mismatch")]
    TokenMismatch,

    #[error("Verification failed: missing parameters")]
    MissingParameters,

    #[error("Graph API error: {0}")]
    GraphApi(String),

    #[error("Webhook error: {0}")]
    Webhook(String),

    #[error("Store error: {0}")]
    Store(#[from] hc_core::Error),

    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, WhatsAppError>;
