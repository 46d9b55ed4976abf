//! Webhook subscription verification
//!
//! Meta verifies a webhook endpoint with a GET handshake carrying
//! `hub.mode`, `hub.verify_token` and `hub.challenge` query parameters.

use crate::error::{Result, WhatsAppError};

/// Validate the subscription handshake and return the challenge to echo.
///
/// Succeeds only when `mode` is "subscribe" and the presented token
/// matches the configured one. Both parameters present but wrong map to
/// `TokenMismatch`; either one absent maps to `MissingParameters`.
pub fn verify_subscription(
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
    expected_token: &str,
) -> Result<String> {
    let (Some(mode), Some(token)) = (mode, token) else {
        return Err(WhatsAppError::MissingParameters);
    };

    if mode == "subscribe" && token == expected_token {
        Ok(challenge.unwrap_or_default().to_string())
    } else {
        Err(WhatsAppError::TokenMismatch)
    }
}
