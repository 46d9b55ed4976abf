//! Webhook server for the WhatsApp Cloud API
//!
//! Handles the subscription handshake, inbound message deliveries and
//! the out-of-flow template send endpoint.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tower_http::cors::CorsLayer;
use tracing::{debug, error, info, warn};

use crate::api::MessageSender;
use crate::error::{Result, WhatsAppError};
use crate::handler::MessageHandler;
use crate::types::{extract_message, WebhookPayload};
use crate::verify::verify_subscription;

type HmacSha256 = Hmac<Sha256>;

/// Webhook server state
#[derive(Clone)]
pub struct WebhookState {
    pub verify_token: String,
    pub app_secret: Option<String>,
    pub handler: Arc<MessageHandler>,
    pub sender: Arc<dyn MessageSender>,
}

/// Webhook server
pub struct WebhookServer {
    addr: SocketAddr,
    state: WebhookState,
}

impl WebhookServer {
    /// Create a new webhook server
    pub fn new(addr: SocketAddr, state: WebhookState) -> Self {
        Self { addr, state }
    }

    /// Start the webhook server
    pub async fn start(self) -> Result<()> {
        info!("Starting WhatsApp webhook server on {}", self.addr);

        let app = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| WhatsAppError::Webhook(e.to_string()))?;

        axum::serve(listener, app)
            .await
            .map_err(|e| WhatsAppError::Webhook(e.to_string()))?;

        Ok(())
    }
}

/// Create the webhook router
pub fn create_router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/send-template", post(send_template))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(state))
}

/// Query parameters of the subscription handshake
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Handle the GET handshake Meta sends when the webhook is subscribed
async fn verify_webhook(
    State(state): State<Arc<WebhookState>>,
    Query(params): Query<VerifyParams>,
) -> (StatusCode, String) {
    match verify_subscription(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        &state.verify_token,
    ) {
        Ok(challenge) => {
            info!("Webhook subscription verified");
            (StatusCode::OK, challenge)
        }
        Err(WhatsAppError::TokenMismatch) => {
            warn!("Webhook verification failed: token mismatch");
            (StatusCode::FORBIDDEN, String::new())
        }
        Err(_) => {
            warn!("Webhook verification failed: missing parameters");
            (StatusCode::BAD_REQUEST, String::new())
        }
    }
}

/// Handle an inbound message delivery.
///
/// Everything past the signature check answers 200: WhatsApp redelivers
/// anything else, and a malformed payload will stay malformed.
async fn receive_webhook(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = &state.app_secret {
        let signature = headers
            .get("x-hub-signature-256")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !verify_signature(secret, &body, signature) {
            warn!("Rejecting payload with invalid signature");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Ignoring unparseable webhook payload: {}", e);
            return StatusCode::OK;
        }
    };

    match extract_message(&payload) {
        Some(message) => {
            if let Err(e) = state.handler.process_message(&message).await {
                error!("Error processing message {}: {}", message.id, e);
            }
        }
        None => debug!("Webhook delivery carried no message"),
    }

    StatusCode::OK
}

/// Verify an X-Hub-Signature-256 header against the raw request body
fn verify_signature(app_secret: &str, body: &[u8], signature: &str) -> bool {
    let Some(signature) = signature.strip_prefix("sha256=") else {
        return false;
    };

    let Ok(expected) = hex::decode(signature) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };

    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Template send request payload
#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    /// Recipient phone number
    pub to: String,
    /// Template name; defaults to the pre-registered hello_world template
    #[serde(default = "default_template")]
    pub template: String,
}

fn default_template() -> String {
    "hello_world".to_string()
}

/// Template send response payload
#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub success: bool,
    pub message_id: String,
}

/// Generic API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Send a pre-registered template to an explicit recipient.
///
/// Runs outside the conversation flow; used to open a conversation from
/// the business side.
async fn send_template(
    State(state): State<Arc<WebhookState>>,
    Json(req): Json<TemplateRequest>,
) -> std::result::Result<Json<TemplateResponse>, (StatusCode, Json<ErrorResponse>)> {
    info!("Template send requested for {}", req.to);

    match state.sender.send_template(&req.to, &req.template, "en_US").await {
        Ok(message_id) => Ok(Json(TemplateResponse {
            success: true,
            message_id,
        })),
        Err(e) => {
            error!("Template send failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    error: e.to_string(),
                }),
            ))
        }
    }
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}
