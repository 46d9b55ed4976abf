//! hc-whatsapp: WhatsApp Cloud API gateway for HealthConnect
//!
//! This crate receives webhook deliveries from the Meta Cloud API,
//! advances the per-user intake conversation, and sends replies and
//! template messages back through the Graph API.

pub mod api;
pub mod error;
pub mod flow;
pub mod handler;
pub mod types;
pub mod verify;
pub mod webhook;

pub use api::{CloudApi, MessageSender};
pub use error::{Result, WhatsAppError};
pub use flow::{advance, Button, Reply};
pub use handler::MessageHandler;
pub use types::{extract_message, InboundEvent, IncomingMessage, WebhookPayload};
pub use verify::verify_subscription;
pub use webhook::{WebhookServer, WebhookState};
