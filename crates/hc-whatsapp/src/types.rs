//! WhatsApp Cloud API webhook types
//!
//! The Cloud API nests the interesting part of a delivery four levels
//! deep, and every level is optional. `extract_message` flattens that
//! into one typed event at the boundary.

use serde::Deserialize;

/// Top-level webhook payload
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

/// Webhook entry, one per business account
#[derive(Debug, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

/// A change notification inside an entry
#[derive(Debug, Deserialize)]
pub struct WebhookChange {
    pub value: Option<ChangeValue>,
}

/// The value of a change; status-only deliveries carry no messages
#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
}

/// A message as delivered by the Cloud API
#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub id: Option<String>,
    pub from: Option<String>,
    pub text: Option<MessageText>,
    pub interactive: Option<MessageInteractive>,
    pub location: Option<MessageLocation>,
    pub image: Option<MessageImage>,
}

/// Text content
#[derive(Debug, Deserialize)]
pub struct MessageText {
    pub body: Option<String>,
}

/// Interactive content (button or list replies)
#[derive(Debug, Deserialize)]
pub struct MessageInteractive {
    pub button_reply: Option<InteractiveReply>,
    pub list_reply: Option<InteractiveReply>,
}

/// The selected option of an interactive message
#[derive(Debug, Deserialize)]
pub struct InteractiveReply {
    pub id: String,
}

/// Shared location content
#[derive(Debug, Deserialize)]
pub struct MessageLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Image content
#[derive(Debug, Deserialize)]
pub struct MessageImage {
    pub id: String,
}

/// Message content after the nested payload has been flattened
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Free text, or the id carried by a button or list reply
    Text(String),
    /// Shared coordinates
    Location { lat: f64, lng: f64 },
    /// Image attachment, carrying the Cloud API media id
    Image { media_id: String },
    /// A message kind the flow does not handle (audio, sticker, ...)
    Unrecognized,
}

/// A single inbound message with its sender and delivery id
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Delivery id (wamid), used to detect redelivered events
    pub id: String,
    /// Sender phone number
    pub from: String,
    /// Flattened message content
    pub event: InboundEvent,
}

/// Extract the first message from a webhook payload.
///
/// Returns `None` when no message with a sender and a delivery id can be
/// found; such payloads (status updates, empty batches) are still acked
/// by the webhook.
pub fn extract_message(payload: &WebhookPayload) -> Option<IncomingMessage> {
    let message = payload
        .entry
        .first()?
        .changes
        .first()?
        .value
        .as_ref()?
        .messages
        .first()?;

    let id = message.id.clone()?;
    let from = message.from.clone()?;

    let event = if let Some(text) = &message.text {
        match &text.body {
            Some(body) => InboundEvent::Text(body.clone()),
            None => InboundEvent::Unrecognized,
        }
    } else if let Some(interactive) = &message.interactive {
        // Button and list replies carry the option id as the payload
        match interactive.button_reply.as_ref().or(interactive.list_reply.as_ref()) {
            Some(reply) => InboundEvent::Text(reply.id.clone()),
            None => InboundEvent::Unrecognized,
        }
    } else if let Some(location) = &message.location {
        InboundEvent::Location {
            lat: location.latitude,
            lng: location.longitude,
        }
    } else if let Some(image) = &message.image {
        InboundEvent::Image {
            media_id: image.id.clone(),
        }
    } else {
        InboundEvent::Unrecognized
    };

    Some(IncomingMessage { id, from, event })
}
