//! WhatsApp Cloud API client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use crate::error::{Result, WhatsAppError};
use crate::flow::{Button, Reply};

/// Graph API base URL
const GRAPH_API_URL: &str = "https://graph.facebook.com/v22.0";

/// Message transport the conversation handler dispatches replies through
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Send a plain text message, returning the message id
    async fn send_text(&self, to: &str, body: &str) -> Result<String>;

    /// Send a text body with up to three reply buttons
    async fn send_buttons(&self, to: &str, body: &str, buttons: &[Button]) -> Result<String>;

    /// Send a pre-registered template message
    async fn send_template(&self, to: &str, name: &str, language: &str) -> Result<String>;

    /// Dispatch a flow reply
    async fn send_reply(&self, to: &str, reply: &Reply) -> Result<String> {
        match reply {
            Reply::Text(body) => self.send_text(to, body).await,
            Reply::Buttons { body, buttons } => self.send_buttons(to, body, buttons).await,
        }
    }
}

/// WhatsApp Cloud API client
#[derive(Clone)]
pub struct CloudApi {
    client: Client,
    base_url: String,
    access_token: String,
    phone_number_id: String,
}

impl CloudApi {
    /// Create a new Cloud API client
    pub fn new(access_token: impl Into<String>, phone_number_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: GRAPH_API_URL.to_string(),
            access_token: access_token.into(),
            phone_number_id: phone_number_id.into(),
        }
    }

    /// Override the Graph API base URL (tests, proxies)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/{}/messages", self.base_url, self.phone_number_id)
    }

    /// POST a message payload to the Cloud API and return the message id
    async fn post_message(&self, payload: serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        debug!("Graph API response: {} - {}", status, body);

        if !status.is_success() {
            error!("Graph API error: {} - {}", status, body);
            return Err(WhatsAppError::GraphApi(format!(
                "Status: {}, Body: {}",
                status, body
            )));
        }

        let response_json: serde_json::Value = serde_json::from_str(&body)?;
        let message_id = response_json["messages"][0]["id"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(message_id)
    }
}

#[async_trait]
impl MessageSender for CloudApi {
    async fn send_text(&self, to: &str, body: &str) -> Result<String> {
        info!("Sending text message to {}", to);

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": body },
        });

        self.post_message(payload).await
    }

    async fn send_buttons(&self, to: &str, body: &str, buttons: &[Button]) -> Result<String> {
        info!("Sending button menu to {}", to);

        let buttons_json: Vec<_> = buttons
            .iter()
            .map(|b| {
                json!({
                    "type": "reply",
                    "reply": { "id": b.id, "title": b.title },
                })
            })
            .collect();

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": body },
                "action": { "buttons": buttons_json },
            },
        });

        self.post_message(payload).await
    }

    async fn send_template(&self, to: &str, name: &str, language: &str) -> Result<String> {
        info!("Sending template {} to {}", name, to);

        let payload = json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "template",
            "template": {
                "name": name,
                "language": { "code": language },
            },
        });

        self.post_message(payload).await
    }
}
