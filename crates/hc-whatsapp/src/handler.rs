//! Message handler for the intake conversation

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info};

use hc_core::UserStore;

use crate::api::MessageSender;
use crate::error::Result;
use crate::flow;
use crate::types::IncomingMessage;

/// Bridges inbound messages to the conversation flow.
///
/// Loads the sender's state, advances it, persists the result, then
/// dispatches the reply. The store lock serializes read-modify-write
/// across senders and is released before the send.
pub struct MessageHandler {
    store: Arc<Mutex<UserStore>>,
    sender: Arc<dyn MessageSender>,
}

impl MessageHandler {
    /// Create a new message handler
    pub fn new(store: Arc<Mutex<UserStore>>, sender: Arc<dyn MessageSender>) -> Self {
        Self { store, sender }
    }

    /// Process one inbound message end to end.
    ///
    /// The new state is persisted before the reply goes out, so a send
    /// failure never loses conversation progress. A message whose id
    /// matches the last one handled for that sender is a redelivery and
    /// is skipped entirely.
    pub async fn process_message(&self, message: &IncomingMessage) -> Result<()> {
        info!(
            "Processing message {} from {}: {:?}",
            message.id, message.from, message.event
        );

        let reply = {
            let store = self.store.lock().unwrap();
            let mut state = store.load_or_create(&message.from)?;

            if state.last_message_id.as_deref() == Some(message.id.as_str()) {
                debug!("Skipping redelivered message {}", message.id);
                return Ok(());
            }

            let reply = flow::advance(&mut state, &message.event);
            state.last_message_id = Some(message.id.clone());
            store.save(&mut state)?;
            reply
        };

        // Best-effort dispatch; the persisted state stands either way
        if let Some(reply) = reply {
            match self.sender.send_reply(&message.from, &reply).await {
                Ok(message_id) => debug!("Sent reply {} to {}", message_id, message.from),
                Err(e) => error!("Failed to send reply to {}: {}", message.from, e),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WhatsAppError;
    use crate::flow::Button;
    use crate::types::InboundEvent;
    use async_trait::async_trait;
    use hc_core::Step;

    #[derive(Debug, PartialEq)]
    enum Sent {
        Text { to: String, body: String },
        Buttons { to: String, buttons: Vec<Button> },
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<Sent>>,
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        async fn send_text(&self, to: &str, body: &str) -> Result<String> {
            self.sent.lock().unwrap().push(Sent::Text {
                to: to.to_string(),
                body: body.to_string(),
            });
            Ok("wamid.SENT".to_string())
        }

        async fn send_buttons(&self, to: &str, _body: &str, buttons: &[Button]) -> Result<String> {
            self.sent.lock().unwrap().push(Sent::Buttons {
                to: to.to_string(),
                buttons: buttons.to_vec(),
            });
            Ok("wamid.SENT".to_string())
        }

        async fn send_template(&self, _to: &str, _name: &str, _language: &str) -> Result<String> {
            Ok("wamid.SENT".to_string())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl MessageSender for FailingSender {
        async fn send_text(&self, _to: &str, _body: &str) -> Result<String> {
            Err(WhatsAppError::GraphApi("network down".to_string()))
        }

        async fn send_buttons(&self, _to: &str, _body: &str, _buttons: &[Button]) -> Result<String> {
            Err(WhatsAppError::GraphApi("network down".to_string()))
        }

        async fn send_template(&self, _to: &str, _name: &str, _language: &str) -> Result<String> {
            Err(WhatsAppError::GraphApi("network down".to_string()))
        }
    }

    fn setup(sender: Arc<dyn MessageSender>) -> (MessageHandler, Arc<Mutex<UserStore>>) {
        let store = Arc::new(Mutex::new(UserStore::in_memory().unwrap()));
        let handler = MessageHandler::new(Arc::clone(&store), sender);
        (handler, store)
    }

    fn incoming(id: &str, from: &str, event: InboundEvent) -> IncomingMessage {
        IncomingMessage {
            id: id.to_string(),
            from: from.to_string(),
            event,
        }
    }

    #[tokio::test]
    async fn test_greeting_persists_state_and_sends_menu() {
        let sender = Arc::new(RecordingSender::default());
        let (handler, store) = setup(sender.clone());

        handler
            .process_message(&incoming(
                "wamid.1",
                "15551234567",
                InboundEvent::Text("hi".to_string()),
            ))
            .await
            .unwrap();

        let state = store.lock().unwrap().load("15551234567").unwrap().unwrap();
        assert_eq!(state.step, Step::AwaitingService);
        assert_eq!(state.last_message_id.as_deref(), Some("wamid.1"));

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Buttons { to, buttons } if to == "15551234567" && buttons.len() == 3));
    }

    #[tokio::test]
    async fn test_redelivered_message_is_skipped() {
        let sender = Arc::new(RecordingSender::default());
        let (handler, store) = setup(sender.clone());

        let message = incoming("wamid.1", "15551234567", InboundEvent::Text("hi".to_string()));
        handler.process_message(&message).await.unwrap();
        handler.process_message(&message).await.unwrap();

        // The duplicate neither advanced the flow nor sent a second menu
        let state = store.lock().unwrap().load("15551234567").unwrap().unwrap();
        assert_eq!(state.step, Step::AwaitingService);
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_messages_advance_the_flow() {
        let sender = Arc::new(RecordingSender::default());
        let (handler, store) = setup(sender.clone());

        handler
            .process_message(&incoming("wamid.1", "15551234567", InboundEvent::Text("hi".to_string())))
            .await
            .unwrap();
        handler
            .process_message(&incoming(
                "wamid.2",
                "15551234567",
                InboundEvent::Text("lab_test".to_string()),
            ))
            .await
            .unwrap();

        let state = store.lock().unwrap().load("15551234567").unwrap().unwrap();
        assert_eq!(state.step, Step::AwaitingLocation);
        assert_eq!(state.last_message_id.as_deref(), Some("wamid.2"));
        assert_eq!(sender.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_persisted_state() {
        let (handler, store) = setup(Arc::new(FailingSender));

        let result = handler
            .process_message(&incoming("wamid.1", "15551234567", InboundEvent::Text("hi".to_string())))
            .await;

        // The dispatch failure is swallowed and the transition stands
        assert!(result.is_ok());
        let state = store.lock().unwrap().load("15551234567").unwrap().unwrap();
        assert_eq!(state.step, Step::AwaitingService);
    }

    #[tokio::test]
    async fn test_completed_user_gets_no_reply() {
        let sender = Arc::new(RecordingSender::default());
        let (handler, store) = setup(sender.clone());

        {
            let store = store.lock().unwrap();
            let mut state = store.load_or_create("15551234567").unwrap();
            state.step = Step::Completed;
            store.save(&mut state).unwrap();
        }

        handler
            .process_message(&incoming("wamid.9", "15551234567", InboundEvent::Text("hi".to_string())))
            .await
            .unwrap();

        assert!(sender.sent.lock().unwrap().is_empty());
        let state = store.lock().unwrap().load("15551234567").unwrap().unwrap();
        assert_eq!(state.step, Step::Completed);
        assert_eq!(state.last_message_id.as_deref(), Some("wamid.9"));
    }

    #[tokio::test]
    async fn test_reply_text_goes_to_sender() {
        let sender = Arc::new(RecordingSender::default());
        let (handler, store) = setup(sender.clone());

        {
            let store = store.lock().unwrap();
            let mut state = store.load_or_create("15551234567").unwrap();
            state.step = Step::AwaitingAge;
            store.save(&mut state).unwrap();
        }

        handler
            .process_message(&incoming("wamid.5", "15551234567", InboundEvent::Text("44".to_string())))
            .await
            .unwrap();

        let sent = sender.sent.lock().unwrap();
        assert!(matches!(&sent[0], Sent::Text { to, .. } if to == "15551234567"));

        let state = store.lock().unwrap().load("15551234567").unwrap().unwrap();
        assert_eq!(state.age, Some(44));
    }
}
