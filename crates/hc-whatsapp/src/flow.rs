//! Conversation flow for the home care intake
//!
//! Pure decision logic: maps the persisted step plus one inbound event
//! to the next step and at most one reply. Persistence and sending stay
//! with the caller.

use hc_core::{GeoPoint, Service, Step, UserState};

use crate::types::InboundEvent;

const WELCOME: &str = "👋 Hello and welcome to Warmy HealthConnect!\n\nWe're here to care for you and your loved ones 💚.\n\nHow can we help you today?\n\nPlease type or choose from below:";

const SERVICE_FALLBACK: &str = "🙏 We currently offer home visits for lab tests only.\n\nPlease tap 🧪 Lab Test at Home to continue.";

const ASK_LOCATION: &str = "🧪 Lab Test at Home it is!\n\n📍 Please share your location so our technician can reach you.\n\nTap the 📎 attachment icon and choose Location.";

const LOCATION_RETRY: &str = "📍 Please share your location so we can proceed.\n\nTap the 📎 attachment icon and choose Location.";

const ASK_AGE: &str = "📍 Location received, thank you!\n\n🎂 May I know your age please? This helps us prepare for your visit.";

const AGE_RETRY: &str = "❗ Please enter a valid age, for example: 35";

const ASK_TESTS: &str = "✅ Thank you!\n\n🧾 Please type the tests you need, or send a photo of your prescription.";

const ASK_TESTS_PRIORITY: &str = "💚 Thank you! Your request will be handled with priority care for our senior members.\n\n🧾 Please type the tests you need, or send a photo of your prescription.";

const TESTS_RETRY: &str = "🧾 Please type the test names, or send a photo of your prescription to continue.";

const TESTS_CONFIRMED: &str = "✅ Thank you! We've received your test request.\n\nOur team will call you shortly to confirm your home visit 🏠💚";

const PRESCRIPTION_CONFIRMED: &str = "✅ Prescription received!\n\nOur team will review it and call you shortly to confirm your home visit 🏠💚";

/// Button offered in a reply menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub title: String,
}

impl Button {
    /// Create a button from an id and a user-visible title
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

/// Outbound reply produced by the flow
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain text message
    Text(String),
    /// Text body with up to three reply buttons
    Buttons { body: String, buttons: Vec<Button> },
}

/// The welcome menu listing the offered services
fn service_menu() -> Reply {
    let buttons: Vec<Button> = [Service::MedicineDelivery, Service::CareAtHome, Service::LabTest]
        .iter()
        .map(|s| Button::new(s.id(), s.label()))
        .collect();

    Reply::Buttons {
        body: WELCOME.to_string(),
        buttons,
    }
}

fn is_greeting(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    text == "hi" || text == "hello"
}

/// Match the lab test selection whether it arrives as a button id, the
/// button title echoed back, or free-typed text
fn is_lab_test_selection(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "lab_test" | "lab test" | "lab test at home" | "🧪 lab test at home"
    )
}

fn parse_age(text: &str) -> Option<u32> {
    text.trim().parse().ok()
}

/// Advance the conversation by one inbound event.
///
/// Mutates `state` in place and returns the reply to send, if any. The
/// transition is keyed by the current step and the event shape; events
/// that fit no transition leave the state untouched and prompt a retry
/// (or stay silent at the start and completed steps).
pub fn advance(state: &mut UserState, event: &InboundEvent) -> Option<Reply> {
    match state.step {
        Step::Start => match event {
            InboundEvent::Text(text) if is_greeting(text) => {
                state.step = Step::AwaitingService;
                Some(service_menu())
            }
            // Nothing is sent before a greeting opens the conversation
            _ => None,
        },

        Step::AwaitingService => match event {
            InboundEvent::Text(text) if is_lab_test_selection(text) => {
                state.selected_service = Some(Service::LabTest);
                state.step = Step::AwaitingLocation;
                Some(Reply::Text(ASK_LOCATION.to_string()))
            }
            _ => Some(Reply::Text(SERVICE_FALLBACK.to_string())),
        },

        Step::AwaitingLocation => match event {
            InboundEvent::Location { lat, lng } => {
                state.location = Some(GeoPoint {
                    lat: *lat,
                    lng: *lng,
                });
                state.step = Step::AwaitingAge;
                Some(Reply::Text(ASK_AGE.to_string()))
            }
            _ => Some(Reply::Text(LOCATION_RETRY.to_string())),
        },

        Step::AwaitingAge => match event {
            InboundEvent::Text(text) => match parse_age(text) {
                Some(age) => {
                    state.age = Some(age);
                    state.step = Step::AwaitingTestsOrPrescription;
                    let prompt = if age > 50 { ASK_TESTS_PRIORITY } else { ASK_TESTS };
                    Some(Reply::Text(prompt.to_string()))
                }
                None => Some(Reply::Text(AGE_RETRY.to_string())),
            },
            _ => Some(Reply::Text(AGE_RETRY.to_string())),
        },

        Step::AwaitingTestsOrPrescription => match event {
            InboundEvent::Text(text) => {
                state.requested_tests = Some(text.clone());
                state.step = Step::Completed;
                Some(Reply::Text(TESTS_CONFIRMED.to_string()))
            }
            InboundEvent::Image { media_id } => {
                state.prescription_ref = Some(media_id.clone());
                state.step = Step::Completed;
                Some(Reply::Text(PRESCRIPTION_CONFIRMED.to_string()))
            }
            _ => Some(Reply::Text(TESTS_RETRY.to_string())),
        },

        // Terminal: the scripted flow is done, a human takes over
        Step::Completed => None,
    }
}
