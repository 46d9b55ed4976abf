//! User conversation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position in the intake conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// No conversation yet; waiting for a greeting
    Start,
    /// Service menu sent; waiting for a selection
    AwaitingService,
    /// Waiting for a shared location
    AwaitingLocation,
    /// Waiting for the user's age
    AwaitingAge,
    /// Waiting for a test list or a prescription photo
    AwaitingTestsOrPrescription,
    /// Intake finished; no further replies
    Completed,
}

impl Step {
    /// Stable string form used in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Start => "start",
            Step::AwaitingService => "awaiting_service",
            Step::AwaitingLocation => "awaiting_location",
            Step::AwaitingAge => "awaiting_age",
            Step::AwaitingTestsOrPrescription => "awaiting_tests_or_prescription",
            Step::Completed => "completed",
        }
    }

    /// Parse the stored string form. Unknown values map to `Start` so a
    /// corrupted row restarts the conversation instead of wedging it.
    pub fn parse(s: &str) -> Self {
        match s {
            "awaiting_service" => Step::AwaitingService,
            "awaiting_location" => Step::AwaitingLocation,
            "awaiting_age" => Step::AwaitingAge,
            "awaiting_tests_or_prescription" => Step::AwaitingTestsOrPrescription,
            "completed" => Step::Completed,
            _ => Step::Start,
        }
    }
}

/// Service offered on the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    MedicineDelivery,
    CareAtHome,
    LabTest,
}

impl Service {
    /// Button id carried in interactive replies
    pub fn id(&self) -> &'static str {
        match self {
            Service::MedicineDelivery => "medicine_delivery",
            Service::CareAtHome => "care_at_home",
            Service::LabTest => "lab_test",
        }
    }

    /// Button label shown to the user
    pub fn label(&self) -> &'static str {
        match self {
            Service::MedicineDelivery => "💊 Medicine Delivery",
            Service::CareAtHome => "🏥 Care at Home",
            Service::LabTest => "🧪 Lab Test at Home",
        }
    }

    /// Parse the stored id form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "medicine_delivery" => Some(Service::MedicineDelivery),
            "care_at_home" => Some(Service::CareAtHome),
            "lab_test" => Some(Service::LabTest),
            _ => None,
        }
    }
}

/// Geographic coordinates shared by the user
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Per-sender conversation state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserState {
    /// Sender phone number (E.164 digits, no plus)
    pub sender: String,
    /// Current conversation step
    pub step: Step,
    /// Service chosen from the menu
    pub selected_service: Option<Service>,
    /// Shared location for the visit
    pub location: Option<GeoPoint>,
    /// Reported age in years
    pub age: Option<u32>,
    /// Free-text list of requested lab tests
    pub requested_tests: Option<String>,
    /// Media id of an uploaded prescription photo
    pub prescription_ref: Option<String>,
    /// Id of the last inbound message, for duplicate delivery detection
    pub last_message_id: Option<String>,
    /// Record creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserState {
    /// Create a fresh state for a sender, positioned at the start
    pub fn new(sender: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            sender: sender.into(),
            step: Step::Start,
            selected_service: None,
            location: None,
            age: None,
            requested_tests: None,
            prescription_ref: None,
            last_message_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_state_creation() {
        let state = UserState::new("15551234567");
        assert_eq!(state.sender, "15551234567");
        assert_eq!(state.step, Step::Start);
        assert!(state.selected_service.is_none());
        assert!(state.age.is_none());
    }

    #[test]
    fn test_step_round_trip() {
        for step in [
            Step::Start,
            Step::AwaitingService,
            Step::AwaitingLocation,
            Step::AwaitingAge,
            Step::AwaitingTestsOrPrescription,
            Step::Completed,
        ] {
            assert_eq!(Step::parse(step.as_str()), step);
        }
    }

    #[test]
    fn test_step_parse_unknown_restarts() {
        assert_eq!(Step::parse("no_such_step"), Step::Start);
    }

    #[test]
    fn test_service_ids() {
        assert_eq!(Service::parse("lab_test"), Some(Service::LabTest));
        assert_eq!(Service::LabTest.label(), "🧪 Lab Test at Home");
        assert_eq!(Service::parse("unknown"), None);
    }
}
