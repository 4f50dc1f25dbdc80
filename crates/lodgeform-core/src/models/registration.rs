use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attendee::Attendee;

/// The registration flows offered by the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistrationType {
    Individuals,
    Lodge,
    GrandLodge,
    Delegation,
}

impl RegistrationType {
    pub const ALL: [RegistrationType; 4] = [
        RegistrationType::Individuals,
        RegistrationType::Lodge,
        RegistrationType::GrandLodge,
        RegistrationType::Delegation,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            RegistrationType::Individuals => "Individuals",
            RegistrationType::Lodge => "Lodge",
            RegistrationType::GrandLodge => "Grand Lodge",
            RegistrationType::Delegation => "Masonic Order Delegation",
        }
    }

    /// Flows that can buy a block of tickets without naming attendees.
    pub fn supports_tickets_only(&self) -> bool {
        matches!(self, RegistrationType::GrandLodge | RegistrationType::Delegation)
    }
}

impl std::fmt::Display for RegistrationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase", tag = "mode")]
pub enum DelegationMode {
    #[default]
    NamedDelegates,
    TicketsOnly { ticket_count: u32 },
}

impl DelegationMode {
    pub fn is_tickets_only(&self) -> bool {
        matches!(self, DelegationMode::TicketsOnly { .. })
    }
}

/// A registration: the ordered attendee list plus order metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: String,
    pub registration_type: RegistrationType,
    #[serde(default)]
    pub delegation_mode: DelegationMode,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub confirmation_number: Option<String>,
}

impl Registration {
    pub fn new(registration_type: RegistrationType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            registration_type,
            delegation_mode: DelegationMode::default(),
            attendees: Vec::new(),
            confirmation_number: None,
        }
    }
}

/// Contact details for the person placing the order, taken from the primary attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingContact {
    pub title: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl BookingContact {
    pub fn from_attendee(attendee: &Attendee) -> Self {
        Self {
            title: attendee.title.clone(),
            first_name: attendee.first_name.clone(),
            last_name: attendee.last_name.clone(),
            email: attendee.primary_email.clone(),
            phone: attendee.primary_phone.clone(),
        }
    }
}

/// Body posted to the payment endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub registration_id: String,
    pub registration_type: RegistrationType,
    pub event_id: Option<String>,
    pub package_id: Option<String>,
    pub delegation_mode: DelegationMode,
    pub ticket_count: u32,
    pub total_amount_cents: i64,
    pub booking_contact: BookingContact,
    pub attendees: Vec<Attendee>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub registration_id: String,
    pub confirmation_number: String,
}
