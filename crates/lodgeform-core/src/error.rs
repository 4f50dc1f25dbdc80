use thiserror::Error;

use crate::models::AttendeeId;

/// Errors raised by store and form operations.
///
/// Field validation problems are not errors; they are reported through
/// `validation::ValidationReport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Attendee not found: {0}")]
    NotFound(AttendeeId),

    #[error("A partner cannot have a partner of their own")]
    PartnerOfPartner,

    #[error("Maximum of {max} attendees reached")]
    LimitReached { max: usize },

    #[error("At least {min} attendees are required")]
    BelowMinimum { min: usize },

    #[error("Unrecognized attendee type: {0}")]
    UnrecognizedKind(String),

    #[error("The primary attendee is always contacted directly")]
    PrimaryContactPreference,

    #[error("Only non-primary Masons can share the primary attendee's lodge")]
    SameLodgeNotAvailable,

    #[error("Named attendees are not collected when purchasing tickets only")]
    TicketsOnlyMode,
}

pub type RegistrationResult<T> = Result<T, RegistrationError>;
