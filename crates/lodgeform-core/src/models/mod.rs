//! Data models for registrations.
//!
//! - `Attendee`, `AttendeeKind`, `Rank`, `ContactPreference`: attendee records
//! - `Field`, `FieldUpdate`: typed field writes used by the store
//! - `Registration`, `RegistrationType`, `DelegationMode`: the registration container
//! - `RegistrationPayload`, `SubmissionResponse`: payment endpoint wire types
//! - `GrandLodge`, `Lodge`, `TicketPackage`: backend lookup data

pub mod attendee;
pub mod lodge;
pub mod registration;

pub use attendee::{
    Attendee, AttendeeId, AttendeeKind, ContactPreference, Field, FieldUpdate,
    GrandOfficerStatus, Rank,
};
pub use lodge::{GrandLodge, Lodge, TicketPackage};
pub use registration::{
    BookingContact, DelegationMode, Registration, RegistrationPayload, RegistrationType,
    SubmissionResponse,
};
