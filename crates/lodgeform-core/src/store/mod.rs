//! Registration store.
//!
//! `RegistrationStore` owns the attendee list for one registration and is
//! the only place attendee fields are written. Free-text fields are
//! debounced through `CommitTracker`; selects and clears commit at once.

pub mod commit;
pub mod registration;

pub use commit::{policy_for, CommitPolicy, CommitTracker, Decision, DEFAULT_DEBOUNCE};
pub use registration::{ChangeSet, PendingSync, RegistrationStore, StoreOptions, UpdateOutcome};
