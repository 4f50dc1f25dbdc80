//! Local draft persistence.
//!
//! `CacheManager` keeps a JSON copy of the in-progress registration so a
//! restart can pick up where the user left off, plus short-lived copies of
//! backend lookup data. Drafts are discarded after seven days; lookup data is
//! considered stale after an hour.
//!
//! Restoring a draft only fills fields that are still empty. A populated
//! field is never overwritten by a stored one.

pub mod manager;

pub use manager::{hydrate_missing, CacheManager, CachedData, RegistrationDraft, StampedAttendee};
