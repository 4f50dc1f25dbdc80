//! REST client for the registration backend.
//!
//! `BackendClient` talks to the Supabase REST endpoints for lookups and
//! attendee rows, and to the payment function for final submission. Every
//! request carries the project API key as both `apikey` and bearer token.
//!
//! `LodgeSearchCache` sits in front of lodge search so repeated or
//! overlapping queries do not hit the network twice.

pub mod client;
pub mod error;
pub mod search;

pub use client::{BackendClient, SyncReport};
pub use error::ApiError;
pub use search::{LodgeSearchCache, SearchOutcome, MIN_QUERY_LEN};
