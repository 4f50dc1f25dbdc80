//! API key storage.
//!
//! The backend key lives in the OS keychain via `CredentialStore`. The
//! `LODGEFORM_SUPABASE_KEY` environment variable wins when set, so CI and
//! one-off runs need no keychain.

pub mod credentials;

pub use credentials::{resolve_api_key, CredentialStore, ENV_SUPABASE_KEY};
