//! Core library for lodgeform.
//!
//! Holds everything the registration wizard needs apart from rendering:
//!
//! - `models`: attendees, registrations, lodges and ticket packages
//! - `rules`: title/rank suggestions and field visibility rules
//! - `contact`: contact-preference transitions and confirmation copy
//! - `partner`: partner creation, removal and relationship labels
//! - `store`: the registration store and its per-field commit policy
//! - `validation`: required-field and format checks
//! - `form`: registration flows, limits and the wizard gate
//! - `cache`: local draft persistence
//! - `api`: backend REST client and lodge search cache
//! - `auth`: API key storage in the OS keychain
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod contact;
pub mod error;
pub mod form;
pub mod models;
pub mod partner;
pub mod rules;
pub mod store;
pub mod utils;
pub mod validation;

pub use error::{RegistrationError, RegistrationResult};
