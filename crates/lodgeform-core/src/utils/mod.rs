//! Field normalization and display formatting.

pub mod format;

pub use format::{
    format_currency, format_lodge_display, format_phone, normalize_email, normalize_name,
    normalize_phone, truncate_string,
};
