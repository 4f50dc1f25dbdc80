//! Field-level validation.
//!
//! Validation never fails an operation: problems are collected into a
//! `ValidationReport` that the wizard uses to block advancing past the
//! attendee step.

use std::collections::BTreeMap;

use crate::models::{Attendee, AttendeeId, Field};
use crate::rules;
use crate::RegistrationError;

pub const NAME_MAX_LEN: usize = 50;
pub const PHONE_MIN_DIGITS: usize = 8;
pub const PHONE_MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldErrorKind {
    Required,
    TooLong { max: usize },
    InvalidEmail,
    InvalidPhone,
    /// The record's attendee type is not one the form knows how to render.
    UnrecognizedKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub attendee_id: AttendeeId,
    /// `None` for errors about the whole record.
    pub field: Option<Field>,
    pub kind: FieldErrorKind,
}

impl FieldError {
    fn new(attendee_id: &AttendeeId, field: Field, kind: FieldErrorKind) -> Self {
        Self {
            attendee_id: attendee_id.clone(),
            field: Some(field),
            kind,
        }
    }

    pub fn message(&self) -> String {
        let label = self.field.map(|f| f.label()).unwrap_or("Attendee");
        match self.kind {
            FieldErrorKind::Required => format!("{} is required", label),
            FieldErrorKind::TooLong { max } => {
                format!("{} must be at most {} characters", label, max)
            }
            FieldErrorKind::InvalidEmail => "Please enter a valid email address".to_string(),
            FieldErrorKind::InvalidPhone => "Please enter a valid phone number".to_string(),
            FieldErrorKind::UnrecognizedKind => "Unknown attendee type".to_string(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

/// Aggregated result of validating every attendee.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
    /// Attendee count outside the flow's limits.
    pub count: Option<RegistrationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.count.is_none()
    }

    pub fn error_count(&self) -> usize {
        self.errors.len() + usize::from(self.count.is_some())
    }

    pub fn for_attendee<'a>(&'a self, id: &'a AttendeeId) -> impl Iterator<Item = &'a FieldError> {
        self.errors.iter().filter(move |e| &e.attendee_id == id)
    }

    pub fn field_error(&self, id: &AttendeeId, field: Field) -> Option<&FieldError> {
        self.errors
            .iter()
            .find(|e| &e.attendee_id == id && e.field == Some(field))
    }

    /// Error counts keyed by attendee.
    pub fn by_attendee(&self) -> BTreeMap<AttendeeId, usize> {
        let mut counts = BTreeMap::new();
        for error in &self.errors {
            *counts.entry(error.attendee_id.clone()).or_insert(0) += 1;
        }
        counts
    }
}

pub fn validate_attendee(attendee: &Attendee) -> Vec<FieldError> {
    let id = &attendee.id;

    if !attendee.kind.is_recognized() {
        return vec![FieldError {
            attendee_id: id.clone(),
            field: None,
            kind: FieldErrorKind::UnrecognizedKind,
        }];
    }

    let mut errors: Vec<FieldError> = rules::get_required_fields(attendee)
        .into_iter()
        .filter(|field| attendee.is_field_empty(*field))
        .map(|field| FieldError::new(id, field, FieldErrorKind::Required))
        .collect();

    for (field, value) in [
        (Field::FirstName, &attendee.first_name),
        (Field::LastName, &attendee.last_name),
    ] {
        if value.trim().chars().count() > NAME_MAX_LEN {
            errors.push(FieldError::new(
                id,
                field,
                FieldErrorKind::TooLong { max: NAME_MAX_LEN },
            ));
        }
    }

    if rules::should_show_contact_fields(attendee) {
        if !attendee.primary_email.trim().is_empty() && !is_valid_email(&attendee.primary_email) {
            errors.push(FieldError::new(id, Field::PrimaryEmail, FieldErrorKind::InvalidEmail));
        }
        if !attendee.primary_phone.trim().is_empty() && !is_valid_phone(&attendee.primary_phone) {
            errors.push(FieldError::new(id, Field::PrimaryPhone, FieldErrorKind::InvalidPhone));
        }
    }

    errors
}

pub fn validate_all(attendees: &[Attendee]) -> ValidationReport {
    ValidationReport {
        errors: attendees.iter().flat_map(validate_attendee).collect(),
        count: None,
    }
}

/// `local@domain.tld`, with no whitespace and a letter-only TLD of two or more.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|l| l.is_empty()) {
        return false;
    }

    labels
        .last()
        .is_some_and(|tld| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
}

/// 8 to 15 digits, an optional leading `+`, and spaces, dashes or brackets as separators.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    let body = phone.strip_prefix('+').unwrap_or(phone);

    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
    {
        return false;
    }

    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttendeeKind, ContactPreference, GrandOfficerStatus, Rank};

    fn complete_primary() -> Attendee {
        let mut a = Attendee::mason();
        a.is_primary = true;
        a.first_name = "John".to_string();
        a.last_name = "Smith".to_string();
        a.grand_lodge_id = Some("GL1".to_string());
        a.lodge_id = Some("L5".to_string());
        a.primary_email = "john@example.com".to_string();
        a.primary_phone = "0412345678".to_string();
        a
    }

    fn kinds(errors: &[FieldError]) -> Vec<(Option<Field>, FieldErrorKind)> {
        errors.iter().map(|e| (e.field, e.kind)).collect()
    }

    #[test]
    fn test_complete_primary_is_valid() {
        assert!(validate_attendee(&complete_primary()).is_empty());
    }

    #[test]
    fn test_missing_required_fields() {
        let mut a = Attendee::mason();
        a.is_primary = true;
        let errors = validate_attendee(&a);
        let fields: Vec<Field> = errors.iter().filter_map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                Field::FirstName,
                Field::LastName,
                Field::GrandLodgeId,
                Field::LodgeId,
                Field::PrimaryEmail,
                Field::PrimaryPhone,
            ]
        );
        assert!(errors.iter().all(|e| e.kind == FieldErrorKind::Required));
    }

    #[test]
    fn test_grand_officer_fields_required() {
        let mut a = complete_primary();
        a.rank = Some(Rank::GrandLodge);
        assert_eq!(
            kinds(&validate_attendee(&a)),
            vec![(Some(Field::GrandOfficerStatus), FieldErrorKind::Required)]
        );

        a.grand_officer_status = Some(GrandOfficerStatus::Present);
        a.present_grand_officer_role = "Other".to_string();
        assert_eq!(
            kinds(&validate_attendee(&a)),
            vec![
                (Some(Field::OtherGrandOfficerRole), FieldErrorKind::Required),
            ]
        );
    }

    #[test]
    fn test_non_primary_needs_preference() {
        let mut guest = Attendee::guest();
        guest.title = "Mrs".to_string();
        guest.first_name = "Jane".to_string();
        guest.last_name = "Smith".to_string();
        assert_eq!(
            kinds(&validate_attendee(&guest)),
            vec![(Some(Field::ContactPreference), FieldErrorKind::Required)]
        );

        guest.contact_preference = Some(ContactPreference::ProvideLater);
        assert!(validate_attendee(&guest).is_empty());

        guest.contact_preference = Some(ContactPreference::Directly);
        assert_eq!(validate_attendee(&guest).len(), 2);
    }

    #[test]
    fn test_name_too_long() {
        let mut a = complete_primary();
        a.last_name = "x".repeat(51);
        assert_eq!(
            kinds(&validate_attendee(&a)),
            vec![(Some(Field::LastName), FieldErrorKind::TooLong { max: 50 })]
        );
    }

    #[test]
    fn test_bad_contact_formats() {
        let mut a = complete_primary();
        a.primary_email = "john@example".to_string();
        a.primary_phone = "12345".to_string();
        assert_eq!(
            kinds(&validate_attendee(&a)),
            vec![
                (Some(Field::PrimaryEmail), FieldErrorKind::InvalidEmail),
                (Some(Field::PrimaryPhone), FieldErrorKind::InvalidPhone),
            ]
        );
    }

    #[test]
    fn test_unrecognized_kind_single_error() {
        let a = Attendee::new(AttendeeKind::Unrecognized("steward".into()));
        let errors = validate_attendee(&a);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, FieldErrorKind::UnrecognizedKind);
        assert_eq!(errors[0].message(), "Unknown attendee type");
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@b.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign.com"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@@example.com"));
        assert!(!is_valid_email("a@example..com"));
        assert!(!is_valid_email("a b@example.com"));
        assert!(!is_valid_email("a@example.c"));
    }

    #[test]
    fn test_phone_pattern() {
        assert!(is_valid_phone("0412 345 678"));
        assert!(is_valid_phone("+61 412 345 678"));
        assert!(is_valid_phone("(02) 9876-5432"));
        assert!(!is_valid_phone("1234567"));
        assert!(!is_valid_phone("1234567890123456"));
        assert!(!is_valid_phone("0412abc678"));
        assert!(!is_valid_phone("04+12345678"));
    }

    #[test]
    fn test_report_aggregates() {
        let good = complete_primary();
        let mut bad = Attendee::guest();
        bad.title = "Mr".to_string();
        let report = validate_all(&[good.clone(), bad.clone()]);

        assert!(!report.is_valid());
        assert_eq!(report.for_attendee(&good.id).count(), 0);
        assert_eq!(report.by_attendee().get(&bad.id), Some(&3));
        assert!(report.field_error(&bad.id, Field::FirstName).is_some());
        assert_eq!(report.error_count(), 3);
    }

    #[test]
    fn test_field_error_outlives_lookup_id() {
        let bad = Attendee::guest();
        let report = validate_all(&[bad.clone()]);

        let error = {
            let id = AttendeeId::from(bad.id.as_str());
            report.field_error(&id, Field::LastName)
        };
        assert_eq!(error.map(|e| e.kind), Some(FieldErrorKind::Required));
        assert!(report.field_error(&AttendeeId::from("other"), Field::LastName).is_none());
    }
}
