//! Contact preference resolution for non-primary attendees.
//!
//! A non-primary attendee is contacted `Directly` (their own email and
//! phone are collected), via the `PrimaryAttendee`, or via the primary
//! attendee until they `ProvideLater`. Only direct selection moves between
//! states. Leaving `Directly` clears email and phone straight away so stale
//! details are never submitted.

use crate::models::{Attendee, ContactPreference, FieldUpdate};
use crate::RegistrationError;

/// What the attendee card shows in its contact section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactResolution {
    /// Email and phone are collected for this attendee.
    Direct,
    /// Communication goes to the primary attendee; `message` is the confirmation copy.
    Deferred {
        preference: ContactPreference,
        message: String,
    },
    /// No preference chosen yet.
    Unselected,
}

/// Confirmation copy for a deferred preference, naming the primary attendee.
pub fn confirmation_message(preference: ContactPreference, primary_name: &str) -> Option<String> {
    let name = if primary_name.trim().is_empty() {
        "the primary attendee"
    } else {
        primary_name.trim()
    };

    match preference {
        ContactPreference::Directly => None,
        ContactPreference::PrimaryAttendee => Some(format!(
            "I confirm that {} will be responsible for all communication with this attendee.",
            name
        )),
        ContactPreference::ProvideLater => Some(format!(
            "I confirm that {} will be responsible for all communication with this attendee \
             until their contact details have been updated in their profile.",
            name
        )),
    }
}

pub fn resolve(attendee: &Attendee, primary: Option<&Attendee>) -> ContactResolution {
    if attendee.is_primary {
        return ContactResolution::Direct;
    }

    match attendee.contact_preference {
        Some(ContactPreference::Directly) => ContactResolution::Direct,
        Some(preference) => {
            let primary_name = primary.map(|p| p.full_name()).unwrap_or_default();
            ContactResolution::Deferred {
                preference,
                message: confirmation_message(preference, &primary_name).unwrap_or_default(),
            }
        }
        None => ContactResolution::Unselected,
    }
}

/// Updates for selecting `preference`: the preference itself, followed by
/// clearing email and phone when the new state is not `Directly`.
pub fn transition(
    attendee: &Attendee,
    preference: ContactPreference,
) -> Result<Vec<FieldUpdate>, RegistrationError> {
    if attendee.is_primary {
        return Err(RegistrationError::PrimaryContactPreference);
    }

    let mut updates = vec![FieldUpdate::ContactPreference(Some(preference))];
    if preference != ContactPreference::Directly {
        updates.push(FieldUpdate::PrimaryEmail(String::new()));
        updates.push(FieldUpdate::PrimaryPhone(String::new()));
    }
    Ok(updates)
}

/// True when the attendee holds contact details it should not.
pub fn has_stale_contact(attendee: &Attendee) -> bool {
    let allowed = attendee.is_primary
        || attendee.contact_preference == Some(ContactPreference::Directly);
    !allowed && (!attendee.primary_email.is_empty() || !attendee.primary_phone.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary() -> Attendee {
        let mut p = Attendee::mason();
        p.is_primary = true;
        p.title = "W Bro".to_string();
        p.first_name = "John".to_string();
        p.last_name = "Smith".to_string();
        p
    }

    #[test]
    fn test_provide_later_message() {
        let msg = confirmation_message(ContactPreference::ProvideLater, "W Bro John Smith").unwrap();
        assert!(msg.contains("W Bro John Smith"));
        assert!(msg.contains("until their contact details have been updated"));
    }

    #[test]
    fn test_primary_attendee_message_is_unconditional() {
        let msg = confirmation_message(ContactPreference::PrimaryAttendee, "Jane").unwrap();
        assert!(msg.ends_with("communication with this attendee."));
        assert!(confirmation_message(ContactPreference::Directly, "Jane").is_none());
    }

    #[test]
    fn test_message_falls_back_without_name() {
        let msg = confirmation_message(ContactPreference::PrimaryAttendee, "  ").unwrap();
        assert!(msg.contains("the primary attendee"));
    }

    #[test]
    fn test_transition_away_from_directly_clears_contact() {
        let mut guest = Attendee::guest();
        guest.contact_preference = Some(ContactPreference::Directly);
        guest.primary_email = "a@b.com".to_string();

        let updates = transition(&guest, ContactPreference::ProvideLater).unwrap();
        for update in &updates {
            guest.apply(update);
        }
        assert_eq!(guest.primary_email, "");
        assert_eq!(guest.primary_phone, "");
        assert!(!has_stale_contact(&guest));
    }

    #[test]
    fn test_transition_to_directly_keeps_fields() {
        let guest = Attendee::guest();
        let updates = transition(&guest, ContactPreference::Directly).unwrap();
        assert_eq!(
            updates,
            vec![FieldUpdate::ContactPreference(Some(ContactPreference::Directly))]
        );
    }

    #[test]
    fn test_primary_has_no_preference() {
        assert_eq!(
            transition(&primary(), ContactPreference::ProvideLater),
            Err(RegistrationError::PrimaryContactPreference)
        );
    }

    #[test]
    fn test_resolve() {
        let p = primary();
        let mut guest = Attendee::guest();
        assert_eq!(resolve(&guest, Some(&p)), ContactResolution::Unselected);

        guest.contact_preference = Some(ContactPreference::PrimaryAttendee);
        match resolve(&guest, Some(&p)) {
            ContactResolution::Deferred { preference, message } => {
                assert_eq!(preference, ContactPreference::PrimaryAttendee);
                assert!(message.contains("W Bro John Smith"));
            }
            other => panic!("expected deferred, got {:?}", other),
        }

        assert_eq!(resolve(&p, None), ContactResolution::Direct);
    }
}
