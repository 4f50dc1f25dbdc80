//! Partner records.
//!
//! A partner is a guest linked one-to-one to a non-partner attendee. The
//! parent holds the forward reference (`partner`), the partner holds the
//! back-reference (`is_partner`). Partners sit directly after their parent
//! and are removed with it.

use std::time::Instant;

use tracing::debug;

use crate::models::{Attendee, AttendeeId, FieldUpdate};
use crate::store::RegistrationStore;
use crate::{RegistrationError, RegistrationResult};

/// Relationship label given to new partners.
pub const DEFAULT_RELATIONSHIP: &str = "Partner";

/// Suggested relationship labels.
pub const RELATIONSHIPS: [&str; 6] = ["Partner", "Wife", "Husband", "Spouse", "Fiancée", "Friend"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartnerToggle {
    Added(AttendeeId),
    Removed(AttendeeId),
}

/// Add a partner to `attendee_id`, or remove the one it has.
pub fn toggle_partner(
    store: &mut RegistrationStore,
    attendee_id: &AttendeeId,
) -> RegistrationResult<PartnerToggle> {
    let attendee = store
        .get(attendee_id)
        .ok_or_else(|| RegistrationError::NotFound(attendee_id.clone()))?;

    if attendee.is_partner_record() {
        return Err(RegistrationError::PartnerOfPartner);
    }

    match attendee.partner.clone() {
        Some(partner_id) => {
            store.remove(&partner_id)?;
            debug!(attendee = %attendee_id, partner = %partner_id, "Removed partner");
            Ok(PartnerToggle::Removed(partner_id))
        }
        None => {
            let partner_id = store.insert_partner(attendee_id)?;
            debug!(attendee = %attendee_id, partner = %partner_id, "Added partner");
            Ok(PartnerToggle::Added(partner_id))
        }
    }
}

/// Set the relationship label on the attendee's partner. Returns false when
/// there is no partner.
pub fn update_partner_relationship(
    store: &mut RegistrationStore,
    attendee_id: &AttendeeId,
    relationship: &str,
) -> RegistrationResult<bool> {
    let Some(partner_id) = partner_of(store, attendee_id)?.map(|p| p.id.clone()) else {
        return Ok(false);
    };

    store.update(
        &partner_id,
        FieldUpdate::Relationship(relationship.to_string()),
        Instant::now(),
    )?;
    Ok(true)
}

/// The partner linked to `attendee_id`, if any.
pub fn partner_of<'a>(
    store: &'a RegistrationStore,
    attendee_id: &AttendeeId,
) -> RegistrationResult<Option<&'a Attendee>> {
    let attendee = store
        .get(attendee_id)
        .ok_or_else(|| RegistrationError::NotFound(attendee_id.clone()))?;
    Ok(attendee.partner.as_ref().and_then(|id| store.get(id)))
}

/// The attendee that `partner_id` is attached to, if it is a partner.
pub fn parent_of<'a>(
    store: &'a RegistrationStore,
    partner_id: &AttendeeId,
) -> RegistrationResult<Option<&'a Attendee>> {
    let partner = store
        .get(partner_id)
        .ok_or_else(|| RegistrationError::NotFound(partner_id.clone()))?;
    Ok(partner.is_partner.as_ref().and_then(|id| store.get(id)))
}
