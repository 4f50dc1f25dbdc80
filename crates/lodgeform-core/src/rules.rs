//! Business rules for attendee fields.
//!
//! Every function here is pure: it looks at a proposed change plus the
//! current attendee state and returns the *additional* field updates the
//! change implies. Callers apply the original change first, then the
//! returned updates in order. Applying a suggestion whose value already
//! holds yields no further updates, so repeated application is a fixed
//! point.

use crate::models::{
    Attendee, ContactPreference, Field, FieldUpdate, GrandOfficerStatus, Rank, RegistrationType,
};

/// Title given to new Masons.
pub const DEFAULT_MASON_TITLE: &str = "Bro";

/// Title for Installed Masters.
pub const WORSHIPFUL_TITLE: &str = "W Bro";

/// Titles reserved for Grand Lodge officers.
pub const GRAND_TITLES: [&str; 3] = ["VW Bro", "RW Bro", "MW Bro"];

pub const MASON_TITLES: [&str; 5] = ["Bro", "W Bro", "VW Bro", "RW Bro", "MW Bro"];

pub const GUEST_TITLES: [&str; 8] = ["Mr", "Mrs", "Ms", "Miss", "Dr", "Rev", "Prof", "Mx"];

/// Grand office value that requires the free-text role field.
pub const OTHER_GRAND_OFFICE: &str = "Other";

pub const GRAND_OFFICER_ROLES: [&str; 8] = [
    "Grand Master",
    "Deputy Grand Master",
    "Assistant Grand Master",
    "Grand Secretary",
    "Grand Director of Ceremonies",
    "Grand Treasurer",
    "Grand Chaplain",
    OTHER_GRAND_OFFICE,
];

pub fn is_grand_title(title: &str) -> bool {
    GRAND_TITLES.contains(&title.trim())
}

/// Ranks offered by the rank picker for a flow.
/// `MO` is only meaningful for Masonic Order delegations.
pub fn rank_options(flow: RegistrationType) -> Vec<Rank> {
    Rank::ALL
        .iter()
        .copied()
        .filter(|r| *r != Rank::MasonicOrder || flow == RegistrationType::Delegation)
        .collect()
}

// ============================================================================
// Title and rank
// ============================================================================

/// Rank suggested by a new title.
///
/// Grand titles imply `GL`; `W Bro` implies `IM` unless the attendee is
/// already `GL`. Only proposes a rank, and only when it differs from the
/// current one.
pub fn on_title_change(new_title: &str, current_rank: Option<Rank>) -> Vec<FieldUpdate> {
    let suggested = if is_grand_title(new_title) {
        Some(Rank::GrandLodge)
    } else if new_title.trim() == WORSHIPFUL_TITLE && current_rank != Some(Rank::GrandLodge) {
        Some(Rank::InstalledMaster)
    } else {
        None
    };

    match suggested {
        Some(rank) if current_rank != Some(rank) => vec![FieldUpdate::Rank(Some(rank))],
        _ => Vec::new(),
    }
}

/// Updates implied by a rank change.
///
/// Leaving a grand-office rank clears the grand officer fields. Entering
/// `GL` with the default (or no) title raises the title to `W Bro`.
pub fn on_rank_change(
    new_rank: Option<Rank>,
    current_title: &str,
    current_rank: Option<Rank>,
    current_status: Option<GrandOfficerStatus>,
) -> Vec<FieldUpdate> {
    let mut updates = Vec::new();

    let was_officer = current_rank.is_some_and(|r| r.carries_grand_office());
    let is_officer = new_rank.is_some_and(|r| r.carries_grand_office());
    if was_officer && !is_officer {
        if current_status.is_some() {
            updates.push(FieldUpdate::GrandOfficerStatus(None));
        }
        updates.push(FieldUpdate::PresentGrandOfficerRole(String::new()));
        updates.push(FieldUpdate::OtherGrandOfficerRole(String::new()));
    }

    let entering_gl = new_rank == Some(Rank::GrandLodge) && current_rank != Some(Rank::GrandLodge);
    let title = current_title.trim();
    if entering_gl && (title.is_empty() || title == DEFAULT_MASON_TITLE) {
        updates.push(FieldUpdate::Title(WORSHIPFUL_TITLE.to_string()));
    }

    updates
}

/// Updates implied by a grand officer status change: only present officers
/// hold a current role.
pub fn on_grand_officer_status_change(
    new_status: Option<GrandOfficerStatus>,
    current_role: &str,
) -> Vec<FieldUpdate> {
    if new_status != Some(GrandOfficerStatus::Present) && !current_role.is_empty() {
        vec![
            FieldUpdate::PresentGrandOfficerRole(String::new()),
            FieldUpdate::OtherGrandOfficerRole(String::new()),
        ]
    } else {
        Vec::new()
    }
}

/// Updates implied by picking a role: the free-text role only exists for "Other".
pub fn on_grand_officer_role_change(new_role: &str, current_other: &str) -> Vec<FieldUpdate> {
    if new_role != OTHER_GRAND_OFFICE && !current_other.is_empty() {
        vec![FieldUpdate::OtherGrandOfficerRole(String::new())]
    } else {
        Vec::new()
    }
}

/// A lodge belongs to one grand lodge; switching grand lodge drops the lodge.
pub fn on_grand_lodge_change(
    new_grand_lodge: Option<&str>,
    current_grand_lodge: Option<&str>,
    current_lodge: Option<&str>,
) -> Vec<FieldUpdate> {
    if new_grand_lodge != current_grand_lodge && current_lodge.is_some() {
        vec![
            FieldUpdate::LodgeId(None),
            FieldUpdate::LodgeNameNumber(String::new()),
        ]
    } else {
        Vec::new()
    }
}

// ============================================================================
// Visibility
// ============================================================================

pub fn should_show_grand_officer_fields(attendee: &Attendee, flow: RegistrationType) -> bool {
    if !attendee.is_mason() {
        return false;
    }
    match attendee.rank {
        Some(Rank::GrandLodge) => true,
        Some(Rank::MasonicOrder) => flow == RegistrationType::Delegation,
        _ => false,
    }
}

pub fn should_show_contact_fields(attendee: &Attendee) -> bool {
    attendee.is_primary || attendee.contact_preference == Some(ContactPreference::Directly)
}

pub fn should_show_confirmation_message(attendee: &Attendee) -> bool {
    !attendee.is_primary
        && matches!(
            attendee.contact_preference,
            Some(ContactPreference::PrimaryAttendee) | Some(ContactPreference::ProvideLater)
        )
}

pub fn should_show_use_same_lodge(attendee: &Attendee, primary: Option<&Attendee>) -> bool {
    if attendee.is_primary || !attendee.is_mason() || attendee.is_partner_record() {
        return false;
    }
    primary.is_some_and(|p| p.is_mason() && p.has_lodge())
}

// ============================================================================
// Required fields
// ============================================================================

/// Fields that must be non-empty for the attendee to pass validation, in
/// the order the form presents them.
pub fn get_required_fields(attendee: &Attendee) -> Vec<Field> {
    let mut fields = vec![Field::Title, Field::FirstName, Field::LastName];

    if attendee.is_partner_record() {
        fields.push(Field::Relationship);
    }

    if attendee.is_mason() && !attendee.is_partner_record() {
        fields.push(Field::Rank);

        if attendee.rank.is_some_and(|r| r.carries_grand_office()) {
            fields.push(Field::GrandOfficerStatus);
            if attendee.grand_officer_status == Some(GrandOfficerStatus::Present) {
                fields.push(Field::PresentGrandOfficerRole);
                if attendee.present_grand_officer_role == OTHER_GRAND_OFFICE {
                    fields.push(Field::OtherGrandOfficerRole);
                }
            }
        }

        fields.push(Field::GrandLodgeId);
        fields.push(Field::LodgeId);
    }

    if attendee.is_primary {
        fields.push(Field::PrimaryEmail);
        fields.push(Field::PrimaryPhone);
    } else {
        fields.push(Field::ContactPreference);
        if attendee.contact_preference == Some(ContactPreference::Directly) {
            fields.push(Field::PrimaryEmail);
            fields.push(Field::PrimaryPhone);
        }
    }

    fields
}

// ============================================================================
// Consistency warnings
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WarningKind {
    GrandTitleWithoutGrandRank,
    GrandRankWithBrotherTitle,
    WorshipfulTitleWithCraftRank,
}

/// A title/rank mismatch. Not a hard error: the user can apply `fix` or dismiss it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyWarning {
    pub kind: WarningKind,
    pub message: String,
    pub fix: Vec<FieldUpdate>,
}

pub fn consistency_warnings(attendee: &Attendee) -> Vec<ConsistencyWarning> {
    let mut warnings = Vec::new();
    if !attendee.is_mason() || attendee.is_partner_record() {
        return warnings;
    }

    let title = attendee.title.trim();
    let rank = attendee.rank;

    if is_grand_title(title) && rank != Some(Rank::GrandLodge) {
        warnings.push(ConsistencyWarning {
            kind: WarningKind::GrandTitleWithoutGrandRank,
            message: format!("{} is a Grand Lodge title but the rank is not GL", title),
            fix: vec![FieldUpdate::Rank(Some(Rank::GrandLodge))],
        });
    }

    if rank == Some(Rank::GrandLodge) && title == DEFAULT_MASON_TITLE {
        warnings.push(ConsistencyWarning {
            kind: WarningKind::GrandRankWithBrotherTitle,
            message: "Grand Lodge officers are usually titled W Bro or higher".to_string(),
            fix: vec![FieldUpdate::Title(WORSHIPFUL_TITLE.to_string())],
        });
    }

    if title == WORSHIPFUL_TITLE && rank.is_some_and(|r| r.is_craft()) {
        warnings.push(ConsistencyWarning {
            kind: WarningKind::WorshipfulTitleWithCraftRank,
            message: "W Bro is the title of an Installed Master".to_string(),
            fix: vec![FieldUpdate::Rank(Some(Rank::InstalledMaster))],
        });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply_all(attendee: &mut Attendee, updates: &[FieldUpdate]) {
        for update in updates {
            attendee.apply(update);
        }
    }

    #[test]
    fn test_grand_title_suggests_gl() {
        let updates = on_title_change("MW Bro", Some(Rank::MasterMason));
        assert_eq!(updates, vec![FieldUpdate::Rank(Some(Rank::GrandLodge))]);
    }

    #[test]
    fn test_worshipful_title_suggests_im() {
        assert_eq!(
            on_title_change("W Bro", Some(Rank::MasterMason)),
            vec![FieldUpdate::Rank(Some(Rank::InstalledMaster))]
        );
        assert!(on_title_change("W Bro", Some(Rank::GrandLodge)).is_empty());
        assert!(on_title_change("W Bro", Some(Rank::InstalledMaster)).is_empty());
    }

    #[test]
    fn test_plain_title_suggests_nothing() {
        assert!(on_title_change("Bro", Some(Rank::MasterMason)).is_empty());
        assert!(on_title_change("Mr", None).is_empty());
    }

    #[test]
    fn test_title_rank_fixed_point() {
        let mut attendee = Attendee::mason();
        attendee.title = "MW Bro".to_string();

        let first = on_title_change(&attendee.title, attendee.rank);
        let new_rank = match first.as_slice() {
            [FieldUpdate::Rank(r)] => *r,
            other => panic!("unexpected updates: {:?}", other),
        };
        let follow_up = on_rank_change(
            new_rank,
            &attendee.title,
            attendee.rank,
            attendee.grand_officer_status,
        );
        apply_all(&mut attendee, &first);
        apply_all(&mut attendee, &follow_up);
        assert!(follow_up.is_empty());

        assert!(on_title_change(&attendee.title, attendee.rank).is_empty());
        assert!(on_rank_change(
            attendee.rank,
            &attendee.title,
            attendee.rank,
            attendee.grand_officer_status
        )
        .is_empty());
    }

    #[test]
    fn test_leaving_gl_clears_grand_officer_fields() {
        let updates = on_rank_change(
            Some(Rank::InstalledMaster),
            "VW Bro",
            Some(Rank::GrandLodge),
            Some(GrandOfficerStatus::Present),
        );
        assert_eq!(
            updates,
            vec![
                FieldUpdate::GrandOfficerStatus(None),
                FieldUpdate::PresentGrandOfficerRole(String::new()),
                FieldUpdate::OtherGrandOfficerRole(String::new()),
            ]
        );
    }

    #[test]
    fn test_entering_gl_raises_default_title() {
        let updates = on_rank_change(Some(Rank::GrandLodge), "Bro", Some(Rank::MasterMason), None);
        assert_eq!(updates, vec![FieldUpdate::Title("W Bro".to_string())]);

        let updates = on_rank_change(Some(Rank::GrandLodge), "RW Bro", Some(Rank::MasterMason), None);
        assert!(updates.is_empty());
    }

    #[test]
    fn test_rank_change_never_touches_names() {
        let updates = on_rank_change(Some(Rank::MasterMason), "Bro", Some(Rank::GrandLodge), None);
        assert!(updates.iter().all(|u| !matches!(
            u.field(),
            Field::FirstName | Field::LastName | Field::Title
        )));
    }

    #[test]
    fn test_grand_lodge_change_drops_lodge() {
        let updates = on_grand_lodge_change(Some("GL2"), Some("GL1"), Some("L5"));
        assert_eq!(
            updates,
            vec![FieldUpdate::LodgeId(None), FieldUpdate::LodgeNameNumber(String::new())]
        );
        assert!(on_grand_lodge_change(Some("GL1"), Some("GL1"), Some("L5")).is_empty());
    }

    #[test]
    fn test_grand_officer_fields_visibility() {
        let mut attendee = Attendee::mason();
        assert!(!should_show_grand_officer_fields(&attendee, RegistrationType::Individuals));
        attendee.rank = Some(Rank::GrandLodge);
        assert!(should_show_grand_officer_fields(&attendee, RegistrationType::Individuals));
        attendee.rank = Some(Rank::MasonicOrder);
        assert!(!should_show_grand_officer_fields(&attendee, RegistrationType::Lodge));
        assert!(should_show_grand_officer_fields(&attendee, RegistrationType::Delegation));

        let guest = Attendee::guest();
        assert!(!should_show_grand_officer_fields(&guest, RegistrationType::Delegation));
    }

    #[test]
    fn test_contact_visibility() {
        let mut attendee = Attendee::guest();
        assert!(!should_show_contact_fields(&attendee));
        attendee.contact_preference = Some(ContactPreference::Directly);
        assert!(should_show_contact_fields(&attendee));
        assert!(!should_show_confirmation_message(&attendee));
        attendee.contact_preference = Some(ContactPreference::ProvideLater);
        assert!(should_show_confirmation_message(&attendee));
        attendee.is_primary = true;
        assert!(should_show_contact_fields(&attendee));
        assert!(!should_show_confirmation_message(&attendee));
    }

    #[test]
    fn test_use_same_lodge_visibility() {
        let mut primary = Attendee::mason();
        primary.is_primary = true;
        let attendee = Attendee::mason();
        assert!(!should_show_use_same_lodge(&attendee, Some(&primary)));

        primary.grand_lodge_id = Some("GL1".to_string());
        primary.lodge_id = Some("L5".to_string());
        assert!(should_show_use_same_lodge(&attendee, Some(&primary)));
        assert!(!should_show_use_same_lodge(&Attendee::guest(), Some(&primary)));
        assert!(!should_show_use_same_lodge(&attendee, None));
    }

    #[test]
    fn test_required_fields_primary_mason() {
        let mut attendee = Attendee::mason();
        attendee.is_primary = true;
        assert_eq!(
            get_required_fields(&attendee),
            vec![
                Field::Title,
                Field::FirstName,
                Field::LastName,
                Field::Rank,
                Field::GrandLodgeId,
                Field::LodgeId,
                Field::PrimaryEmail,
                Field::PrimaryPhone,
            ]
        );
    }

    #[test]
    fn test_required_fields_grand_officer() {
        let mut attendee = Attendee::mason();
        attendee.is_primary = true;
        attendee.rank = Some(Rank::GrandLodge);
        attendee.grand_officer_status = Some(GrandOfficerStatus::Present);
        attendee.present_grand_officer_role = OTHER_GRAND_OFFICE.to_string();
        let fields = get_required_fields(&attendee);
        assert!(fields.contains(&Field::GrandOfficerStatus));
        assert!(fields.contains(&Field::PresentGrandOfficerRole));
        assert!(fields.contains(&Field::OtherGrandOfficerRole));

        attendee.grand_officer_status = Some(GrandOfficerStatus::Past);
        let fields = get_required_fields(&attendee);
        assert!(!fields.contains(&Field::PresentGrandOfficerRole));
    }

    #[test]
    fn test_required_fields_follow_contact_preference() {
        let mut guest = Attendee::guest();
        assert_eq!(
            get_required_fields(&guest),
            vec![Field::Title, Field::FirstName, Field::LastName, Field::ContactPreference]
        );
        guest.contact_preference = Some(ContactPreference::Directly);
        let fields = get_required_fields(&guest);
        assert_eq!(&fields[fields.len() - 2..], &[Field::PrimaryEmail, Field::PrimaryPhone]);
    }

    #[test]
    fn test_required_fields_partner() {
        let parent = Attendee::mason();
        let partner = Attendee::partner_of(&parent.id);
        let fields = get_required_fields(&partner);
        assert!(fields.contains(&Field::Relationship));
        assert!(!fields.contains(&Field::Rank));
    }

    #[test]
    fn test_consistency_warnings() {
        let mut attendee = Attendee::mason();
        attendee.title = "RW Bro".to_string();
        let warnings = consistency_warnings(&attendee);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::GrandTitleWithoutGrandRank);
        assert_eq!(warnings[0].fix, vec![FieldUpdate::Rank(Some(Rank::GrandLodge))]);

        apply_all(&mut attendee, &warnings[0].fix.clone());
        assert!(consistency_warnings(&attendee).is_empty());
    }

    #[test]
    fn test_rank_options_hide_mo_outside_delegations() {
        assert!(!rank_options(RegistrationType::Lodge).contains(&Rank::MasonicOrder));
        assert!(rank_options(RegistrationType::Delegation).contains(&Rank::MasonicOrder));
    }
}
