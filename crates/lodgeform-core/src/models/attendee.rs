use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for an attendee record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendeeId(String);

impl AttendeeId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AttendeeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AttendeeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for AttendeeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Attendee Kind
// ============================================================================

/// Kind of attendee.
///
/// Legacy kinds (`ladypartner`, `guestpartner`) are folded into `Guest` when
/// records are deserialized, so the rest of the crate only sees the canonical
/// pair. Anything else is kept as `Unrecognized` and rendered with a fallback
/// card instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttendeeKind {
    Mason,
    Guest,
    Unrecognized(String),
}

impl AttendeeKind {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "mason" => AttendeeKind::Mason,
            "guest" | "ladypartner" | "guestpartner" => AttendeeKind::Guest,
            _ => AttendeeKind::Unrecognized(trimmed.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            AttendeeKind::Mason => "Mason",
            AttendeeKind::Guest => "Guest",
            AttendeeKind::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, AttendeeKind::Unrecognized(_))
    }
}

impl From<String> for AttendeeKind {
    fn from(value: String) -> Self {
        AttendeeKind::parse(&value)
    }
}

impl From<AttendeeKind> for String {
    fn from(value: AttendeeKind) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for AttendeeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Masonic Rank
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Rank {
    /// Entered Apprentice
    #[serde(rename = "EAF")]
    EnteredApprentice,
    /// Fellow Craft
    #[serde(rename = "FCF")]
    FellowCraft,
    #[serde(rename = "MM")]
    MasterMason,
    #[serde(rename = "IM")]
    InstalledMaster,
    #[serde(rename = "GL")]
    GrandLodge,
    /// Masonic Order delegate, only offered to order delegations
    #[serde(rename = "MO")]
    MasonicOrder,
    #[serde(rename = "Other")]
    Other,
}

impl Rank {
    pub const ALL: [Rank; 7] = [
        Rank::EnteredApprentice,
        Rank::FellowCraft,
        Rank::MasterMason,
        Rank::InstalledMaster,
        Rank::GrandLodge,
        Rank::MasonicOrder,
        Rank::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Rank::EnteredApprentice => "EAF",
            Rank::FellowCraft => "FCF",
            Rank::MasterMason => "MM",
            Rank::InstalledMaster => "IM",
            Rank::GrandLodge => "GL",
            Rank::MasonicOrder => "MO",
            Rank::Other => "Other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rank::EnteredApprentice => "Entered Apprentice",
            Rank::FellowCraft => "Fellow Craft",
            Rank::MasterMason => "Master Mason",
            Rank::InstalledMaster => "Installed Master",
            Rank::GrandLodge => "Grand Lodge",
            Rank::MasonicOrder => "Masonic Order",
            Rank::Other => "Other",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.code().eq_ignore_ascii_case(code.trim()))
    }

    /// Ranks whose holders may carry a grand office.
    pub fn carries_grand_office(&self) -> bool {
        matches!(self, Rank::GrandLodge | Rank::MasonicOrder)
    }

    /// True for the ranks below Installed Master.
    pub fn is_craft(&self) -> bool {
        matches!(
            self,
            Rank::EnteredApprentice | Rank::FellowCraft | Rank::MasterMason
        )
    }
}

impl std::fmt::Display for Rank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum GrandOfficerStatus {
    Present,
    Past,
}

/// Who receives event communication for a non-primary attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ContactPreference {
    Directly,
    PrimaryAttendee,
    ProvideLater,
}

impl ContactPreference {
    pub const ALL: [ContactPreference; 3] = [
        ContactPreference::Directly,
        ContactPreference::PrimaryAttendee,
        ContactPreference::ProvideLater,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ContactPreference::Directly => "Directly",
            ContactPreference::PrimaryAttendee => "Via primary attendee",
            ContactPreference::ProvideLater => "Provide later",
        }
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Every attendee field that can be edited through the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Title,
    FirstName,
    LastName,
    Suffix,
    Rank,
    GrandOfficerStatus,
    PresentGrandOfficerRole,
    OtherGrandOfficerRole,
    GrandLodgeId,
    LodgeId,
    LodgeNameNumber,
    UseSameLodge,
    PrimaryEmail,
    PrimaryPhone,
    ContactPreference,
    Relationship,
    DietaryRequirements,
    SpecialNeeds,
}

impl Field {
    pub const ALL: [Field; 18] = [
        Field::Title,
        Field::FirstName,
        Field::LastName,
        Field::Suffix,
        Field::Rank,
        Field::GrandOfficerStatus,
        Field::PresentGrandOfficerRole,
        Field::OtherGrandOfficerRole,
        Field::GrandLodgeId,
        Field::LodgeId,
        Field::LodgeNameNumber,
        Field::UseSameLodge,
        Field::PrimaryEmail,
        Field::PrimaryPhone,
        Field::ContactPreference,
        Field::Relationship,
        Field::DietaryRequirements,
        Field::SpecialNeeds,
    ];

    /// Wire name, matching the serialized attendee keys.
    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::FirstName => "firstName",
            Field::LastName => "lastName",
            Field::Suffix => "suffix",
            Field::Rank => "rank",
            Field::GrandOfficerStatus => "grandOfficerStatus",
            Field::PresentGrandOfficerRole => "presentGrandOfficerRole",
            Field::OtherGrandOfficerRole => "otherGrandOfficerRole",
            Field::GrandLodgeId => "grandLodgeId",
            Field::LodgeId => "lodgeId",
            Field::LodgeNameNumber => "lodgeNameNumber",
            Field::UseSameLodge => "useSameLodge",
            Field::PrimaryEmail => "primaryEmail",
            Field::PrimaryPhone => "primaryPhone",
            Field::ContactPreference => "contactPreference",
            Field::Relationship => "relationship",
            Field::DietaryRequirements => "dietaryRequirements",
            Field::SpecialNeeds => "specialNeeds",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::FirstName => "First Name",
            Field::LastName => "Last Name",
            Field::Suffix => "Suffix",
            Field::Rank => "Rank",
            Field::GrandOfficerStatus => "Grand Officer Status",
            Field::PresentGrandOfficerRole => "Grand Officer Role",
            Field::OtherGrandOfficerRole => "Other Grand Office",
            Field::GrandLodgeId => "Grand Lodge",
            Field::LodgeId => "Lodge",
            Field::LodgeNameNumber => "Lodge Name",
            Field::UseSameLodge => "Same Lodge as Primary",
            Field::PrimaryEmail => "Email",
            Field::PrimaryPhone => "Phone",
            Field::ContactPreference => "Contact",
            Field::Relationship => "Relationship",
            Field::DietaryRequirements => "Dietary Requirements",
            Field::SpecialNeeds => "Special Needs",
        }
    }
}

/// A single field write, carrying the new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Title(String),
    FirstName(String),
    LastName(String),
    Suffix(String),
    Rank(Option<Rank>),
    GrandOfficerStatus(Option<GrandOfficerStatus>),
    PresentGrandOfficerRole(String),
    OtherGrandOfficerRole(String),
    GrandLodgeId(Option<String>),
    LodgeId(Option<String>),
    LodgeNameNumber(String),
    UseSameLodge(bool),
    PrimaryEmail(String),
    PrimaryPhone(String),
    ContactPreference(Option<ContactPreference>),
    Relationship(String),
    DietaryRequirements(String),
    SpecialNeeds(String),
}

impl FieldUpdate {
    pub fn field(&self) -> Field {
        match self {
            FieldUpdate::Title(_) => Field::Title,
            FieldUpdate::FirstName(_) => Field::FirstName,
            FieldUpdate::LastName(_) => Field::LastName,
            FieldUpdate::Suffix(_) => Field::Suffix,
            FieldUpdate::Rank(_) => Field::Rank,
            FieldUpdate::GrandOfficerStatus(_) => Field::GrandOfficerStatus,
            FieldUpdate::PresentGrandOfficerRole(_) => Field::PresentGrandOfficerRole,
            FieldUpdate::OtherGrandOfficerRole(_) => Field::OtherGrandOfficerRole,
            FieldUpdate::GrandLodgeId(_) => Field::GrandLodgeId,
            FieldUpdate::LodgeId(_) => Field::LodgeId,
            FieldUpdate::LodgeNameNumber(_) => Field::LodgeNameNumber,
            FieldUpdate::UseSameLodge(_) => Field::UseSameLodge,
            FieldUpdate::PrimaryEmail(_) => Field::PrimaryEmail,
            FieldUpdate::PrimaryPhone(_) => Field::PrimaryPhone,
            FieldUpdate::ContactPreference(_) => Field::ContactPreference,
            FieldUpdate::Relationship(_) => Field::Relationship,
            FieldUpdate::DietaryRequirements(_) => Field::DietaryRequirements,
            FieldUpdate::SpecialNeeds(_) => Field::SpecialNeeds,
        }
    }
}

// ============================================================================
// Attendee
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Attendee {
    pub id: AttendeeId,
    #[serde(rename = "attendeeType")]
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub kind: AttendeeKind,

    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub suffix: String,

    #[serde(default)]
    pub rank: Option<Rank>,
    #[serde(default)]
    pub grand_officer_status: Option<GrandOfficerStatus>,
    #[serde(default)]
    pub present_grand_officer_role: String,
    #[serde(default)]
    pub other_grand_officer_role: String,
    #[serde(default)]
    pub grand_lodge_id: Option<String>,
    #[serde(default)]
    pub lodge_id: Option<String>,
    #[serde(default)]
    pub lodge_name_number: String,
    #[serde(default)]
    pub use_same_lodge: bool,

    #[serde(default)]
    pub primary_email: String,
    #[serde(default)]
    pub primary_phone: String,
    #[serde(default)]
    pub contact_preference: Option<ContactPreference>,

    #[serde(default)]
    pub is_primary: bool,
    /// Back-reference to the attendee this record is the partner of.
    #[serde(default)]
    pub is_partner: Option<AttendeeId>,
    /// Forward reference to this attendee's partner.
    #[serde(default)]
    pub partner: Option<AttendeeId>,
    #[serde(default)]
    pub relationship: String,

    #[serde(default)]
    pub dietary_requirements: String,
    #[serde(default)]
    pub special_needs: String,
}

impl Attendee {
    pub fn new(kind: AttendeeKind) -> Self {
        Self {
            id: AttendeeId::generate(),
            kind,
            title: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            suffix: String::new(),
            rank: None,
            grand_officer_status: None,
            present_grand_officer_role: String::new(),
            other_grand_officer_role: String::new(),
            grand_lodge_id: None,
            lodge_id: None,
            lodge_name_number: String::new(),
            use_same_lodge: false,
            primary_email: String::new(),
            primary_phone: String::new(),
            contact_preference: None,
            is_primary: false,
            is_partner: None,
            partner: None,
            relationship: String::new(),
            dietary_requirements: String::new(),
            special_needs: String::new(),
        }
    }

    /// A Mason with the default title and rank.
    pub fn mason() -> Self {
        let mut attendee = Self::new(AttendeeKind::Mason);
        attendee.title = crate::rules::DEFAULT_MASON_TITLE.to_string();
        attendee.rank = Some(Rank::MasterMason);
        attendee
    }

    pub fn guest() -> Self {
        Self::new(AttendeeKind::Guest)
    }

    /// A partner record linked back to `parent`.
    pub fn partner_of(parent: &AttendeeId) -> Self {
        let mut attendee = Self::new(AttendeeKind::Guest);
        attendee.is_partner = Some(parent.clone());
        attendee.contact_preference = Some(ContactPreference::PrimaryAttendee);
        attendee.relationship = crate::partner::DEFAULT_RELATIONSHIP.to_string();
        attendee
    }

    pub fn is_mason(&self) -> bool {
        self.kind == AttendeeKind::Mason
    }

    pub fn is_partner_record(&self) -> bool {
        self.is_partner.is_some()
    }

    /// Kind used for rendering: partners always render as guests.
    pub fn effective_kind(&self) -> AttendeeKind {
        if self.is_partner_record() && self.kind.is_recognized() {
            AttendeeKind::Guest
        } else {
            self.kind.clone()
        }
    }

    pub fn has_lodge(&self) -> bool {
        self.grand_lodge_id.as_deref().is_some_and(|id| !id.is_empty())
            && self.lodge_id.as_deref().is_some_and(|id| !id.is_empty())
    }

    /// Name with title and suffix, e.g. "W Bro John Smith PGStB".
    pub fn full_name(&self) -> String {
        [
            self.title.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
            self.suffix.as_str(),
        ]
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// Name for list rows, falling back to a placeholder for blank records.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            format!("New {}", self.effective_kind())
        } else {
            name.to_string()
        }
    }

    /// Write a single field without running any business rules.
    pub fn apply(&mut self, update: &FieldUpdate) {
        match update {
            FieldUpdate::Title(v) => self.title = v.clone(),
            FieldUpdate::FirstName(v) => self.first_name = v.clone(),
            FieldUpdate::LastName(v) => self.last_name = v.clone(),
            FieldUpdate::Suffix(v) => self.suffix = v.clone(),
            FieldUpdate::Rank(v) => self.rank = *v,
            FieldUpdate::GrandOfficerStatus(v) => self.grand_officer_status = *v,
            FieldUpdate::PresentGrandOfficerRole(v) => self.present_grand_officer_role = v.clone(),
            FieldUpdate::OtherGrandOfficerRole(v) => self.other_grand_officer_role = v.clone(),
            FieldUpdate::GrandLodgeId(v) => self.grand_lodge_id = v.clone(),
            FieldUpdate::LodgeId(v) => self.lodge_id = v.clone(),
            FieldUpdate::LodgeNameNumber(v) => self.lodge_name_number = v.clone(),
            FieldUpdate::UseSameLodge(v) => self.use_same_lodge = *v,
            FieldUpdate::PrimaryEmail(v) => self.primary_email = v.clone(),
            FieldUpdate::PrimaryPhone(v) => self.primary_phone = v.clone(),
            FieldUpdate::ContactPreference(v) => self.contact_preference = *v,
            FieldUpdate::Relationship(v) => self.relationship = v.clone(),
            FieldUpdate::DietaryRequirements(v) => self.dietary_requirements = v.clone(),
            FieldUpdate::SpecialNeeds(v) => self.special_needs = v.clone(),
        }
    }

    /// Current value of a field, as the update that would write it.
    pub fn value(&self, field: Field) -> FieldUpdate {
        match field {
            Field::Title => FieldUpdate::Title(self.title.clone()),
            Field::FirstName => FieldUpdate::FirstName(self.first_name.clone()),
            Field::LastName => FieldUpdate::LastName(self.last_name.clone()),
            Field::Suffix => FieldUpdate::Suffix(self.suffix.clone()),
            Field::Rank => FieldUpdate::Rank(self.rank),
            Field::GrandOfficerStatus => FieldUpdate::GrandOfficerStatus(self.grand_officer_status),
            Field::PresentGrandOfficerRole => {
                FieldUpdate::PresentGrandOfficerRole(self.present_grand_officer_role.clone())
            }
            Field::OtherGrandOfficerRole => {
                FieldUpdate::OtherGrandOfficerRole(self.other_grand_officer_role.clone())
            }
            Field::GrandLodgeId => FieldUpdate::GrandLodgeId(self.grand_lodge_id.clone()),
            Field::LodgeId => FieldUpdate::LodgeId(self.lodge_id.clone()),
            Field::LodgeNameNumber => FieldUpdate::LodgeNameNumber(self.lodge_name_number.clone()),
            Field::UseSameLodge => FieldUpdate::UseSameLodge(self.use_same_lodge),
            Field::PrimaryEmail => FieldUpdate::PrimaryEmail(self.primary_email.clone()),
            Field::PrimaryPhone => FieldUpdate::PrimaryPhone(self.primary_phone.clone()),
            Field::ContactPreference => FieldUpdate::ContactPreference(self.contact_preference),
            Field::Relationship => FieldUpdate::Relationship(self.relationship.clone()),
            Field::DietaryRequirements => {
                FieldUpdate::DietaryRequirements(self.dietary_requirements.clone())
            }
            Field::SpecialNeeds => FieldUpdate::SpecialNeeds(self.special_needs.clone()),
        }
    }

    /// True when the field holds no value.
    pub fn is_field_empty(&self, field: Field) -> bool {
        match field {
            Field::Title => self.title.trim().is_empty(),
            Field::FirstName => self.first_name.trim().is_empty(),
            Field::LastName => self.last_name.trim().is_empty(),
            Field::Suffix => self.suffix.trim().is_empty(),
            Field::Rank => self.rank.is_none(),
            Field::GrandOfficerStatus => self.grand_officer_status.is_none(),
            Field::PresentGrandOfficerRole => self.present_grand_officer_role.trim().is_empty(),
            Field::OtherGrandOfficerRole => self.other_grand_officer_role.trim().is_empty(),
            Field::GrandLodgeId => self.grand_lodge_id.as_deref().map_or(true, str::is_empty),
            Field::LodgeId => self.lodge_id.as_deref().map_or(true, str::is_empty),
            Field::LodgeNameNumber => self.lodge_name_number.trim().is_empty(),
            Field::UseSameLodge => !self.use_same_lodge,
            Field::PrimaryEmail => self.primary_email.trim().is_empty(),
            Field::PrimaryPhone => self.primary_phone.trim().is_empty(),
            Field::ContactPreference => self.contact_preference.is_none(),
            Field::Relationship => self.relationship.trim().is_empty(),
            Field::DietaryRequirements => self.dietary_requirements.trim().is_empty(),
            Field::SpecialNeeds => self.special_needs.trim().is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parses_legacy_aliases() {
        assert_eq!(AttendeeKind::parse("mason"), AttendeeKind::Mason);
        assert_eq!(AttendeeKind::parse("Guest"), AttendeeKind::Guest);
        assert_eq!(AttendeeKind::parse("ladypartner"), AttendeeKind::Guest);
        assert_eq!(AttendeeKind::parse("GuestPartner"), AttendeeKind::Guest);
        assert_eq!(
            AttendeeKind::parse("steward"),
            AttendeeKind::Unrecognized("steward".to_string())
        );
    }

    #[test]
    fn test_deserialize_normalizes_kind() {
        let json = r#"{"id":"a1","attendeeType":"ladypartner","firstName":"Jane"}"#;
        let attendee: Attendee = serde_json::from_str(json).unwrap();
        assert_eq!(attendee.kind, AttendeeKind::Guest);
        assert_eq!(attendee.first_name, "Jane");
        assert!(attendee.partner.is_none());

        let out = serde_json::to_value(&attendee).unwrap();
        assert_eq!(out["attendeeType"], "Guest");
    }

    #[test]
    fn test_rank_codes_round_trip() {
        for rank in Rank::ALL {
            assert_eq!(Rank::from_code(rank.code()), Some(rank));
        }
        assert_eq!(Rank::from_code("gl"), Some(Rank::GrandLodge));
        assert_eq!(Rank::from_code("XX"), None);
        let json = serde_json::to_string(&Rank::InstalledMaster).unwrap();
        assert_eq!(json, "\"IM\"");
    }

    #[test]
    fn test_partner_renders_as_guest() {
        let parent = Attendee::mason();
        let mut partner = Attendee::partner_of(&parent.id);
        partner.kind = AttendeeKind::Mason;
        assert_eq!(partner.effective_kind(), AttendeeKind::Guest);
    }

    #[test]
    fn test_full_name_skips_blank_parts() {
        let mut attendee = Attendee::mason();
        attendee.title = "W Bro".to_string();
        attendee.first_name = "John".to_string();
        attendee.last_name = "Smith".to_string();
        assert_eq!(attendee.full_name(), "W Bro John Smith");
        attendee.suffix = "PGStB".to_string();
        assert_eq!(attendee.full_name(), "W Bro John Smith PGStB");
    }

    #[test]
    fn test_display_name_placeholder() {
        let attendee = Attendee::guest();
        assert_eq!(attendee.display_name(), "New Guest");
    }
}
