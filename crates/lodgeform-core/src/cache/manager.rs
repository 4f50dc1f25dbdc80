use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use crate::models::{
    Attendee, AttendeeId, DelegationMode, Field, GrandLodge, GrandOfficerStatus, Registration,
    RegistrationType, TicketPackage,
};
use crate::rules;
use crate::store::{PendingSync, RegistrationStore};

/// Lookup data (grand lodges, packages) is refreshed after an hour.
const LOOKUP_STALE_MINUTES: i64 = 60;

/// Drafts older than a week are discarded on load.
const DRAFT_MAX_AGE_MINUTES: i64 = 7 * 24 * 60;

const DRAFT_FILE: &str = "registration-draft";
const GRAND_LODGES_FILE: &str = "grand-lodges";
const PACKAGES_FILE: &str = "packages";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }

    pub fn is_stale(&self) -> bool {
        self.age_minutes() > LOOKUP_STALE_MINUTES
    }

    fn is_expired_draft(&self) -> bool {
        self.age_minutes() > DRAFT_MAX_AGE_MINUTES
    }
}

// ============================================================================
// Draft
// ============================================================================

/// An attendee with the time it was last edited, as saved in the draft or
/// returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StampedAttendee {
    #[serde(flatten)]
    pub attendee: Attendee,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Local copy of an in-progress registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationDraft {
    pub registration_id: String,
    pub registration_type: RegistrationType,
    #[serde(default)]
    pub delegation_mode: DelegationMode,
    #[serde(default)]
    pub attendees: Vec<StampedAttendee>,
    /// Changes the backend had not confirmed when the draft was saved.
    #[serde(default)]
    pub pending_sync: PendingSync,
}

impl RegistrationDraft {
    pub fn from_store(store: &RegistrationStore) -> Self {
        Self {
            registration_id: store.registration_id().to_string(),
            registration_type: store.registration_type(),
            delegation_mode: store.delegation_mode(),
            attendees: store
                .attendees()
                .iter()
                .map(|a| StampedAttendee {
                    attendee: a.clone(),
                    updated_at: store.updated_at(&a.id),
                })
                .collect(),
            pending_sync: store.pending_sync(),
        }
    }

    pub fn attendees(&self) -> Vec<Attendee> {
        self.attendees.iter().map(|d| d.attendee.clone()).collect()
    }

    pub fn into_registration(self) -> Registration {
        Registration {
            id: self.registration_id,
            registration_type: self.registration_type,
            delegation_mode: self.delegation_mode,
            attendees: self.attendees.into_iter().map(|d| d.attendee).collect(),
            confirmation_number: None,
        }
    }

    /// Most recent edit time per attendee.
    pub fn edit_times(&self) -> HashMap<AttendeeId, DateTime<Utc>> {
        self.attendees
            .iter()
            .filter_map(|d| d.updated_at.map(|t| (d.attendee.id.clone(), t)))
            .collect()
    }
}

/// Copy fields that are empty on `target` but populated on `stored`.
///
/// Only fields the target's current state allows are copied, so a stored
/// grand office, lodge or contact preference cannot undo a rule that has
/// since cleared it. Never overwrites a value and never touches links or
/// the same-lodge flag. Returns the number of fields filled.
pub fn hydrate_missing(target: &mut Attendee, stored: &Attendee) -> usize {
    if target.id != stored.id {
        return 0;
    }

    // The preference decides whether contact details may be filled.
    let order = std::iter::once(Field::ContactPreference)
        .chain(Field::ALL.into_iter().filter(|f| *f != Field::ContactPreference));

    let mut filled = 0;
    for field in order {
        if !accepts_stored(target, stored, field) {
            continue;
        }
        if target.is_field_empty(field) && !stored.is_field_empty(field) {
            target.apply(&stored.value(field));
            filled += 1;
        }
    }
    filled
}

/// Whether `field` may be restored onto `target` as it stands now.
fn accepts_stored(target: &Attendee, stored: &Attendee, field: Field) -> bool {
    let mason = target.is_mason() && !target.is_partner_record();
    match field {
        Field::UseSameLodge => false,
        Field::Rank => mason,
        Field::GrandOfficerStatus => mason && target.rank.is_some_and(|r| r.carries_grand_office()),
        Field::PresentGrandOfficerRole => {
            target.grand_officer_status == Some(GrandOfficerStatus::Present)
        }
        Field::OtherGrandOfficerRole => {
            target.present_grand_officer_role == rules::OTHER_GRAND_OFFICE
        }
        // Same-lodge attendees get their lodge from the primary, and a stored
        // copy that mirrored the primary says nothing about a hand-picked lodge.
        Field::GrandLodgeId => mason && !target.use_same_lodge && !stored.use_same_lodge,
        Field::LodgeId | Field::LodgeNameNumber => {
            mason
                && !target.use_same_lodge
                && !stored.use_same_lodge
                && target.grand_lodge_id == stored.grand_lodge_id
        }
        Field::PrimaryEmail | Field::PrimaryPhone => rules::should_show_contact_fields(target),
        Field::ContactPreference => !target.is_primary,
        Field::Relationship => target.is_partner_record(),
        _ => true,
    }
}

// ============================================================================
// Manager
// ============================================================================

pub struct CacheManager {
    cache_dir: PathBuf,
}

impl CacheManager {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache dir: {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read cache file: {}", name))?;

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    fn save<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let cached = CachedData::new(data);
        let path = self.cache_path(name);
        let contents = serde_json::to_string_pretty(&cached)?;
        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let path = self.cache_path(name);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove cache file: {}", name))?;
        }
        Ok(())
    }

    // ===== Draft =====

    /// Load the saved draft. Expired drafts are deleted and reported as absent.
    pub fn load_draft(&self) -> Result<Option<CachedData<RegistrationDraft>>> {
        let Some(draft) = self.load::<RegistrationDraft>(DRAFT_FILE)? else {
            return Ok(None);
        };

        if draft.is_expired_draft() {
            debug!(age = %draft.age_display(), "Discarding expired draft");
            self.remove(DRAFT_FILE)?;
            return Ok(None);
        }
        Ok(Some(draft))
    }

    pub fn save_draft(&self, draft: &RegistrationDraft) -> Result<()> {
        debug!(
            registration = %draft.registration_id,
            attendees = draft.attendees.len(),
            "Saving draft"
        );
        self.save(DRAFT_FILE, draft)
    }

    pub fn clear_draft(&self) -> Result<()> {
        self.remove(DRAFT_FILE)
    }

    // ===== Lookups =====

    pub fn load_grand_lodges(&self) -> Result<Option<CachedData<Vec<GrandLodge>>>> {
        self.load(GRAND_LODGES_FILE)
    }

    pub fn save_grand_lodges(&self, grand_lodges: &[GrandLodge]) -> Result<()> {
        self.save(GRAND_LODGES_FILE, &grand_lodges)
    }

    pub fn load_packages(&self) -> Result<Option<CachedData<Vec<TicketPackage>>>> {
        self.load(PACKAGES_FILE)
    }

    pub fn save_packages(&self, packages: &[TicketPackage]) -> Result<()> {
        self.save(PACKAGES_FILE, &packages)
    }
}
