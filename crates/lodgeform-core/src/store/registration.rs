use std::collections::{BTreeSet, HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::{hydrate_missing, StampedAttendee};
use crate::contact;
use crate::models::{
    Attendee, AttendeeId, AttendeeKind, DelegationMode, Field, FieldUpdate, Registration,
    RegistrationType,
};
use crate::rules;
use crate::utils::{normalize_email, normalize_name, normalize_phone};
use crate::{RegistrationError, RegistrationResult};

use super::commit::{CommitTracker, Decision, DEFAULT_DEBOUNCE};

/// Upper bound on rule-derived updates from a single write.
/// Real cascades are two or three steps; this only guards against a rule cycle.
const MAX_CASCADE: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub debounce: Duration,
    /// Keep same-lodge attendees in step with later changes to the primary's lodge.
    pub live_lodge_sync: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            live_lodge_sync: true,
        }
    }
}

/// Result of a field write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Updates written to the attendee, the requested one first.
    pub applied: Vec<FieldUpdate>,
    /// The write was held by the debounce window and will land on flush.
    pub held: bool,
}

/// Records touched since the last `take_changes`.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub upserts: Vec<Attendee>,
    pub deletes: Vec<AttendeeId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn ids(&self) -> PendingSync {
        PendingSync {
            upserts: self.upserts.iter().map(|a| a.id.clone()).collect(),
            deletes: self.deletes.clone(),
        }
    }
}

/// Ids of records the backend has not confirmed yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSync {
    #[serde(default)]
    pub upserts: Vec<AttendeeId>,
    #[serde(default)]
    pub deletes: Vec<AttendeeId>,
}

impl PendingSync {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Single source of truth for one registration's attendees.
///
/// All writes go through `update`, which normalizes the value, applies the
/// commit policy, runs the business rules and keeps the partner, primary,
/// contact and same-lodge invariants.
#[derive(Debug)]
pub struct RegistrationStore {
    registration: Registration,
    tracker: CommitTracker,
    live_lodge_sync: bool,
    dirty: BTreeSet<AttendeeId>,
    removed: Vec<AttendeeId>,
    updated_at: HashMap<AttendeeId, DateTime<Utc>>,
}

impl RegistrationStore {
    pub fn new(registration_type: RegistrationType, options: StoreOptions) -> Self {
        Self::from_registration(Registration::new(registration_type), options)
    }

    /// Wrap an existing registration, repairing any broken links it carries.
    pub fn from_registration(registration: Registration, options: StoreOptions) -> Self {
        let mut store = Self {
            registration,
            tracker: CommitTracker::new(options.debounce),
            live_lodge_sync: options.live_lodge_sync,
            dirty: BTreeSet::new(),
            removed: Vec::new(),
            updated_at: HashMap::new(),
        };
        store.repair();
        store
    }

    // ===== Accessors =====

    pub fn registration(&self) -> &Registration {
        &self.registration
    }

    pub fn registration_id(&self) -> &str {
        &self.registration.id
    }

    pub fn registration_type(&self) -> RegistrationType {
        self.registration.registration_type
    }

    pub fn delegation_mode(&self) -> DelegationMode {
        self.registration.delegation_mode
    }

    pub(crate) fn set_delegation_mode(&mut self, mode: DelegationMode) {
        self.registration.delegation_mode = mode;
    }

    pub(crate) fn set_confirmation_number(&mut self, confirmation: String) {
        self.registration.confirmation_number = Some(confirmation);
    }

    pub fn attendees(&self) -> &[Attendee] {
        &self.registration.attendees
    }

    pub fn len(&self) -> usize {
        self.registration.attendees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registration.attendees.is_empty()
    }

    pub fn get(&self, id: &AttendeeId) -> Option<&Attendee> {
        self.registration.attendees.iter().find(|a| &a.id == id)
    }

    pub fn primary(&self) -> Option<&Attendee> {
        self.registration.attendees.iter().find(|a| a.is_primary)
    }

    /// Attendees that are not partners, i.e. the entries the form adds and counts.
    pub fn registrants(&self) -> impl Iterator<Item = &Attendee> {
        self.registration
            .attendees
            .iter()
            .filter(|a| !a.is_partner_record())
    }

    pub fn registrant_count(&self) -> usize {
        self.registrants().count()
    }

    pub fn updated_at(&self, id: &AttendeeId) -> Option<DateTime<Utc>> {
        self.updated_at.get(id).copied()
    }

    pub fn has_pending_writes(&self) -> bool {
        self.tracker.has_pending()
    }

    fn position(&self, id: &AttendeeId) -> RegistrationResult<usize> {
        self.registration
            .attendees
            .iter()
            .position(|a| &a.id == id)
            .ok_or_else(|| RegistrationError::NotFound(id.clone()))
    }

    fn attendee_mut(&mut self, id: &AttendeeId) -> RegistrationResult<&mut Attendee> {
        self.registration
            .attendees
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| RegistrationError::NotFound(id.clone()))
    }

    fn touch(&mut self, id: &AttendeeId) {
        self.dirty.insert(id.clone());
        self.updated_at.insert(id.clone(), Utc::now());
    }

    // ===== Add / Remove =====

    /// Add an attendee with default values. The first attendee becomes primary.
    pub fn add(&mut self, kind: AttendeeKind) -> RegistrationResult<AttendeeId> {
        let mut attendee = match kind {
            AttendeeKind::Mason => Attendee::mason(),
            AttendeeKind::Guest => Attendee::guest(),
            AttendeeKind::Unrecognized(raw) => {
                return Err(RegistrationError::UnrecognizedKind(raw));
            }
        };

        if self.primary().is_none() {
            attendee.is_primary = true;
        }

        let id = attendee.id.clone();
        debug!(attendee = %id, kind = %attendee.kind, primary = attendee.is_primary, "Adding attendee");
        self.registration.attendees.push(attendee);
        self.touch(&id);
        Ok(id)
    }

    pub fn add_mason(&mut self) -> RegistrationResult<AttendeeId> {
        self.add(AttendeeKind::Mason)
    }

    pub fn add_guest(&mut self) -> RegistrationResult<AttendeeId> {
        self.add(AttendeeKind::Guest)
    }

    /// Create a partner directly after `parent_id` and link the two.
    pub(crate) fn insert_partner(&mut self, parent_id: &AttendeeId) -> RegistrationResult<AttendeeId> {
        let index = self.position(parent_id)?;
        let parent = &self.registration.attendees[index];
        if parent.is_partner_record() {
            return Err(RegistrationError::PartnerOfPartner);
        }
        if let Some(existing) = &parent.partner {
            return Ok(existing.clone());
        }

        let partner = Attendee::partner_of(parent_id);
        let partner_id = partner.id.clone();
        self.registration.attendees.insert(index + 1, partner);
        self.registration.attendees[index].partner = Some(partner_id.clone());

        self.touch(parent_id);
        self.touch(&partner_id);
        Ok(partner_id)
    }

    /// Remove an attendee, cascading to its partner.
    ///
    /// Removing a partner unlinks it from its parent. Removing the primary
    /// promotes the next registrant. Returns the removed records.
    pub fn remove(&mut self, id: &AttendeeId) -> RegistrationResult<Vec<Attendee>> {
        let index = self.position(id)?;
        let target = self.registration.attendees[index].clone();

        let mut doomed = vec![target.id.clone()];
        if let Some(partner) = &target.partner {
            doomed.push(partner.clone());
        }

        if let Some(parent_id) = &target.is_partner {
            if let Ok(parent) = self.attendee_mut(parent_id) {
                parent.partner = None;
                let parent_id = parent_id.clone();
                self.touch(&parent_id);
            }
        }

        let mut removed = Vec::new();
        self.registration.attendees.retain(|a| {
            if doomed.contains(&a.id) {
                removed.push(a.clone());
                false
            } else {
                true
            }
        });

        for gone in &removed {
            self.tracker.cancel_attendee(&gone.id);
            self.dirty.remove(&gone.id);
            self.updated_at.remove(&gone.id);
            self.removed.push(gone.id.clone());
        }

        if target.is_primary {
            self.promote_primary();
        }

        debug!(attendee = %id, removed = removed.len(), "Removed attendee");
        Ok(removed)
    }

    /// Remove every attendee.
    pub fn clear(&mut self) {
        for attendee in self.registration.attendees.drain(..) {
            self.removed.push(attendee.id);
        }
        self.tracker = CommitTracker::new(self.tracker.window());
        self.dirty.clear();
        self.updated_at.clear();
    }

    fn promote_primary(&mut self) {
        let next = self
            .registration
            .attendees
            .iter_mut()
            .find(|a| !a.is_partner_record());

        let Some(next) = next else {
            return;
        };

        next.is_primary = true;
        next.contact_preference = None;
        next.use_same_lodge = false;
        let id = next.id.clone();
        debug!(attendee = %id, "Promoted attendee to primary");
        self.touch(&id);
        if self.live_lodge_sync {
            self.sync_same_lodge();
        }
    }

    // ===== Reordering =====

    /// Move an attendee (with its partner) one place up. The primary stays first.
    pub fn move_up(&mut self, id: &AttendeeId) -> RegistrationResult<bool> {
        self.shift(id, -1)
    }

    pub fn move_down(&mut self, id: &AttendeeId) -> RegistrationResult<bool> {
        self.shift(id, 1)
    }

    fn shift(&mut self, id: &AttendeeId, delta: isize) -> RegistrationResult<bool> {
        let attendee = self
            .get(id)
            .ok_or_else(|| RegistrationError::NotFound(id.clone()))?;
        let anchor = attendee.is_partner.clone().unwrap_or_else(|| id.clone());

        let mut groups: Vec<Vec<Attendee>> = Vec::new();
        for attendee in self.registration.attendees.drain(..) {
            match &attendee.is_partner {
                Some(parent) => match groups.iter_mut().find(|g| &g[0].id == parent) {
                    Some(group) => group.push(attendee),
                    None => groups.push(vec![attendee]),
                },
                None => groups.push(vec![attendee]),
            }
        }

        let from = groups.iter().position(|g| g[0].id == anchor);
        let to = from.and_then(|f| f.checked_add_signed(delta));
        let moved = match (from, to) {
            (Some(from), Some(to))
                if to < groups.len() && !groups[from][0].is_primary && !groups[to][0].is_primary =>
            {
                groups.swap(from, to);
                true
            }
            _ => false,
        };

        self.registration.attendees = groups.into_iter().flatten().collect();
        Ok(moved)
    }

    // ===== Field Updates =====

    /// Write a field at `now`, following the field's commit policy.
    pub fn update(
        &mut self,
        id: &AttendeeId,
        update: FieldUpdate,
        now: Instant,
    ) -> RegistrationResult<UpdateOutcome> {
        let attendee = self
            .get(id)
            .ok_or_else(|| RegistrationError::NotFound(id.clone()))?;
        let update = normalize(update);

        match &update {
            FieldUpdate::PrimaryEmail(v) | FieldUpdate::PrimaryPhone(v)
                if !v.is_empty() && !rules::should_show_contact_fields(attendee) =>
            {
                debug!(attendee = %id, field = update.field().name(), "Ignoring contact write for deferred attendee");
                return Ok(UpdateOutcome::default());
            }
            FieldUpdate::ContactPreference(Some(_)) if attendee.is_primary => {
                return Err(RegistrationError::PrimaryContactPreference);
            }
            FieldUpdate::UseSameLodge(true)
                if !rules::should_show_use_same_lodge(attendee, self.primary()) =>
            {
                return Err(RegistrationError::SameLodgeNotAvailable);
            }
            _ => {}
        }

        match self.tracker.offer(id, update.clone(), now) {
            Decision::Hold => Ok(UpdateOutcome {
                applied: Vec::new(),
                held: true,
            }),
            Decision::Commit => Ok(UpdateOutcome {
                applied: self.commit(id, update)?,
                held: false,
            }),
        }
    }

    /// Write held debounced values whose window has elapsed.
    pub fn flush_due(&mut self, now: Instant) -> usize {
        let due = self.tracker.due(now);
        self.apply_flushed(due)
    }

    /// Write every held value. Run before validation, navigation and submission.
    pub fn flush_all(&mut self) -> usize {
        let pending = self.tracker.drain();
        self.apply_flushed(pending)
    }

    fn apply_flushed(&mut self, pending: Vec<(AttendeeId, FieldUpdate)>) -> usize {
        let mut flushed = 0;
        for (id, update) in pending {
            match self.commit(&id, update) {
                Ok(_) => flushed += 1,
                Err(e) => debug!(attendee = %id, error = %e, "Dropped pending write"),
            }
        }
        flushed
    }

    /// Apply an update and everything the rules derive from it, depth first.
    fn commit(&mut self, id: &AttendeeId, update: FieldUpdate) -> RegistrationResult<Vec<FieldUpdate>> {
        let mut queue: VecDeque<(FieldUpdate, bool)> = VecDeque::from([(update, true)]);
        let mut applied = Vec::new();
        let mut primary_lodge_changed = false;

        while let Some((update, run_rules)) = queue.pop_front() {
            if applied.len() >= MAX_CASCADE {
                warn!(attendee = %id, "Rule cascade limit reached, dropping remaining updates");
                break;
            }

            let current = self
                .get(id)
                .ok_or_else(|| RegistrationError::NotFound(id.clone()))?;
            let follow_ups = if run_rules {
                self.follow_ups(current, &update)?
            } else {
                Vec::new()
            };

            if !applied.is_empty() {
                self.tracker.cancel(id, update.field());
            }

            let attendee = self.attendee_mut(id)?;
            attendee.apply(&update);
            if attendee.is_primary && is_lodge_field(update.field()) {
                primary_lodge_changed = true;
            }

            for follow_up in follow_ups.into_iter().rev() {
                queue.push_front(follow_up);
            }
            applied.push(update);
        }

        self.touch(id);
        if primary_lodge_changed && self.live_lodge_sync {
            self.sync_same_lodge();
        }
        Ok(applied)
    }

    /// Rule-derived updates for `update` against the attendee's current state.
    /// The flag says whether the follow-up runs its own rules.
    fn follow_ups(
        &self,
        current: &Attendee,
        update: &FieldUpdate,
    ) -> RegistrationResult<Vec<(FieldUpdate, bool)>> {
        let mut follow_ups: Vec<(FieldUpdate, bool)> = match update {
            FieldUpdate::Title(title) => with_rules(rules::on_title_change(title, current.rank)),
            FieldUpdate::Rank(rank) => with_rules(rules::on_rank_change(
                *rank,
                &current.title,
                current.rank,
                current.grand_officer_status,
            )),
            FieldUpdate::GrandOfficerStatus(status) => with_rules(
                rules::on_grand_officer_status_change(*status, &current.present_grand_officer_role),
            ),
            FieldUpdate::PresentGrandOfficerRole(role) => with_rules(
                rules::on_grand_officer_role_change(role, &current.other_grand_officer_role),
            ),
            FieldUpdate::GrandLodgeId(grand_lodge) => with_rules(rules::on_grand_lodge_change(
                grand_lodge.as_deref(),
                current.grand_lodge_id.as_deref(),
                current.lodge_id.as_deref(),
            )),
            FieldUpdate::ContactPreference(preference) => {
                if current.is_primary {
                    Vec::new()
                } else {
                    let updates = match preference {
                        Some(p) => contact::transition(current, *p)?,
                        None => vec![
                            FieldUpdate::ContactPreference(None),
                            FieldUpdate::PrimaryEmail(String::new()),
                            FieldUpdate::PrimaryPhone(String::new()),
                        ],
                    };
                    updates.into_iter().skip(1).map(|u| (u, false)).collect()
                }
            }
            FieldUpdate::UseSameLodge(true) => {
                let primary = self
                    .primary()
                    .filter(|p| p.id != current.id)
                    .ok_or(RegistrationError::SameLodgeNotAvailable)?;
                lodge_copy(primary).into_iter().map(|u| (u, false)).collect()
            }
            FieldUpdate::UseSameLodge(false) if current.use_same_lodge => vec![
                (FieldUpdate::GrandLodgeId(None), false),
                (FieldUpdate::LodgeId(None), false),
                (FieldUpdate::LodgeNameNumber(String::new()), false),
            ],
            _ => Vec::new(),
        };

        // A hand-picked lodge means the attendee no longer mirrors the primary.
        if is_lodge_field(update.field()) && current.use_same_lodge && !current.is_primary {
            follow_ups.push((FieldUpdate::UseSameLodge(false), false));
        }

        Ok(follow_ups)
    }

    /// Copy the primary's lodge onto every attendee that uses the same lodge.
    fn sync_same_lodge(&mut self) {
        let Some(primary) = self.primary().cloned() else {
            return;
        };

        let copy = lodge_copy(&primary);
        let mut synced = Vec::new();
        for attendee in self.registration.attendees.iter_mut() {
            if attendee.is_primary || !attendee.use_same_lodge {
                continue;
            }
            if primary.is_mason() {
                for update in &copy {
                    attendee.apply(update);
                }
            } else {
                attendee.use_same_lodge = false;
                attendee.grand_lodge_id = None;
                attendee.lodge_id = None;
                attendee.lodge_name_number.clear();
            }
            synced.push(attendee.id.clone());
        }

        for id in synced {
            self.touch(&id);
        }
    }

    // ===== Persistence Support =====

    /// Records changed or removed since the last call.
    pub fn take_changes(&mut self) -> ChangeSet {
        let dirty = std::mem::take(&mut self.dirty);
        ChangeSet {
            upserts: self
                .registration
                .attendees
                .iter()
                .filter(|a| dirty.contains(&a.id))
                .cloned()
                .collect(),
            deletes: std::mem::take(&mut self.removed),
        }
    }

    /// Changes not yet taken, plus any handed back with `requeue`.
    pub fn pending_sync(&self) -> PendingSync {
        PendingSync {
            upserts: self.dirty.iter().cloned().collect(),
            deletes: self.removed.clone(),
        }
    }

    /// Mark records as unsynced again after a failed or interrupted push.
    /// Upserts for attendees removed since are dropped; their delete is queued instead.
    pub fn requeue(&mut self, pending: &PendingSync) {
        for id in &pending.upserts {
            if self.get(id).is_some() {
                self.dirty.insert(id.clone());
            }
        }
        for id in &pending.deletes {
            if self.get(id).is_none() && !self.removed.contains(id) {
                self.removed.push(id.clone());
            }
        }
        debug!(
            upserts = pending.upserts.len(),
            deletes = pending.deletes.len(),
            "Requeued unsynced records"
        );
    }

    /// Restore per-attendee edit times saved with a draft.
    pub fn restore_edit_times(&mut self, times: HashMap<AttendeeId, DateTime<Utc>>) {
        for (id, at) in times {
            if self.get(&id).is_some() {
                self.updated_at.insert(id, at);
            }
        }
    }

    /// Fill empty fields from stored copies of the same attendees.
    ///
    /// Populated fields are never overwritten. A stored copy older than the
    /// local edit is skipped, so a field cleared locally stays cleared.
    /// Returns the number of fields filled.
    pub fn hydrate_from(&mut self, stored: &[StampedAttendee]) -> usize {
        let mut filled = 0;
        let mut touched = Vec::new();

        for attendee in self.registration.attendees.iter_mut() {
            let Some(saved) = stored.iter().find(|s| s.attendee.id == attendee.id) else {
                continue;
            };
            if let (Some(local), Some(remote)) = (self.updated_at.get(&attendee.id), saved.updated_at) {
                if *local >= remote {
                    debug!(attendee = %attendee.id, "Local copy is newer, not hydrating");
                    continue;
                }
            }
            let count = hydrate_missing(attendee, &saved.attendee);
            if contact::has_stale_contact(attendee) {
                attendee.primary_email.clear();
                attendee.primary_phone.clear();
            }
            if count > 0 {
                filled += count;
                touched.push(attendee.id.clone());
            }
        }

        for id in touched {
            self.touch(&id);
        }
        filled
    }

    /// Restore the primary, partner and contact invariants on loaded data.
    fn repair(&mut self) {
        let ids: BTreeSet<AttendeeId> = self
            .registration
            .attendees
            .iter()
            .map(|a| a.id.clone())
            .collect();

        let mut seen_primary = false;
        for attendee in self.registration.attendees.iter_mut() {
            if let Some(partner) = &attendee.partner {
                if !ids.contains(partner) {
                    warn!(attendee = %attendee.id, "Dropping link to missing partner");
                    attendee.partner = None;
                }
            }
            if let Some(parent) = &attendee.is_partner {
                if !ids.contains(parent) {
                    warn!(attendee = %attendee.id, "Partner record without parent, detaching");
                    attendee.is_partner = None;
                }
            }
            if attendee.is_partner.is_some() {
                attendee.is_primary = false;
            }
            if attendee.is_primary {
                if seen_primary {
                    warn!(attendee = %attendee.id, "Second primary attendee, demoting");
                    attendee.is_primary = false;
                } else {
                    seen_primary = true;
                }
            }
            if contact::has_stale_contact(attendee) {
                attendee.primary_email.clear();
                attendee.primary_phone.clear();
            }
        }

        // Forward links must agree with back-references.
        let back_refs: Vec<(AttendeeId, AttendeeId)> = self
            .registration
            .attendees
            .iter()
            .filter_map(|a| a.is_partner.clone().map(|parent| (parent, a.id.clone())))
            .collect();
        for (parent, child) in back_refs {
            if let Ok(parent) = self.attendee_mut(&parent) {
                parent.partner = Some(child);
            }
        }
        let children: BTreeSet<AttendeeId> = self
            .registration
            .attendees
            .iter()
            .filter_map(|a| a.is_partner.as_ref().map(|_| a.id.clone()))
            .collect();
        for attendee in self.registration.attendees.iter_mut() {
            if attendee.partner.as_ref().is_some_and(|p| !children.contains(p)) {
                attendee.partner = None;
            }
        }

        self.regroup_partners();

        if !seen_primary && !self.registration.attendees.is_empty() {
            self.promote_primary();
        }
    }

    /// Place every partner directly after its parent.
    fn regroup_partners(&mut self) {
        let (partners, mut rest): (Vec<Attendee>, Vec<Attendee>) = self
            .registration
            .attendees
            .drain(..)
            .partition(|a| a.is_partner_record());

        for partner in partners {
            let parent = rest
                .iter()
                .position(|a| Some(&a.id) == partner.is_partner.as_ref());
            match parent {
                Some(index) => rest.insert(index + 1, partner),
                None => rest.push(partner),
            }
        }
        self.registration.attendees = rest;
    }
}

fn is_lodge_field(field: Field) -> bool {
    matches!(field, Field::GrandLodgeId | Field::LodgeId | Field::LodgeNameNumber)
}

fn with_rules(updates: Vec<FieldUpdate>) -> Vec<(FieldUpdate, bool)> {
    updates.into_iter().map(|u| (u, true)).collect()
}

fn lodge_copy(primary: &Attendee) -> Vec<FieldUpdate> {
    vec![
        FieldUpdate::GrandLodgeId(primary.grand_lodge_id.clone()),
        FieldUpdate::LodgeId(primary.lodge_id.clone()),
        FieldUpdate::LodgeNameNumber(primary.lodge_name_number.clone()),
    ]
}

fn normalize(update: FieldUpdate) -> FieldUpdate {
    match update {
        FieldUpdate::FirstName(v) => FieldUpdate::FirstName(normalize_name(&v)),
        FieldUpdate::LastName(v) => FieldUpdate::LastName(normalize_name(&v)),
        FieldUpdate::Suffix(v) => FieldUpdate::Suffix(normalize_name(&v)),
        FieldUpdate::PrimaryEmail(v) => FieldUpdate::PrimaryEmail(normalize_email(&v)),
        FieldUpdate::PrimaryPhone(v) => FieldUpdate::PrimaryPhone(normalize_phone(&v)),
        FieldUpdate::Title(v) => FieldUpdate::Title(v.trim().to_string()),
        FieldUpdate::Relationship(v) => FieldUpdate::Relationship(normalize_name(&v)),
        other => other,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactPreference, GrandOfficerStatus, Rank};

    fn store() -> RegistrationStore {
        RegistrationStore::new(RegistrationType::Individuals, StoreOptions::default())
    }

    fn stamped(attendee: Attendee, updated_at: Option<DateTime<Utc>>) -> StampedAttendee {
        StampedAttendee { attendee, updated_at }
    }

    fn set(store: &mut RegistrationStore, id: &AttendeeId, update: FieldUpdate) -> UpdateOutcome {
        store.update(id, update, Instant::now()).unwrap()
    }

    fn primary_with_lodge(store: &mut RegistrationStore) -> AttendeeId {
        let id = store.add_mason().unwrap();
        set(store, &id, FieldUpdate::GrandLodgeId(Some("GL1".into())));
        set(store, &id, FieldUpdate::LodgeId(Some("L5".into())));
        set(store, &id, FieldUpdate::LodgeNameNumber("Lodge Harmony No. 5".into()));
        id
    }

    #[test]
    fn test_first_attendee_is_primary() {
        let mut store = store();
        let a = store.add_mason().unwrap();
        let b = store.add_guest().unwrap();
        assert!(store.get(&a).unwrap().is_primary);
        assert!(!store.get(&b).unwrap().is_primary);
        assert_eq!(store.attendees().iter().filter(|a| a.is_primary).count(), 1);
    }

    #[test]
    fn test_unrecognized_kind_is_rejected() {
        let mut store = store();
        let err = store.add(AttendeeKind::Unrecognized("steward".into())).unwrap_err();
        assert_eq!(err, RegistrationError::UnrecognizedKind("steward".into()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_title_change_updates_rank() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        assert_eq!(store.get(&id).unwrap().rank, Some(Rank::MasterMason));

        let outcome = set(&mut store, &id, FieldUpdate::Title("MW Bro".into()));
        assert_eq!(
            outcome.applied,
            vec![
                FieldUpdate::Title("MW Bro".into()),
                FieldUpdate::Rank(Some(Rank::GrandLodge)),
            ]
        );
        assert_eq!(store.get(&id).unwrap().rank, Some(Rank::GrandLodge));
        assert_eq!(store.get(&id).unwrap().title, "MW Bro");
    }

    #[test]
    fn test_rank_change_cascades_to_title() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        set(&mut store, &id, FieldUpdate::Rank(Some(Rank::GrandLodge)));
        assert_eq!(store.get(&id).unwrap().title, "W Bro");

        set(&mut store, &id, FieldUpdate::GrandOfficerStatus(Some(GrandOfficerStatus::Present)));
        set(&mut store, &id, FieldUpdate::PresentGrandOfficerRole("Grand Master".into()));
        set(&mut store, &id, FieldUpdate::Rank(Some(Rank::InstalledMaster)));

        let attendee = store.get(&id).unwrap();
        assert_eq!(attendee.grand_officer_status, None);
        assert_eq!(attendee.present_grand_officer_role, "");
        assert_eq!(attendee.title, "W Bro");
    }

    #[test]
    fn test_provide_later_clears_contact_immediately() {
        let mut store = store();
        store.add_mason().unwrap();
        let guest = store.add_guest().unwrap();

        set(&mut store, &guest, FieldUpdate::ContactPreference(Some(ContactPreference::Directly)));
        set(&mut store, &guest, FieldUpdate::PrimaryEmail("a@b.com".into()));
        assert_eq!(store.get(&guest).unwrap().primary_email, "a@b.com");

        set(&mut store, &guest, FieldUpdate::ContactPreference(Some(ContactPreference::ProvideLater)));
        let attendee = store.get(&guest).unwrap();
        assert_eq!(attendee.primary_email, "");
        assert_eq!(attendee.primary_phone, "");
    }

    #[test]
    fn test_pending_contact_write_cannot_resurrect_after_clear() {
        let mut store = store();
        store.add_mason().unwrap();
        let guest = store.add_guest().unwrap();
        let t0 = Instant::now();

        store
            .update(&guest, FieldUpdate::ContactPreference(Some(ContactPreference::Directly)), t0)
            .unwrap();
        store.update(&guest, FieldUpdate::PrimaryEmail("a".into()), t0).unwrap();
        let held = store
            .update(&guest, FieldUpdate::PrimaryEmail("a@b.com".into()), t0 + Duration::from_millis(50))
            .unwrap();
        assert!(held.held);

        store
            .update(
                &guest,
                FieldUpdate::ContactPreference(Some(ContactPreference::PrimaryAttendee)),
                t0 + Duration::from_millis(100),
            )
            .unwrap();
        assert_eq!(store.flush_due(t0 + Duration::from_secs(5)), 0);
        assert_eq!(store.flush_all(), 0);
        assert_eq!(store.get(&guest).unwrap().primary_email, "");
    }

    #[test]
    fn test_contact_write_ignored_when_deferred() {
        let mut store = store();
        store.add_mason().unwrap();
        let guest = store.add_guest().unwrap();
        set(&mut store, &guest, FieldUpdate::ContactPreference(Some(ContactPreference::PrimaryAttendee)));

        let outcome = set(&mut store, &guest, FieldUpdate::PrimaryEmail("x@y.com".into()));
        assert!(outcome.applied.is_empty());
        assert_eq!(store.get(&guest).unwrap().primary_email, "");
    }

    #[test]
    fn test_primary_rejects_contact_preference() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        let err = store
            .update(&id, FieldUpdate::ContactPreference(Some(ContactPreference::ProvideLater)), Instant::now())
            .unwrap_err();
        assert_eq!(err, RegistrationError::PrimaryContactPreference);
    }

    #[test]
    fn test_use_same_lodge_copies_immediately() {
        let mut store = store();
        primary_with_lodge(&mut store);
        let mason = store.add_mason().unwrap();

        let outcome = set(&mut store, &mason, FieldUpdate::UseSameLodge(true));
        assert!(!outcome.held);
        let attendee = store.get(&mason).unwrap();
        assert_eq!(attendee.grand_lodge_id.as_deref(), Some("GL1"));
        assert_eq!(attendee.lodge_id.as_deref(), Some("L5"));
        assert_eq!(attendee.lodge_name_number, "Lodge Harmony No. 5");

        set(&mut store, &mason, FieldUpdate::UseSameLodge(false));
        let attendee = store.get(&mason).unwrap();
        assert_eq!(attendee.grand_lodge_id, None);
        assert_eq!(attendee.lodge_id, None);
        assert_eq!(attendee.lodge_name_number, "");
    }

    #[test]
    fn test_use_same_lodge_requires_primary_lodge() {
        let mut store = store();
        store.add_mason().unwrap();
        let mason = store.add_mason().unwrap();
        let err = store
            .update(&mason, FieldUpdate::UseSameLodge(true), Instant::now())
            .unwrap_err();
        assert_eq!(err, RegistrationError::SameLodgeNotAvailable);
    }

    #[test]
    fn test_primary_lodge_change_resyncs() {
        let mut store = store();
        let primary = primary_with_lodge(&mut store);
        let mason = store.add_mason().unwrap();
        set(&mut store, &mason, FieldUpdate::UseSameLodge(true));

        set(&mut store, &primary, FieldUpdate::LodgeId(Some("L9".into())));
        assert_eq!(store.get(&mason).unwrap().lodge_id.as_deref(), Some("L9"));

        set(&mut store, &primary, FieldUpdate::GrandLodgeId(Some("GL2".into())));
        let attendee = store.get(&mason).unwrap();
        assert_eq!(attendee.grand_lodge_id.as_deref(), Some("GL2"));
        assert_eq!(attendee.lodge_id, None);
    }

    #[test]
    fn test_copy_on_check_without_live_sync() {
        let options = StoreOptions {
            live_lodge_sync: false,
            ..StoreOptions::default()
        };
        let mut store = RegistrationStore::new(RegistrationType::Lodge, options);
        let primary = primary_with_lodge(&mut store);
        let mason = store.add_mason().unwrap();
        set(&mut store, &mason, FieldUpdate::UseSameLodge(true));
        set(&mut store, &primary, FieldUpdate::LodgeId(Some("L9".into())));
        assert_eq!(store.get(&mason).unwrap().lodge_id.as_deref(), Some("L5"));
    }

    #[test]
    fn test_manual_lodge_edit_unchecks_same_lodge() {
        let mut store = store();
        primary_with_lodge(&mut store);
        let mason = store.add_mason().unwrap();
        set(&mut store, &mason, FieldUpdate::UseSameLodge(true));
        set(&mut store, &mason, FieldUpdate::LodgeId(Some("L7".into())));

        let attendee = store.get(&mason).unwrap();
        assert!(!attendee.use_same_lodge);
        assert_eq!(attendee.lodge_id.as_deref(), Some("L7"));
        assert_eq!(attendee.grand_lodge_id.as_deref(), Some("GL1"));
    }

    #[test]
    fn test_free_text_is_debounced_then_flushed() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        let t0 = Instant::now();

        store.update(&id, FieldUpdate::FirstName("J".into()), t0).unwrap();
        let outcome = store
            .update(&id, FieldUpdate::FirstName("John".into()), t0 + Duration::from_millis(100))
            .unwrap();
        assert!(outcome.held);
        assert_eq!(store.get(&id).unwrap().first_name, "J");
        assert!(store.has_pending_writes());

        assert_eq!(store.flush_due(t0 + Duration::from_millis(400)), 1);
        assert_eq!(store.get(&id).unwrap().first_name, "John");
    }

    #[test]
    fn test_names_are_normalized() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        set(&mut store, &id, FieldUpdate::LastName("  van   der Berg ".into()));
        assert_eq!(store.get(&id).unwrap().last_name, "van der Berg");
    }

    #[test]
    fn test_remove_primary_with_partner_removes_both() {
        let mut store = store();
        let primary = store.add_mason().unwrap();
        store.insert_partner(&primary).unwrap();
        let guest = store.add_guest().unwrap();
        assert_eq!(store.len(), 3);

        let removed = store.remove(&primary).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(store.len(), 1);

        let next = store.get(&guest).unwrap();
        assert!(next.is_primary);
        assert_eq!(next.contact_preference, None);
    }

    #[test]
    fn test_remove_partner_unlinks_parent() {
        let mut store = store();
        let primary = store.add_mason().unwrap();
        let partner = store.insert_partner(&primary).unwrap();

        store.remove(&partner).unwrap();
        assert_eq!(store.get(&primary).unwrap().partner, None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reorder_keeps_partner_attached_and_primary_first() {
        let mut store = store();
        let primary = store.add_mason().unwrap();
        let a = store.add_mason().unwrap();
        let partner = store.insert_partner(&a).unwrap();
        let b = store.add_guest().unwrap();

        assert!(!store.move_up(&a).unwrap());
        assert!(store.move_down(&a).unwrap());

        let order: Vec<&AttendeeId> = store.attendees().iter().map(|a| &a.id).collect();
        assert_eq!(order, vec![&primary, &b, &a, &partner]);

        assert!(!store.move_down(&partner).unwrap());
        assert!(store.move_up(&partner).unwrap());
        let order: Vec<&AttendeeId> = store.attendees().iter().map(|a| &a.id).collect();
        assert_eq!(order, vec![&primary, &a, &partner, &b]);
    }

    #[test]
    fn test_take_changes_reports_upserts_and_deletes() {
        let mut store = store();
        let a = store.add_mason().unwrap();
        let b = store.add_guest().unwrap();
        let first = store.take_changes();
        assert_eq!(first.upserts.len(), 2);
        assert!(first.deletes.is_empty());

        store.remove(&b).unwrap();
        set(&mut store, &a, FieldUpdate::FirstName("John".into()));
        let second = store.take_changes();
        assert_eq!(second.upserts.len(), 1);
        assert_eq!(second.deletes, vec![b]);
        assert!(store.take_changes().is_empty());
    }

    #[test]
    fn test_repair_on_load() {
        let mut registration = Registration::new(RegistrationType::Individuals);
        let mut a = Attendee::mason();
        a.is_primary = true;
        let mut b = Attendee::guest();
        b.is_primary = true;
        b.primary_email = "stale@example.com".to_string();
        let mut orphan = Attendee::partner_of(&AttendeeId::from("missing"));
        orphan.first_name = "Orphan".to_string();
        registration.attendees = vec![a.clone(), b.clone(), orphan.clone()];

        let store = RegistrationStore::from_registration(registration, StoreOptions::default());
        assert!(store.get(&a.id).unwrap().is_primary);
        let b = store.get(&b.id).unwrap();
        assert!(!b.is_primary);
        assert_eq!(b.primary_email, "");
        assert_eq!(store.get(&orphan.id).unwrap().is_partner, None);
    }

    #[test]
    fn test_hydrate_fills_only_missing_fields() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        set(&mut store, &id, FieldUpdate::FirstName("John".into()));

        let mut saved = store.get(&id).unwrap().clone();
        saved.first_name = "Jonathan".to_string();
        saved.last_name = "Smith".to_string();
        saved.dietary_requirements = "Vegetarian".to_string();

        let filled = store.hydrate_from(&[stamped(saved, None)]);
        assert_eq!(filled, 2);
        let attendee = store.get(&id).unwrap();
        assert_eq!(attendee.first_name, "John");
        assert_eq!(attendee.last_name, "Smith");
        assert_eq!(attendee.dietary_requirements, "Vegetarian");
    }

    #[test]
    fn test_hydrate_skips_copies_older_than_local_edit() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        set(&mut store, &id, FieldUpdate::FirstName("John".into()));

        let mut saved = store.get(&id).unwrap().clone();
        saved.dietary_requirements = "Vegetarian".to_string();

        let older = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(store.hydrate_from(&[stamped(saved.clone(), Some(older))]), 0);
        assert_eq!(store.get(&id).unwrap().dietary_requirements, "");

        let newer = Utc::now() + chrono::Duration::minutes(1);
        assert_eq!(store.hydrate_from(&[stamped(saved, Some(newer))]), 1);
        assert_eq!(store.get(&id).unwrap().dietary_requirements, "Vegetarian");
    }

    #[test]
    fn test_hydrate_does_not_restore_cleared_grand_office() {
        let mut store = store();
        let id = store.add_mason().unwrap();
        set(&mut store, &id, FieldUpdate::Rank(Some(Rank::GrandLodge)));
        set(&mut store, &id, FieldUpdate::GrandOfficerStatus(Some(GrandOfficerStatus::Present)));
        set(&mut store, &id, FieldUpdate::PresentGrandOfficerRole("Grand Master".into()));
        let saved = store.get(&id).unwrap().clone();

        set(&mut store, &id, FieldUpdate::Rank(Some(Rank::InstalledMaster)));
        store.hydrate_from(&[stamped(saved, None)]);

        let attendee = store.get(&id).unwrap();
        assert_eq!(attendee.rank, Some(Rank::InstalledMaster));
        assert_eq!(attendee.grand_officer_status, None);
        assert_eq!(attendee.present_grand_officer_role, "");
    }

    #[test]
    fn test_hydrate_does_not_restore_unchecked_same_lodge() {
        let mut store = store();
        primary_with_lodge(&mut store);
        let mason = store.add_mason().unwrap();
        set(&mut store, &mason, FieldUpdate::UseSameLodge(true));
        let saved = store.get(&mason).unwrap().clone();

        set(&mut store, &mason, FieldUpdate::UseSameLodge(false));
        assert_eq!(store.hydrate_from(&[stamped(saved, None)]), 0);

        let attendee = store.get(&mason).unwrap();
        assert_eq!(attendee.grand_lodge_id, None);
        assert_eq!(attendee.lodge_id, None);
        assert_eq!(attendee.lodge_name_number, "");
    }

    #[test]
    fn test_hydrate_does_not_give_primary_a_contact_preference() {
        let mut store = store();
        let primary = store.add_mason().unwrap();
        let guest = store.add_guest().unwrap();
        set(&mut store, &guest, FieldUpdate::ContactPreference(Some(ContactPreference::ProvideLater)));
        let saved = store.get(&guest).unwrap().clone();

        store.remove(&primary).unwrap();
        assert!(store.get(&guest).unwrap().is_primary);
        store.hydrate_from(&[stamped(saved, None)]);
        assert_eq!(store.get(&guest).unwrap().contact_preference, None);
    }

    #[test]
    fn test_restored_edit_times_guard_hydration() {
        let mut registration = Registration::new(RegistrationType::Individuals);
        let mut attendee = Attendee::mason();
        attendee.is_primary = true;
        let id = attendee.id.clone();
        registration.attendees = vec![attendee.clone()];

        let edited = Utc::now();
        let mut store = RegistrationStore::from_registration(registration, StoreOptions::default());
        store.restore_edit_times(HashMap::from([
            (id.clone(), edited),
            (AttendeeId::from("gone"), edited),
        ]));
        assert_eq!(store.updated_at(&id), Some(edited));
        assert_eq!(store.updated_at(&AttendeeId::from("gone")), None);

        attendee.special_needs = "Wheelchair access".to_string();
        let stale = edited - chrono::Duration::minutes(5);
        assert_eq!(store.hydrate_from(&[stamped(attendee, Some(stale))]), 0);
    }

    #[test]
    fn test_promotion_without_live_sync_keeps_copied_lodge() {
        let options = StoreOptions {
            live_lodge_sync: false,
            ..StoreOptions::default()
        };
        let mut store = RegistrationStore::new(RegistrationType::Lodge, options);
        let primary = primary_with_lodge(&mut store);
        let next = store.add_mason().unwrap();
        set(&mut store, &next, FieldUpdate::GrandLodgeId(Some("GL1".into())));
        set(&mut store, &next, FieldUpdate::LodgeId(Some("L9".into())));
        let follower = store.add_mason().unwrap();
        set(&mut store, &follower, FieldUpdate::UseSameLodge(true));

        store.remove(&primary).unwrap();
        assert!(store.get(&next).unwrap().is_primary);
        let attendee = store.get(&follower).unwrap();
        assert_eq!(attendee.lodge_id.as_deref(), Some("L5"));
        assert!(attendee.use_same_lodge);
    }

    #[test]
    fn test_guest_primary_clears_same_lodge_followers() {
        let mut store = store();
        let primary = primary_with_lodge(&mut store);
        store.add_guest().unwrap();
        let follower = store.add_mason().unwrap();
        set(&mut store, &follower, FieldUpdate::UseSameLodge(true));

        store.remove(&primary).unwrap();
        let attendee = store.get(&follower).unwrap();
        assert!(!attendee.use_same_lodge);
        assert_eq!(attendee.grand_lodge_id, None);
        assert_eq!(attendee.lodge_id, None);
        assert_eq!(attendee.lodge_name_number, "");
    }

    #[test]
    fn test_loaded_partner_is_moved_after_parent() {
        let mut primary = Attendee::mason();
        primary.is_primary = true;
        let mut parent = Attendee::mason();
        let partner = Attendee::partner_of(&parent.id);
        parent.partner = Some(partner.id.clone());
        let other = Attendee::guest();

        let mut registration = Registration::new(RegistrationType::Individuals);
        registration.attendees = vec![primary.clone(), partner.clone(), parent.clone(), other.clone()];
        let mut store = RegistrationStore::from_registration(registration, StoreOptions::default());

        let order = |store: &RegistrationStore| -> Vec<AttendeeId> {
            store.attendees().iter().map(|a| a.id.clone()).collect()
        };
        assert_eq!(order(&store), vec![primary.id.clone(), parent.id.clone(), partner.id.clone(), other.id.clone()]);

        assert!(store.move_down(&parent.id).unwrap());
        assert_eq!(order(&store), vec![primary.id.clone(), other.id.clone(), parent.id.clone(), partner.id.clone()]);
        assert!(store.move_up(&parent.id).unwrap());
        assert_eq!(order(&store), vec![primary.id, parent.id, partner.id, other.id]);
    }

    #[test]
    fn test_requeue_returns_records_to_next_change_set() {
        let mut store = store();
        let a = store.add_mason().unwrap();
        let b = store.add_guest().unwrap();
        store.take_changes();
        store.remove(&b).unwrap();

        let in_flight = store.take_changes();
        assert_eq!(in_flight.deletes, vec![b.clone()]);
        assert!(store.pending_sync().is_empty());

        store.requeue(&PendingSync {
            upserts: vec![a.clone(), b.clone()],
            deletes: vec![b.clone()],
        });
        assert_eq!(
            store.pending_sync(),
            PendingSync {
                upserts: vec![a.clone()],
                deletes: vec![b.clone()],
            }
        );

        let retry = store.take_changes();
        assert_eq!(retry.upserts.len(), 1);
        assert_eq!(retry.upserts[0].id, a);
        assert_eq!(retry.deletes, vec![b]);
    }
}
