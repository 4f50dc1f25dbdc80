//! Per-field commit policy.
//!
//! Select-style and critical fields commit immediately. Free-text fields
//! commit on the leading edge of a debounce window: the first keystroke is
//! written at once, later keystrokes inside the window are held as a single
//! pending value, and the pending value is written when the window elapses.
//! Any immediate write or clear of the same field discards the pending value,
//! so a late debounced write can never overwrite it.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::models::{AttendeeId, Field, FieldUpdate};

/// Default debounce window for free-text fields.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPolicy {
    Immediate,
    Debounced(Duration),
}

/// Policy for a field given the configured debounce window.
pub fn policy_for(field: Field, window: Duration) -> CommitPolicy {
    match field {
        Field::FirstName
        | Field::LastName
        | Field::Suffix
        | Field::OtherGrandOfficerRole
        | Field::PrimaryEmail
        | Field::PrimaryPhone
        | Field::DietaryRequirements
        | Field::SpecialNeeds => CommitPolicy::Debounced(window),
        Field::Title
        | Field::Rank
        | Field::GrandOfficerStatus
        | Field::PresentGrandOfficerRole
        | Field::GrandLodgeId
        | Field::LodgeId
        | Field::LodgeNameNumber
        | Field::UseSameLodge
        | Field::ContactPreference
        | Field::Relationship => CommitPolicy::Immediate,
    }
}

/// Whether an offered write should be applied now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Commit,
    Hold,
}

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    pending: Option<FieldUpdate>,
}

/// Tracks open debounce windows per attendee field.
#[derive(Debug)]
pub struct CommitTracker {
    window: Duration,
    windows: BTreeMap<(AttendeeId, Field), Window>,
}

impl CommitTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            windows: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn policy(&self, field: Field) -> CommitPolicy {
        policy_for(field, self.window)
    }

    /// Offer a write made at `now`.
    pub fn offer(&mut self, id: &AttendeeId, update: FieldUpdate, now: Instant) -> Decision {
        let field = update.field();
        let window = match self.policy(field) {
            CommitPolicy::Immediate => {
                self.cancel(id, field);
                return Decision::Commit;
            }
            CommitPolicy::Debounced(window) => window,
        };

        let key = (id.clone(), field);
        match self.windows.get_mut(&key) {
            Some(open) if now.saturating_duration_since(open.opened_at) < window => {
                open.pending = Some(update);
                Decision::Hold
            }
            _ => {
                self.windows.insert(
                    key,
                    Window {
                        opened_at: now,
                        pending: None,
                    },
                );
                Decision::Commit
            }
        }
    }

    /// Drop any pending write for the field.
    pub fn cancel(&mut self, id: &AttendeeId, field: Field) {
        self.windows.remove(&(id.clone(), field));
    }

    pub fn cancel_attendee(&mut self, id: &AttendeeId) {
        self.windows.retain(|(attendee, _), _| attendee != id);
    }

    /// Close elapsed windows, returning their pending writes.
    pub fn due(&mut self, now: Instant) -> Vec<(AttendeeId, FieldUpdate)> {
        let window = self.window;
        let elapsed: Vec<(AttendeeId, Field)> = self
            .windows
            .iter()
            .filter(|(_, w)| now.saturating_duration_since(w.opened_at) >= window)
            .map(|(key, _)| key.clone())
            .collect();

        elapsed
            .into_iter()
            .filter_map(|key| {
                self.windows
                    .remove(&key)
                    .and_then(|w| w.pending)
                    .map(|update| (key.0, update))
            })
            .collect()
    }

    /// Close every window regardless of age, returning pending writes.
    pub fn drain(&mut self) -> Vec<(AttendeeId, FieldUpdate)> {
        std::mem::take(&mut self.windows)
            .into_iter()
            .filter_map(|((id, _), w)| w.pending.map(|update| (id, update)))
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        self.windows.values().any(|w| w.pending.is_some())
    }
}

impl Default for CommitTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_policy_split() {
        assert_eq!(policy_for(Field::Title, ms(300)), CommitPolicy::Immediate);
        assert_eq!(policy_for(Field::ContactPreference, ms(300)), CommitPolicy::Immediate);
        assert_eq!(policy_for(Field::LodgeId, ms(300)), CommitPolicy::Immediate);
        assert_eq!(policy_for(Field::FirstName, ms(300)), CommitPolicy::Debounced(ms(300)));
    }

    #[test]
    fn test_leading_edge_commits_then_holds() {
        let mut tracker = CommitTracker::new(ms(300));
        let id = AttendeeId::from("a");
        let t0 = Instant::now();

        assert_eq!(tracker.offer(&id, FieldUpdate::FirstName("J".into()), t0), Decision::Commit);
        assert_eq!(
            tracker.offer(&id, FieldUpdate::FirstName("Jo".into()), t0 + ms(100)),
            Decision::Hold
        );
        assert_eq!(
            tracker.offer(&id, FieldUpdate::FirstName("Joh".into()), t0 + ms(200)),
            Decision::Hold
        );
        assert!(tracker.has_pending());

        assert!(tracker.due(t0 + ms(250)).is_empty());
        let due = tracker.due(t0 + ms(300));
        assert_eq!(due, vec![(id.clone(), FieldUpdate::FirstName("Joh".into()))]);
        assert!(!tracker.has_pending());

        // Window closed: next keystroke is a fresh leading edge.
        assert_eq!(
            tracker.offer(&id, FieldUpdate::FirstName("John".into()), t0 + ms(400)),
            Decision::Commit
        );
    }

    #[test]
    fn test_immediate_write_discards_pending() {
        let mut tracker = CommitTracker::new(ms(300));
        let id = AttendeeId::from("a");
        let t0 = Instant::now();

        tracker.offer(&id, FieldUpdate::PrimaryEmail("a".into()), t0);
        tracker.offer(&id, FieldUpdate::PrimaryEmail("a@b.com".into()), t0 + ms(50));
        tracker.cancel(&id, Field::PrimaryEmail);

        assert!(tracker.due(t0 + ms(1000)).is_empty());
    }

    #[test]
    fn test_windows_are_per_field() {
        let mut tracker = CommitTracker::new(ms(300));
        let id = AttendeeId::from("a");
        let t0 = Instant::now();

        assert_eq!(tracker.offer(&id, FieldUpdate::FirstName("J".into()), t0), Decision::Commit);
        assert_eq!(tracker.offer(&id, FieldUpdate::LastName("S".into()), t0), Decision::Commit);
    }

    #[test]
    fn test_drain_and_cancel_attendee() {
        let mut tracker = CommitTracker::new(ms(300));
        let a = AttendeeId::from("a");
        let b = AttendeeId::from("b");
        let t0 = Instant::now();

        tracker.offer(&a, FieldUpdate::FirstName("J".into()), t0);
        tracker.offer(&a, FieldUpdate::FirstName("Jo".into()), t0 + ms(10));
        tracker.offer(&b, FieldUpdate::LastName("S".into()), t0);
        tracker.offer(&b, FieldUpdate::LastName("Sm".into()), t0 + ms(10));

        tracker.cancel_attendee(&b);
        assert_eq!(tracker.drain(), vec![(a, FieldUpdate::FirstName("Jo".into()))]);
        assert!(!tracker.has_pending());
    }
}
