//! Registration form orchestration.
//!
//! `RegistrationForm` drives one registration flow through the wizard. It
//! wraps the store with the flow's attendee limits, per-attendee expand
//! state, the validation gate, consistency warnings and the submission
//! lifecycle. Rendering lives in the terminal crate.

use std::collections::BTreeSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{
    AttendeeId, AttendeeKind, BookingContact, DelegationMode, FieldUpdate, RegistrationPayload,
    RegistrationType, SubmissionResponse, TicketPackage,
};
use crate::partner::{self, PartnerToggle};
use crate::rules::{self, ConsistencyWarning, WarningKind};
use crate::store::{RegistrationStore, StoreOptions, UpdateOutcome};
use crate::validation::{self, ValidationReport};
use crate::{RegistrationError, RegistrationResult};

// ============================================================================
// Limits
// ============================================================================

/// Bounds on the number of registrants (partners are not counted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowLimits {
    pub min: usize,
    pub max: usize,
}

impl FlowLimits {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, count: usize) -> bool {
        (self.min..=self.max).contains(&count)
    }
}

/// Per-flow limits, as stored in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub individuals: FlowLimits,
    pub lodge: FlowLimits,
    pub grand_lodge: FlowLimits,
    pub delegation: FlowLimits,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            individuals: FlowLimits::new(1, 10),
            lodge: FlowLimits::new(3, 20),
            grand_lodge: FlowLimits::new(1, 20),
            delegation: FlowLimits::new(1, 20),
        }
    }
}

impl LimitsConfig {
    pub fn for_type(&self, registration_type: RegistrationType) -> FlowLimits {
        match registration_type {
            RegistrationType::Individuals => self.individuals,
            RegistrationType::Lodge => self.lodge,
            RegistrationType::GrandLodge => self.grand_lodge,
            RegistrationType::Delegation => self.delegation,
        }
    }
}

// ============================================================================
// Wizard
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WizardStep {
    RegistrationType,
    AttendeeDetails,
    Review,
    Payment,
    Confirmation,
}

impl WizardStep {
    pub const ALL: [WizardStep; 5] = [
        WizardStep::RegistrationType,
        WizardStep::AttendeeDetails,
        WizardStep::Review,
        WizardStep::Payment,
        WizardStep::Confirmation,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            WizardStep::RegistrationType => "Registration Type",
            WizardStep::AttendeeDetails => "Attendee Details",
            WizardStep::Review => "Review",
            WizardStep::Payment => "Payment",
            WizardStep::Confirmation => "Confirmation",
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL.iter().position(|s| s == self).unwrap_or(0)
    }

    fn next(&self) -> Option<Self> {
        Self::ALL.get(self.index() + 1).copied()
    }

    fn prev(&self) -> Option<Self> {
        self.index().checked_sub(1).and_then(|i| Self::ALL.get(i).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
    Failed(String),
    Confirmed(SubmissionResponse),
}

/// Why the wizard could not move forward.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StepBlocked {
    #[error("{} problem(s) need fixing before you continue", .0.error_count())]
    Invalid(ValidationReport),

    #[error("Payment has not been confirmed yet")]
    AwaitingPayment,

    #[error("A submission is already in progress")]
    Submitting,

    #[error("Registration is complete")]
    Complete,

    #[error("No primary attendee to use as booking contact")]
    NoBookingContact,
}

// ============================================================================
// Form
// ============================================================================

#[derive(Debug)]
pub struct RegistrationForm {
    store: RegistrationStore,
    limits: FlowLimits,
    step: WizardStep,
    expanded: BTreeSet<AttendeeId>,
    dismissed: BTreeSet<(AttendeeId, WarningKind)>,
    report: Option<ValidationReport>,
    submission: SubmissionState,
    event_id: Option<String>,
}

impl RegistrationForm {
    /// Start a fresh registration with the flow's minimum attendees in place.
    pub fn new(registration_type: RegistrationType, limits: FlowLimits, options: StoreOptions) -> Self {
        Self::from_store(RegistrationStore::new(registration_type, options), limits)
    }

    /// Resume a registration, e.g. one restored from a draft.
    pub fn from_store(store: RegistrationStore, limits: FlowLimits) -> Self {
        let mut form = Self {
            store,
            limits,
            step: WizardStep::AttendeeDetails,
            expanded: BTreeSet::new(),
            dismissed: BTreeSet::new(),
            report: None,
            submission: SubmissionState::Idle,
            event_id: None,
        };
        form.ensure_minimum();
        if let Some(primary) = form.store.primary() {
            form.expanded.insert(primary.id.clone());
        }
        form
    }

    pub fn with_event_id(mut self, event_id: Option<String>) -> Self {
        self.event_id = event_id;
        self
    }

    // ===== Accessors =====

    pub fn store(&self) -> &RegistrationStore {
        &self.store
    }

    /// Mutable store access for persistence plumbing (change sets, hydration).
    pub fn store_mut(&mut self) -> &mut RegistrationStore {
        &mut self.store
    }

    pub fn registration_type(&self) -> RegistrationType {
        self.store.registration_type()
    }

    pub fn limits(&self) -> FlowLimits {
        self.limits
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn submission(&self) -> &SubmissionState {
        &self.submission
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        self.report.as_ref()
    }

    pub fn delegation_mode(&self) -> DelegationMode {
        self.store.delegation_mode()
    }

    pub fn is_tickets_only(&self) -> bool {
        self.store.delegation_mode().is_tickets_only()
    }

    // ===== Attendee Controls =====

    pub fn can_add(&self) -> bool {
        !self.is_tickets_only() && self.store.registrant_count() < self.limits.max
    }

    pub fn can_remove(&self, id: &AttendeeId) -> bool {
        match self.store.get(id) {
            Some(a) if a.is_partner_record() => true,
            Some(_) => !self.is_tickets_only() && self.store.registrant_count() > self.limits.min,
            None => false,
        }
    }

    pub fn add_attendee(&mut self, kind: AttendeeKind) -> RegistrationResult<AttendeeId> {
        if self.is_tickets_only() {
            return Err(RegistrationError::TicketsOnlyMode);
        }
        if self.store.registrant_count() >= self.limits.max {
            return Err(RegistrationError::LimitReached {
                max: self.limits.max,
            });
        }

        let id = self.store.add(kind)?;
        self.expanded.insert(id.clone());
        self.revalidate();
        Ok(id)
    }

    pub fn add_mason(&mut self) -> RegistrationResult<AttendeeId> {
        self.add_attendee(AttendeeKind::Mason)
    }

    pub fn add_guest(&mut self) -> RegistrationResult<AttendeeId> {
        self.add_attendee(AttendeeKind::Guest)
    }

    pub fn remove_attendee(&mut self, id: &AttendeeId) -> RegistrationResult<()> {
        let attendee = self
            .store
            .get(id)
            .ok_or_else(|| RegistrationError::NotFound(id.clone()))?;

        if !attendee.is_partner_record() && self.store.registrant_count() <= self.limits.min {
            return Err(RegistrationError::BelowMinimum {
                min: self.limits.min,
            });
        }

        for removed in self.store.remove(id)? {
            self.expanded.remove(&removed.id);
            self.dismissed.retain(|(attendee, _)| attendee != &removed.id);
        }
        self.revalidate();
        Ok(())
    }

    pub fn toggle_partner(&mut self, id: &AttendeeId) -> RegistrationResult<PartnerToggle> {
        let toggled = partner::toggle_partner(&mut self.store, id)?;
        match &toggled {
            PartnerToggle::Added(partner) => {
                self.expanded.insert(partner.clone());
            }
            PartnerToggle::Removed(partner) => {
                self.expanded.remove(partner);
            }
        }
        self.revalidate();
        Ok(toggled)
    }

    pub fn update_partner_relationship(
        &mut self,
        id: &AttendeeId,
        relationship: &str,
    ) -> RegistrationResult<bool> {
        let updated = partner::update_partner_relationship(&mut self.store, id, relationship)?;
        self.revalidate();
        Ok(updated)
    }

    pub fn move_up(&mut self, id: &AttendeeId) -> RegistrationResult<bool> {
        self.store.move_up(id)
    }

    pub fn move_down(&mut self, id: &AttendeeId) -> RegistrationResult<bool> {
        self.store.move_down(id)
    }

    /// Write a field through the store.
    pub fn update(
        &mut self,
        id: &AttendeeId,
        update: FieldUpdate,
        now: Instant,
    ) -> RegistrationResult<UpdateOutcome> {
        let outcome = self.store.update(id, update, now)?;
        if !outcome.applied.is_empty() {
            self.revalidate();
        }
        Ok(outcome)
    }

    pub fn flush_due(&mut self, now: Instant) -> usize {
        let flushed = self.store.flush_due(now);
        if flushed > 0 {
            self.revalidate();
        }
        flushed
    }

    // ===== Delegation Mode =====

    /// Switch between named delegates and tickets only. Changing mode clears
    /// every attendee record. Returns whether anything changed.
    pub fn set_delegation_mode(&mut self, mode: DelegationMode) -> RegistrationResult<bool> {
        if mode.is_tickets_only() && !self.registration_type().supports_tickets_only() {
            return Err(RegistrationError::TicketsOnlyMode);
        }

        let current = self.store.delegation_mode();
        if current == mode {
            return Ok(false);
        }

        let switching = current.is_tickets_only() != mode.is_tickets_only();
        self.store.set_delegation_mode(mode);

        if switching {
            info!(mode = ?mode, "Delegation mode changed, clearing attendees");
            self.store.clear();
            self.expanded.clear();
            self.dismissed.clear();
            self.report = None;
            self.ensure_minimum();
            if let Some(primary) = self.store.primary() {
                self.expanded.insert(primary.id.clone());
            }
        }
        Ok(true)
    }

    pub fn set_ticket_count(&mut self, ticket_count: u32) -> RegistrationResult<()> {
        if !self.is_tickets_only() {
            return Err(RegistrationError::TicketsOnlyMode);
        }
        self.store
            .set_delegation_mode(DelegationMode::TicketsOnly { ticket_count });
        self.revalidate();
        Ok(())
    }

    /// Add attendees until the flow's minimum is met. Tickets-only orders keep
    /// only the booking contact.
    pub fn ensure_minimum(&mut self) {
        let target = if self.is_tickets_only() { 1 } else { self.limits.min.max(1) };
        while self.store.registrant_count() < target {
            match self.store.add_mason() {
                Ok(id) => debug!(attendee = %id, "Added attendee to meet minimum"),
                Err(_) => break,
            }
        }
    }

    // ===== Expand State =====

    pub fn is_expanded(&self, id: &AttendeeId) -> bool {
        self.expanded.contains(id)
    }

    pub fn toggle_expanded(&mut self, id: &AttendeeId) {
        if !self.expanded.remove(id) {
            self.expanded.insert(id.clone());
        }
    }

    pub fn expand_all(&mut self) {
        self.expanded = self.store.attendees().iter().map(|a| a.id.clone()).collect();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    // ===== Validation & Warnings =====

    /// Flush pending writes and validate every attendee and the attendee count.
    pub fn validate_all_attendees(&mut self) -> ValidationReport {
        self.store.flush_all();
        let report = self.build_report();
        self.report = Some(report.clone());
        report
    }

    fn build_report(&self) -> ValidationReport {
        let mut report = validation::validate_all(self.store.attendees());
        report.count = match self.store.delegation_mode() {
            DelegationMode::TicketsOnly { ticket_count } if ticket_count == 0 => {
                Some(RegistrationError::BelowMinimum { min: 1 })
            }
            DelegationMode::TicketsOnly { .. } => None,
            DelegationMode::NamedDelegates => {
                let count = self.store.registrant_count();
                if count < self.limits.min {
                    Some(RegistrationError::BelowMinimum {
                        min: self.limits.min,
                    })
                } else if count > self.limits.max {
                    Some(RegistrationError::LimitReached {
                        max: self.limits.max,
                    })
                } else {
                    None
                }
            }
        };
        report
    }

    /// Refresh a report the user has already seen, so fixed errors disappear.
    fn revalidate(&mut self) {
        if self.report.is_some() {
            self.report = Some(self.build_report());
        }
    }

    /// Consistency warnings for an attendee that have not been dismissed.
    pub fn warnings(&self, id: &AttendeeId) -> Vec<ConsistencyWarning> {
        self.store
            .get(id)
            .map(rules::consistency_warnings)
            .unwrap_or_default()
            .into_iter()
            .filter(|w| !self.dismissed.contains(&(id.clone(), w.kind)))
            .collect()
    }

    pub fn dismiss_warning(&mut self, id: &AttendeeId, kind: WarningKind) {
        self.dismissed.insert((id.clone(), kind));
    }

    /// Apply a warning's suggested fix. Returns false if the warning no longer applies.
    pub fn apply_warning_fix(
        &mut self,
        id: &AttendeeId,
        kind: WarningKind,
        now: Instant,
    ) -> RegistrationResult<bool> {
        let Some(warning) = self.warnings(id).into_iter().find(|w| w.kind == kind) else {
            return Ok(false);
        };
        for update in warning.fix {
            self.update(id, update, now)?;
        }
        Ok(true)
    }

    // ===== Navigation =====

    /// Move to the next wizard step. Leaving attendee details requires a clean
    /// validation report; leaving payment requires a confirmed submission.
    pub fn advance(&mut self) -> Result<WizardStep, StepBlocked> {
        match self.step {
            WizardStep::AttendeeDetails | WizardStep::Review => {
                let report = self.validate_all_attendees();
                if !report.is_valid() {
                    return Err(StepBlocked::Invalid(report));
                }
            }
            WizardStep::Payment => {
                if !matches!(self.submission, SubmissionState::Confirmed(_)) {
                    return Err(StepBlocked::AwaitingPayment);
                }
            }
            WizardStep::Confirmation => return Err(StepBlocked::Complete),
            WizardStep::RegistrationType => {}
        }

        if let Some(next) = self.step.next() {
            self.step = next;
        }
        Ok(self.step)
    }

    /// Move back one step. Not possible once confirmed or while submitting.
    pub fn back(&mut self) -> WizardStep {
        let locked = self.step == WizardStep::Confirmation
            || self.submission == SubmissionState::Submitting;
        if !locked {
            if let Some(prev) = self.step.prev() {
                self.step = prev;
            }
        }
        self.step
    }

    // ===== Submission =====

    /// Tickets in the order: the ticket count in tickets-only mode, otherwise
    /// one per attendee including partners.
    pub fn ticket_count(&self) -> u32 {
        match self.store.delegation_mode() {
            DelegationMode::TicketsOnly { ticket_count } => ticket_count,
            DelegationMode::NamedDelegates => self.store.len() as u32,
        }
    }

    pub fn total_cents(&self, package: Option<&TicketPackage>) -> i64 {
        package.map_or(0, |p| p.total_for(self.ticket_count()))
    }

    pub fn build_payload(&self, package: Option<&TicketPackage>) -> Result<RegistrationPayload, StepBlocked> {
        let primary = self.store.primary().ok_or(StepBlocked::NoBookingContact)?;

        Ok(RegistrationPayload {
            registration_id: self.store.registration_id().to_string(),
            registration_type: self.registration_type(),
            event_id: self.event_id.clone(),
            package_id: package.map(|p| p.id.clone()),
            delegation_mode: self.store.delegation_mode(),
            ticket_count: self.ticket_count(),
            total_amount_cents: self.total_cents(package),
            booking_contact: BookingContact::from_attendee(primary),
            attendees: self.store.attendees().to_vec(),
        })
    }

    /// Validate and mark the form as submitting, returning the payload to post.
    pub fn begin_submission(
        &mut self,
        package: Option<&TicketPackage>,
    ) -> Result<RegistrationPayload, StepBlocked> {
        match self.submission {
            SubmissionState::Submitting => return Err(StepBlocked::Submitting),
            SubmissionState::Confirmed(_) => return Err(StepBlocked::Complete),
            SubmissionState::Idle | SubmissionState::Failed(_) => {}
        }

        let report = self.validate_all_attendees();
        if !report.is_valid() {
            return Err(StepBlocked::Invalid(report));
        }

        let payload = self.build_payload(package)?;
        self.submission = SubmissionState::Submitting;
        Ok(payload)
    }

    /// Record the payment endpoint's answer. Success moves to confirmation;
    /// failure keeps the form on the payment step for a retry.
    pub fn record_submission_result(&mut self, result: Result<SubmissionResponse, String>) {
        match result {
            Ok(response) => {
                info!(confirmation = %response.confirmation_number, "Registration confirmed");
                self.store
                    .set_confirmation_number(response.confirmation_number.clone());
                self.submission = SubmissionState::Confirmed(response);
                self.step = WizardStep::Confirmation;
            }
            Err(message) => {
                self.submission = SubmissionState::Failed(message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactPreference, Rank};

    fn form(registration_type: RegistrationType) -> RegistrationForm {
        let limits = LimitsConfig::default().for_type(registration_type);
        RegistrationForm::new(registration_type, limits, StoreOptions::default())
    }

    fn fill_primary(form: &mut RegistrationForm) -> AttendeeId {
        let id = form.store().primary().unwrap().id.clone();
        let now = Instant::now();
        for update in [
            FieldUpdate::FirstName("John".into()),
            FieldUpdate::LastName("Smith".into()),
            FieldUpdate::GrandLodgeId(Some("GL1".into())),
            FieldUpdate::LodgeId(Some("L5".into())),
            FieldUpdate::PrimaryEmail("john@example.com".into()),
            FieldUpdate::PrimaryPhone("0412 345 678".into()),
        ] {
            form.update(&id, update, now).unwrap();
        }
        id
    }

    #[test]
    fn test_new_form_meets_minimum() {
        assert_eq!(form(RegistrationType::Individuals).store().len(), 1);
        let lodge = form(RegistrationType::Lodge);
        assert_eq!(lodge.store().registrant_count(), 3);
        assert_eq!(lodge.step(), WizardStep::AttendeeDetails);
        assert!(lodge.store().attendees()[0].is_primary);
    }

    #[test]
    fn test_limits_enforced() {
        let mut form = RegistrationForm::new(
            RegistrationType::Individuals,
            FlowLimits::new(1, 2),
            StoreOptions::default(),
        );
        let primary = form.store().primary().unwrap().id.clone();
        assert!(!form.can_remove(&primary));
        assert_eq!(
            form.remove_attendee(&primary),
            Err(RegistrationError::BelowMinimum { min: 1 })
        );

        form.add_guest().unwrap();
        assert!(!form.can_add());
        assert_eq!(form.add_mason(), Err(RegistrationError::LimitReached { max: 2 }));

        // Partners do not count against the limit.
        assert!(matches!(form.toggle_partner(&primary), Ok(PartnerToggle::Added(_))));
        assert_eq!(form.store().len(), 3);
    }

    #[test]
    fn test_validation_blocks_advance() {
        let mut form = form(RegistrationType::Individuals);
        match form.advance() {
            Err(StepBlocked::Invalid(report)) => assert!(report.error_count() > 0),
            other => panic!("expected invalid, got {:?}", other),
        }
        assert_eq!(form.step(), WizardStep::AttendeeDetails);

        fill_primary(&mut form);
        assert_eq!(form.advance(), Ok(WizardStep::Review));
        assert_eq!(form.advance(), Ok(WizardStep::Payment));
        assert_eq!(form.advance(), Err(StepBlocked::AwaitingPayment));
    }

    #[test]
    fn test_validation_flushes_pending_writes() {
        let mut form = form(RegistrationType::Individuals);
        let id = fill_primary(&mut form);
        let t0 = Instant::now();
        form.update(&id, FieldUpdate::LastName("S".into()), t0 + std::time::Duration::from_secs(10))
            .unwrap();
        form.update(&id, FieldUpdate::LastName("Smythe".into()), t0 + std::time::Duration::from_secs(10))
            .unwrap();

        assert!(form.validate_all_attendees().is_valid());
        assert_eq!(form.store().get(&id).unwrap().last_name, "Smythe");
    }

    #[test]
    fn test_report_refreshes_after_fix() {
        let mut form = form(RegistrationType::Individuals);
        let report = form.validate_all_attendees();
        assert!(!report.is_valid());

        fill_primary(&mut form);
        assert!(form.report().unwrap().is_valid());
    }

    #[test]
    fn test_delegation_mode_switch_clears_records() {
        let mut form = form(RegistrationType::Delegation);
        let original = form.store().primary().unwrap().id.clone();
        form.add_guest().unwrap();

        assert!(form
            .set_delegation_mode(DelegationMode::TicketsOnly { ticket_count: 10 })
            .unwrap());
        assert_eq!(form.store().len(), 1);
        assert!(form.store().get(&original).is_none());
        assert_eq!(form.add_guest(), Err(RegistrationError::TicketsOnlyMode));
        assert_eq!(form.ticket_count(), 10);

        form.set_ticket_count(12).unwrap();
        assert_eq!(form.store().len(), 1);
        assert_eq!(form.ticket_count(), 12);

        assert!(form.set_delegation_mode(DelegationMode::NamedDelegates).unwrap());
        assert_eq!(form.store().len(), 1);
    }

    #[test]
    fn test_tickets_only_unavailable_for_individuals() {
        let mut form = form(RegistrationType::Individuals);
        assert_eq!(
            form.set_delegation_mode(DelegationMode::TicketsOnly { ticket_count: 2 }),
            Err(RegistrationError::TicketsOnlyMode)
        );
    }

    #[test]
    fn test_warning_fix_and_dismiss() {
        let mut form = form(RegistrationType::Individuals);
        let id = form.store().primary().unwrap().id.clone();

        // Set the rank back by hand so the title no longer matches.
        form.update(&id, FieldUpdate::Title("W Bro".into()), Instant::now()).unwrap();
        form.update(&id, FieldUpdate::Rank(Some(Rank::MasterMason)), Instant::now()).unwrap();
        let warnings = form.warnings(&id);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::WorshipfulTitleWithCraftRank);

        assert!(form
            .apply_warning_fix(&id, WarningKind::WorshipfulTitleWithCraftRank, Instant::now())
            .unwrap());
        assert_eq!(form.store().get(&id).unwrap().rank, Some(Rank::InstalledMaster));
        assert!(form.warnings(&id).is_empty());

        form.update(&id, FieldUpdate::Rank(Some(Rank::MasterMason)), Instant::now()).unwrap();
        form.dismiss_warning(&id, WarningKind::WorshipfulTitleWithCraftRank);
        assert!(form.warnings(&id).is_empty());
    }

    #[test]
    fn test_submission_lifecycle() {
        let mut form = form(RegistrationType::Individuals);
        fill_primary(&mut form);
        let guest = form.add_guest().unwrap();
        let now = Instant::now();
        form.update(&guest, FieldUpdate::Title("Mrs".into()), now).unwrap();
        form.update(&guest, FieldUpdate::FirstName("Jane".into()), now).unwrap();
        form.update(&guest, FieldUpdate::LastName("Smith".into()), now).unwrap();
        form.update(&guest, FieldUpdate::ContactPreference(Some(ContactPreference::PrimaryAttendee)), now)
            .unwrap();

        form.advance().unwrap();
        form.advance().unwrap();
        assert_eq!(form.step(), WizardStep::Payment);

        let package = TicketPackage {
            id: "pkg-1".to_string(),
            name: "Grand Banquet".to_string(),
            price_cents: 15000,
            description: None,
        };
        let payload = form.begin_submission(Some(&package)).unwrap();
        assert_eq!(payload.ticket_count, 2);
        assert_eq!(payload.total_amount_cents, 30000);
        assert_eq!(payload.booking_contact.email, "john@example.com");
        assert_eq!(payload.package_id.as_deref(), Some("pkg-1"));
        assert!(matches!(
            form.begin_submission(Some(&package)),
            Err(StepBlocked::Submitting)
        ));
        assert_eq!(form.back(), WizardStep::Payment);

        form.record_submission_result(Err("card declined".to_string()));
        assert_eq!(form.submission(), &SubmissionState::Failed("card declined".to_string()));
        assert!(form.begin_submission(Some(&package)).is_ok());

        form.record_submission_result(Ok(SubmissionResponse {
            registration_id: payload.registration_id.clone(),
            confirmation_number: "LF-1234".to_string(),
        }));
        assert_eq!(form.step(), WizardStep::Confirmation);
        assert_eq!(
            form.store().registration().confirmation_number.as_deref(),
            Some("LF-1234")
        );
        assert_eq!(form.advance(), Err(StepBlocked::Complete));
        assert_eq!(form.back(), WizardStep::Confirmation);
    }

    #[test]
    fn test_expand_state() {
        let mut form = form(RegistrationType::Individuals);
        let primary = form.store().primary().unwrap().id.clone();
        assert!(form.is_expanded(&primary));

        let guest = form.add_guest().unwrap();
        assert!(form.is_expanded(&guest));
        form.toggle_expanded(&guest);
        assert!(!form.is_expanded(&guest));

        form.collapse_all();
        assert!(!form.is_expanded(&primary));
        form.expand_all();
        assert!(form.is_expanded(&guest));
    }
}
