//! Application state management for lodgeform.
//!
//! `App` owns the registration form, the draft cache, the optional backend
//! client and all UI state. Network work runs in spawned tasks that report
//! back through an mpsc channel drained once per frame.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use lodgeform_core::api::{ApiError, BackendClient, LodgeSearchCache, SearchOutcome, SyncReport};
use lodgeform_core::auth::{resolve_api_key, ENV_SUPABASE_KEY};
use lodgeform_core::cache::{CacheManager, RegistrationDraft, StampedAttendee};
use lodgeform_core::config::Config;
use lodgeform_core::form::{RegistrationForm, StepBlocked, SubmissionState, WizardStep};
use lodgeform_core::models::{
    Attendee, AttendeeId, AttendeeKind, ContactPreference, DelegationMode, Field, FieldUpdate,
    GrandLodge, GrandOfficerStatus, Lodge, RegistrationType, SubmissionResponse, TicketPackage,
};
use lodgeform_core::partner::RELATIONSHIPS;
use lodgeform_core::rules::{self, GRAND_OFFICER_ROLES, GUEST_TITLES, MASON_TITLES};
use lodgeform_core::store::{PendingSync, RegistrationStore};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length for a single text field while editing.
const MAX_INPUT_LENGTH: usize = 100;

/// Dirty drafts are written to disk (and synced) at most this often.
const AUTOSAVE_INTERVAL: Duration = Duration::from_secs(2);

/// Upper bound for the tickets-only counter.
pub const MAX_TICKETS: u32 = 200;

// ============================================================================
// UI State Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Editing,
    PickingLodge,
    ShowingHelp,
    ConfirmingQuit,
    ConfirmingModeSwitch,
    Quitting,
}

/// Attendee list or the selected attendee's card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Card,
}

/// How a card field is edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldInput {
    Text,
    Choice,
    Toggle,
    LodgeSearch,
}

pub fn field_input(field: Field) -> FieldInput {
    match field {
        Field::Title
        | Field::Rank
        | Field::GrandOfficerStatus
        | Field::PresentGrandOfficerRole
        | Field::GrandLodgeId
        | Field::ContactPreference
        | Field::Relationship => FieldInput::Choice,
        Field::UseSameLodge => FieldInput::Toggle,
        Field::LodgeId => FieldInput::LodgeSearch,
        Field::FirstName
        | Field::LastName
        | Field::Suffix
        | Field::OtherGrandOfficerRole
        | Field::LodgeNameNumber
        | Field::PrimaryEmail
        | Field::PrimaryPhone
        | Field::DietaryRequirements
        | Field::SpecialNeeds => FieldInput::Text,
    }
}

// ============================================================================
// Background Task Results
// ============================================================================

enum BackgroundResult {
    GrandLodges(Vec<GrandLodge>),
    Packages(Vec<TicketPackage>),
    /// Attendee rows stored on the server for the restored draft.
    Hydrated(Vec<StampedAttendee>),
    LodgeSearch { query: String, outcome: SearchOutcome },
    LodgeSearchFailed(String),
    Synced(SyncReport),
    Submitted(Result<SubmissionResponse, String>),
    Error(String),
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    config_path: PathBuf,
    pub cache: CacheManager,
    pub client: Option<BackendClient>,
    search: LodgeSearchCache,
    pub form: RegistrationForm,

    // UI state
    pub state: AppState,
    pub focus: Focus,
    pub type_selection: usize,
    pub attendee_selection: usize,
    pub field_selection: usize,
    pub edit_buffer: String,

    // Lookups
    pub grand_lodges: Vec<GrandLodge>,
    pub packages: Vec<TicketPackage>,
    pub package_selection: usize,

    // Lodge picker
    pub lodge_query: String,
    pub lodge_results: Vec<Lodge>,
    pub lodge_selection: usize,
    /// Set when lodge search fails; the picker stays disabled until restart.
    pub lodge_search_error: Option<String>,
    search_due: Option<Instant>,

    // Persistence
    draft_dirty: bool,
    last_autosave: Instant,
    pub last_saved: Option<Instant>,
    /// Changes handed to the running sync, requeued if it fails or we exit first.
    sync_in_flight: Option<PendingSync>,

    // Background task channel
    bg_rx: Option<mpsc::Receiver<BackgroundResult>>,
    bg_tx: mpsc::Sender<BackgroundResult>,

    pub status_message: Option<String>,
}

impl App {
    /// Create the application from the user's config, cache and keychain.
    pub fn new() -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");
        let cache = CacheManager::new(cache_dir)?;

        let client = Self::build_client(&config);
        Ok(Self::with_parts(config, Config::config_path()?, cache, client))
    }

    fn build_client(config: &Config) -> Option<BackendClient> {
        let url = config.supabase_url.as_deref()?;
        let Some(key) = resolve_api_key(std::env::var(ENV_SUPABASE_KEY).ok()) else {
            warn!("No API key available, running offline");
            return None;
        };
        match BackendClient::new(url, &key) {
            Ok(client) => Some(client.with_payment_url(config.payment_url())),
            Err(e) => {
                warn!(error = %e, "Failed to create backend client");
                None
            }
        }
    }

    /// Assemble the app from already-loaded parts, restoring a saved draft if one exists.
    pub fn with_parts(
        config: Config,
        config_path: PathBuf,
        cache: CacheManager,
        client: Option<BackendClient>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let mut status_message = None;
        let restored = match cache.load_draft() {
            Ok(Some(draft)) => {
                info!(
                    registration = %draft.data.registration_id,
                    age = %draft.age_display(),
                    "Restoring draft"
                );
                status_message = Some(format!("Restored draft from {}", draft.age_display()));
                Some(draft.data)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to load draft");
                None
            }
        };

        let (form, draft_dirty) = match restored {
            Some(draft) => {
                let form = Self::restore_form(&config, draft);
                let unsynced = !form.store().pending_sync().is_empty();
                (form, unsynced)
            }
            None => {
                let registration_type = config
                    .last_registration_type
                    .unwrap_or(RegistrationType::Individuals);
                let mut form = Self::new_form(&config, registration_type);
                form.back();
                (form, false)
            }
        };

        let type_selection = RegistrationType::ALL
            .iter()
            .position(|t| *t == form.registration_type())
            .unwrap_or(0);

        Self {
            config,
            config_path,
            cache,
            client,
            search: LodgeSearchCache::new(),
            form,

            state: AppState::Normal,
            focus: Focus::List,
            type_selection,
            attendee_selection: 0,
            field_selection: 0,
            edit_buffer: String::new(),

            grand_lodges: Vec::new(),
            packages: Vec::new(),
            package_selection: 0,

            lodge_query: String::new(),
            lodge_results: Vec::new(),
            lodge_selection: 0,
            lodge_search_error: None,
            search_due: None,

            draft_dirty,
            last_autosave: Instant::now(),
            last_saved: None,
            sync_in_flight: None,

            bg_rx: Some(rx),
            bg_tx: tx,

            status_message,
        }
    }

    fn new_form(config: &Config, registration_type: RegistrationType) -> RegistrationForm {
        RegistrationForm::new(
            registration_type,
            config.limits.for_type(registration_type),
            config.store_options(),
        )
        .with_event_id(config.event_id.clone())
    }

    fn restore_form(config: &Config, draft: RegistrationDraft) -> RegistrationForm {
        let limits = config.limits.for_type(draft.registration_type);
        let edit_times = draft.edit_times();
        let unsynced = draft.pending_sync.clone();

        let mut store = RegistrationStore::from_registration(draft.into_registration(), config.store_options());
        store.restore_edit_times(edit_times);
        store.requeue(&unsynced);
        RegistrationForm::from_store(store, limits).with_event_id(config.event_id.clone())
    }

    pub fn is_online(&self) -> bool {
        self.client.is_some()
    }

    // =========================================================================
    // Startup Loads
    // =========================================================================

    /// Load lookups from cache and refresh anything missing or stale in the background.
    pub fn load_lookups(&mut self) {
        let mut need_grand_lodges = true;
        match self.cache.load_grand_lodges() {
            Ok(Some(cached)) => {
                need_grand_lodges = cached.is_stale();
                self.grand_lodges = cached.data;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load cached grand lodges"),
        }

        let mut need_packages = true;
        match self.cache.load_packages() {
            Ok(Some(cached)) => {
                need_packages = cached.is_stale();
                self.packages = cached.data;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load cached packages"),
        }

        let Some(client) = self.client.clone() else {
            return;
        };
        let tx = self.bg_tx.clone();

        if need_grand_lodges {
            let client = client.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                let result = match client.fetch_grand_lodges().await {
                    Ok(list) => BackgroundResult::GrandLodges(list),
                    Err(e) => BackgroundResult::Error(describe_error(&e)),
                };
                Self::send_result(&tx, result).await;
            });
        }

        if let (true, Some(event_id)) = (need_packages, self.config.event_id.clone()) {
            tokio::spawn(async move {
                let result = match client.fetch_packages(&event_id).await {
                    Ok(list) => BackgroundResult::Packages(list),
                    Err(e) => BackgroundResult::Error(describe_error(&e)),
                };
                Self::send_result(&tx, result).await;
            });
        }
    }

    /// Fill fields the local draft is missing from the rows stored on the server.
    pub fn hydrate_from_backend(&mut self) {
        if self.form.step() == WizardStep::RegistrationType {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        let registration_id = self.form.store().registration_id().to_string();
        let tx = self.bg_tx.clone();

        tokio::spawn(async move {
            let result = match client.fetch_attendees(&registration_id).await {
                Ok(rows) => BackgroundResult::Hydrated(rows),
                Err(e) => BackgroundResult::Error(describe_error(&e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    async fn send_result(tx: &mpsc::Sender<BackgroundResult>, result: BackgroundResult) {
        if let Err(e) = tx.send(result).await {
            error!(error = %e, "Failed to send background result - channel closed");
        }
    }

    // =========================================================================
    // Background Results
    // =========================================================================

    /// Drain finished background work.
    pub fn check_background_tasks(&mut self) {
        let results: Vec<BackgroundResult> = {
            if let Some(ref mut rx) = self.bg_rx {
                let mut results = Vec::new();
                while let Ok(result) = rx.try_recv() {
                    results.push(result);
                }
                results
            } else {
                Vec::new()
            }
        };

        for result in results {
            self.process_background_result(result);
        }
    }

    fn process_background_result(&mut self, result: BackgroundResult) {
        match result {
            BackgroundResult::GrandLodges(list) => {
                if let Err(e) = self.cache.save_grand_lodges(&list) {
                    warn!(error = %e, "Failed to cache grand lodges");
                }
                self.grand_lodges = list;
            }
            BackgroundResult::Packages(list) => {
                if let Err(e) = self.cache.save_packages(&list) {
                    warn!(error = %e, "Failed to cache packages");
                }
                self.packages = list;
                self.package_selection = self.package_selection.min(self.packages.len().saturating_sub(1));
            }
            BackgroundResult::Hydrated(rows) => {
                let filled = self.form.store_mut().hydrate_from(&rows);
                if filled > 0 {
                    self.draft_dirty = true;
                    self.status_message = Some(format!("Filled {} field(s) from the server", filled));
                }
            }
            BackgroundResult::LodgeSearch { query, outcome } => {
                if query != self.lodge_query {
                    return;
                }
                match outcome {
                    SearchOutcome::Cached(lodges) | SearchOutcome::Fetched(lodges) => {
                        self.lodge_results = lodges;
                        self.lodge_selection = 0;
                    }
                    SearchOutcome::TooShort => self.lodge_results.clear(),
                    SearchOutcome::Skipped => {}
                }
            }
            BackgroundResult::LodgeSearchFailed(message) => {
                self.lodge_results.clear();
                self.status_message = Some(format!("Lodge search unavailable: {}", message));
                self.lodge_search_error = Some(message);
                if self.state == AppState::PickingLodge {
                    self.state = AppState::Normal;
                }
            }
            BackgroundResult::Synced(report) => {
                self.sync_in_flight = None;
                if !report.is_clean() {
                    warn!(failures = ?report.failures, "Attendee sync incomplete");
                    // Retried with the next autosave.
                    self.form.store_mut().requeue(&report.failed);
                    self.draft_dirty = true;
                    self.status_message = Some(format!(
                        "Saved locally; {} server update(s) failed",
                        report.failures.len()
                    ));
                }
            }
            BackgroundResult::Submitted(result) => {
                self.form.record_submission_result(result);
                self.after_submission();
            }
            BackgroundResult::Error(message) => {
                self.status_message = Some(message);
            }
        }
    }

    fn after_submission(&mut self) {
        match self.form.submission() {
            SubmissionState::Confirmed(response) => {
                self.status_message = Some(format!(
                    "Registration confirmed: {}",
                    response.confirmation_number
                ));
                if let Err(e) = self.cache.clear_draft() {
                    warn!(error = %e, "Failed to clear draft");
                }
                self.draft_dirty = false;
                self.config.active_registration_id = None;
                self.save_config();
            }
            SubmissionState::Failed(message) => {
                self.status_message = Some(format!("Payment failed: {} - press Enter to retry", message));
            }
            SubmissionState::Idle | SubmissionState::Submitting => {}
        }
    }

    // =========================================================================
    // Periodic Work
    // =========================================================================

    /// Called once per frame: flush held writes, fire due searches, autosave.
    pub fn tick(&mut self, now: Instant) {
        if self.form.flush_due(now) > 0 {
            self.draft_dirty = true;
        }

        if self.search_due.is_some_and(|due| due <= now) {
            self.search_due = None;
            self.spawn_lodge_search();
        }

        if self.draft_dirty && now.duration_since(self.last_autosave) >= AUTOSAVE_INTERVAL {
            self.last_autosave = now;
            self.save_draft();
            self.sync_background();
        }
    }

    pub fn save_draft(&mut self) {
        if self.form.step() == WizardStep::Confirmation {
            return;
        }
        let draft = RegistrationDraft::from_store(self.form.store());
        match self.cache.save_draft(&draft) {
            Ok(()) => {
                self.draft_dirty = false;
                self.last_saved = Some(Instant::now());
            }
            Err(e) => {
                warn!(error = %e, "Failed to save draft");
                self.status_message = Some("Could not save draft".to_string());
            }
        }
    }

    /// Push attendee changes to the backend. One sync runs at a time; changes
    /// made meanwhile wait in the store for the next call.
    fn sync_background(&mut self) {
        if self.sync_in_flight.is_some() {
            return;
        }
        let Some(client) = self.client.clone() else {
            return;
        };
        let changes = self.form.store_mut().take_changes();
        if changes.is_empty() {
            return;
        }

        self.sync_in_flight = Some(changes.ids());
        let registration_id = self.form.store().registration_id().to_string();
        let tx = self.bg_tx.clone();
        tokio::spawn(async move {
            let report = client.sync_changes(&registration_id, &changes).await;
            Self::send_result(&tx, BackgroundResult::Synced(report)).await;
        });
    }

    fn save_config(&self) {
        if let Err(e) = self.config.save_to(&self.config_path) {
            warn!(error = %e, "Failed to save config");
        }
    }

    /// Commit held writes and persist everything before exit. Changes the
    /// backend has not confirmed stay in the draft for the next start.
    pub fn shutdown(&mut self) {
        self.form.store_mut().flush_all();
        if let Some(unconfirmed) = self.sync_in_flight.take() {
            self.form.store_mut().requeue(&unconfirmed);
        }
        self.save_draft();
        self.save_config();
        info!("State saved");
    }

    // =========================================================================
    // Registration Type
    // =========================================================================

    pub fn select_type(&mut self, forward: bool) {
        let len = RegistrationType::ALL.len();
        self.type_selection = if forward {
            (self.type_selection + 1) % len
        } else {
            (self.type_selection + len - 1) % len
        };
    }

    /// Start (or continue) the registration type under the cursor.
    pub fn choose_registration_type(&mut self) {
        let chosen = RegistrationType::ALL[self.type_selection.min(RegistrationType::ALL.len() - 1)];
        if chosen != self.form.registration_type() {
            info!(registration_type = %chosen, "Starting new registration");
            self.form = Self::new_form(&self.config, chosen);
            self.form.back();
        }
        if let Err(blocked) = self.form.advance() {
            self.status_message = Some(blocked.to_string());
            return;
        }

        self.config.last_registration_type = Some(chosen);
        self.config.active_registration_id = Some(self.form.store().registration_id().to_string());
        self.save_config();
        self.reset_selection();
        self.draft_dirty = true;
    }

    /// Throw away a confirmed registration and start over.
    pub fn start_new_registration(&mut self) {
        let registration_type = self.form.registration_type();
        self.form = Self::new_form(&self.config, registration_type);
        self.form.back();
        self.reset_selection();
        self.status_message = None;
    }

    fn reset_selection(&mut self) {
        self.focus = Focus::List;
        self.attendee_selection = 0;
        self.field_selection = 0;
    }

    // =========================================================================
    // Attendee List
    // =========================================================================

    pub fn selected_attendee(&self) -> Option<&Attendee> {
        self.form.store().attendees().get(self.attendee_selection)
    }

    fn selected_id(&self) -> Option<AttendeeId> {
        self.selected_attendee().map(|a| a.id.clone())
    }

    fn select_attendee(&mut self, id: &AttendeeId) {
        if let Some(index) = self.form.store().attendees().iter().position(|a| &a.id == id) {
            self.attendee_selection = index;
            self.field_selection = 0;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.form.store().len();
        self.attendee_selection = self.attendee_selection.min(len.saturating_sub(1));
        let fields = self.card_fields().len();
        self.field_selection = self.field_selection.min(fields.saturating_sub(1));
    }

    pub fn move_selection(&mut self, down: bool) {
        let len = self.form.store().len();
        if len == 0 {
            return;
        }
        self.attendee_selection = if down {
            (self.attendee_selection + 1).min(len - 1)
        } else {
            self.attendee_selection.saturating_sub(1)
        };
        self.field_selection = 0;
    }

    pub fn add_attendee(&mut self, kind: AttendeeKind) {
        match self.form.add_attendee(kind) {
            Ok(id) => {
                self.select_attendee(&id);
                self.draft_dirty = true;
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn remove_selected(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.form.remove_attendee(&id) {
            Ok(()) => {
                self.clamp_selection();
                self.focus = Focus::List;
                self.draft_dirty = true;
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn toggle_partner(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        match self.form.toggle_partner(&id) {
            Ok(_) => {
                self.clamp_selection();
                self.draft_dirty = true;
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn reorder_selected(&mut self, up: bool) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let moved = if up { self.form.move_up(&id) } else { self.form.move_down(&id) };
        match moved {
            Ok(true) => {
                self.select_attendee(&id);
                self.draft_dirty = true;
            }
            Ok(false) => {}
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn toggle_expanded(&mut self) {
        if let Some(id) = self.selected_id() {
            self.form.toggle_expanded(&id);
        }
    }

    pub fn open_card(&mut self) {
        if let Some(id) = self.selected_id() {
            if !self.form.is_expanded(&id) {
                self.form.toggle_expanded(&id);
            }
            self.focus = Focus::Card;
            self.field_selection = 0;
        }
    }

    // =========================================================================
    // Delegation Mode
    // =========================================================================

    pub fn request_mode_switch(&mut self) {
        if !self.form.registration_type().supports_tickets_only() {
            self.status_message = Some(format!(
                "{} registrations always name each attendee",
                self.form.registration_type()
            ));
            return;
        }
        self.state = AppState::ConfirmingModeSwitch;
    }

    pub fn confirm_mode_switch(&mut self) {
        let mode = if self.form.is_tickets_only() {
            DelegationMode::NamedDelegates
        } else {
            DelegationMode::TicketsOnly { ticket_count: 1 }
        };
        match self.form.set_delegation_mode(mode) {
            Ok(_) => {
                self.reset_selection();
                self.draft_dirty = true;
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
        self.state = AppState::Normal;
    }

    pub fn adjust_ticket_count(&mut self, increase: bool) {
        let DelegationMode::TicketsOnly { ticket_count } = self.form.delegation_mode() else {
            return;
        };
        let count = if increase {
            (ticket_count + 1).min(MAX_TICKETS)
        } else {
            ticket_count.saturating_sub(1).max(1)
        };
        match self.form.set_ticket_count(count) {
            Ok(()) => self.draft_dirty = true,
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    // =========================================================================
    // Attendee Card
    // =========================================================================

    /// Fields shown on the selected attendee's card.
    pub fn card_fields(&self) -> Vec<Field> {
        match self.selected_attendee() {
            Some(attendee) => card_fields(
                attendee,
                self.form.store().primary(),
                self.form.registration_type(),
            ),
            None => Vec::new(),
        }
    }

    pub fn selected_field(&self) -> Option<Field> {
        self.card_fields().get(self.field_selection).copied()
    }

    pub fn move_field_selection(&mut self, down: bool) {
        let len = self.card_fields().len();
        if len == 0 {
            return;
        }
        self.field_selection = if down {
            (self.field_selection + 1).min(len - 1)
        } else {
            self.field_selection.saturating_sub(1)
        };
    }

    fn apply_update(&mut self, id: &AttendeeId, update: FieldUpdate) {
        match self.form.update(id, update, Instant::now()) {
            Ok(_) => {
                self.draft_dirty = true;
                self.clamp_selection();
            }
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    /// Enter on a card field: edit text, cycle a choice, flip a toggle or open the lodge picker.
    pub fn activate_field(&mut self) {
        let (Some(attendee), Some(field)) = (self.selected_attendee(), self.selected_field()) else {
            return;
        };
        match field_input(field) {
            FieldInput::Text => {
                self.edit_buffer = text_value(attendee, field);
                self.state = AppState::Editing;
            }
            FieldInput::Choice => self.cycle_field(true),
            FieldInput::Toggle => {
                let id = attendee.id.clone();
                let next = !attendee.use_same_lodge;
                self.apply_update(&id, FieldUpdate::UseSameLodge(next));
            }
            FieldInput::LodgeSearch => self.open_lodge_picker(),
        }
    }

    /// Step a choice field to its next or previous option.
    pub fn cycle_field(&mut self, forward: bool) {
        let Some(field) = self.selected_field() else {
            return;
        };
        if field == Field::GrandLodgeId && self.grand_lodges.is_empty() {
            self.status_message = Some("Grand lodges have not been loaded".to_string());
            return;
        }
        let Some(attendee) = self.selected_attendee() else {
            return;
        };
        let id = attendee.id.clone();

        if field == Field::Relationship {
            let next = cycle(&RELATIONSHIPS, Some(&attendee.relationship.as_str()), forward)
                .map(str::to_string);
            if let Some(relationship) = next {
                match self.form.update_partner_relationship(&id, &relationship) {
                    Ok(_) => self.draft_dirty = true,
                    Err(e) => self.status_message = Some(e.to_string()),
                }
            }
            return;
        }

        let flow = self.form.registration_type();
        if let Some(update) = next_choice(attendee, field, flow, &self.grand_lodges, forward) {
            self.apply_update(&id, update);
        }
    }

    pub fn push_edit_char(&mut self, c: char) {
        if can_add_char(self.edit_buffer.chars().count(), c) {
            self.edit_buffer.push(c);
            self.write_edit_buffer();
        }
    }

    pub fn pop_edit_char(&mut self) {
        if self.edit_buffer.pop().is_some() {
            self.write_edit_buffer();
        }
    }

    /// Each keystroke goes through the store; the commit policy decides when it lands.
    fn write_edit_buffer(&mut self) {
        let (Some(id), Some(field)) = (self.selected_id(), self.selected_field()) else {
            return;
        };
        if let Some(update) = text_update(field, self.edit_buffer.clone()) {
            self.apply_update(&id, update);
        }
    }

    pub fn finish_editing(&mut self) {
        self.state = AppState::Normal;
        self.edit_buffer.clear();
    }

    pub fn apply_first_warning_fix(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        let Some(warning) = self.form.warnings(&id).into_iter().next() else {
            return;
        };
        match self.form.apply_warning_fix(&id, warning.kind, Instant::now()) {
            Ok(true) => self.draft_dirty = true,
            Ok(false) => {}
            Err(e) => self.status_message = Some(e.to_string()),
        }
    }

    pub fn dismiss_first_warning(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if let Some(warning) = self.form.warnings(&id).into_iter().next() {
            self.form.dismiss_warning(&id, warning.kind);
        }
    }

    /// Name shown for the attendee's grand lodge.
    pub fn grand_lodge_name(&self, id: Option<&str>) -> Option<String> {
        let id = id?;
        Some(
            self.grand_lodges
                .iter()
                .find(|gl| gl.id == id)
                .map(|gl| gl.short_name().to_string())
                .unwrap_or_else(|| id.to_string()),
        )
    }

    // =========================================================================
    // Lodge Picker
    // =========================================================================

    pub fn open_lodge_picker(&mut self) {
        if let Some(message) = &self.lodge_search_error {
            self.status_message = Some(format!("Lodge search unavailable: {}", message));
            return;
        }
        if !self.is_online() {
            self.status_message = Some("Lodge search needs a server connection".to_string());
            return;
        }
        let Some(attendee) = self.selected_attendee() else {
            return;
        };
        if attendee.grand_lodge_id.is_none() {
            self.status_message = Some("Choose a grand lodge first".to_string());
            return;
        }

        self.lodge_query.clear();
        self.lodge_results.clear();
        self.lodge_selection = 0;
        self.search_due = None;
        self.state = AppState::PickingLodge;
    }

    pub fn push_lodge_query_char(&mut self, c: char) {
        if can_add_char(self.lodge_query.chars().count(), c) {
            self.lodge_query.push(c);
            self.search_due = Some(Instant::now() + self.config.search_debounce());
        }
    }

    pub fn pop_lodge_query_char(&mut self) {
        if self.lodge_query.pop().is_some() {
            self.search_due = Some(Instant::now() + self.config.search_debounce());
        }
    }

    pub fn move_lodge_selection(&mut self, down: bool) {
        let len = self.lodge_results.len();
        if len == 0 {
            return;
        }
        self.lodge_selection = if down {
            (self.lodge_selection + 1).min(len - 1)
        } else {
            self.lodge_selection.saturating_sub(1)
        };
    }

    fn spawn_lodge_search(&mut self) {
        let Some(client) = self.client.clone() else {
            return;
        };
        let grand_lodge_id = self.selected_attendee().and_then(|a| a.grand_lodge_id.clone());
        let query = self.lodge_query.clone();
        let search = self.search.clone();
        let tx = self.bg_tx.clone();

        tokio::spawn(async move {
            let result = match search.search(&client, grand_lodge_id.as_deref(), &query).await {
                Ok(outcome) => BackgroundResult::LodgeSearch { query, outcome },
                Err(e) => BackgroundResult::LodgeSearchFailed(describe_error(&e)),
            };
            Self::send_result(&tx, result).await;
        });
    }

    pub fn pick_lodge(&mut self) {
        let (Some(id), Some(lodge)) = (
            self.selected_id(),
            self.lodge_results.get(self.lodge_selection).cloned(),
        ) else {
            return;
        };
        self.apply_update(&id, FieldUpdate::LodgeId(Some(lodge.id.clone())));
        self.apply_update(&id, FieldUpdate::LodgeNameNumber(lodge.display_name()));
        self.close_lodge_picker();
    }

    pub fn close_lodge_picker(&mut self) {
        self.state = AppState::Normal;
        self.search_due = None;
        self.lodge_query.clear();
        self.lodge_results.clear();
    }

    // =========================================================================
    // Wizard
    // =========================================================================

    pub fn advance(&mut self) {
        if self.form.step() == WizardStep::RegistrationType {
            self.choose_registration_type();
            return;
        }

        match self.form.advance() {
            Ok(step) => {
                debug!(?step, "Advanced wizard");
                self.status_message = None;
                self.focus = Focus::List;
            }
            Err(StepBlocked::Invalid(report)) => {
                self.status_message = Some(StepBlocked::Invalid(report.clone()).to_string());
                if let Some(first) = report.errors.first() {
                    let id = first.attendee_id.clone();
                    self.select_attendee(&id);
                }
            }
            Err(blocked) => self.status_message = Some(blocked.to_string()),
        }
    }

    pub fn back(&mut self) {
        let before = self.form.step();
        let after = self.form.back();
        if before != after {
            self.status_message = None;
            if after == WizardStep::RegistrationType {
                self.type_selection = RegistrationType::ALL
                    .iter()
                    .position(|t| *t == self.form.registration_type())
                    .unwrap_or(0);
            }
        }
    }

    pub fn selected_package(&self) -> Option<&TicketPackage> {
        self.packages.get(self.package_selection)
    }

    pub fn cycle_package(&mut self, forward: bool) {
        let len = self.packages.len();
        if len == 0 {
            return;
        }
        self.package_selection = if forward {
            (self.package_selection + 1) % len
        } else {
            (self.package_selection + len - 1) % len
        };
    }

    /// Post the registration to the payment endpoint.
    pub fn submit(&mut self) {
        let package = self.selected_package().cloned();
        let payload = match self.form.begin_submission(package.as_ref()) {
            Ok(payload) => payload,
            Err(blocked) => {
                self.status_message = Some(blocked.to_string());
                return;
            }
        };

        let Some(client) = self.client.clone() else {
            self.form
                .record_submission_result(Err("Not connected to the registration server".to_string()));
            self.after_submission();
            return;
        };

        info!(
            registration = %payload.registration_id,
            tickets = payload.ticket_count,
            "Submitting registration"
        );
        self.status_message = Some("Submitting registration...".to_string());
        let tx = self.bg_tx.clone();
        tokio::spawn(async move {
            let result = client
                .submit_registration(&payload)
                .await
                .map_err(|e| describe_error(&e));
            Self::send_result(&tx, BackgroundResult::Submitted(result)).await;
        });
    }
}

// ============================================================================
// Card helpers
// ============================================================================

/// Card fields for an attendee, in display order. Unrecognized kinds get none
/// and render with a fallback card.
pub fn card_fields(attendee: &Attendee, primary: Option<&Attendee>, flow: RegistrationType) -> Vec<Field> {
    if !attendee.kind.is_recognized() {
        return Vec::new();
    }

    let mut fields = vec![Field::Title, Field::FirstName, Field::LastName];

    if attendee.is_partner_record() {
        fields.push(Field::Relationship);
    }

    if attendee.is_mason() && !attendee.is_partner_record() {
        fields.push(Field::Suffix);
        fields.push(Field::Rank);
        if rules::should_show_grand_officer_fields(attendee, flow) {
            fields.push(Field::GrandOfficerStatus);
            if attendee.grand_officer_status == Some(GrandOfficerStatus::Present) {
                fields.push(Field::PresentGrandOfficerRole);
                if attendee.present_grand_officer_role == rules::OTHER_GRAND_OFFICE {
                    fields.push(Field::OtherGrandOfficerRole);
                }
            }
        }
        if rules::should_show_use_same_lodge(attendee, primary) {
            fields.push(Field::UseSameLodge);
        }
        fields.push(Field::GrandLodgeId);
        fields.push(Field::LodgeId);
    }

    if !attendee.is_primary {
        fields.push(Field::ContactPreference);
    }
    if rules::should_show_contact_fields(attendee) {
        fields.push(Field::PrimaryEmail);
        fields.push(Field::PrimaryPhone);
    }

    fields.push(Field::DietaryRequirements);
    fields.push(Field::SpecialNeeds);
    fields
}

/// Current text of a free-text field.
pub fn text_value(attendee: &Attendee, field: Field) -> String {
    match attendee.value(field) {
        FieldUpdate::FirstName(v)
        | FieldUpdate::LastName(v)
        | FieldUpdate::Suffix(v)
        | FieldUpdate::OtherGrandOfficerRole(v)
        | FieldUpdate::LodgeNameNumber(v)
        | FieldUpdate::PrimaryEmail(v)
        | FieldUpdate::PrimaryPhone(v)
        | FieldUpdate::DietaryRequirements(v)
        | FieldUpdate::SpecialNeeds(v) => v,
        _ => String::new(),
    }
}

/// The write for a free-text field, or `None` for fields edited another way.
pub fn text_update(field: Field, value: String) -> Option<FieldUpdate> {
    let update = match field {
        Field::FirstName => FieldUpdate::FirstName(value),
        Field::LastName => FieldUpdate::LastName(value),
        Field::Suffix => FieldUpdate::Suffix(value),
        Field::OtherGrandOfficerRole => FieldUpdate::OtherGrandOfficerRole(value),
        Field::LodgeNameNumber => FieldUpdate::LodgeNameNumber(value),
        Field::PrimaryEmail => FieldUpdate::PrimaryEmail(value),
        Field::PrimaryPhone => FieldUpdate::PrimaryPhone(value),
        Field::DietaryRequirements => FieldUpdate::DietaryRequirements(value),
        Field::SpecialNeeds => FieldUpdate::SpecialNeeds(value),
        _ => return None,
    };
    Some(update)
}

/// Next (or previous) option after `current`, wrapping. No current value starts at either end.
pub fn cycle<T: PartialEq + Clone>(options: &[T], current: Option<&T>, forward: bool) -> Option<T> {
    if options.is_empty() {
        return None;
    }
    let len = options.len();
    let index = match current.and_then(|c| options.iter().position(|o| o == c)) {
        Some(i) if forward => (i + 1) % len,
        Some(i) => (i + len - 1) % len,
        None if forward => 0,
        None => len - 1,
    };
    Some(options[index].clone())
}

/// The write that steps a choice field. Relationship is handled by the partner manager.
pub fn next_choice(
    attendee: &Attendee,
    field: Field,
    flow: RegistrationType,
    grand_lodges: &[GrandLodge],
    forward: bool,
) -> Option<FieldUpdate> {
    match field {
        Field::Title => {
            let options: &[&str] = if attendee.is_mason() && !attendee.is_partner_record() {
                &MASON_TITLES
            } else {
                &GUEST_TITLES
            };
            cycle(options, Some(&attendee.title.as_str()), forward)
                .map(|t| FieldUpdate::Title(t.to_string()))
        }
        Field::Rank => cycle(&rules::rank_options(flow), attendee.rank.as_ref(), forward)
            .map(|r| FieldUpdate::Rank(Some(r))),
        Field::GrandOfficerStatus => cycle(
            &[GrandOfficerStatus::Present, GrandOfficerStatus::Past],
            attendee.grand_officer_status.as_ref(),
            forward,
        )
        .map(|s| FieldUpdate::GrandOfficerStatus(Some(s))),
        Field::PresentGrandOfficerRole => cycle(
            &GRAND_OFFICER_ROLES,
            Some(&attendee.present_grand_officer_role.as_str()),
            forward,
        )
        .map(|r| FieldUpdate::PresentGrandOfficerRole(r.to_string())),
        Field::GrandLodgeId => {
            let ids: Vec<&str> = grand_lodges.iter().map(|gl| gl.id.as_str()).collect();
            cycle(&ids, attendee.grand_lodge_id.as_deref().as_ref(), forward)
                .map(|id| FieldUpdate::GrandLodgeId(Some(id.to_string())))
        }
        Field::ContactPreference => cycle(
            &ContactPreference::ALL,
            attendee.contact_preference.as_ref(),
            forward,
        )
        .map(|p| FieldUpdate::ContactPreference(Some(p))),
        _ => None,
    }
}

/// Status-bar text for a background failure.
fn describe_error(e: &anyhow::Error) -> String {
    e.downcast_ref::<ApiError>()
        .map(ApiError::user_message)
        .unwrap_or_else(|| e.to_string())
}

// ============================================================================
// Input validation helpers
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

pub fn can_add_char(current_len: usize, c: char) -> bool {
    current_len < MAX_INPUT_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
