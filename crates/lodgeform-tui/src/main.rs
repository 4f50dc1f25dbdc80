//! lodgeform - a terminal registration wizard for masonic events.
//!
//! Walks a booking contact through choosing a registration type, entering
//! attendee details, reviewing the order and paying.

mod app;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lodgeform_core::auth::CredentialStore;
use lodgeform_core::cache::CacheManager;
use lodgeform_core::config::Config;

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Initialize the tracing subscriber, writing to a daily log file.
///
/// The terminal belongs to the UI, so nothing is logged to stderr.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=lodgeform_core=debug).
fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log dir: {}", log_dir.display()))?;

    let appender = tracing_appender::rolling::daily(log_dir, "lodgeform.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    Ok(guard)
}

fn log_dir() -> PathBuf {
    Config::load()
        .ok()
        .and_then(|c| c.cache_dir().ok())
        .unwrap_or_else(|| PathBuf::from("./cache"))
        .join("logs")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if let Some(command) = args.get(1) {
        return match command.as_str() {
            "--set-key" => set_api_key(),
            "--forget-key" => forget_api_key(),
            "--dump-draft" => dump_draft(),
            "--help" | "-h" => {
                print_usage();
                Ok(())
            }
            other => {
                print_usage();
                bail!("Unknown argument: {}", other)
            }
        };
    }

    let _log_guard = init_tracing(&log_dir())?;
    info!(version = env!("CARGO_PKG_VERSION"), "lodgeform starting");

    // Create app before touching the terminal so config errors print normally
    let mut app = App::new()?;
    app.load_lookups();
    app.hydrate_from_backend();

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("lodgeform shutting down");
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: lodgeform [--set-key | --forget-key | --dump-draft]");
    eprintln!();
    eprintln!("  --set-key      Store the registration server API key in the OS keychain");
    eprintln!("  --forget-key   Remove the stored API key");
    eprintln!("  --dump-draft   Print the saved registration draft as JSON");
}

/// Prompt for the API key without echo and store it in the keychain.
fn set_api_key() -> Result<()> {
    let key = rpassword::prompt_password("API key: ").context("Failed to read API key")?;
    let key = key.trim();
    if key.is_empty() {
        bail!("No API key entered");
    }
    CredentialStore::store(key)?;
    eprintln!("API key saved to the system keychain");
    Ok(())
}

fn forget_api_key() -> Result<()> {
    CredentialStore::delete()?;
    eprintln!("API key removed");
    Ok(())
}

/// Dump the saved draft to stdout as JSON
fn dump_draft() -> Result<()> {
    let config = Config::load()?;
    let cache = CacheManager::new(config.cache_dir()?)?;
    match cache.load_draft()? {
        Some(draft) => println!("{}", serde_json::to_string_pretty(&draft)?),
        None => eprintln!("No saved draft"),
    }
    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit, keeping the draft
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    app.shutdown();
                    return Ok(());
                }

                // Handle input
                if handle_input(app, key)? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Debounced writes, lodge searches and autosave
        app.tick(Instant::now());

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
