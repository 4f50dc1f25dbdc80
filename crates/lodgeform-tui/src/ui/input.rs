//! Keyboard input handling for the TUI.
//!
//! Overlays and text entry are handled first, then keys are routed to the
//! handler for the current wizard step.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use lodgeform_core::form::WizardStep;
use lodgeform_core::models::AttendeeKind;

use crate::app::{App, AppState, Focus};

/// Handle a key press. Returns `true` when the application should exit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            return Ok(false);
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.shutdown();
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::ConfirmingModeSwitch => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.confirm_mode_switch();
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            return Ok(false);
        }
        AppState::Editing => {
            handle_editing_input(app, key);
            return Ok(false);
        }
        AppState::PickingLodge => {
            handle_lodge_picker_input(app, key);
            return Ok(false);
        }
        AppState::Normal | AppState::Quitting => {}
    }

    // Global keys
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return Ok(false);
        }
        _ => {}
    }

    // Any other key clears a stale status message
    app.status_message = None;

    match app.form.step() {
        WizardStep::RegistrationType => handle_type_input(app, key),
        WizardStep::AttendeeDetails => match app.focus {
            Focus::List => handle_list_input(app, key),
            Focus::Card => handle_card_input(app, key),
        },
        WizardStep::Review => handle_review_input(app, key),
        WizardStep::Payment => handle_payment_input(app, key),
        WizardStep::Confirmation => handle_confirmation_input(app, key),
    }

    Ok(false)
}

fn handle_editing_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Enter | KeyCode::Esc => app.finish_editing(),
        KeyCode::Backspace => app.pop_edit_char(),
        KeyCode::Char(c) => app.push_edit_char(c),
        _ => {}
    }
}

fn handle_lodge_picker_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_lodge_picker(),
        KeyCode::Enter => app.pick_lodge(),
        KeyCode::Up => app.move_lodge_selection(false),
        KeyCode::Down => app.move_lodge_selection(true),
        KeyCode::Backspace => app.pop_lodge_query_char(),
        KeyCode::Char(c) => app.push_lodge_query_char(c),
        _ => {}
    }
}

fn handle_type_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.select_type(false),
        KeyCode::Down | KeyCode::Char('j') => app.select_type(true),
        KeyCode::Enter | KeyCode::Char('n') => app.advance(),
        _ => {}
    }
}

fn handle_list_input(app: &mut App, key: KeyEvent) {
    match key.code {
        // Navigation
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(true),
        KeyCode::Enter | KeyCode::Tab => app.open_card(),
        KeyCode::Char(' ') => app.toggle_expanded(),
        KeyCode::Char('e') => app.form.expand_all(),
        KeyCode::Char('c') => app.form.collapse_all(),

        // Attendees
        KeyCode::Char('m') => app.add_attendee(AttendeeKind::Mason),
        KeyCode::Char('g') => app.add_attendee(AttendeeKind::Guest),
        KeyCode::Char('d') | KeyCode::Delete => app.remove_selected(),
        KeyCode::Char('p') => app.toggle_partner(),
        KeyCode::Char('K') => app.reorder_selected(true),
        KeyCode::Char('J') => app.reorder_selected(false),

        // Tickets
        KeyCode::Char('t') => app.request_mode_switch(),
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_ticket_count(true),
        KeyCode::Char('-') => app.adjust_ticket_count(false),

        // Warnings
        KeyCode::Char('f') => app.apply_first_warning_fix(),
        KeyCode::Char('x') => app.dismiss_first_warning(),

        // Wizard
        KeyCode::Char('n') => app.advance(),
        KeyCode::Char('b') | KeyCode::Esc => app.back(),
        KeyCode::Char('s') => app.save_draft(),
        _ => {}
    }
}

fn handle_card_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => app.move_field_selection(false),
        KeyCode::Down | KeyCode::Char('j') => app.move_field_selection(true),
        KeyCode::Enter => app.activate_field(),
        KeyCode::Left | KeyCode::Char('h') => app.cycle_field(false),
        KeyCode::Right | KeyCode::Char('l') => app.cycle_field(true),
        KeyCode::Char('f') => app.apply_first_warning_fix(),
        KeyCode::Char('x') => app.dismiss_first_warning(),
        KeyCode::Esc | KeyCode::Tab | KeyCode::BackTab => app.focus = Focus::List,
        _ => {}
    }
}

fn handle_review_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') => app.cycle_package(false),
        KeyCode::Right | KeyCode::Char('l') => app.cycle_package(true),
        KeyCode::Enter | KeyCode::Char('n') => app.advance(),
        KeyCode::Char('b') | KeyCode::Esc => app.back(),
        _ => {}
    }
}

fn handle_payment_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Left | KeyCode::Char('h') => app.cycle_package(false),
        KeyCode::Right | KeyCode::Char('l') => app.cycle_package(true),
        KeyCode::Enter | KeyCode::Char('s') => app.submit(),
        KeyCode::Char('b') | KeyCode::Esc => app.back(),
        _ => {}
    }
}

fn handle_confirmation_input(app: &mut App, key: KeyEvent) {
    if let KeyCode::Char('n') | KeyCode::Char('r') = key.code {
        app.start_new_registration();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use lodgeform_core::cache::CacheManager;
    use lodgeform_core::config::Config;
    use tempfile::TempDir;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_in(dir: &TempDir) -> App {
        let cache = CacheManager::new(dir.path().join("cache")).unwrap();
        App::with_parts(Config::default(), dir.path().join("config.json"), cache, None)
    }

    #[test]
    fn test_quit_needs_confirmation() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);

        assert!(!handle_input(&mut app, key(KeyCode::Char('q'))).unwrap());
        assert_eq!(app.state, AppState::ConfirmingQuit);

        assert!(!handle_input(&mut app, key(KeyCode::Char('n'))).unwrap());
        assert_eq!(app.state, AppState::Normal);

        handle_input(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert!(handle_input(&mut app, key(KeyCode::Char('y'))).unwrap());
        assert_eq!(app.state, AppState::Quitting);
    }

    #[test]
    fn test_help_toggles() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);

        handle_input(&mut app, key(KeyCode::Char('?'))).unwrap();
        assert_eq!(app.state, AppState::ShowingHelp);
        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.state, AppState::Normal);
    }

    #[test]
    fn test_enter_on_type_step_starts_registration() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);
        assert_eq!(app.form.step(), WizardStep::RegistrationType);

        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.form.step(), WizardStep::AttendeeDetails);
        assert!(!app.form.store().attendees().is_empty());
    }

    #[test]
    fn test_typing_q_while_editing_is_text() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();

        // Open the card and edit the first text field
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.focus, Focus::Card);
        let text_field = app
            .card_fields()
            .iter()
            .position(|f| {
                matches!(
                    crate::app::field_input(*f),
                    crate::app::FieldInput::Text
                )
            })
            .unwrap();
        app.field_selection = text_field;
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.state, AppState::Editing);

        handle_input(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert_eq!(app.state, AppState::Editing);
        assert!(app.edit_buffer.ends_with('q'));

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.state, AppState::Normal);
    }

    #[test]
    fn test_card_escape_returns_to_list() {
        let dir = TempDir::new().unwrap();
        let mut app = app_in(&dir);
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.focus, Focus::Card);

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.focus, Focus::List);
        assert_eq!(app.form.step(), WizardStep::AttendeeDetails);
    }
}
