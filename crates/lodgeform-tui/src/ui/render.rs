use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use lodgeform_core::api::MIN_QUERY_LEN;
use lodgeform_core::contact::{self, ContactResolution};
use lodgeform_core::form::{SubmissionState, WizardStep};
use lodgeform_core::models::{
    Attendee, DelegationMode, Field, FieldUpdate, GrandOfficerStatus, RegistrationType,
};
use lodgeform_core::rules;
use lodgeform_core::utils::{format_currency, format_phone, truncate_string};

use crate::app::{App, AppState, Focus};

use super::styles;

/// Width of the label column on the attendee card.
const LABEL_WIDTH: usize = 24;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Wizard steps
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_steps(frame, app, chunks[1]);
    render_main_content(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::ConfirmingModeSwitch => render_mode_switch_overlay(frame, app),
        AppState::PickingLodge => render_lodge_picker(frame, app),
        AppState::Normal | AppState::Editing | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("  lodgeform - {} registration", app.form.registration_type());
    let help_hint = "[?] Help";

    let title_line = Line::from(vec![
        Span::styled(title.clone(), styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.chars().count() + help_hint.len() + 4),
        )),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_steps(frame: &mut Frame, app: &App, area: Rect) {
    let current = app.form.step();
    let mut spans = vec![Span::raw(" ")];
    for (i, step) in WizardStep::ALL.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" > ", styles::muted_style()));
        }
        let label = format!("{}. {}", i + 1, step.title());
        spans.push(Span::styled(
            label,
            styles::step_style(*step == current, step.index() < current.index()),
        ));
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.form.step() {
        WizardStep::RegistrationType => render_type_picker(frame, app, area),
        WizardStep::AttendeeDetails => render_attendee_details(frame, app, area),
        WizardStep::Review => render_review(frame, app, area),
        WizardStep::Payment => render_payment(frame, app, area),
        WizardStep::Confirmation => render_confirmation(frame, app, area),
    }
}

// ============================================================================
// Registration type
// ============================================================================

fn type_description(registration_type: RegistrationType) -> &'static str {
    match registration_type {
        RegistrationType::Individuals => "Yourself and any partners or guests",
        RegistrationType::Lodge => "Members of one lodge, booked together",
        RegistrationType::GrandLodge => "A grand lodge party, named or as a block of tickets",
        RegistrationType::Delegation => "A masonic order delegation, named or as a block of tickets",
    }
}

fn render_type_picker(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![
        Line::from(Span::styled(" Who are you registering?", styles::highlight_style())),
        Line::from(""),
    ];

    for (i, registration_type) in RegistrationType::ALL.iter().enumerate() {
        let selected = i == app.type_selection;
        let limits = app.config.limits.for_type(*registration_type);
        let style = if selected {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        lines.push(Line::from(vec![
            Span::raw(if selected { " ▶ " } else { "   " }),
            Span::styled(format!("{:<26}", registration_type.title()), style),
            Span::styled(
                format!("{}-{} attendees", limits.min, limits.max),
                styles::muted_style(),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            format!("     {}", type_description(*registration_type)),
            styles::muted_style(),
        )));
        lines.push(Line::from(""));
    }

    let block = Block::default()
        .title(" Registration Type ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

// ============================================================================
// Attendee details
// ============================================================================

fn render_attendee_details(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(area);

    render_attendee_list(frame, app, chunks[0]);
    render_attendee_card(frame, app, chunks[1]);
}

fn render_attendee_list(frame: &mut Frame, app: &App, area: Rect) {
    let store = app.form.store();
    let error_counts = app.form.report().map(|r| r.by_attendee()).unwrap_or_default();
    let width = area.width.saturating_sub(12) as usize;

    let mut lines = Vec::new();

    if let DelegationMode::TicketsOnly { ticket_count } = app.form.delegation_mode() {
        lines.push(Line::from(vec![
            Span::styled(" Tickets: ", styles::muted_style()),
            Span::styled(format!("{}", ticket_count), styles::highlight_style()),
            Span::styled("  [+/-]", styles::muted_style()),
        ]));
        lines.push(Line::from(Span::styled(
            " Only the booking contact is named",
            styles::muted_style(),
        )));
        lines.push(Line::from(""));
    }

    for (i, attendee) in store.attendees().iter().enumerate() {
        let selected = i == app.attendee_selection;
        let style = if selected && app.focus == Focus::List {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };

        let fold = if app.form.is_expanded(&attendee.id) { "▾" } else { "▸" };
        let indent = if attendee.is_partner_record() { "   ↳ " } else { " " };
        let marker = if attendee.is_primary { "★ " } else { "" };
        let name = truncate_string(&format!("{}{}", marker, attendee.display_name()), width);

        let mut spans = vec![
            Span::raw(indent),
            Span::styled(format!("{} ", fold), styles::muted_style()),
            Span::styled(name, style),
            Span::styled(format!("  {}", attendee.effective_kind()), styles::muted_style()),
        ];
        if let Some(count) = error_counts.get(&attendee.id) {
            spans.push(Span::styled(format!("  ✗{}", count), styles::error_style()));
        }
        if !app.form.warnings(&attendee.id).is_empty() {
            spans.push(Span::styled("  ⚠", styles::warning_style()));
        }
        lines.push(Line::from(spans));
    }

    if let Some(count_error) = app.form.report().and_then(|r| r.count.as_ref()) {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", count_error),
            styles::error_style(),
        )));
    }

    let limits = app.form.limits();
    let title = format!(" Attendees ({}/{}) ", store.registrant_count(), limits.max);
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(styles::border_style(app.focus == Focus::List));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_attendee_card(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(app.focus == Focus::Card));

    let Some(attendee) = app.selected_attendee() else {
        frame.render_widget(Paragraph::new("").block(block), area);
        return;
    };
    let block = block.title(format!(" {} ", attendee.display_name()));

    if !attendee.kind.is_recognized() {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!(" Unsupported attendee type: \"{}\"", attendee.kind),
                styles::warning_style(),
            )),
            Line::from(""),
            Line::from(Span::styled(
                " This record is kept as-is but cannot be edited here.",
                styles::muted_style(),
            )),
            Line::from(Span::styled(" Press d to remove it.", styles::muted_style())),
        ];
        frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
        return;
    }

    if !app.form.is_expanded(&attendee.id) {
        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                format!(" {}", attendee.full_name()),
                styles::list_item_style(),
            )),
            Line::from(Span::styled(" Press Enter to edit", styles::muted_style())),
        ];
        frame.render_widget(Paragraph::new(lines).block(block), area);
        return;
    }

    let required = rules::get_required_fields(attendee);
    let report = app.form.report();
    let mut lines = Vec::new();

    for (i, field) in app.card_fields().into_iter().enumerate() {
        let selected = app.focus == Focus::Card && i == app.field_selection;
        let editing = selected && app.state == AppState::Editing;

        let marker = if required.contains(&field) { "*" } else { " " };
        let label = format!("{:<width$}", field.label(), width = LABEL_WIDTH);

        let value_span = if editing {
            Span::styled(format!("{}▌", app.edit_buffer), styles::input_style())
        } else {
            let value = field_display(app, attendee, field);
            let style = if selected {
                styles::selected_style()
            } else if value.is_empty() {
                styles::muted_style()
            } else {
                styles::list_item_style()
            };
            Span::styled(if value.is_empty() { "-".to_string() } else { value }, style)
        };

        lines.push(Line::from(vec![
            Span::styled(format!(" {}", marker), styles::required_style()),
            Span::styled(label, styles::muted_style()),
            value_span,
        ]));

        if let Some(error) = report.and_then(|r| r.field_error(&attendee.id, field)) {
            lines.push(Line::from(Span::styled(
                format!("  {:<width$}✗ {}", "", error.message(), width = LABEL_WIDTH),
                styles::error_style(),
            )));
        }
    }

    if let ContactResolution::Deferred { message, .. } =
        contact::resolve(attendee, app.form.store().primary())
    {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", message), styles::muted_style())));
    }

    let warnings = app.form.warnings(&attendee.id);
    if !warnings.is_empty() {
        lines.push(Line::from(""));
        for warning in warnings {
            lines.push(Line::from(vec![
                Span::styled(format!(" ⚠ {}", warning.message), styles::warning_style()),
                Span::styled("  [f]ix [x] dismiss", styles::muted_style()),
            ]));
        }
    }

    frame.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: false }), area);
}

/// Display text for a card field.
fn field_display(app: &App, attendee: &Attendee, field: Field) -> String {
    match attendee.value(field) {
        FieldUpdate::Rank(rank) => rank
            .map(|r| format!("{} ({})", r.code(), r.label()))
            .unwrap_or_default(),
        FieldUpdate::GrandOfficerStatus(status) => match status {
            Some(GrandOfficerStatus::Present) => "Present".to_string(),
            Some(GrandOfficerStatus::Past) => "Past".to_string(),
            None => String::new(),
        },
        FieldUpdate::GrandLodgeId(id) => app.grand_lodge_name(id.as_deref()).unwrap_or_default(),
        FieldUpdate::LodgeId(id) => {
            if !attendee.lodge_name_number.is_empty() {
                attendee.lodge_name_number.clone()
            } else {
                id.unwrap_or_default()
            }
        }
        FieldUpdate::UseSameLodge(same) => {
            if same {
                "[x] Same lodge as primary".to_string()
            } else {
                "[ ] Same lodge as primary".to_string()
            }
        }
        FieldUpdate::ContactPreference(preference) => preference
            .map(|p| p.label().to_string())
            .unwrap_or_default(),
        FieldUpdate::PrimaryPhone(phone) => format_phone(&phone),
        FieldUpdate::Title(v)
        | FieldUpdate::FirstName(v)
        | FieldUpdate::LastName(v)
        | FieldUpdate::Suffix(v)
        | FieldUpdate::PresentGrandOfficerRole(v)
        | FieldUpdate::OtherGrandOfficerRole(v)
        | FieldUpdate::LodgeNameNumber(v)
        | FieldUpdate::PrimaryEmail(v)
        | FieldUpdate::Relationship(v)
        | FieldUpdate::DietaryRequirements(v)
        | FieldUpdate::SpecialNeeds(v) => v,
    }
}

// ============================================================================
// Review, payment, confirmation
// ============================================================================

fn order_summary_lines(app: &App) -> Vec<Line<'static>> {
    let package = app.selected_package();
    let package_text = match package {
        Some(p) => format!("< {} - {} each >", p.name, format_currency(p.price_cents)),
        None if app.packages.is_empty() => "No packages loaded".to_string(),
        None => "-".to_string(),
    };

    vec![
        Line::from(vec![
            Span::styled(format!(" {:<14}", "Package"), styles::muted_style()),
            Span::styled(package_text, styles::highlight_style()),
        ]),
        Line::from(vec![
            Span::styled(format!(" {:<14}", "Tickets"), styles::muted_style()),
            Span::styled(app.form.ticket_count().to_string(), styles::list_item_style()),
        ]),
        Line::from(vec![
            Span::styled(format!(" {:<14}", "Total"), styles::muted_style()),
            Span::styled(
                format_currency(app.form.total_cents(package)),
                styles::title_style(),
            ),
        ]),
    ]
}

fn render_review(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];

    for attendee in app.form.store().attendees() {
        let indent = if attendee.is_partner_record() { "   ↳ " } else { " " };
        let mut spans = vec![
            Span::raw(indent),
            Span::styled(
                format!("{:<36}", truncate_string(&attendee.full_name(), 36)),
                styles::list_item_style(),
            ),
            Span::styled(format!("{:<8}", attendee.effective_kind()), styles::muted_style()),
        ];
        if attendee.is_mason() && !attendee.lodge_name_number.is_empty() {
            spans.push(Span::styled(attendee.lodge_name_number.clone(), styles::muted_style()));
        }
        if attendee.is_primary {
            spans.push(Span::styled("  booking contact", styles::highlight_style()));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::from(""));
    lines.extend(order_summary_lines(app));

    let block = Block::default()
        .title(" Review ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_payment(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];
    lines.extend(order_summary_lines(app));
    lines.push(Line::from(""));

    match app.form.submission() {
        SubmissionState::Idle => lines.push(Line::from(vec![
            Span::styled(" Press ", styles::muted_style()),
            Span::styled("Enter", styles::help_key_style()),
            Span::styled(" to pay and submit", styles::muted_style()),
        ])),
        SubmissionState::Submitting => lines.push(Line::from(Span::styled(
            " Submitting...",
            styles::highlight_style(),
        ))),
        SubmissionState::Failed(message) => {
            lines.push(Line::from(Span::styled(
                format!(" Payment failed: {}", message),
                styles::error_style(),
            )));
            lines.push(Line::from(vec![
                Span::styled(" Press ", styles::muted_style()),
                Span::styled("Enter", styles::help_key_style()),
                Span::styled(" to retry. Your details are kept.", styles::muted_style()),
            ]));
        }
        SubmissionState::Confirmed(_) => {}
    }

    let block = Block::default()
        .title(" Payment ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirmation(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![Line::from("")];
    if let SubmissionState::Confirmed(response) = app.form.submission() {
        lines.push(Line::from(Span::styled(
            " Registration complete",
            styles::success_style(),
        )));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled(" Confirmation number: ", styles::muted_style()),
            Span::styled(response.confirmation_number.clone(), styles::title_style()),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::styled(" Press ", styles::muted_style()),
        Span::styled("n", styles::help_key_style()),
        Span::styled(" for a new registration or ", styles::muted_style()),
        Span::styled("q", styles::help_key_style()),
        Span::styled(" to quit", styles::muted_style()),
    ]));

    let block = Block::default()
        .title(" Confirmation ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

// ============================================================================
// Status bar
// ============================================================================

fn shortcuts(app: &App) -> &'static str {
    match app.state {
        AppState::Editing => "[Enter/Esc] done",
        AppState::PickingLodge => "[↑/↓] select | [Enter] pick | [Esc] cancel",
        _ => match (app.form.step(), app.focus) {
            (WizardStep::RegistrationType, _) => "[↑/↓] select | [Enter] start | [q]uit",
            (WizardStep::AttendeeDetails, Focus::List) => {
                "[m]ason [g]uest [p]artner [d]elete | [n]ext | [q]uit"
            }
            (WizardStep::AttendeeDetails, Focus::Card) => "[Enter] edit | [←/→] change | [Esc] list",
            (WizardStep::Review, _) => "[←/→] package | [n]ext | [b]ack",
            (WizardStep::Payment, _) => "[←/→] package | [Enter] submit | [b]ack",
            (WizardStep::Confirmation, _) => "[n]ew | [q]uit",
        },
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else {
        let connection = if app.is_online() { "Online" } else { "Offline" };
        let saved = if app.last_saved.is_some() { " | Draft saved" } else { "" };
        format!(" {}{} ", connection, saved)
    };
    let right_text = format!(" {} ", shortcuts(app));

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.chars().count());

    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(Paragraph::new(status_line).style(styles::status_bar_style()), area);
}

// ============================================================================
// Overlays
// ============================================================================

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(56, 28, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");
    let help_text = vec![
        Line::from(Span::styled(
            format!("  lodgeform {}", version),
            styles::title_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Attendees", styles::highlight_style())),
        help_line("↑/↓", "Select attendee or field"),
        help_line("Enter", "Open card / edit field"),
        help_line("←/→", "Change a choice field"),
        help_line("Space", "Fold or unfold an attendee"),
        help_line("e / c", "Expand / collapse all"),
        help_line("m / g", "Add a Mason / a guest"),
        help_line("p", "Add or remove partner"),
        help_line("d", "Remove attendee"),
        help_line("K / J", "Move attendee up / down"),
        help_line("t", "Named attendees / tickets only"),
        help_line("+ / -", "Ticket count"),
        help_line("f / x", "Fix / dismiss a warning"),
        Line::from(""),
        Line::from(Span::styled(" Wizard", styles::highlight_style())),
        help_line("n", "Next step"),
        help_line("b / Esc", "Previous step"),
        help_line("s", "Save draft now"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 8, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Quit? Your draft will be saved.",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_mode_switch_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(56, 9, frame.area());
    frame.render_widget(Clear, area);

    let target = if app.form.is_tickets_only() {
        "named attendees"
    } else {
        "tickets only"
    };
    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("   Switch to {}?", target),
            styles::highlight_style(),
        )),
        Line::from(Span::styled(
            "   All attendee details entered so far will be cleared.",
            styles::warning_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to switch, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_lodge_picker(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(60, 18, frame.area());
    frame.render_widget(Clear, area);

    let grand_lodge = app
        .selected_attendee()
        .and_then(|a| app.grand_lodge_name(a.grand_lodge_id.as_deref()))
        .unwrap_or_default();

    let mut lines = vec![
        Line::from(Span::styled(format!(" {}", grand_lodge), styles::muted_style())),
        Line::from(vec![
            Span::styled(" Search: ", styles::muted_style()),
            Span::styled(format!("{}▌", app.lodge_query), styles::input_style()),
        ]),
        Line::from(""),
    ];

    if app.lodge_query.trim().chars().count() < MIN_QUERY_LEN {
        lines.push(Line::from(Span::styled(
            format!(" Type at least {} characters", MIN_QUERY_LEN),
            styles::muted_style(),
        )));
    } else if app.lodge_results.is_empty() {
        lines.push(Line::from(Span::styled(" No lodges found", styles::muted_style())));
    }

    for (i, lodge) in app.lodge_results.iter().enumerate().take(12) {
        let selected = i == app.lodge_selection;
        let style = if selected {
            styles::selected_style()
        } else {
            styles::list_item_style()
        };
        let mut spans = vec![
            Span::raw(if selected { " ▶ " } else { "   " }),
            Span::styled(truncate_string(&lodge.display_name(), 40), style),
        ];
        if let Some(district) = &lodge.district {
            spans.push(Span::styled(format!("  {}", district), styles::muted_style()));
        }
        lines.push(Line::from(spans));
    }

    let block = Block::default()
        .title(" Find Lodge ")
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
