use ratatui::style::{Color, Modifier, Style};

// Lodge blue and gold, with signal colours for validation
pub const LODGE_BLUE: Color = Color::Rgb(70, 110, 190);
pub const GOLD: Color = Color::Rgb(212, 175, 55);
pub const GREEN: Color = Color::Rgb(90, 170, 110);
pub const RED: Color = Color::Rgb(210, 80, 80);
pub const AMBER: Color = Color::Rgb(230, 150, 40);
pub const GREY: Color = Color::Rgb(125, 125, 135);
pub const TEXT: Color = Color::Rgb(225, 225, 230);
pub const ROW_BG: Color = Color::Rgb(40, 46, 70);
pub const BAR_BG: Color = Color::Rgb(24, 28, 44);

fn fg(color: Color) -> Style {
    Style::default().fg(color)
}

pub fn title_style() -> Style {
    fg(GOLD).add_modifier(Modifier::BOLD)
}

pub fn selected_style() -> Style {
    fg(TEXT).bg(ROW_BG).add_modifier(Modifier::BOLD)
}

pub fn list_item_style() -> Style {
    fg(TEXT)
}

pub fn muted_style() -> Style {
    fg(GREY)
}

pub fn highlight_style() -> Style {
    fg(LODGE_BLUE).add_modifier(Modifier::BOLD)
}

pub fn success_style() -> Style {
    fg(GREEN).add_modifier(Modifier::BOLD)
}

pub fn error_style() -> Style {
    fg(RED)
}

pub fn warning_style() -> Style {
    fg(AMBER)
}

/// Red asterisk beside required card fields.
pub fn required_style() -> Style {
    fg(RED).add_modifier(Modifier::BOLD)
}

/// Wizard breadcrumb entry.
pub fn step_style(current: bool, done: bool) -> Style {
    match (current, done) {
        (true, _) => fg(GOLD).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        (false, true) => fg(GREEN),
        (false, false) => fg(GREY),
    }
}

pub fn border_style(focused: bool) -> Style {
    fg(if focused { GOLD } else { GREY })
}

/// Text being typed into a field or the lodge search box.
pub fn input_style() -> Style {
    fg(GOLD).add_modifier(Modifier::UNDERLINED)
}

pub fn status_bar_style() -> Style {
    fg(TEXT).bg(BAR_BG)
}

pub fn help_key_style() -> Style {
    fg(GOLD).add_modifier(Modifier::BOLD)
}

pub fn help_desc_style() -> Style {
    fg(TEXT)
}
