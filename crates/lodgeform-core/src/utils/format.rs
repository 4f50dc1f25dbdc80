/// Collapse runs of whitespace and trim the ends of a name field.
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Emails are stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Keep the digits of a phone number, plus a leading `+` for international numbers.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if trimmed.starts_with('+') && !digits.is_empty() {
        format!("+{}", digits)
    } else {
        digits
    }
}

/// Format a phone number for display.
/// Australian mobiles become `0412 345 678` or `+61 412 345 678`,
/// landlines `(02) 9876 5432`; anything else is returned as entered.
pub fn format_phone(phone: &str) -> String {
    let normalized = normalize_phone(phone);

    if let Some(rest) = normalized.strip_prefix("+61") {
        if rest.len() == 9 && rest.starts_with('4') {
            return format!("+61 {} {} {}", &rest[0..3], &rest[3..6], &rest[6..9]);
        }
        return phone.trim().to_string();
    }

    match normalized.len() {
        10 if normalized.starts_with("04") => format!(
            "{} {} {}",
            &normalized[0..4],
            &normalized[4..7],
            &normalized[7..10]
        ),
        10 if normalized.starts_with('0') => format!(
            "({}) {} {}",
            &normalized[0..2],
            &normalized[2..6],
            &normalized[6..10]
        ),
        _ => phone.trim().to_string(),
    }
}

/// Lodge display name, e.g. "Lodge Harmony No. 5".
pub fn format_lodge_display(name: &str, number: Option<i32>) -> String {
    let name = normalize_name(name);
    match number {
        Some(n) => format!("{} No. {}", name, n),
        None => name,
    }
}

/// Format an amount in cents as dollars, e.g. `$1,250.00`.
pub fn format_currency(cents: i64) -> String {
    let negative = cents < 0;
    let cents = cents.unsigned_abs();
    let dollars = (cents / 100).to_string();

    let mut grouped = String::new();
    for (i, c) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}${}.{:02}", if negative { "-" } else { "" }, grouped, cents % 100)
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
