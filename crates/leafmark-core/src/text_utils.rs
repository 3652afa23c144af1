//! Small text helpers for link labels and stats display.

/// Longest label kept inside a generated link.
pub const MAX_LINK_TEXT_CHARS: usize = 120;

/// Make a selection safe to use as a link label.
///
/// Host link syntax reserves `[`, `]`, `|`, `#` and `^`; newlines would end
/// the link. Whitespace runs collapse to one space.
pub fn sanitize_link_text(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() || matches!(ch, '[' | ']' | '|' | '#' | '^') {
            pending_space = !cleaned.is_empty();
            continue;
        }
        if pending_space {
            cleaned.push(' ');
            pending_space = false;
        }
        cleaned.push(ch);
    }

    if cleaned.chars().count() <= MAX_LINK_TEXT_CHARS {
        return cleaned;
    }
    let mut truncated: String = cleaned.chars().take(MAX_LINK_TEXT_CHARS - 1).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push('…');
    truncated
}

/// Human-readable reading time: `"2h 05m"`, `"12m"`, `"<1m"`.
pub fn format_duration(ms: u64) -> String {
    let total_minutes = ms / 60_000;
    if total_minutes == 0 {
        return "<1m".to_string();
    }
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours == 0 {
        format!("{minutes}m")
    } else {
        format!("{hours}h {minutes:02}m")
    }
}
