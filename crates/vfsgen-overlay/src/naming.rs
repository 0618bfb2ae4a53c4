//! Path-safe rendering of human-readable names.

/// Marker appended to truncated names.
pub const ELLIPSIS: char = '…';

/// Replace characters that are invalid (or meaningful) in path components with
/// look-alike characters, then trim surrounding whitespace.
#[must_use]
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|ch| match ch {
            '*' => '\u{1F7AF}',
            '|' => '\u{FF5C}',
            '\\' => '\u{29F9}',
            '/' => '\u{29F8}',
            ':' => '\u{0589}',
            '"' => '\u{2033}',
            '>' => '\u{203A}',
            '<' => '\u{2039}',
            '?' => '\u{FF1F}',
            '.' => '\u{2024}',
            other => other,
        })
        .collect();
    replaced.trim().to_string()
}

/// Shorten `name` to at most `cutoff` characters.
///
/// The cut happens at the last whitespace boundary that fits and an ellipsis is
/// appended; names without a usable boundary are cut mid-word.
#[must_use]
pub fn truncate(name: &str, cutoff: usize) -> String {
    if name.chars().count() <= cutoff {
        return name.to_string();
    }
    let keep = cutoff.saturating_sub(1);
    let end = name
        .char_indices()
        .nth(keep)
        .map_or(name.len(), |(index, _)| index);
    let head = &name[..end];
    let head = if name[end..].starts_with(char::is_whitespace) {
        head
    } else {
        match head.rfind(char::is_whitespace) {
            Some(boundary) if boundary > 0 => &head[..boundary],
            _ => head,
        }
    };
    format!("{}{ELLIPSIS}", head.trim_end())
}

/// Sanitize then truncate a name component.
#[must_use]
pub fn display_name(name: &str, cutoff: usize) -> String {
    truncate(&sanitize_component(name), cutoff)
}
