use crossterm::style::Color;
use std::hash::{Hash, Hasher};

/// Resource kinds accepted in the `TYPE/NAME` argument form.
const POD_KINDS: &[&str] = &["pod", "pods", "po"];

/// Reduce a positional argument to the regex matched against pod names.
///
/// `pod/NAME` (and its aliases) selects by `NAME`; anything else is taken
/// as a pattern verbatim.
pub fn parse_pattern_arg(arg: &str) -> &str {
    if let Some((kind, name)) = arg.split_once('/')
        && POD_KINDS.contains(&kind.to_ascii_lowercase().as_str())
    {
        return name;
    }
    arg
}

/// clap value parser for `--since`: validates, keeps the user's spelling.
pub fn duration_arg(s: &str) -> Result<String, String> {
    humantime::parse_duration(s)
        .map(|_| s.to_string())
        .map_err(|e| format!("'{}' is not a duration: {}", s, e))
}

/// clap value parser for `--since-time`: validates RFC3339, keeps the user's spelling.
pub fn rfc3339_arg(s: &str) -> Result<String, String> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|_| s.to_string())
        .map_err(|e| format!("'{}' is not an RFC3339 time: {}", s, e))
}

/// Stable color for a `pod/container` key, so every line of one stream
/// shares a color across the run while sibling containers differ.
pub fn get_color(s: &str) -> Color {
    let colors = [
        Color::Red,
        Color::Green,
        Color::Blue,
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::AnsiValue(91),
        Color::AnsiValue(92),
        Color::AnsiValue(94),
        Color::AnsiValue(93),
        Color::AnsiValue(95),
        Color::AnsiValue(96),
    ];
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    let hash = hasher.finish() as u32;
    colors[(hash % colors.len() as u32) as usize]
}
