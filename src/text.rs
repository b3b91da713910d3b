//! Two-line watermark text derivation
//!
//! Turns a free-form identity string ("Jane Doe, 555-123-4567",
//! "Jane Doe | Sales", "John Smith 555 123 4567", ...) into exactly two
//! display lines. Splitting is an ordered list of independent strategies;
//! the first one that produces a result wins, and text nobody can split
//! lands on the first line.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

/// The two lines of a watermark. The second line may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextLines {
    /// Upper line (usually the name)
    pub first: String,
    /// Lower line (usually the phone number)
    pub second: String,
}

impl TextLines {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Build from any number of parts: missing parts become empty lines and
    /// anything past the second part is dropped.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parts = parts.into_iter().map(Into::into);
        let first = parts.next().unwrap_or_default();
        let second = parts.next().unwrap_or_default();
        Self { first, second }
    }

    /// Both lines, top to bottom
    pub fn as_array(&self) -> [&str; 2] {
        [&self.first, &self.second]
    }
}

/// A single splitting rule. Returns `None` when it does not apply.
type SplitStrategy = fn(&str) -> Option<TextLines>;

/// Splitting rules in priority order
const STRATEGIES: &[(&str, SplitStrategy)] = &[
    ("comma", split_on_comma),
    ("pipe", split_on_pipe),
    ("phone", split_around_phone),
];

/// Delimiters tried, in order, when the text contains a phone number.
/// The flag marks tokens that only count when they sit next to the number.
const PHONE_DELIMITERS: &[(&str, bool)] = &[
    (" - ", false),
    (" at ", false),
    (" : ", false),
    (" \n", false),
    (" ", true),
];

/// Phone number shapes we recognise
const PHONE_PATTERNS: &[&str] = &[
    r"\(\d{3}\) \d{3}-\d{4}",      // (123) 456-7890
    r"\d{3}-\d{3}-\d{4}",          // 123-456-7890
    r"\d{10}",                     // 1234567890
    r"\+\d{1,3} \d{3} \d{3} \d{4}", // +1 234 567 8901
    r"\d{3} \d{3} \d{4}",          // 123 456 7890
];

/// Leading non-digit run, then everything from the first digit on
const NAME_THEN_NUMBER: &str = r"(\D+)(\d[\d\s\-\(\)\.]+)";

fn phone_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PHONE_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("phone pattern is a valid regex"))
            .collect()
    })
}

fn name_then_number() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(NAME_THEN_NUMBER).expect("fallback pattern is a valid regex"))
}

/// Derive the two watermark lines from raw identity text.
///
/// # Example
///
/// ```
/// use doc_watermark::text::split_lines;
///
/// let lines = split_lines("Jane Doe, 555-123-4567");
/// assert_eq!(lines.as_array(), ["Jane Doe", "555-123-4567"]);
///
/// let lines = split_lines("CONFIDENTIAL");
/// assert_eq!(lines.as_array(), ["CONFIDENTIAL", ""]);
/// ```
pub fn split_lines(raw: &str) -> TextLines {
    let text = raw.trim();

    STRATEGIES
        .iter()
        .find_map(|(name, strategy)| {
            let lines = strategy(text)?;
            debug!(strategy = *name, "watermark text split");
            Some(lines)
        })
        .unwrap_or_else(|| TextLines::new(text, ""))
}

/// Whether the text contains something shaped like a phone number
pub fn contains_phone(text: &str) -> bool {
    phone_patterns().iter().any(|re| re.is_match(text))
}

fn split_once_trimmed(text: &str, separator: &str) -> Option<TextLines> {
    if !text.contains(separator) {
        return None;
    }
    Some(TextLines::from_parts(text.splitn(2, separator).map(str::trim)))
}

fn split_on_comma(text: &str) -> Option<TextLines> {
    split_once_trimmed(text, ",")
}

fn split_on_pipe(text: &str) -> Option<TextLines> {
    split_once_trimmed(text, "|")
}

fn split_around_phone(text: &str) -> Option<TextLines> {
    if !contains_phone(text) {
        return None;
    }

    PHONE_DELIMITERS
        .iter()
        .find_map(|&(delimiter, at_boundary_only)| {
            split_once_trimmed(text, delimiter)
                .filter(|lines| !at_boundary_only || splits_at_phone_boundary(lines))
        })
        .or_else(|| split_at_first_digit(text))
}

/// A plain space only splits where the phone number begins or ends, so
/// "John Smith 555 123 4567" keeps the full name together.
fn splits_at_phone_boundary(lines: &TextLines) -> bool {
    if lines.first.is_empty() || lines.second.is_empty() {
        return false;
    }

    let second_starts_number = lines
        .second
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '+' || c == '(');
    let first_ends_number = lines
        .first
        .chars()
        .last()
        .is_some_and(|c| c.is_ascii_digit() || c == ')');

    second_starts_number || first_ends_number
}

fn split_at_first_digit(text: &str) -> Option<TextLines> {
    let caps = name_then_number().captures(text)?;
    Some(TextLines::new(caps[1].trim(), caps[2].trim()))
}
