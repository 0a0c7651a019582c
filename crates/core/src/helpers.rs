//! Helper functions for text scrubbing and prompt rendering.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::record::Details;
use crate::REMOVALS;

// Punctuation left behind by serialized lists and maps, plus all whitespace.
static NOISE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[:\[\]{}\s]").unwrap());
static SPACED_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +,").unwrap());
static COMMA_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",{2,}").unwrap());
// Decimal digits in any script, plus superscript and subscript digits.
static DIGIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Nd}\x{00B2}\x{00B3}\x{00B9}\x{2070}\x{2074}-\x{2079}\x{2080}-\x{2089}]")
        .unwrap()
});

/// Words at least this long that contain a digit are treated as part numbers.
const CATALOG_NUMBER_MIN_CHARS: usize = 7;

/// Scrub free text before tokenizing.
///
/// Replaces each bracket, brace, colon and whitespace character with a space,
/// mends the comma artifacts that leaves behind (spaces before a comma and
/// runs of commas), and drops words of 7+ characters containing a digit,
/// which are almost always SKUs or model numbers. Scrubbing is idempotent.
pub fn scrub(text: &str) -> String {
    let spaced = NOISE_RE.replace_all(text, " ");
    let joined = SPACED_COMMA_RE.replace_all(spaced.trim(), ",");
    let collapsed = COMMA_RUN_RE.replace_all(&joined, ",");

    collapsed
        .split(' ')
        .filter(|word| !is_catalog_number(word))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Fractions such as `½` and Roman numerals are not digits.
fn is_catalog_number(word: &str) -> bool {
    word.chars().count() >= CATALOG_NUMBER_MIN_CHARS && DIGIT_RE.is_match(word)
}

/// Render structured details as `key: value, key: value` text.
///
/// Text details are returned verbatim; maps keep their source key order.
pub fn render_details(details: &Details) -> String {
    match details {
        Details::Text(text) => text.clone(),
        Details::Map(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{key}: {s}"),
                other => format!("{key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// Render details and strip every configured removal phrase.
///
/// Removal is plain substring deletion and repeats until nothing changes, so a
/// phrase spliced together by an earlier deletion is removed as well.
pub fn scrub_details(details: &Details) -> String {
    let mut text = render_details(details);
    loop {
        let before = text.len();
        for removal in REMOVALS {
            text = text.replace(removal, "");
        }
        if text.len() == before {
            return text;
        }
    }
}

/// Keep at most `max_chars` characters from the start of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Round a price to whole dollars, ties to even ($122.50 becomes $122).
pub fn round_price(price: f64) -> f64 {
    price.round_ties_even()
}
