//! Text cleanup for raw lore values.
//!
//! Source documents were hand-edited in several tools and passed through
//! at least one lossy re-encoding, so string values arrive with replacement
//! characters, curly quotes, non-breaking spaces, and ragged whitespace.
//! [`clean`] repairs all of that; every normalizer routes its string output
//! through it.
//!
//! All functions here are pure and never fail: the worst case is `None`.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Literal substring repairs, applied in order before whitespace collapse.
///
/// U+FFFD is stripped first, so mis-decoded sequences like `�"` and `�'`
/// reduce to the punctuation that followed the replacement character.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("\u{FFFD}", ""),
    ("\u{2019}", "'"),
    ("\u{2018}", "'"),
    ("\u{201C}", "\""),
    ("\u{201D}", "\""),
    ("\u{00A0}", " "),
    ("\u{001B}", ""),
    ("\r\n", "\n"),
];

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static NON_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_]+").unwrap());
static NON_KEY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static NON_FILENAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9._-]+").unwrap());

/// Render any JSON value as text.
///
/// Strings are returned as-is, numbers and booleans in their JSON form,
/// and arrays/objects as compact JSON. `null` yields `None`.
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Clean a string: repair mis-decoded punctuation, collapse whitespace runs
/// to a single space, and trim. Returns `None` when nothing is left.
pub fn clean_str(raw: &str) -> Option<String> {
    let mut text = raw.to_string();
    for (from, to) in REPLACEMENTS {
        if text.contains(from) {
            text = text.replace(from, to);
        }
    }
    let collapsed = WHITESPACE.replace_all(&text, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Clean any JSON value coerced to text. `null` passes through as `None`.
pub fn clean(value: &Value) -> Option<String> {
    value_to_text(value).and_then(|s| clean_str(&s))
}

/// Clean every element of a list, dropping empty results.
///
/// A scalar is treated as a one-element list. Returns `None` when the
/// input is `null` or when nothing survives cleaning, so callers can tell
/// "no data" apart from a populated list.
pub fn clean_list(value: &Value) -> Option<Vec<String>> {
    let cleaned: Vec<String> = as_list(value).into_iter().filter_map(clean).collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// View a value as a list: arrays yield their elements, `null` yields
/// nothing, anything else is a single element.
pub fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// Fold a raw key for vocabulary matching: lowercase, non-alphanumeric runs
/// become `_`, leading/trailing underscores stripped.
///
/// `"Distinctive Features"`, `"distinctive-features"` and
/// `"distinctive_features"` all fold to `distinctive_features`.
pub fn canonicalize_key(key: &str) -> String {
    NON_KEY
        .replace_all(&key.to_lowercase(), "_")
        .trim_matches('_')
        .to_string()
}

/// Derive an entity id from its display name.
///
/// Lowercases and replaces every run of characters outside `[a-z0-9_]`
/// with a single underscore. The mapping is deterministic but not
/// injective: `"Mab!"` and `"Mab?"` share an id.
pub fn derive_id(name: &str) -> String {
    NON_ID.replace_all(&name.to_lowercase(), "_").into_owned()
}

/// File stem used when an entity is written to its own file.
pub fn safe_filename(name: &str) -> String {
    NON_FILENAME.replace_all(name, "_").into_owned()
}

/// Title-case a string: the first letter of every alphabetic run is
/// uppercased and the rest lowercased. Non-letters (spaces, apostrophes,
/// hyphens, digits) all start a new run, so `"o'brien"` becomes `"O'Brien"`.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut prev_alpha = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}
