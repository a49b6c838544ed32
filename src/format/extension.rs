//! File-name extension classification.

use once_cell::sync::Lazy;
use regex::Regex;

/// Trailing dot-prefixed run of ASCII letters and digits.
static EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.[0-9A-Za-z]+$").expect("Invalid extension pattern regex"));

/// Return the lowercase, dot-prefixed extension of `filename`.
///
/// Only a trailing run of ASCII letters and digits counts, so `"Model.OBJ"`
/// yields `".obj"` while `"README"`, `"trailing."` and `"bad.ob-j"` yield the
/// empty string. Never fails.
pub fn classify(filename: &str) -> String {
    EXTENSION
        .find(filename)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default()
}
