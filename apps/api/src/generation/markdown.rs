//! Strips lightweight markdown left in generated text before it is rendered.

use once_cell::sync::Lazy;
use regex::Regex;

/// `-`, `*` or `•` followed by whitespace at the start of a line.
static LEADING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^[ \t]*[-•*][ \t]+").expect("valid bullet pattern"));

/// One to three asterisks wrapping text on a single line.
static EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*{1,3}([^*\n]+?)\*{1,3}").expect("valid emphasis pattern"));

/// Removes emphasis markers and leading bullets, then trims.
///
/// Passes repeat until the text stops changing, so the result is a fixed
/// point: `normalize(&normalize(x)) == normalize(x)`. Every effective pass
/// shortens the text, so the loop terminates.
pub fn normalize(text: &str) -> String {
    let mut current = text.trim().to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    // bullets first so "* **Bold**" is not read as one emphasis span
    let without_bullets = LEADING_BULLET.replace_all(text, "");
    EMPHASIS
        .replace_all(&without_bullets, "$1")
        .trim()
        .to_string()
}
