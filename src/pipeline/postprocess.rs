//! Post-processing: deterministic cleanup of vision-model replies.
//!
//! ## Why is post-processing necessary?
//!
//! Both backends ask the model for a bare JSON array, and well-prompted models
//! usually comply. Occasionally they still:
//!
//! - wrap the array in ` ```json ... ``` ` fences
//! - prepend a sentence ("Here is the text I found:")
//! - emit Windows line endings or zero-width characters copied from the page
//!
//! These rules repair such replies without interpreting them. Each rule is a
//! pure `&str → String` function and independently testable.
//!
//! ## Rule Order
//!
//! Strip invisible characters first so fence detection sees clean input,
//! then strip fences, then cut the reply down to its outermost JSON array.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules and return the JSON array text, if any.
///
/// Rules (applied in order):
/// 1. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip outer code fences
/// 4. Extract the outermost `[...]` span
///
/// Returns `None` when the reply contains no array at all.
pub fn extract_json_array(input: &str) -> Option<String> {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    let s = strip_code_fences(&s);
    outermost_array(&s).map(str::to_string)
}

// ── Rule 1: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?\s*\n(.*)\n```\s*$").unwrap());

fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.trim().to_string()
    }
}

// ── Rule 4: Extract the outermost JSON array ────────────────────────────────

fn outermost_array(input: &str) -> Option<&str> {
    let start = input.find('[')?;
    let end = input.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&input[start..=end])
}

// ── Tests ────────────────────────────────────────────────────────────────────
