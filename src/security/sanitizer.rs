//! Query cleanup for the execution-plan tool.
//!
//! While a session is in SHOWPLAN mode, any `SET SHOWPLAN_*` toggle inside the
//! submitted text would fight the gateway's own bracketing, and a `GO` batch
//! separator is not T-SQL at all. Both are stripped; everything else is left
//! as written.

use once_cell::sync::Lazy;
use regex::Regex;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

static SHOWPLAN_TOGGLE: Lazy<Regex> =
    Lazy::new(|| compile(r"(?im)SET\s+SHOWPLAN[_A-Z]*\s+(ON|OFF)\s*;?\s*"));

static BATCH_SEPARATOR: Lazy<Regex> = Lazy::new(|| compile(r"(?im)^\s*GO\s*$"));

static LEADING_BLANK_LINES: Lazy<Regex> = Lazy::new(|| compile(r"(?m)^\s*\r?\n"));

static TRAILING_BLANK_LINES: Lazy<Regex> = Lazy::new(|| compile(r"(?m)\r?\n\s*$"));

fn clean_once(query: &str) -> String {
    let cleaned = SHOWPLAN_TOGGLE.replace_all(query, "");
    let cleaned = BATCH_SEPARATOR.replace_all(&cleaned, "");
    let cleaned = LEADING_BLANK_LINES.replace_all(&cleaned, "");
    let cleaned = TRAILING_BLANK_LINES.replace_all(&cleaned, "");
    cleaned.trim().to_string()
}

/// Strip SHOWPLAN toggles and `GO` lines, then trim blank lines.
///
/// Removal can splice two fragments into a new directive, so passes repeat
/// until the text stops changing. The result is therefore a fixed point:
/// sanitizing it again returns it unchanged.
pub fn sanitize_query(query: &str) -> String {
    let mut current = clean_once(query);
    loop {
        let next = clean_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}
