//! CLI input validation functions.
//!
//! These validators are used by clap's `value_parser` attribute to validate
//! user input at parse time.

/// Validate an issue key such as `PROJ-123`.
///
/// Keys are opaque to the tracker client, so only obviously broken input is
/// rejected: empty keys and keys containing whitespace or commas.
pub fn validate_issue_key(s: &str) -> Result<String, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Issue key cannot be empty".to_string());
    }
    if s.chars().any(|c| c.is_whitespace() || c == ',') {
        return Err(format!(
            "Invalid issue key: '{s}'. Keys cannot contain whitespace or commas"
        ));
    }

    Ok(s.to_string())
}

/// Validate a staleness threshold in days.
pub fn validate_stale_days(s: &str) -> Result<i64, String> {
    let days: i64 = s
        .trim()
        .parse()
        .map_err(|_| format!("'{s}' is not a whole number of days"))?;
    if days <= 0 {
        return Err(format!("stale-after-days must be positive, got {days}"));
    }
    Ok(days)
}
