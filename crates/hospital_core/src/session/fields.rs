//! Field path and search term handling shared by query runners.
//!
//! # Invariants
//! - Field paths are dotted identifiers; anything else is rejected before SQL
//!   is built.
//! - Search terms shorter than [`MIN_SEARCH_TERM_CHARS`] mean "no filter".

use super::error::{SessionError, SessionResult};
use once_cell::sync::Lazy;
use regex::Regex;

/// Terms shorter than this (after trimming) do not filter.
pub const MIN_SEARCH_TERM_CHARS: usize = 2;

static FIELD_PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$")
        .expect("valid field path regex")
});
static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Converts a dotted field path (`address.city`) to a JSON path (`$.address.city`).
pub fn json_path(field: &str) -> SessionResult<String> {
    if FIELD_PATH_RE.is_match(field) {
        Ok(format!("$.{field}"))
    } else {
        Err(SessionError::InvalidField(field.to_string()))
    }
}

/// Validates a projection alias.
pub fn check_alias(alias: &str) -> SessionResult<()> {
    if IDENTIFIER_RE.is_match(alias) {
        Ok(())
    } else {
        Err(SessionError::InvalidField(alias.to_string()))
    }
}

/// Returns the effective prefix-search term, or `None` when the input is too
/// short to filter on.
pub fn normalize_search_term(term: &str) -> Option<String> {
    let trimmed = term.trim();
    if trimmed.chars().count() < MIN_SEARCH_TERM_CHARS {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Builds a `LIKE ... ESCAPE '\'` pattern matching values that start with `term`.
pub fn like_prefix_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 1);
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::{check_alias, json_path, like_prefix_pattern, normalize_search_term};

    #[test]
    fn json_path_accepts_dotted_identifiers_only() {
        assert_eq!(json_path("birthDate").unwrap(), "$.birthDate");
        assert_eq!(json_path("address.city").unwrap(), "$.address.city");
        assert!(json_path("visits[].date").is_err());
        assert!(json_path("name'); DROP TABLE documents; --").is_err());
        assert!(json_path("").is_err());
    }

    #[test]
    fn aliases_must_be_plain_identifiers() {
        assert!(check_alias("doctorName").is_ok());
        assert!(check_alias("doctor.name").is_err());
    }

    #[test]
    fn short_terms_disable_filtering() {
        assert_eq!(normalize_search_term(""), None);
        assert_eq!(normalize_search_term(" j "), None);
        assert_eq!(normalize_search_term(" jo "), Some("jo".to_string()));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_prefix_pattern("50%_a\\"), "50\\%\\_a\\\\%");
    }
}
