//! Normalizers for client-supplied filter values.

use regex::{Regex, RegexBuilder};

use crate::{errors::ValidationError, filters::Filter};

/// Longest search term accepted from a client.
pub const MAX_SEARCH_TERM_LEN: usize = 128;

/// Builds a case-insensitive substring pattern from raw user input.
///
/// Returns `Ok(None)` for blank input. Regex metacharacters are escaped so the
/// term is always matched literally.
pub fn build_text_pattern(raw: Option<&str>) -> Result<Option<Regex>, ValidationError> {
    let Some(term) = raw.map(str::trim).filter(|term| !term.is_empty()) else {
        return Ok(None);
    };
    if term.chars().count() > MAX_SEARCH_TERM_LEN {
        return Err(ValidationError::single(
            "query",
            "validation.length",
            format!("search term must be at most {MAX_SEARCH_TERM_LEN} characters"),
        ));
    }
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|err| ValidationError::single("query", "validation.regex", err.to_string()))
}

/// Matches the term against any of `fields`; `None` when there is no term.
pub fn text_search_filter(raw: Option<&str>, fields: &[&str]) -> Result<Option<Filter>, ValidationError> {
    let Some(pattern) = build_text_pattern(raw)? else {
        return Ok(None);
    };
    Ok(Some(Filter::or(
        fields.iter().map(|field| Filter::text(*field, pattern.clone())),
    )))
}

/// Lowercases and trims a username the way it is stored.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}
