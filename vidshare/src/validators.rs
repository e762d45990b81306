use email_address::EmailAddress;
use url::Url;

use crate::errors::{ValidationError, ValidationIssue};

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Accumulates field issues so a mutation reports every problem at once.
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<ValidationIssue>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires a non-blank value; returns the trimmed text when present.
    pub fn required<'v>(&mut self, field: &str, value: Option<&'v str>) -> Option<&'v str> {
        match value.map(str::trim).filter(|text| !text.is_empty()) {
            Some(text) => Some(text),
            None => {
                self.push(field, "validation.required", "field is required");
                None
            }
        }
    }

    /// Like [`Self::required`] but also bounds the length in characters.
    pub fn text<'v>(&mut self, field: &str, value: Option<&'v str>, max_len: usize) -> Option<&'v str> {
        let text = self.required(field, value)?;
        if text.chars().count() > max_len {
            self.push(field, "validation.length", format!("must be at most {max_len} characters"));
            return None;
        }
        Some(text)
    }

    pub fn email<'v>(&mut self, field: &str, value: Option<&'v str>) -> Option<&'v str> {
        let text = self.required(field, value)?;
        if !is_valid_email(text) {
            self.push(field, "validation.email", "must be a valid email address");
            return None;
        }
        Some(text)
    }

    pub fn url<'v>(&mut self, field: &str, value: Option<&'v str>) -> Option<&'v str> {
        let text = self.required(field, value)?;
        if !is_valid_url(text) {
            self.push(field, "validation.url", "must be a valid url");
            return None;
        }
        Some(text)
    }

    pub fn push(&mut self, field: &str, code: &str, message: impl Into<String>) {
        self.issues.push(ValidationIssue::new(field, code, message));
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        if self.issues.is_empty() {
            Ok(())
        } else {
            Err(ValidationError::new(self.issues))
        }
    }
}
