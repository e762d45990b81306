//! Uniform response envelope for successes and failures.

use serde::Serialize;

use crate::errors::{CoreError, ValidationIssue};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub data: T,
    pub message: String,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(status: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status,
            data,
            message: message.into(),
            success: status < 400,
        }
    }

    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self::new(200, data, message)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct FieldIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl From<&ValidationIssue> for FieldIssue {
    fn from(issue: &ValidationIssue) -> Self {
        Self {
            field: issue.field.clone(),
            code: issue.code.clone(),
            message: issue.message.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ApiFailure {
    pub status: u16,
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldIssue>,
}

impl From<&CoreError> for ApiFailure {
    fn from(err: &CoreError) -> Self {
        let errors = match err {
            CoreError::Validation(validation) => validation.issues.iter().map(FieldIssue::from).collect(),
            _ => Vec::new(),
        };
        Self {
            status: err.status_code(),
            message: err.to_string(),
            success: false,
            errors,
        }
    }
}

impl From<CoreError> for ApiFailure {
    fn from(err: CoreError) -> Self {
        Self::from(&err)
    }
}

/// Wraps an operation result; failures never carry partial data.
pub fn respond<T>(result: Result<T, CoreError>, message: impl Into<String>) -> Result<ApiResponse<T>, ApiFailure> {
    match result {
        Ok(data) => Ok(ApiResponse::ok(data, message)),
        Err(err) => Err(ApiFailure::from(&err)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::errors::ValidationError;

    #[test]
    fn success_envelope_shape() {
        let response = respond(Ok(json!({"liked": true})), "Video liked").expect("ok");
        assert_eq!(
            serde_json::to_value(&response).expect("json"),
            json!({"status": 200, "data": {"liked": true}, "message": "Video liked", "success": true})
        );
    }

    #[test]
    fn failures_map_status_and_issues() {
        let failure = respond::<()>(
            Err(ValidationError::single("sortBy", "validation.sort", "Unsupported sort field").into()),
            "unused",
        )
        .unwrap_err();
        assert_eq!(failure.status, 400);
        assert!(!failure.success);
        assert_eq!(failure.errors.len(), 1);

        let failure = ApiFailure::from(CoreError::Forbidden { entity: "playlist" });
        assert_eq!(failure.status, 403);
        assert_eq!(failure.message, "only the owner can modify this playlist");
        let value = serde_json::to_value(&failure).expect("json");
        assert!(value.get("errors").is_none());
    }
}
