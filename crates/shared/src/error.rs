use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphqlError {
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
}

impl GraphqlError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: None,
            path: Vec::new(),
        }
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn classification(&self) -> ErrorClassification {
        ErrorClassification::from_error_type(self.error_type.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    Unauthorized,
    Validation,
    Other,
}

impl ErrorClassification {
    pub fn from_error_type(error_type: Option<&str>) -> Self {
        let Some(error_type) = error_type else {
            return ErrorClassification::Other;
        };
        let lower = error_type.to_ascii_lowercase();
        if lower.starts_with("unauthorized") || lower.ends_with("unauthorizedexception") {
            ErrorClassification::Unauthorized
        } else if lower.contains("validation") || lower == "badrequest" {
            ErrorClassification::Validation
        } else {
            ErrorClassification::Other
        }
    }
}

/// A failed GraphQL call: zero or more structured sub-errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", summarize(.errors))]
pub struct RemoteError {
    pub errors: Vec<GraphqlError>,
}

impl RemoteError {
    pub fn new(errors: Vec<GraphqlError>) -> Self {
        Self { errors }
    }

    pub fn first(&self) -> Option<&GraphqlError> {
        self.errors.first()
    }
}

fn summarize(errors: &[GraphqlError]) -> String {
    match errors {
        [] => "remote call failed without error details".to_string(),
        [only] => only.message.clone(),
        [first, rest @ ..] => format!("{} (+{} more)", first.message, rest.len()),
    }
}
