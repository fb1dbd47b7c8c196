use serde::Serialize;
use uuid::Uuid;

use crate::validation::Violations;

#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(Violations),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(
        #[from]
        #[serde(skip)]
        anyhow::Error,
    ),
}

impl From<Violations> for ServiceError {
    fn from(violations: Violations) -> Self {
        ServiceError::Validation(violations)
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(Violations::from(err))
    }
}

impl ServiceError {
    /// Shorthand for a missing record of the given kind.
    pub fn not_found(kind: &str, id: Uuid) -> Self {
        ServiceError::NotFound(format!("{} with ID {} not found", kind, id))
    }

    /// Whether the caller can fix the request and retry it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::Validation(_)
                | Self::InvalidOperation(_)
                | Self::InvalidInput(_)
                | Self::Conflict(_)
        )
    }

    /// Returns the violations carried by a validation failure.
    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Validation(violations) => Some(violations),
            _ => None,
        }
    }

    /// Message suitable for showing to an end user.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Config(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Violation;

    #[test]
    fn validation_error_exposes_violations() {
        let violations = Violations::from(vec![Violation::new(
            "code",
            "Required",
            "Code is required",
        )]);
        let err = ServiceError::from(violations);

        let carried = err.violations().expect("violations expected");
        assert_eq!(carried.len(), 1);
        assert!(carried.has_rule("Required"));
        assert!(err.is_recoverable());
    }

    #[test]
    fn response_message_hides_internal_details() {
        assert_eq!(
            ServiceError::InternalError("lock poisoned".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::Config("missing file".into()).response_message(),
            "Internal server error"
        );
        assert_eq!(
            ServiceError::NotFound("Material not found".into()).response_message(),
            "Not found: Material not found"
        );
    }

    #[test]
    fn not_found_names_kind_and_id() {
        let id = Uuid::nil();
        let err = ServiceError::not_found("WorkOrder", id);
        assert_eq!(
            err.to_string(),
            format!("Not found: WorkOrder with ID {} not found", id)
        );
        assert!(!ServiceError::InternalError("x".into()).is_recoverable());
    }

    #[test]
    fn foreign_errors_are_internal() {
        let err: ServiceError = anyhow::anyhow!("disk full").into();
        assert!(!err.is_recoverable());
        assert_eq!(err.response_message(), "Internal server error");
    }
}
