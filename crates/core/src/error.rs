use std::fmt;

/// Errors surfaced to callers of [`crate::service::StockService`].
///
/// Parse problems and single-record storage failures during ingestion never reach this type;
/// they are absorbed and logged where they happen.
#[derive(Debug)]
pub enum ServiceError {
    NotFound(String),
    Validation(String),
    Internal(anyhow::Error),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotFound(what) => write!(f, "{what} not found"),
            ServiceError::Validation(detail) => write!(f, "invalid request: {detail}"),
            ServiceError::Internal(err) => write!(f, "internal error: {err:#}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::Internal(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(err)
    }
}
