//! Service-level error kinds, independent of transport.

use thiserror::Error;

use crate::coalesce::Aborted;
use crate::search::SearchError;
use crate::store::StoreError;
use crate::upstream::UpstreamError;

/// Errors surfaced by the catalogue service. The payloads are plain strings
/// and the type is `Clone`, so a coalesced failure can be handed to every
/// waiting caller.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadInput(String),

    #[error("{0}")]
    InvalidData(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    Unauthorised(String),

    #[error("{0}")]
    External(String),

    #[error("{0}")]
    SyncFailed(String),

    #[error("{0}")]
    SearchFailed(String),

    #[error("{0}")]
    PaginationExceeded(String),

    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable application code carried in error responses.
    pub fn app_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => "manhwa_not_found",
            ServiceError::BadInput(_) | ServiceError::Conflict(_) => "bad_input",
            ServiceError::InvalidData(_) => "invalid_manhwa_data",
            ServiceError::Validation(_) => "validation_failed",
            ServiceError::RateLimited(_) => "rate_limit_exceeded",
            ServiceError::Unauthorised(_) | ServiceError::External(_) => "external_api_error",
            ServiceError::SyncFailed(_) => "sync_failed",
            ServiceError::SearchFailed(_) => "manhwa_search_failed",
            ServiceError::PaginationExceeded(_) => "pagination_limit_exceeded",
            ServiceError::Transient(_) | ServiceError::Internal(_) => "internal_error",
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => ServiceError::NotFound(msg),
            StoreError::Conflict(msg) => ServiceError::Conflict(msg),
            StoreError::Invalid(msg) => ServiceError::InvalidData(msg),
            StoreError::Transient(msg) => ServiceError::Transient(msg),
        }
    }
}

impl From<UpstreamError> for ServiceError {
    fn from(e: UpstreamError) -> Self {
        match e {
            UpstreamError::RateLimited { .. } => ServiceError::RateLimited(e.to_string()),
            UpstreamError::BadInput(msg) => ServiceError::BadInput(msg),
            UpstreamError::NotFound(msg) => ServiceError::NotFound(msg),
            UpstreamError::Unauthorised(msg) => ServiceError::Unauthorised(msg),
            UpstreamError::PaginationLimitExceeded { .. } => {
                ServiceError::PaginationExceeded(e.to_string())
            }
            UpstreamError::Api { .. }
            | UpstreamError::Connection(_)
            | UpstreamError::Parse(_) => ServiceError::External(e.to_string()),
        }
    }
}

impl From<SearchError> for ServiceError {
    fn from(e: SearchError) -> Self {
        ServiceError::SearchFailed(e.to_string())
    }
}

impl From<Aborted> for ServiceError {
    fn from(_: Aborted) -> Self {
        ServiceError::Internal("coalesced request aborted".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_codes() {
        assert_eq!(
            ServiceError::NotFound("x".into()).app_code(),
            "manhwa_not_found"
        );
        assert_eq!(
            ServiceError::RateLimited("x".into()).app_code(),
            "rate_limit_exceeded"
        );
        assert_eq!(
            ServiceError::PaginationExceeded("x".into()).app_code(),
            "pagination_limit_exceeded"
        );
        assert_eq!(
            ServiceError::InvalidData("x".into()).app_code(),
            "invalid_manhwa_data"
        );
    }

    #[test]
    fn test_store_error_mapping() {
        let err: ServiceError = StoreError::NotFound("manhwa id 3".into()).into();
        assert!(matches!(err, ServiceError::NotFound(_)));
        let err: ServiceError = StoreError::Conflict("dup".into()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn test_upstream_error_mapping() {
        let err: ServiceError = UpstreamError::PaginationLimitExceeded {
            offset: 9_999,
            limit: 100,
        }
        .into();
        assert!(matches!(err, ServiceError::PaginationExceeded(_)));

        let err: ServiceError = UpstreamError::RateLimited {
            reason: "slow down".into(),
            retry_after_secs: Some(60),
        }
        .into();
        assert!(matches!(err, ServiceError::RateLimited(_)));
    }
}
