use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use desk_orchestrator::{OrchestratorError, ProvisionError};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

fn is_transient(err: &OrchestratorError) -> bool {
    matches!(
        err,
        OrchestratorError::Unavailable(_) | OrchestratorError::Cancelled
    )
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        if is_transient(&err) {
            ApiError::Unavailable(err.to_string())
        } else {
            ApiError::Internal(err.to_string())
        }
    }
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match &err {
            ProvisionError::NameConflict { .. } | ProvisionError::CredentialMissing(_) => {
                ApiError::Conflict(err.to_string())
            }
            ProvisionError::Cancelled { .. } => ApiError::Unavailable(err.to_string()),
            ProvisionError::Orchestrator(source)
            | ProvisionError::PartialProvisioning { source, .. }
                if is_transient(source) =>
            {
                ApiError::Unavailable(err.to_string())
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use desk_orchestrator::{ResourceKind, ResourceNamer, RollbackReport, UserId};

    #[test]
    fn test_name_conflict_is_409() {
        let err = ProvisionError::NameConflict {
            kind: ResourceKind::ComputeUnit,
            name: ResourceNamer::default().name(&UserId::from(1)),
            rollback: RollbackReport::default(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_transient_partial_failure_is_503() {
        let err = ProvisionError::PartialProvisioning {
            step: ResourceKind::Route,
            source: OrchestratorError::Unavailable("down".to_string()),
            rollback: RollbackReport::default(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_rejected_partial_failure_is_500() {
        let err = ProvisionError::PartialProvisioning {
            step: ResourceKind::Route,
            source: OrchestratorError::Rejected("invalid".to_string()),
            rollback: RollbackReport::default(),
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
