use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::error;
use zensor_types::ZensorError;

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Zensor(ZensorError),
    /// The operation exists but this daemon is configured not to allow it.
    Forbidden(String),
}

impl From<ZensorError> for ApiError {
    fn from(err: ZensorError) -> Self {
        Self::Zensor(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        let err = match self {
            Self::Zensor(err) => err,
            Self::Forbidden(_) => return StatusCode::FORBIDDEN,
        };

        match err {
            ZensorError::InvalidProof(_)
            | ZensorError::Serialization(_)
            | ZensorError::InvalidSeed(_) => StatusCode::BAD_REQUEST,
            ZensorError::NotAMember(_) => StatusCode::FORBIDDEN,
            ZensorError::GroupNotFound(_) | ZensorError::UnknownLeaf { .. } => {
                StatusCode::NOT_FOUND
            }
            ZensorError::DuplicateNullifier { .. } | ZensorError::CapacityExceeded { .. } => {
                StatusCode::CONFLICT
            }
            ZensorError::StaleRoot { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ZensorError::BackendUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ZensorError::Network(_) => StatusCode::BAD_GATEWAY,
            ZensorError::Crypto(_)
            | ZensorError::Circuit(_)
            | ZensorError::Storage(_)
            | ZensorError::Config(_)
            | ZensorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Zensor(err) => err.code(),
            Self::Forbidden(_) => "FORBIDDEN",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let message = match self {
            Self::Zensor(err) if self.status().is_server_error() && !err.is_transient() => {
                "An internal error occurred".to_string()
            }
            Self::Zensor(err) => err.to_string(),
            Self::Forbidden(reason) => reason.clone(),
        };

        ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let Self::Zensor(err) = &self {
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!(error = %err, "Request failed");
            }
        }
        (status, Json(self.body())).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_statuses() {
        let cases = [
            (ZensorError::InvalidProof("bad".into()), StatusCode::BAD_REQUEST),
            (
                ZensorError::DuplicateNullifier {
                    group_id: "g".into(),
                    nullifier: "00".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ZensorError::StaleRoot {
                    group_id: "g".into(),
                    root: "00".into(),
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ZensorError::NotAMember("g".into()), StatusCode::FORBIDDEN),
            (ZensorError::GroupNotFound("g".into()), StatusCode::NOT_FOUND),
            (
                ZensorError::BackendUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_body_uses_error_code() {
        let body = ApiError::from(ZensorError::StaleRoot {
            group_id: "g".into(),
            root: "ab".into(),
        })
        .body();
        assert_eq!(body.error.code, "STALE_ROOT");
        assert!(body.error.message.contains("ab"));
    }

    #[test]
    fn test_internal_message_hidden() {
        let body = ApiError::from(ZensorError::Storage("/var/lib/zensor: EIO".into())).body();
        assert_eq!(body.error.code, "STORAGE_ERROR");
        assert!(!body.error.message.contains("/var/lib"));

        let json = serde_json::to_value(&body).unwrap();
        assert!(json["error"]["message"].is_string());
    }

    #[test]
    fn test_forbidden() {
        let err = ApiError::Forbidden("registration disabled".into());
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.body().error.code, "FORBIDDEN");
        assert_eq!(err.body().error.message, "registration disabled");
    }
}
