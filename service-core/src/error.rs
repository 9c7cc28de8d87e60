use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

/// Stable machine-readable rejection codes shared with API consumers.
///
/// The code set and its status mapping are a wire contract: 401 for every
/// credential/identity failure, 403 for authorization failures, 500 for
/// infrastructure failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "INVALID_TOKEN_TYPE")]
    InvalidTokenType,
    #[serde(rename = "TOKEN_EXPIRED")]
    TokenExpired,
    #[serde(rename = "TOKEN_INVALID")]
    TokenInvalid,
    #[serde(rename = "TOKEN_BLACKLISTED")]
    TokenBlacklisted,
    #[serde(rename = "USER_INVALID")]
    UserInvalid,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "AUTH_ERROR")]
    AuthError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::AuthError => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::InvalidTokenType => "INVALID_TOKEN_TYPE",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::TokenInvalid => "TOKEN_INVALID",
            ErrorCode::TokenBlacklisted => "TOKEN_BLACKLISTED",
            ErrorCode::UserInvalid => "USER_INVALID",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::AuthError => "AUTH_ERROR",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing or invalid Authorization header")]
    MissingCredential,

    #[error("Wrong token kind: {0}")]
    WrongTokenKind(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    TokenInvalid(anyhow::Error),

    #[error("Token has been revoked")]
    TokenRevoked,

    #[error("User account is invalid or disabled")]
    PrincipalInvalid,

    #[error("Forbidden: {0}")]
    Forbidden(anyhow::Error),

    #[error("Internal authorization error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Cache error: {0}")]
    CacheError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::MissingCredential => ErrorCode::Unauthorized,
            AppError::WrongTokenKind(_) => ErrorCode::InvalidTokenType,
            AppError::TokenExpired => ErrorCode::TokenExpired,
            AppError::TokenInvalid(_) => ErrorCode::TokenInvalid,
            AppError::TokenRevoked => ErrorCode::TokenBlacklisted,
            AppError::PrincipalInvalid => ErrorCode::UserInvalid,
            AppError::Forbidden(_) => ErrorCode::Forbidden,
            AppError::InternalError(_)
            | AppError::DatabaseError(_)
            | AppError::CacheError(_)
            | AppError::ConfigError(_) => ErrorCode::AuthError,
        }
    }

    /// Whether this is a credential-layer failure (as opposed to an
    /// authorization or infrastructure failure). The optional-auth path
    /// swallows exactly these.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            AppError::MissingCredential
                | AppError::WrongTokenKind(_)
                | AppError::TokenExpired
                | AppError::TokenInvalid(_)
                | AppError::TokenRevoked
                | AppError::PrincipalInvalid
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError(anyhow::Error::new(err))
    }
}

/// Uniform rejection payload returned on every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "errorCode")]
    pub error_code: ErrorCode,
    pub message: String,
    pub timestamp: chrono::DateTime<Utc>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();

        // Infrastructure failures are logged with full context and surface
        // as a generic message, never downgraded to a permission failure.
        let message = match &self {
            AppError::InternalError(err)
            | AppError::DatabaseError(err)
            | AppError::CacheError(err)
            | AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Authorization infrastructure error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (
            code.status(),
            Json(ErrorBody {
                error_code: code,
                message,
                timestamp: Utc::now(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_errors_map_to_401() {
        for err in [
            AppError::MissingCredential,
            AppError::WrongTokenKind("refresh".to_string()),
            AppError::TokenExpired,
            AppError::TokenInvalid(anyhow::anyhow!("bad signature")),
            AppError::TokenRevoked,
            AppError::PrincipalInvalid,
        ] {
            assert_eq!(err.code().status(), StatusCode::UNAUTHORIZED);
            assert!(err.is_credential_error());
        }
    }

    #[test]
    fn test_forbidden_maps_to_403() {
        let err = AppError::Forbidden(anyhow::anyhow!("missing permission"));
        assert_eq!(err.code(), ErrorCode::Forbidden);
        assert_eq!(err.code().status(), StatusCode::FORBIDDEN);
        assert!(!err.is_credential_error());
    }

    #[test]
    fn test_infrastructure_errors_map_to_500() {
        let err = AppError::DatabaseError(anyhow::anyhow!("connection refused"));
        assert_eq!(err.code(), ErrorCode::AuthError);
        assert_eq!(err.code().status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.is_credential_error());
    }

    #[test]
    fn test_error_code_wire_names() {
        assert_eq!(ErrorCode::TokenBlacklisted.as_str(), "TOKEN_BLACKLISTED");
        assert_eq!(ErrorCode::InvalidTokenType.as_str(), "INVALID_TOKEN_TYPE");
        assert_eq!(ErrorCode::UserInvalid.as_str(), "USER_INVALID");
    }
}
