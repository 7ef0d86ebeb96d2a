use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("too many sessions for subject {subject}")]
    TooManySessions { subject: String, redirect: String },

    #[error("session expired")]
    SessionExpired { redirect: String },

    #[error("identity verifier unavailable: {0}")]
    VerifierUnavailable(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<anyhow::Error> for GateError {
    fn from(e: anyhow::Error) -> Self {
        GateError::InternalError(e.to_string())
    }
}

impl GateError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Fail closed: an unreachable verifier denies exactly like a bad credential.
            Self::Unauthorized(_) | Self::VerifierUnavailable(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::TooManySessions { .. } | Self::SessionExpired { .. } => StatusCode::FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::TooManySessions { .. } => "TOO_MANY_SESSIONS",
            Self::SessionExpired { .. } => "SESSION_EXPIRED",
            Self::VerifierUnavailable(_) => "VERIFIER_UNAVAILABLE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::InternalError(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Redirect target for kinds that send the client elsewhere instead of a bare status.
    pub fn redirect(&self) -> Option<&str> {
        match self {
            Self::TooManySessions { redirect, .. } | Self::SessionExpired { redirect } => {
                Some(redirect.as_str())
            }
            _ => None,
        }
    }

    /// Whether the error is one of the gate's admission failures
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized(_)
                | Self::Forbidden(_)
                | Self::TooManySessions { .. }
                | Self::SessionExpired { .. }
                | Self::VerifierUnavailable(_)
        )
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let location = self
            .redirect()
            .and_then(|target| HeaderValue::from_str(target).ok());
        let body = Json(json!({
            "error": self.error_code(),
            "message": self.to_string(),
        }));

        let mut response = (status, body).into_response();
        if let Some(location) = location {
            response.headers_mut().insert(header::LOCATION, location);
        }
        if matches!(self, Self::Unauthorized(_) | Self::VerifierUnavailable(_)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifier_unavailable_is_a_denial() {
        let err = GateError::VerifierUnavailable("timeout".to_string());
        assert!(err.is_denial());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_too_many_sessions_redirects() {
        let err = GateError::TooManySessions {
            subject: "u".to_string(),
            redirect: "/login/expired".to_string(),
        };
        assert_eq!(err.redirect(), Some("/login/expired"));

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login/expired"
        );
    }

    #[test]
    fn test_unauthorized_carries_challenge() {
        let response = GateError::Unauthorized("missing credential".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[test]
    fn test_config_error_is_not_a_denial() {
        let err = GateError::ConfigError("bad".to_string());
        assert!(!err.is_denial());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
