//! API key gate for the difficulty endpoint.
//!
//! The valid key set lives in the `VALID_API_KEYS` environment variable as a
//! comma-separated list. It is read through the [`CredentialSource`] trait on
//! every request, so an operator edit takes effect without a restart and the
//! test suite can substitute a fixture.

use std::collections::HashSet;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Header carrying the caller's credential.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Source of the raw comma-separated credential list.
pub trait CredentialSource: Send + Sync {
    /// The raw configured value, or `None` when unset. Called per request.
    fn raw_keys(&self) -> Option<String>;
}

/// Production source: reads `VALID_API_KEYS` from the process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvCredentials;

impl CredentialSource for EnvCredentials {
    fn raw_keys(&self) -> Option<String> {
        std::env::var("VALID_API_KEYS").ok()
    }
}

/// Authorization failures, each with a distinct HTTP mapping. Missing header,
/// wrong value and missing server configuration are deliberately separate
/// cases: the first two are caller errors, the last is an operator error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `X-API-Key` header was supplied at all.
    #[error("Not authenticated")]
    Unauthenticated,
    /// A key was supplied but is not in the configured set.
    #[error("Invalid API Key")]
    InvalidCredential,
    /// `VALID_API_KEYS` is absent or empty; nobody can authenticate.
    #[error("Server misconfiguration: VALID_API_KEYS not set")]
    Misconfigured,
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::FORBIDDEN,
            AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AuthError::Misconfigured => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "detail": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Proof of a passed gate. The accepted token is carried but not used further.
#[derive(Debug, Clone)]
pub struct Authorized(pub String);

/// Validate a presented key against the configured set.
///
/// Configuration is checked before the credential: with no usable key set the
/// outcome is [`AuthError::Misconfigured`] regardless of what, if anything,
/// the caller presented. Nothing is cached between calls.
pub fn authorize(
    presented: Option<&str>,
    source: &dyn CredentialSource,
) -> Result<Authorized, AuthError> {
    let raw = source
        .raw_keys()
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::Misconfigured)?;
    let presented = presented.ok_or(AuthError::Unauthenticated)?;

    let valid: HashSet<&str> = raw.split(',').collect();
    if valid.contains(presented) {
        Ok(Authorized(presented.to_string()))
    } else {
        Err(AuthError::InvalidCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedKeys(Option<&'static str>);

    impl CredentialSource for FixedKeys {
        fn raw_keys(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    #[test]
    fn accepts_member_of_comma_separated_set() {
        let source = FixedKeys(Some("alpha,beta,gamma"));
        let ok = authorize(Some("beta"), &source).unwrap();
        assert_eq!(ok.0, "beta");
    }

    #[test]
    fn rejects_unknown_key() {
        let source = FixedKeys(Some("alpha"));
        let err = authorize(Some("beta"), &source).unwrap_err();
        assert_eq!(err, AuthError::InvalidCredential);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn missing_header_is_distinct_from_wrong_value() {
        let source = FixedKeys(Some("alpha"));
        let err = authorize(None, &source).unwrap_err();
        assert_eq!(err, AuthError::Unauthenticated);
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unset_configuration_wins_over_presented_key() {
        let source = FixedKeys(None);
        assert_eq!(
            authorize(Some("anything"), &source).unwrap_err(),
            AuthError::Misconfigured
        );
        assert_eq!(authorize(None, &source).unwrap_err(), AuthError::Misconfigured);
    }

    #[test]
    fn empty_configuration_is_misconfiguration() {
        let source = FixedKeys(Some(""));
        let err = authorize(Some("anything"), &source).unwrap_err();
        assert_eq!(err, AuthError::Misconfigured);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.to_string(),
            "Server misconfiguration: VALID_API_KEYS not set"
        );
    }

    #[test]
    fn key_must_match_exactly_not_substring() {
        let source = FixedKeys(Some("longkey"));
        assert!(authorize(Some("long"), &source).is_err());
        assert!(authorize(Some("longkey "), &source).is_err());
    }
}
