//! Token claims and the token engine collaborator.
//!
//! Signing and verification live behind [`TokenEngine`]; this module only
//! defines the claim shapes issued by the platform's OAuth2 server and the
//! checks any engine is expected to apply to them.

use crate::identity::{ParseUserIdError, ScopeSet, UserId, UserRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Claim-level validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClaimsError {
    /// `exp` is in the past.
    #[error("token expired")]
    Expired,

    /// `nbf` is in the future.
    #[error("token not yet valid")]
    NotYetValid,

    /// A claim that must hold a numeric id does not.
    #[error("invalid token format: invalid {claim}")]
    InvalidFormat {
        /// Name of the offending claim.
        claim: &'static str,
    },

    /// The subject is not a user id.
    #[error(transparent)]
    InvalidSubject(#[from] ParseUserIdError),
}

/// Errors a [`TokenEngine`] may raise.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The credential is not a token the engine understands.
    #[error("malformed token: {0}")]
    Malformed(String),

    /// The signature did not verify.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The claims failed validation.
    #[error(transparent)]
    Claims(#[from] ClaimsError),

    /// The engine itself failed.
    #[error("token engine failure: {0}")]
    Engine(String),
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Registered claims shared by every token kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardClaims {
    /// Token id.
    #[serde(rename = "jti", default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Issuer.
    #[serde(rename = "iss", default, skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    /// Audience.
    #[serde(rename = "aud", default, skip_serializing_if = "String::is_empty")]
    pub audience: String,
    /// Subject, a decimal user id.
    #[serde(rename = "sub", default, skip_serializing_if = "String::is_empty")]
    pub subject: String,
    /// Expiry, seconds since the epoch. Zero means no expiry.
    #[serde(rename = "exp", default, skip_serializing_if = "is_zero")]
    pub expires_at: i64,
    /// Not-before, seconds since the epoch. Zero means no lower bound.
    #[serde(rename = "nbf", default, skip_serializing_if = "is_zero")]
    pub not_before: i64,
}

impl StandardClaims {
    /// Checks `exp` and `nbf` against `now`.
    pub fn check_time_window(&self, now: DateTime<Utc>) -> Result<(), ClaimsError> {
        let now = now.timestamp();
        if self.expires_at != 0 && self.expires_at < now {
            return Err(ClaimsError::Expired);
        }
        if self.not_before != 0 && self.not_before > now {
            return Err(ClaimsError::NotYetValid);
        }
        Ok(())
    }

    /// Checks the time window and the shape of `jti` and `sub`.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ClaimsError> {
        self.check_time_window(now)?;
        if self.id.parse::<u64>().is_err() {
            return Err(ClaimsError::InvalidFormat { claim: "jti" });
        }
        if self.subject.parse::<u64>().is_err() {
            return Err(ClaimsError::InvalidFormat { claim: "sub" });
        }
        Ok(())
    }

    /// Decodes the subject as a user id.
    pub fn subject_id(&self) -> Result<UserId, ClaimsError> {
        Ok(self.subject.parse::<UserId>()?)
    }
}

/// Claims of an OAuth2 access token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Registered claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: String,
}

impl AccessTokenClaims {
    /// Returns the granted scopes.
    #[must_use]
    pub fn scopes(&self) -> ScopeSet {
        ScopeSet::parse(&self.scope)
    }
}

/// Claims of an OAuth2 refresh token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    /// Registered claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Rotation sequence number.
    #[serde(rename = "seq", default)]
    pub sequence_number: u64,
    /// Space-separated granted scopes.
    #[serde(default)]
    pub scope: String,
}

/// Claims of an OpenID Connect id token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Registered claims.
    #[serde(flatten)]
    pub standard: StandardClaims,
    /// Login name.
    pub username: String,
    /// Display name.
    pub display_name: String,
    /// Role of the user.
    pub role: UserRole,
}

/// Verifies bearer credentials.
///
/// Implementations are shared across requests and must be thread safe.
pub trait TokenEngine: Send + Sync + fmt::Debug {
    /// The scheme credentials must carry, compared case-sensitively.
    fn declared_scheme(&self) -> &str;

    /// Validates the credential value (without the scheme).
    ///
    /// `Ok(None)` means the token was well-formed but not acceptable, for
    /// instance expired.
    fn validate(&self, credential: &str) -> Result<Option<AccessTokenClaims>, TokenError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_time_window() {
        let claims = StandardClaims {
            expires_at: 2_000,
            not_before: 1_000,
            ..StandardClaims::default()
        };
        assert_eq!(claims.check_time_window(at(1_500)), Ok(()));
        assert_eq!(claims.check_time_window(at(2_001)), Err(ClaimsError::Expired));
        assert_eq!(claims.check_time_window(at(999)), Err(ClaimsError::NotYetValid));
        assert_eq!(StandardClaims::default().check_time_window(at(0)), Ok(()));
    }

    #[test]
    fn test_validate_checks_ids() {
        let mut claims = StandardClaims {
            id: "17".into(),
            subject: "42".into(),
            ..StandardClaims::default()
        };
        assert_eq!(claims.validate(at(0)), Ok(()));

        claims.subject = "alice".into();
        assert_eq!(
            claims.validate(at(0)),
            Err(ClaimsError::InvalidFormat { claim: "sub" })
        );

        claims.id = String::new();
        assert_eq!(
            claims.validate(at(0)),
            Err(ClaimsError::InvalidFormat { claim: "jti" })
        );
    }

    #[test]
    fn test_subject_id() {
        let claims = StandardClaims {
            subject: "42".into(),
            ..StandardClaims::default()
        };
        assert_eq!(claims.subject_id().unwrap().get(), 42);

        let bad = StandardClaims {
            subject: "0".into(),
            ..StandardClaims::default()
        };
        assert!(matches!(bad.subject_id(), Err(ClaimsError::InvalidSubject(_))));
    }

    #[test]
    fn test_access_token_wire_format() {
        let json = r#"{"jti":"1","sub":"42","exp":1700000000,"scope":"read write"}"#;
        let claims: AccessTokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.standard.subject, "42");
        assert_eq!(claims.standard.expires_at, 1_700_000_000);
        assert!(claims.scopes().contains("write"));

        let encoded = serde_json::to_value(&claims).unwrap();
        assert!(encoded.get("iss").is_none());
        assert!(encoded.get("nbf").is_none());
    }

    #[test]
    fn test_id_token_role() {
        let json = r#"{"sub":"7","username":"ann","display_name":"Ann","role":"admin"}"#;
        let claims: IdTokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.role, UserRole::Admin);
    }

    #[test]
    fn test_refresh_token_sequence() {
        let json = r#"{"jti":"9","seq":3,"scope":"offline"}"#;
        let claims: RefreshTokenClaims = serde_json::from_str(json).unwrap();
        assert_eq!(claims.sequence_number, 3);
        assert_eq!(claims.standard.id, "9");
    }
}
