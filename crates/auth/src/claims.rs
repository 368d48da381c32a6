use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use devportal_core::UserId;

/// Bearer-token claims (transport-agnostic).
///
/// The subject is the acting user recorded as `created_by` / `changed_by`
/// on everything the request touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: UserId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("malformed or unsigned token: {0}")]
    Malformed(String),
}

/// Check the time window of already decoded claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    if claims.expires_at <= claims.issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn claims(issued_offset: i64, lifetime: i64) -> (JwtClaims, DateTime<Utc>) {
        let now = Utc::now();
        let issued_at = now + Duration::minutes(issued_offset);
        (
            JwtClaims {
                sub: UserId::new(),
                issued_at,
                expires_at: issued_at + Duration::minutes(lifetime),
            },
            now,
        )
    }

    #[test]
    fn window_checks() {
        let (ok, now) = claims(-1, 10);
        assert_eq!(validate_claims(&ok, now), Ok(()));

        let (expired, now) = claims(-20, 10);
        assert_eq!(validate_claims(&expired, now), Err(TokenValidationError::Expired));

        let (future, now) = claims(5, 10);
        assert_eq!(validate_claims(&future, now), Err(TokenValidationError::NotYetValid));

        let (inverted, now) = claims(-1, 0);
        assert_eq!(
            validate_claims(&inverted, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }

    #[test]
    fn subject_serializes_as_plain_uuid() {
        let (claims, _) = claims(0, 10);
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"].as_str().unwrap(), claims.sub.to_string());
    }
}
