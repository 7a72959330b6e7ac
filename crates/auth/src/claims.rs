use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use invoicechain_core::Address;

/// Bearer-token claims (transport-agnostic).
///
/// `sub` is the account address the caller acts as; every registry call made
/// with this token runs with that address as the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerClaims {
    /// Subject: caller account address.
    pub sub: Address,

    /// Issued-at timestamp.
    pub issued_at: DateTime<Utc>,

    /// Expiration timestamp.
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

    #[error("token subject is the zero address")]
    ZeroSubject,
}

/// Deterministically validate token claims.
///
/// Checks the claims only; signature verification lives in [`crate::jwt`].
pub fn validate_claims(
    claims: &CallerClaims,
    now: DateTime<Utc>,
) -> Result<(), TokenValidationError> {
    if claims.sub.is_zero() {
        return Err(TokenValidationError::ZeroSubject);
    }
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
    use super::*;
    use chrono::Duration;

    fn claims(now: DateTime<Utc>) -> CallerClaims {
        CallerClaims {
            sub: Address::repeat_byte(0xa1),
            issued_at: now,
            expires_at: now + Duration::minutes(10),
        }
    }

    #[test]
    fn accepts_tokens_inside_their_window() {
        let now = Utc::now();
        assert_eq!(validate_claims(&claims(now), now + Duration::minutes(1)), Ok(()));
    }

    #[test]
    fn rejects_expired_and_future_tokens() {
        let now = Utc::now();
        assert_eq!(
            validate_claims(&claims(now), now + Duration::minutes(10)),
            Err(TokenValidationError::Expired)
        );
        assert_eq!(
            validate_claims(&claims(now), now - Duration::seconds(1)),
            Err(TokenValidationError::NotYetValid)
        );
    }

    #[test]
    fn rejects_zero_subject_and_inverted_window() {
        let now = Utc::now();
        let mut c = claims(now);
        c.sub = Address::ZERO;
        assert_eq!(validate_claims(&c, now), Err(TokenValidationError::ZeroSubject));

        let mut c = claims(now);
        c.expires_at = c.issued_at;
        assert_eq!(
            validate_claims(&c, now),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
