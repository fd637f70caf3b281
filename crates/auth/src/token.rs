//! Compact-serialized, HMAC-signed session tokens (JWT, HS256).

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::SessionClaims;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing key must not be empty")]
    EmptyKey,

    #[error("token encoding failed: {0}")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("token rejected: {0}")]
    Rejected(#[source] jsonwebtoken::errors::Error),
}

/// Signs and verifies session claims with the server-held secret.
///
/// Only the signature (and algorithm) is checked here; the time window is
/// validated by [`crate::validate_claims`] against an explicit `now`.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl core::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("algorithm", &Algorithm::HS256)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn hs256(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptyKey);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        })
    }

    pub fn encode(&self, claims: &SessionClaims) -> Result<String, TokenError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(TokenError::Encode)
    }

    pub fn decode(&self, token: &str) -> Result<SessionClaims, TokenError> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use labtrack_core::{RoleId, UserId};

    use super::*;
    use crate::RoleName;

    fn claims() -> SessionClaims {
        SessionClaims::new(UserId::new(), RoleId::new(), RoleName::ADMIN, Utc::now(), Duration::hours(1))
    }

    #[test]
    fn token_has_three_segments() {
        let codec = TokenCodec::hs256(b"test-secret").unwrap();
        let token = codec.encode(&claims()).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn decode_returns_signed_claims() {
        let codec = TokenCodec::hs256(b"test-secret").unwrap();
        let claims = claims();
        let token = codec.encode(&claims).unwrap();
        assert_eq!(codec.decode(&token).unwrap(), claims);
    }

    #[test]
    fn token_signed_with_other_key_is_rejected() {
        let ours = TokenCodec::hs256(b"test-secret").unwrap();
        let theirs = TokenCodec::hs256(b"another-secret").unwrap();
        let token = theirs.encode(&claims()).unwrap();
        assert!(matches!(ours.decode(&token), Err(TokenError::Rejected(_))));
    }

    #[test]
    fn unsigned_token_is_rejected() {
        let codec = TokenCodec::hs256(b"test-secret").unwrap();
        let token = codec.encode(&claims()).unwrap();
        let mut parts = token.split('.');
        let (_, payload) = (parts.next().unwrap(), parts.next().unwrap());
        // {"alg":"none","typ":"JWT"}
        let forged = format!("eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.{payload}.");
        assert!(codec.decode(&forged).is_err());
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenCodec::hs256(b""), Err(TokenError::EmptyKey)));
    }
}
