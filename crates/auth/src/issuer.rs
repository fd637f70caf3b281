//! Sign-in: exchange a login handle and secret for a session token.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    AuthError, CredentialStore, IdentitySummary, PasswordError, SecretHasher, SessionClaims,
    TokenCodec,
};

/// Default session validity window.
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(1);

/// Result of a successful sign-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSession {
    pub token: String,
    #[serde(skip)]
    pub claims: SessionClaims,
    pub identity_summary: IdentitySummary,
}

pub struct CredentialIssuer {
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    hasher: SecretHasher,
    ttl: Duration,
    // Verified against when the handle is unknown, so both failure paths do
    // the same amount of hashing work.
    dummy_hash: String,
}

impl CredentialIssuer {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        hasher: SecretHasher,
        ttl: Duration,
    ) -> Result<Self, PasswordError> {
        let dummy_hash = hasher.hash("labtrack-unknown-identity")?;
        Ok(Self {
            store,
            codec,
            hasher,
            ttl,
            dummy_hash,
        })
    }

    pub async fn issue(
        &self,
        login_handle: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, AuthError> {
        let handle = login_handle.trim().to_lowercase();
        if handle.is_empty() || secret.is_empty() {
            return Err(AuthError::MissingInput);
        }

        let identity = self
            .store
            .find_identity_by_login_handle(&handle)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "identity lookup failed during sign-in");
                AuthError::from(e)
            })?;

        let phc = match &identity {
            Some(found) => found.password_hash.clone(),
            None => self.dummy_hash.clone(),
        };
        let secret_matches = self.verify_secret(phc, secret.to_owned()).await?;

        let identity = match identity {
            Some(found) if secret_matches => found,
            _ => {
                tracing::warn!("sign-in rejected: invalid credentials");
                return Err(AuthError::InvalidCredentials);
            }
        };

        let claims = SessionClaims::new(
            identity.id,
            identity.role_id,
            identity.role_name.clone(),
            now,
            self.ttl,
        );
        let token = self
            .codec
            .encode(&claims)
            .map_err(|e| AuthError::internal(e.to_string()))?;

        tracing::info!(identity_id = %identity.id, role = %identity.role_name, "session issued");

        Ok(IssuedSession {
            token,
            claims,
            identity_summary: IdentitySummary::from(&identity),
        })
    }

    async fn verify_secret(&self, phc: String, secret: String) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&phc, &secret))
            .await
            .map_err(|e| AuthError::internal(format!("secret verification task failed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::permissions::READ_INTERFACES;
    use crate::testing::FixtureStore;
    use crate::RoleName;

    fn issuer(store: Arc<FixtureStore>) -> CredentialIssuer {
        let codec = Arc::new(TokenCodec::hs256(b"test-secret").unwrap());
        CredentialIssuer::new(store, codec, SecretHasher::low_cost(), DEFAULT_SESSION_TTL).unwrap()
    }

    #[tokio::test]
    async fn issues_token_carrying_current_role() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, [READ_INTERFACES]);
        let user_id = store.add_identity("user@labtrack.com", "password123", role_id);

        let now = Utc::now();
        let session = issuer(store).issue("User@LabTrack.com", "password123", now).await.unwrap();

        assert_eq!(session.claims.identity_id, user_id);
        assert_eq!(session.claims.role_id, role_id);
        assert_eq!(session.claims.role_name, RoleName::USER);
        assert_eq!(session.claims.expires_at - session.claims.issued_at, Duration::hours(1));
        assert_eq!(session.identity_summary.role, RoleName::USER);
    }

    #[tokio::test]
    async fn unknown_handle_and_wrong_secret_are_indistinguishable() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::USER, []);
        store.add_identity("user@labtrack.com", "password123", role_id);
        let issuer = issuer(store);

        let unknown = issuer.issue("nobody@labtrack.com", "password123", Utc::now()).await.unwrap_err();
        let wrong = issuer.issue("user@labtrack.com", "wrong", Utc::now()).await.unwrap_err();
        assert_eq!(unknown, AuthError::InvalidCredentials);
        assert_eq!(unknown, wrong);
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn missing_input_is_rejected_before_lookup() {
        let store = Arc::new(FixtureStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let issuer = issuer(store);

        assert_eq!(issuer.issue("", "x", Utc::now()).await.unwrap_err(), AuthError::MissingInput);
        assert_eq!(issuer.issue("  ", "x", Utc::now()).await.unwrap_err(), AuthError::MissingInput);
        assert_eq!(issuer.issue("a@b.c", "", Utc::now()).await.unwrap_err(), AuthError::MissingInput);
    }

    #[tokio::test]
    async fn store_failure_is_internal() {
        let store = Arc::new(FixtureStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let result = issuer(store).issue("user@labtrack.com", "password123", Utc::now()).await;
        assert!(matches!(result, Err(AuthError::Internal(_))));
    }

    #[tokio::test]
    async fn summary_never_exposes_the_hash() {
        let store = Arc::new(FixtureStore::default());
        let role_id = store.add_role(RoleName::ADMIN, []);
        store.add_identity("admin@labtrack.com", "password123", role_id);
        let session = issuer(store).issue("admin@labtrack.com", "password123", Utc::now()).await.unwrap();

        let body = serde_json::to_string(&session).unwrap();
        assert!(!body.contains("argon2"));
        assert!(body.contains("identitySummary"));
    }
}
