//! Service wiring: store backend, credential issuer/verifier, permission
//! resolver and the session revocation list.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use labtrack_auth::{
    CredentialIssuer, CredentialStore, CredentialVerifier, PermissionResolver, RevocationList,
    SecretHasher, TokenCodec,
};
use labtrack_core::UserId;
use labtrack_infra::{AppConfig, InMemoryStore, LabtrackStore, StoreBackend, seed};

/// Shared, process-wide application services.
pub struct AppServices {
    pub store: Arc<dyn LabtrackStore>,
    pub issuer: CredentialIssuer,
    pub verifier: CredentialVerifier,
    pub resolver: PermissionResolver,
    pub revocations: RevocationList,
    pub hasher: SecretHasher,
}

impl AppServices {
    pub fn new<S>(store: Arc<S>, config: &AppConfig, hasher: SecretHasher) -> anyhow::Result<Self>
    where
        S: LabtrackStore + 'static,
    {
        let codec = Arc::new(TokenCodec::hs256(config.jwt_secret.as_bytes())?);
        let credentials: Arc<dyn CredentialStore> = store.clone();

        let issuer = CredentialIssuer::new(credentials.clone(), codec.clone(), hasher.clone(), config.session_ttl)?;
        let verifier = CredentialVerifier::new(codec);
        let resolver = PermissionResolver::cached(credentials, config.permission_cache_ttl);
        let revocations = RevocationList::new(config.session_ttl);

        Ok(Self {
            store,
            issuer,
            verifier,
            resolver,
            revocations,
            hasher,
        })
    }

    /// Invalidate every session `identity_id` was issued before this second.
    pub fn revoke_sessions(&self, identity_id: UserId) {
        self.revocations.revoke(identity_id, Utc::now());
        tracing::info!(identity_id = %identity_id, "sessions revoked");
    }

    /// Sign-out: the presented token dies outright, earlier sessions with it.
    pub fn end_session(&self, identity_id: UserId, token: &str) {
        let now = Utc::now();
        self.revocations.revoke_token(token, now);
        self.revocations.revoke(identity_id, now);
        tracing::info!(identity_id = %identity_id, "signed out");
    }

    /// Hash a new secret off the async executor.
    pub async fn hash_secret(&self, plaintext: String) -> anyhow::Result<String> {
        let hasher = self.hasher.clone();
        let phc = tokio::task::spawn_blocking(move || hasher.hash(&plaintext)).await??;
        Ok(phc)
    }
}

/// Build services for the configured backend, seeding demo data if asked.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let hasher = SecretHasher::default();

    match &config.backend {
        StoreBackend::InMemory => {
            let store = Arc::new(InMemoryStore::new());
            if config.seed_demo_data {
                seed::seed_demo_data(store.as_ref(), &hasher).await?;
            } else {
                seed::seed_catalog(store.as_ref()).await?;
            }
            tracing::info!("using in-memory store");
            AppServices::new(store, config, hasher)
        }
        #[cfg(feature = "postgres")]
        StoreBackend::Postgres { database_url } => {
            let store = Arc::new(labtrack_infra::PostgresStore::connect(database_url).await?);
            store.apply_schema().await?;
            if config.seed_demo_data {
                seed::seed_demo_data(store.as_ref(), &hasher).await?;
            } else {
                seed::seed_catalog(store.as_ref()).await?;
            }
            tracing::info!("using postgres store");
            AppServices::new(store, config, hasher)
        }
        #[cfg(not(feature = "postgres"))]
        StoreBackend::Postgres { .. } => {
            anyhow::bail!("USE_PERSISTENT_STORES=true but the postgres feature is not enabled")
        }
    }
}

/// Periodically drop revocation entries older than one token lifetime.
pub fn spawn_revocation_sweeper(services: Arc<AppServices>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        loop {
            ticker.tick().await;
            let purged = services.revocations.purge_expired(Utc::now());
            if purged > 0 {
                tracing::debug!(purged, "expired revocations purged");
            }
        }
    })
}
