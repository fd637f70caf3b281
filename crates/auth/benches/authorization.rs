use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use labtrack_auth::permissions::{MANAGE_INTERFACES, READ_INTERFACES, READ_USERS};
use labtrack_auth::{
    CredentialStore, CredentialVerifier, IdentityContext, PermissionResolver, RoleGrants, RoleName,
    SessionClaims, StoreResult, StoredIdentity, TokenCodec, require_permissions,
};
use labtrack_core::{RoleId, UserId};
use std::sync::Arc;

/// Store holding a single role; no I/O.
struct SingleRoleStore {
    grants: RoleGrants,
}

#[async_trait]
impl CredentialStore for SingleRoleStore {
    async fn find_identity_by_login_handle(&self, _handle: &str) -> StoreResult<Option<StoredIdentity>> {
        Ok(None)
    }

    async fn find_role_with_permissions(&self, role_id: RoleId) -> StoreResult<Option<RoleGrants>> {
        Ok((role_id == self.grants.role_id).then(|| self.grants.clone()))
    }
}

fn setup() -> (Arc<SingleRoleStore>, IdentityContext) {
    let role_id = RoleId::new();
    let store = Arc::new(SingleRoleStore {
        grants: RoleGrants {
            role_id,
            role_name: RoleName::USER,
            permissions: [READ_INTERFACES, READ_USERS].into_iter().collect(),
        },
    });
    let ctx = IdentityContext::new(UserId::new(), role_id, RoleName::USER, Utc::now());
    (store, ctx)
}

fn bench_verify_token(c: &mut Criterion) {
    let codec = Arc::new(TokenCodec::hs256(b"bench-secret").unwrap());
    let now = Utc::now();
    let claims = SessionClaims::new(UserId::new(), RoleId::new(), RoleName::USER, now, Duration::hours(1));
    let header = format!("Bearer {}", codec.encode(&claims).unwrap());
    let verifier = CredentialVerifier::new(codec);

    c.bench_function("verify_bearer_token", |b| {
        b.iter(|| verifier.verify(black_box(Some(header.as_str())), now).unwrap())
    });
}

fn bench_authorize(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    let (store, ctx) = setup();

    let mut group = c.benchmark_group("authorize");
    for (label, ttl) in [("uncached", std::time::Duration::ZERO), ("cached", std::time::Duration::from_secs(30))] {
        let resolver = PermissionResolver::cached(store.clone(), ttl);
        let allowed = require_permissions([READ_INTERFACES]);
        let denied = require_permissions([READ_INTERFACES, MANAGE_INTERFACES]);

        group.bench_with_input(BenchmarkId::new("allow", label), &allowed, |b, req| {
            b.iter(|| rt.block_on(resolver.authorize(black_box(&ctx), req)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("deny", label), &denied, |b, req| {
            b.iter(|| rt.block_on(resolver.authorize(black_box(&ctx), req)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_verify_token, bench_authorize);
criterion_main!(benches);
