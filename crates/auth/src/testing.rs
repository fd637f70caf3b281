//! In-crate fixture store for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use labtrack_core::{Email, Matricule, RoleId, UserId};

use crate::{
    CredentialStore, Permission, PermissionSet, RoleGrants, RoleName, SecretHasher, StoreError,
    StoreResult, StoredIdentity,
};

#[derive(Default)]
pub(crate) struct FixtureStore {
    identities: RwLock<HashMap<String, StoredIdentity>>,
    roles: RwLock<HashMap<RoleId, RoleGrants>>,
    pub(crate) role_lookups: AtomicUsize,
    pub(crate) fail: AtomicBool,
}

impl FixtureStore {
    pub(crate) fn add_role(&self, name: RoleName, permissions: impl IntoIterator<Item = Permission>) -> RoleId {
        let role_id = RoleId::new();
        self.roles.write().unwrap().insert(
            role_id,
            RoleGrants {
                role_id,
                role_name: name,
                permissions: permissions.into_iter().collect(),
            },
        );
        role_id
    }

    pub(crate) fn set_permissions(&self, role_id: RoleId, permissions: PermissionSet) {
        if let Some(role) = self.roles.write().unwrap().get_mut(&role_id) {
            role.permissions = permissions;
        }
    }

    pub(crate) fn remove_role(&self, role_id: RoleId) {
        self.roles.write().unwrap().remove(&role_id);
    }

    pub(crate) fn add_identity(&self, email: &str, secret: &str, role_id: RoleId) -> UserId {
        let role_name = self.roles.read().unwrap()[&role_id].role_name.clone();
        let id = UserId::new();
        let email = Email::parse(email).unwrap();
        self.identities.write().unwrap().insert(
            email.as_str().to_string(),
            StoredIdentity {
                id,
                email,
                matricule: Matricule::parse("TST001").unwrap(),
                first_name: "Test".to_string(),
                last_name: "User".to_string(),
                password_hash: SecretHasher::low_cost().hash(secret).unwrap(),
                role_id,
                role_name,
            },
        );
        id
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FixtureStore {
    async fn find_identity_by_login_handle(&self, handle: &str) -> StoreResult<Option<StoredIdentity>> {
        self.check_available()?;
        Ok(self.identities.read().unwrap().get(handle).cloned())
    }

    async fn find_role_with_permissions(&self, role_id: RoleId) -> StoreResult<Option<RoleGrants>> {
        self.check_available()?;
        self.role_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.roles.read().unwrap().get(&role_id).cloned())
    }
}
