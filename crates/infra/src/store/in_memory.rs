//! In-memory backend for tests and local development.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use labtrack_auth::{
    CredentialStore, Permission, PermissionSet, RoleGrants, RoleName, StoreError, StoreResult,
    StoredIdentity,
};
use labtrack_core::{Email, InterfaceId, LocationId, PermissionId, RoleId, UserId};

use super::{
    InterfaceChanges, InterfaceRecord, InterfaceRepository, LocationRecord, NewInterface, NewUser,
    PermissionRecord, RoleRecord, RoleRepository, UserChanges, UserRecord, UserRepository,
};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, UserRecord>,
    roles: HashMap<RoleId, RoleRecord>,
    grants: HashMap<RoleId, PermissionSet>,
    permissions: BTreeMap<Permission, PermissionRecord>,
    locations: HashMap<LocationId, LocationRecord>,
    interfaces: HashMap<InterfaceId, InterfaceRecord>,
}

impl State {
    fn role_grants(&self, role_id: RoleId) -> Option<RoleGrants> {
        let role = self.roles.get(&role_id)?;
        Some(RoleGrants {
            role_id,
            role_name: role.name.clone(),
            permissions: self.grants.get(&role_id).cloned().unwrap_or_default(),
        })
    }

    fn require_role(&self, role_id: RoleId) -> StoreResult<()> {
        if self.roles.contains_key(&role_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("role {role_id}")))
        }
    }

    fn require_location(&self, location_id: LocationId) -> StoreResult<()> {
        if self.locations.contains_key(&location_id) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("location {location_id}")))
        }
    }

    fn require_permission(&self, permission: &Permission) -> StoreResult<()> {
        if self.permissions.contains_key(permission) {
            Ok(())
        } else {
            Err(StoreError::NotFound(format!("permission '{permission}'")))
        }
    }

    fn email_taken(&self, email: &Email, except: Option<UserId>) -> bool {
        self.users.values().any(|u| &u.email == email && Some(u.id) != except)
    }

    fn serial_taken(&self, serial_number: &str, except: Option<InterfaceId>) -> bool {
        self.interfaces
            .values()
            .any(|i| i.serial_number == serial_number && Some(i.id) != except)
    }
}

/// Process-local store guarded by a single `RwLock`.
///
/// Locks are never held across an `.await`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, State>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, State>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_identity_by_login_handle(&self, handle: &str) -> StoreResult<Option<StoredIdentity>> {
        let state = self.read()?;
        let Some(user) = state.users.values().find(|u| u.email.as_str() == handle) else {
            return Ok(None);
        };
        let role = state
            .roles
            .get(&user.role_id)
            .ok_or_else(|| StoreError::Unavailable(format!("user {} references missing role", user.id)))?;

        Ok(Some(StoredIdentity {
            id: user.id,
            email: user.email.clone(),
            matricule: user.matricule.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            password_hash: user.password_hash.clone(),
            role_id: user.role_id,
            role_name: role.name.clone(),
        }))
    }

    async fn find_role_with_permissions(&self, role_id: RoleId) -> StoreResult<Option<RoleGrants>> {
        Ok(self.read()?.role_grants(role_id))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self.read()?.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(users)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<UserRecord>> {
        Ok(self.read()?.users.values().find(|u| &u.email == email).cloned())
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<UserRecord> {
        let mut state = self.write()?;
        state.require_role(new.role_id)?;
        if state.email_taken(&new.email, None) {
            return Err(StoreError::Conflict("user with this email already exists".to_string()));
        }
        if state.users.values().any(|u| u.matricule == new.matricule) {
            return Err(StoreError::Conflict("user with this matricule already exists".to_string()));
        }

        let now = Utc::now();
        let record = UserRecord {
            id: UserId::new(),
            matricule: new.matricule,
            email: new.email,
            password_hash: new.password_hash,
            first_name: new.first_name,
            last_name: new.last_name,
            phone_number: new.phone_number,
            role_id: new.role_id,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<UserRecord> {
        let mut state = self.write()?;
        if !state.users.contains_key(&id) {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        if let Some(email) = &changes.email {
            if state.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("email is already taken by another user".to_string()));
            }
        }
        if let Some(matricule) = &changes.matricule {
            if state.users.values().any(|u| &u.matricule == matricule && u.id != id) {
                return Err(StoreError::Conflict("matricule is already taken by another user".to_string()));
            }
        }
        if let Some(role_id) = changes.role_id {
            state.require_role(role_id)?;
        }

        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        if let Some(v) = changes.matricule {
            user.matricule = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.password_hash {
            user.password_hash = v;
        }
        if let Some(v) = changes.first_name {
            user.first_name = v;
        }
        if let Some(v) = changes.last_name {
            user.last_name = v;
        }
        if let Some(v) = changes.phone_number {
            user.phone_number = Some(v);
        }
        if let Some(v) = changes.role_id {
            user.role_id = v;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        self.write()?
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn list_roles(&self) -> StoreResult<Vec<RoleGrants>> {
        let state = self.read()?;
        let mut roles: Vec<RoleGrants> = state.roles.keys().filter_map(|id| state.role_grants(*id)).collect();
        roles.sort_by(|a, b| a.role_name.cmp(&b.role_name));
        Ok(roles)
    }

    async fn get_role(&self, id: RoleId) -> StoreResult<Option<RoleRecord>> {
        Ok(self.read()?.roles.get(&id).cloned())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<PermissionRecord>> {
        Ok(self.read()?.permissions.values().cloned().collect())
    }

    async fn ensure_permission(&self, name: Permission, description: Option<String>) -> StoreResult<PermissionRecord> {
        let mut state = self.write()?;
        let record = state
            .permissions
            .entry(name.clone())
            .or_insert_with(|| PermissionRecord {
                id: PermissionId::new(),
                name,
                description,
            });
        Ok(record.clone())
    }

    async fn ensure_role(&self, name: RoleName, description: Option<String>) -> StoreResult<RoleRecord> {
        let mut state = self.write()?;
        if let Some(existing) = state.roles.values().find(|r| r.name == name) {
            return Ok(existing.clone());
        }
        let record = RoleRecord {
            id: RoleId::new(),
            name,
            description,
        };
        state.roles.insert(record.id, record.clone());
        Ok(record)
    }

    async fn grant_permission(&self, role_id: RoleId, permission: &Permission) -> StoreResult<RoleGrants> {
        let mut state = self.write()?;
        state.require_role(role_id)?;
        state.require_permission(permission)?;
        state.grants.entry(role_id).or_default().insert(permission.clone());
        state
            .role_grants(role_id)
            .ok_or_else(|| StoreError::NotFound(format!("role {role_id}")))
    }

    async fn revoke_permission(&self, role_id: RoleId, permission: &Permission) -> StoreResult<RoleGrants> {
        let mut state = self.write()?;
        state.require_role(role_id)?;
        state.require_permission(permission)?;
        if let Some(grants) = state.grants.get_mut(&role_id) {
            grants.remove(permission);
        }
        state
            .role_grants(role_id)
            .ok_or_else(|| StoreError::NotFound(format!("role {role_id}")))
    }
}

#[async_trait]
impl InterfaceRepository for InMemoryStore {
    async fn list_interfaces(&self) -> StoreResult<Vec<InterfaceRecord>> {
        let mut interfaces: Vec<InterfaceRecord> = self.read()?.interfaces.values().cloned().collect();
        interfaces.sort_by_key(|i| i.id);
        Ok(interfaces)
    }

    async fn get_interface(&self, id: InterfaceId) -> StoreResult<Option<InterfaceRecord>> {
        Ok(self.read()?.interfaces.get(&id).cloned())
    }

    async fn find_interface_by_serial(&self, serial_number: &str) -> StoreResult<Option<InterfaceRecord>> {
        Ok(self
            .read()?
            .interfaces
            .values()
            .find(|i| i.serial_number == serial_number)
            .cloned())
    }

    async fn create_interface(&self, new: NewInterface) -> StoreResult<InterfaceRecord> {
        let mut state = self.write()?;
        if state.serial_taken(&new.serial_number, None) {
            return Err(StoreError::Conflict("interface with this serial number already exists".to_string()));
        }
        state.require_location(new.current_location_id)?;

        let now = Utc::now();
        let record = InterfaceRecord {
            id: InterfaceId::new(),
            serial_number: new.serial_number,
            name: new.name,
            model: new.model,
            kind: new.kind,
            status: new.status,
            acquisition_date: new.acquisition_date,
            notes: new.notes,
            current_location_id: new.current_location_id,
            created_at: now,
            updated_at: now,
        };
        state.interfaces.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_interface(&self, id: InterfaceId, changes: InterfaceChanges) -> StoreResult<InterfaceRecord> {
        let mut state = self.write()?;
        if !state.interfaces.contains_key(&id) {
            return Err(StoreError::NotFound(format!("interface {id}")));
        }
        if let Some(serial) = &changes.serial_number {
            if state.serial_taken(serial, Some(id)) {
                return Err(StoreError::Conflict("another interface already uses this serial number".to_string()));
            }
        }
        if let Some(location_id) = changes.current_location_id {
            state.require_location(location_id)?;
        }

        let record = state
            .interfaces
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("interface {id}")))?;
        if let Some(v) = changes.serial_number {
            record.serial_number = v;
        }
        if let Some(v) = changes.name {
            record.name = v;
        }
        if let Some(v) = changes.model {
            record.model = Some(v);
        }
        if let Some(v) = changes.kind {
            record.kind = Some(v);
        }
        if let Some(v) = changes.status {
            record.status = v;
        }
        if let Some(v) = changes.acquisition_date {
            record.acquisition_date = Some(v);
        }
        if let Some(v) = changes.notes {
            record.notes = Some(v);
        }
        if let Some(v) = changes.current_location_id {
            record.current_location_id = v;
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn delete_interface(&self, id: InterfaceId) -> StoreResult<()> {
        self.write()?
            .interfaces
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("interface {id}")))
    }

    async fn list_locations(&self) -> StoreResult<Vec<LocationRecord>> {
        let mut locations: Vec<LocationRecord> = self.read()?.locations.values().cloned().collect();
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn get_location(&self, id: LocationId) -> StoreResult<Option<LocationRecord>> {
        Ok(self.read()?.locations.get(&id).cloned())
    }

    async fn ensure_location(
        &self,
        name: String,
        description: Option<String>,
        address: Option<String>,
    ) -> StoreResult<LocationRecord> {
        let mut state = self.write()?;
        if let Some(existing) = state.locations.values().find(|l| l.name == name) {
            return Ok(existing.clone());
        }
        let record = LocationRecord {
            id: LocationId::new(),
            name,
            description,
            address,
        };
        state.locations.insert(record.id, record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use labtrack_auth::permissions::{MANAGE_INTERFACES, READ_INTERFACES};
    use labtrack_core::Matricule;

    use super::*;
    use crate::store::InterfaceStatus;

    async fn store_with_role() -> (InMemoryStore, RoleId) {
        let store = InMemoryStore::new();
        store.ensure_permission(READ_INTERFACES, None).await.unwrap();
        store.ensure_permission(MANAGE_INTERFACES, None).await.unwrap();
        let role = store.ensure_role(RoleName::USER, None).await.unwrap();
        (store, role.id)
    }

    fn new_user(email: &str, matricule: &str, role_id: RoleId) -> NewUser {
        NewUser {
            matricule: Matricule::parse(matricule).unwrap(),
            email: Email::parse(email).unwrap(),
            password_hash: "$argon2id$stub".to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            phone_number: None,
            role_id,
        }
    }

    #[tokio::test]
    async fn login_lookup_resolves_role_name() {
        let (store, role_id) = store_with_role().await;
        let user = store.create_user(new_user("a@lab.com", "A1", role_id)).await.unwrap();

        let found = store.find_identity_by_login_handle("a@lab.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert_eq!(found.role_name, RoleName::USER);
        assert!(store.find_identity_by_login_handle("b@lab.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_or_matricule_conflicts() {
        let (store, role_id) = store_with_role().await;
        store.create_user(new_user("a@lab.com", "A1", role_id)).await.unwrap();

        let dup_email = store.create_user(new_user("A@Lab.com", "A2", role_id)).await;
        assert!(matches!(dup_email, Err(StoreError::Conflict(_))));
        let dup_matricule = store.create_user(new_user("b@lab.com", "a1", role_id)).await;
        assert!(matches!(dup_matricule, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn updating_to_a_taken_email_conflicts() {
        let (store, role_id) = store_with_role().await;
        store.create_user(new_user("a@lab.com", "A1", role_id)).await.unwrap();
        let b = store.create_user(new_user("b@lab.com", "B1", role_id)).await.unwrap();

        let changes = UserChanges {
            email: Some(Email::parse("a@lab.com").unwrap()),
            ..UserChanges::default()
        };
        assert!(matches!(store.update_user(b.id, changes).await, Err(StoreError::Conflict(_))));

        let own = UserChanges {
            email: Some(Email::parse("b@lab.com").unwrap()),
            first_name: Some("Bea".to_string()),
            ..UserChanges::default()
        };
        assert_eq!(store.update_user(b.id, own).await.unwrap().first_name, "Bea");
    }

    #[tokio::test]
    async fn unknown_role_is_not_found() {
        let (store, _) = store_with_role().await;
        let result = store.create_user(new_user("a@lab.com", "A1", RoleId::new())).await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn grant_and_revoke_are_visible_to_lookups() {
        let (store, role_id) = store_with_role().await;

        store.grant_permission(role_id, &READ_INTERFACES).await.unwrap();
        let grants = store.grant_permission(role_id, &READ_INTERFACES).await.unwrap();
        assert_eq!(grants.permissions.len(), 1);

        let grants = store.find_role_with_permissions(role_id).await.unwrap().unwrap();
        assert!(grants.permissions.contains(&READ_INTERFACES));

        store.revoke_permission(role_id, &READ_INTERFACES).await.unwrap();
        let grants = store.find_role_with_permissions(role_id).await.unwrap().unwrap();
        assert!(grants.permissions.is_empty());

        let unknown = Permission::new("launch_rockets");
        assert!(matches!(store.grant_permission(role_id, &unknown).await, Err(StoreError::NotFound(_))));
        assert!(store.find_role_with_permissions(RoleId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ensure_is_idempotent() {
        let store = InMemoryStore::new();
        let first = store.ensure_role(RoleName::ADMIN, None).await.unwrap();
        let second = store.ensure_role(RoleName::ADMIN, Some("ignored".to_string())).await.unwrap();
        assert_eq!(first, second);

        let a = store.ensure_location("Storage Room A".to_string(), None, None).await.unwrap();
        let b = store.ensure_location("Storage Room A".to_string(), None, None).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn interface_serials_are_unique_and_locations_must_exist() {
        let store = InMemoryStore::new();
        let location = store.ensure_location("Lab".to_string(), None, None).await.unwrap();
        let new = |serial: &str, location_id| NewInterface {
            serial_number: serial.to_string(),
            name: "DMM-500".to_string(),
            model: None,
            kind: Some("Multimeter".to_string()),
            status: InterfaceStatus::default(),
            acquisition_date: None,
            notes: None,
            current_location_id: location_id,
        };

        let created = store.create_interface(new("5001", location.id)).await.unwrap();
        assert_eq!(created.status, InterfaceStatus::InStock);
        assert!(matches!(store.create_interface(new("5001", location.id)).await, Err(StoreError::Conflict(_))));
        assert!(matches!(store.create_interface(new("5002", LocationId::new())).await, Err(StoreError::NotFound(_))));

        let retired = InterfaceChanges {
            status: Some(InterfaceStatus::Retired),
            ..InterfaceChanges::default()
        };
        assert_eq!(store.update_interface(created.id, retired).await.unwrap().status, InterfaceStatus::Retired);

        store.delete_interface(created.id).await.unwrap();
        assert!(matches!(store.delete_interface(created.id).await, Err(StoreError::NotFound(_))));
    }
}
