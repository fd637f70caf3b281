//! Reference catalogue (permissions, roles, grants) and demo records.
//!
//! Seeding is idempotent: existing rows (matched by name, email or serial
//! number) are left untouched, so it can run on every start.

use labtrack_auth::permissions::*;
use labtrack_auth::{PasswordError, Permission, RoleName, SecretHasher, StoreError};
use labtrack_core::{DomainError, Email, Matricule};
use thiserror::Error;

use crate::store::{InterfaceStatus, LabtrackStore, NewInterface, NewUser};

#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("invalid seed record: {0}")]
    Invalid(#[from] DomainError),
}

pub struct PermissionSeed {
    pub name: Permission,
    pub description: &'static str,
}

pub struct RoleSeed {
    pub name: RoleName,
    pub description: &'static str,
    pub permissions: Vec<Permission>,
}

pub struct UserSeed {
    pub matricule: &'static str,
    pub email: &'static str,
    pub first_name: &'static str,
    pub last_name: &'static str,
    pub phone_number: &'static str,
    pub role: RoleName,
}

/// Shared secret of every demo account.
pub const DEMO_PASSWORD: &str = "password123";

pub fn permissions() -> Vec<PermissionSeed> {
    fn p(name: Permission, description: &'static str) -> PermissionSeed {
        PermissionSeed { name, description }
    }

    vec![
        p(READ_USERS, "Allows viewing user information"),
        p(MANAGE_USERS, "Allows creating, updating, and deleting users"),
        p(READ_INTERFACES, "Allows viewing interface details"),
        p(MANAGE_INTERFACES, "Allows adding, modifying, and retiring interfaces"),
        p(TRACK_MOVEMENTS, "Allows logging interface movements"),
        p(REPORT_MAINTENANCE, "Allows creating maintenance tickets"),
        p(ASSIGN_MAINTENANCE, "Allows assigning maintenance tickets to technicians"),
        p(RESOLVE_MAINTENANCE, "Allows resolving and closing maintenance tickets"),
        p(VIEW_USAGE_LOGS, "Allows viewing interface usage history"),
        p(MANAGE_ROLES_PERMISSIONS, "Allows creating and managing roles and permissions"),
        p(MANAGE_DAILY_APP_USE, "Allows managing daily application usage"),
        p(PREPARE_SERIES_CHANGE, "Allows preparing interfaces for series changes"),
        p(PERFORM_INTERFACE_SWAP, "Allows taking out and putting back interfaces for corrective actions"),
        p(LEAVE_MAINTENANCE_REMARK, "Allows leaving remarks on maintenance logs/tickets"),
    ]
}

pub fn roles() -> Vec<RoleSeed> {
    vec![
        RoleSeed {
            name: RoleName::ADMIN,
            description: "Full administrative access",
            permissions: permissions().into_iter().map(|p| p.name).collect(),
        },
        RoleSeed {
            name: RoleName::PREVENTIVE_TECHNICIAN,
            description: "Manages daily app use and prepares series changes",
            permissions: vec![
                READ_INTERFACES,
                TRACK_MOVEMENTS,
                REPORT_MAINTENANCE,
                VIEW_USAGE_LOGS,
                MANAGE_DAILY_APP_USE,
                PREPARE_SERIES_CHANGE,
            ],
        },
        RoleSeed {
            name: RoleName::CORRECTIVE_TECHNICIAN,
            description: "Handles interface swaps and leaves remarks for corrective actions",
            permissions: vec![
                READ_INTERFACES,
                TRACK_MOVEMENTS,
                REPORT_MAINTENANCE,
                RESOLVE_MAINTENANCE,
                VIEW_USAGE_LOGS,
                PERFORM_INTERFACE_SWAP,
                LEAVE_MAINTENANCE_REMARK,
            ],
        },
        RoleSeed {
            name: RoleName::USER,
            description: "Basic access for logging usage and reporting issues",
            permissions: vec![READ_INTERFACES, REPORT_MAINTENANCE, VIEW_USAGE_LOGS],
        },
    ]
}

pub fn demo_users() -> Vec<UserSeed> {
    vec![
        UserSeed {
            matricule: "ADM001",
            email: "admin@labtrack.com",
            first_name: "Admin",
            last_name: "User",
            phone_number: "21655123456",
            role: RoleName::ADMIN,
        },
        UserSeed {
            matricule: "PRE001",
            email: "preventive.tech@labtrack.com",
            first_name: "Omar",
            last_name: "Preventif",
            phone_number: "21655666777",
            role: RoleName::PREVENTIVE_TECHNICIAN,
        },
        UserSeed {
            matricule: "CUR001",
            email: "corrective.tech@labtrack.com",
            first_name: "Fatma",
            last_name: "Curatif",
            phone_number: "21655999000",
            role: RoleName::CORRECTIVE_TECHNICIAN,
        },
        UserSeed {
            matricule: "USR001",
            email: "user@labtrack.com",
            first_name: "Regular",
            last_name: "Member",
            phone_number: "21655987654",
            role: RoleName::USER,
        },
    ]
}

/// Seed the permission/role catalogue and grants.
pub async fn seed_catalog<S>(store: &S) -> Result<(), SeedError>
where
    S: LabtrackStore + ?Sized,
{
    for permission in permissions() {
        store
            .ensure_permission(permission.name, Some(permission.description.to_string()))
            .await?;
    }
    for role in roles() {
        let record = store.ensure_role(role.name, Some(role.description.to_string())).await?;
        for permission in &role.permissions {
            store.grant_permission(record.id, permission).await?;
        }
    }
    tracing::info!("role/permission catalogue seeded");
    Ok(())
}

/// Seed the catalogue, demo accounts, a storage location and one interface.
pub async fn seed_demo_data<S>(store: &S, hasher: &SecretHasher) -> Result<(), SeedError>
where
    S: LabtrackStore + ?Sized,
{
    seed_catalog(store).await?;

    let roles = store.list_roles().await?;
    let password_hash = hasher.hash(DEMO_PASSWORD)?;
    for user in demo_users() {
        let email = Email::parse(user.email)?;
        if store.find_user_by_email(&email).await?.is_some() {
            continue;
        }
        let role = roles
            .iter()
            .find(|r| r.role_name == user.role)
            .ok_or_else(|| StoreError::NotFound(format!("role '{}'", user.role)))?;
        store
            .create_user(NewUser {
                matricule: Matricule::parse(user.matricule)?,
                email,
                password_hash: password_hash.clone(),
                first_name: user.first_name.to_string(),
                last_name: user.last_name.to_string(),
                phone_number: Some(user.phone_number.to_string()),
                role_id: role.role_id,
            })
            .await?;
        tracing::info!(email = user.email, role = %user.role, "demo user seeded");
    }

    let storage = store
        .ensure_location(
            "Storage Room A".to_string(),
            Some("Main storage for unused interfaces".to_string()),
            Some("Building 1, Floor 2".to_string()),
        )
        .await?;

    if store.find_interface_by_serial("5001").await?.is_none() {
        store
            .create_interface(NewInterface {
                serial_number: "5001".to_string(),
                name: "Digital Multimeter DMM-500".to_string(),
                model: Some("DMM-500".to_string()),
                kind: Some("Multimeter".to_string()),
                status: InterfaceStatus::InStock,
                acquisition_date: None,
                notes: Some("Precision multimeter for voltage, current, resistance".to_string()),
                current_location_id: storage.id,
            })
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use labtrack_auth::CredentialStore;

    use super::*;
    use crate::store::{InMemoryStore, InterfaceRepository, RoleRepository, UserRepository};

    #[test]
    fn catalogue_shape() {
        assert_eq!(permissions().len(), 14);
        let roles = roles();
        let admin = roles.iter().find(|r| r.name == RoleName::ADMIN).unwrap();
        assert_eq!(admin.permissions.len(), 14);

        let user = roles.iter().find(|r| r.name == RoleName::USER).unwrap();
        assert!(user.permissions.contains(&READ_INTERFACES));
        assert!(!user.permissions.contains(&MANAGE_INTERFACES));
        assert!(!user.permissions.contains(&READ_USERS));
    }

    #[tokio::test]
    async fn demo_seed_is_idempotent_and_signs_in() {
        let store = InMemoryStore::new();
        let hasher = SecretHasher::low_cost();
        seed_demo_data(&store, &hasher).await.unwrap();
        seed_demo_data(&store, &hasher).await.unwrap();

        assert_eq!(store.list_users().await.unwrap().len(), 4);
        assert_eq!(store.list_roles().await.unwrap().len(), 4);
        assert_eq!(store.list_permissions().await.unwrap().len(), 14);
        assert_eq!(store.list_interfaces().await.unwrap().len(), 1);

        let admin = store
            .find_identity_by_login_handle("admin@labtrack.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role_name, RoleName::ADMIN);
        assert!(hasher.verify(&admin.password_hash, DEMO_PASSWORD));

        let grants = store.find_role_with_permissions(admin.role_id).await.unwrap().unwrap();
        assert!(grants.permissions.contains(&MANAGE_ROLES_PERMISSIONS));
    }
}
