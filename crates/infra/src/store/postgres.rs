//! Postgres backend.
//!
//! Expects the tables in `sql/schema.sql`; [`PostgresStore::apply_schema`]
//! creates them when missing. Uniqueness and foreign-key violations are
//! reported as `Conflict` and `NotFound` respectively.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use labtrack_auth::{
    CredentialStore, Permission, PermissionSet, RoleGrants, RoleName, StoreError, StoreResult,
    StoredIdentity,
};
use labtrack_core::{Email, InterfaceId, LocationId, Matricule, PermissionId, RoleId, UserId};

use super::{
    InterfaceChanges, InterfaceRecord, InterfaceRepository, InterfaceStatus, LocationRecord,
    NewInterface, NewUser, PermissionRecord, RoleRecord, RoleRepository, UserChanges, UserRecord,
    UserRepository,
};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const USER_COLUMNS: &str = "id, matricule, email, password_hash, first_name, last_name, phone_number, role_id, created_at, updated_at";
const INTERFACE_COLUMNS: &str = "id, serial_number, name, model, kind, status, acquisition_date, notes, current_location_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await.map_err(db_error)?;
        Ok(Self::new(pool))
    }

    /// Create missing tables.
    pub async fn apply_schema(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await.map_err(db_error)?;
        Ok(())
    }

    async fn permission_id(&self, permission: &Permission) -> StoreResult<Uuid> {
        let row = sqlx::query("SELECT id FROM permissions WHERE name = $1")
            .bind(permission.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or_else(|| StoreError::NotFound(format!("permission '{permission}'")))?;
        row.try_get("id").map_err(db_error)
    }

    async fn grants_or_not_found(&self, role_id: RoleId) -> StoreResult<RoleGrants> {
        self.find_role_with_permissions(role_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("role {role_id}")))
    }
}

fn db_error(err: sqlx::Error) -> StoreError {
    if let Some(db) = err.as_database_error() {
        if db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
        if db.is_foreign_key_violation() {
            return StoreError::NotFound(db.message().to_string());
        }
    }
    tracing::error!(error = %err, "postgres query failed");
    StoreError::Unavailable(err.to_string())
}

fn corrupt(what: &str, detail: impl core::fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("corrupt {what} row: {detail}"))
}

fn user_from_row(row: &PgRow) -> StoreResult<UserRecord> {
    let email: String = row.try_get("email").map_err(db_error)?;
    let matricule: String = row.try_get("matricule").map_err(db_error)?;
    Ok(UserRecord {
        id: UserId::from_uuid(row.try_get("id").map_err(db_error)?),
        matricule: Matricule::parse(&matricule).map_err(|e| corrupt("user", e))?,
        email: Email::parse(&email).map_err(|e| corrupt("user", e))?,
        password_hash: row.try_get("password_hash").map_err(db_error)?,
        first_name: row.try_get("first_name").map_err(db_error)?,
        last_name: row.try_get("last_name").map_err(db_error)?,
        phone_number: row.try_get("phone_number").map_err(db_error)?,
        role_id: RoleId::from_uuid(row.try_get("role_id").map_err(db_error)?),
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn interface_from_row(row: &PgRow) -> StoreResult<InterfaceRecord> {
    let status: String = row.try_get("status").map_err(db_error)?;
    Ok(InterfaceRecord {
        id: InterfaceId::from_uuid(row.try_get("id").map_err(db_error)?),
        serial_number: row.try_get("serial_number").map_err(db_error)?,
        name: row.try_get("name").map_err(db_error)?,
        model: row.try_get("model").map_err(db_error)?,
        kind: row.try_get("kind").map_err(db_error)?,
        status: status.parse::<InterfaceStatus>().map_err(|e| corrupt("interface", e))?,
        acquisition_date: row.try_get("acquisition_date").map_err(db_error)?,
        notes: row.try_get("notes").map_err(db_error)?,
        current_location_id: LocationId::from_uuid(row.try_get("current_location_id").map_err(db_error)?),
        created_at: row.try_get("created_at").map_err(db_error)?,
        updated_at: row.try_get("updated_at").map_err(db_error)?,
    })
}

fn location_from_row(row: &PgRow) -> StoreResult<LocationRecord> {
    Ok(LocationRecord {
        id: LocationId::from_uuid(row.try_get("id").map_err(db_error)?),
        name: row.try_get("name").map_err(db_error)?,
        description: row.try_get("description").map_err(db_error)?,
        address: row.try_get("address").map_err(db_error)?,
    })
}

fn role_from_row(row: &PgRow) -> StoreResult<RoleRecord> {
    let name: String = row.try_get("name").map_err(db_error)?;
    Ok(RoleRecord {
        id: RoleId::from_uuid(row.try_get("id").map_err(db_error)?),
        name: RoleName::new(name),
        description: row.try_get("description").map_err(db_error)?,
    })
}

fn permission_from_row(row: &PgRow) -> StoreResult<PermissionRecord> {
    let name: String = row.try_get("name").map_err(db_error)?;
    Ok(PermissionRecord {
        id: PermissionId::from_uuid(row.try_get("id").map_err(db_error)?),
        name: Permission::new(name),
        description: row.try_get("description").map_err(db_error)?,
    })
}

#[async_trait]
impl CredentialStore for PostgresStore {
    async fn find_identity_by_login_handle(&self, handle: &str) -> StoreResult<Option<StoredIdentity>> {
        let row = sqlx::query(
            r#"
            SELECT u.id, u.matricule, u.email, u.password_hash, u.first_name, u.last_name,
                   u.role_id, r.name AS role_name
            FROM users u
            JOIN roles r ON r.id = u.role_id
            WHERE u.email = $1
            "#,
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let email: String = row.try_get("email").map_err(db_error)?;
        let matricule: String = row.try_get("matricule").map_err(db_error)?;
        let role_name: String = row.try_get("role_name").map_err(db_error)?;
        Ok(Some(StoredIdentity {
            id: UserId::from_uuid(row.try_get("id").map_err(db_error)?),
            email: Email::parse(&email).map_err(|e| corrupt("user", e))?,
            matricule: Matricule::parse(&matricule).map_err(|e| corrupt("user", e))?,
            first_name: row.try_get("first_name").map_err(db_error)?,
            last_name: row.try_get("last_name").map_err(db_error)?,
            password_hash: row.try_get("password_hash").map_err(db_error)?,
            role_id: RoleId::from_uuid(row.try_get("role_id").map_err(db_error)?),
            role_name: RoleName::new(role_name),
        }))
    }

    async fn find_role_with_permissions(&self, role_id: RoleId) -> StoreResult<Option<RoleGrants>> {
        let rows = sqlx::query(
            r#"
            SELECT r.name AS role_name, p.name AS permission
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            WHERE r.id = $1
            "#,
        )
        .bind(role_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(first) = rows.first() else {
            return Ok(None);
        };
        let role_name: String = first.try_get("role_name").map_err(db_error)?;
        let mut permissions = PermissionSet::new();
        for row in &rows {
            if let Some(name) = row.try_get::<Option<String>, _>("permission").map_err(db_error)? {
                permissions.insert(Permission::new(name));
            }
        }
        Ok(Some(RoleGrants {
            role_id,
            role_name: RoleName::new(role_name),
            permissions,
        }))
    }
}

#[async_trait]
impl UserRepository for PostgresStore {
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let rows = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn get_user(&self, id: UserId) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> StoreResult<Option<UserRecord>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn create_user(&self, new: NewUser) -> StoreResult<UserRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO users (id, matricule, email, password_hash, first_name, last_name, phone_number, role_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(UserId::new().as_uuid())
        .bind(new.matricule.as_str())
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .bind(&new.first_name)
        .bind(&new.last_name)
        .bind(&new.phone_number)
        .bind(new.role_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        user_from_row(&row)
    }

    async fn update_user(&self, id: UserId, changes: UserChanges) -> StoreResult<UserRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE users SET
                matricule = COALESCE($2, matricule),
                email = COALESCE($3, email),
                password_hash = COALESCE($4, password_hash),
                first_name = COALESCE($5, first_name),
                last_name = COALESCE($6, last_name),
                phone_number = COALESCE($7, phone_number),
                role_id = COALESCE($8, role_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(changes.matricule.as_ref().map(|m| m.as_str()))
        .bind(changes.email.as_ref().map(|e| e.as_str()))
        .bind(changes.password_hash.as_deref())
        .bind(changes.first_name.as_deref())
        .bind(changes.last_name.as_deref())
        .bind(changes.phone_number.as_deref())
        .bind(changes.role_id.map(Uuid::from))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user_from_row(&row)
    }

    async fn delete_user(&self, id: UserId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RoleRepository for PostgresStore {
    async fn list_roles(&self) -> StoreResult<Vec<RoleGrants>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name AS role_name, p.name AS permission
            FROM roles r
            LEFT JOIN role_permissions rp ON rp.role_id = r.id
            LEFT JOIN permissions p ON p.id = rp.permission_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut roles: BTreeMap<RoleId, RoleGrants> = BTreeMap::new();
        for row in &rows {
            let role_id = RoleId::from_uuid(row.try_get("id").map_err(db_error)?);
            let role_name: String = row.try_get("role_name").map_err(db_error)?;
            let entry = roles.entry(role_id).or_insert_with(|| RoleGrants {
                role_id,
                role_name: RoleName::new(role_name),
                permissions: PermissionSet::new(),
            });
            if let Some(name) = row.try_get::<Option<String>, _>("permission").map_err(db_error)? {
                entry.permissions.insert(Permission::new(name));
            }
        }
        let mut roles: Vec<RoleGrants> = roles.into_values().collect();
        roles.sort_by(|a, b| a.role_name.cmp(&b.role_name));
        Ok(roles)
    }

    async fn get_role(&self, id: RoleId) -> StoreResult<Option<RoleRecord>> {
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(role_from_row).transpose()
    }

    async fn list_permissions(&self) -> StoreResult<Vec<PermissionRecord>> {
        let rows = sqlx::query("SELECT id, name, description FROM permissions ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(permission_from_row).collect()
    }

    async fn ensure_permission(&self, name: Permission, description: Option<String>) -> StoreResult<PermissionRecord> {
        sqlx::query("INSERT INTO permissions (id, name, description) VALUES ($1, $2, $3) ON CONFLICT (name) DO NOTHING")
            .bind(PermissionId::new().as_uuid())
            .bind(name.as_str())
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        let row = sqlx::query("SELECT id, name, description FROM permissions WHERE name = $1")
            .bind(name.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        permission_from_row(&row)
    }

    async fn ensure_role(&self, name: RoleName, description: Option<String>) -> StoreResult<RoleRecord> {
        sqlx::query("INSERT INTO roles (id, name, description) VALUES ($1, $2, $3) ON CONFLICT (name) DO NOTHING")
            .bind(RoleId::new().as_uuid())
            .bind(name.as_str())
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        let row = sqlx::query("SELECT id, name, description FROM roles WHERE name = $1")
            .bind(name.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        role_from_row(&row)
    }

    async fn grant_permission(&self, role_id: RoleId, permission: &Permission) -> StoreResult<RoleGrants> {
        let permission_id = self.permission_id(permission).await?;
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(role_id.as_uuid())
            .bind(permission_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        self.grants_or_not_found(role_id).await
    }

    async fn revoke_permission(&self, role_id: RoleId, permission: &Permission) -> StoreResult<RoleGrants> {
        let permission_id = self.permission_id(permission).await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id.as_uuid())
            .bind(permission_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        self.grants_or_not_found(role_id).await
    }
}

#[async_trait]
impl InterfaceRepository for PostgresStore {
    async fn list_interfaces(&self) -> StoreResult<Vec<InterfaceRecord>> {
        let rows = sqlx::query(&format!("SELECT {INTERFACE_COLUMNS} FROM interfaces ORDER BY created_at, id"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(interface_from_row).collect()
    }

    async fn get_interface(&self, id: InterfaceId) -> StoreResult<Option<InterfaceRecord>> {
        let row = sqlx::query(&format!("SELECT {INTERFACE_COLUMNS} FROM interfaces WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(interface_from_row).transpose()
    }

    async fn find_interface_by_serial(&self, serial_number: &str) -> StoreResult<Option<InterfaceRecord>> {
        let row = sqlx::query(&format!("SELECT {INTERFACE_COLUMNS} FROM interfaces WHERE serial_number = $1"))
            .bind(serial_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(interface_from_row).transpose()
    }

    async fn create_interface(&self, new: NewInterface) -> StoreResult<InterfaceRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO interfaces (id, serial_number, name, model, kind, status, acquisition_date, notes, current_location_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {INTERFACE_COLUMNS}
            "#
        ))
        .bind(InterfaceId::new().as_uuid())
        .bind(&new.serial_number)
        .bind(&new.name)
        .bind(&new.model)
        .bind(&new.kind)
        .bind(new.status.as_str())
        .bind(new.acquisition_date)
        .bind(&new.notes)
        .bind(new.current_location_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        interface_from_row(&row)
    }

    async fn update_interface(&self, id: InterfaceId, changes: InterfaceChanges) -> StoreResult<InterfaceRecord> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE interfaces SET
                serial_number = COALESCE($2, serial_number),
                name = COALESCE($3, name),
                model = COALESCE($4, model),
                kind = COALESCE($5, kind),
                status = COALESCE($6, status),
                acquisition_date = COALESCE($7, acquisition_date),
                notes = COALESCE($8, notes),
                current_location_id = COALESCE($9, current_location_id),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {INTERFACE_COLUMNS}
            "#
        ))
        .bind(id.as_uuid())
        .bind(changes.serial_number.as_deref())
        .bind(changes.name.as_deref())
        .bind(changes.model.as_deref())
        .bind(changes.kind.as_deref())
        .bind(changes.status.map(|s| s.as_str()))
        .bind(changes.acquisition_date)
        .bind(changes.notes.as_deref())
        .bind(changes.current_location_id.map(Uuid::from))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| StoreError::NotFound(format!("interface {id}")))?;
        interface_from_row(&row)
    }

    async fn delete_interface(&self, id: InterfaceId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM interfaces WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("interface {id}")));
        }
        Ok(())
    }

    async fn list_locations(&self) -> StoreResult<Vec<LocationRecord>> {
        let rows = sqlx::query("SELECT id, name, description, address FROM locations ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(location_from_row).collect()
    }

    async fn get_location(&self, id: LocationId) -> StoreResult<Option<LocationRecord>> {
        let row = sqlx::query("SELECT id, name, description, address FROM locations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(location_from_row).transpose()
    }

    async fn ensure_location(
        &self,
        name: String,
        description: Option<String>,
        address: Option<String>,
    ) -> StoreResult<LocationRecord> {
        sqlx::query(
            "INSERT INTO locations (id, name, description, address) VALUES ($1, $2, $3, $4) ON CONFLICT (name) DO NOTHING",
        )
        .bind(LocationId::new().as_uuid())
        .bind(&name)
        .bind(description)
        .bind(address)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        let row = sqlx::query("SELECT id, name, description, address FROM locations WHERE name = $1")
            .bind(&name)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        location_from_row(&row)
    }
}
