use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Permission identifier.
///
/// Permissions are opaque snake_case names (e.g. "read_interfaces"). There is
/// no wildcard: a role holds exactly the permissions granted to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

/// Set of permissions, either required by an operation or granted to a role.
pub type PermissionSet = BTreeSet<Permission>;

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for Permission {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}

pub const READ_USERS: Permission = Permission::from_static("read_users");
pub const MANAGE_USERS: Permission = Permission::from_static("manage_users");
pub const READ_INTERFACES: Permission = Permission::from_static("read_interfaces");
pub const MANAGE_INTERFACES: Permission = Permission::from_static("manage_interfaces");
pub const TRACK_MOVEMENTS: Permission = Permission::from_static("track_movements");
pub const REPORT_MAINTENANCE: Permission = Permission::from_static("report_maintenance");
pub const ASSIGN_MAINTENANCE: Permission = Permission::from_static("assign_maintenance");
pub const RESOLVE_MAINTENANCE: Permission = Permission::from_static("resolve_maintenance");
pub const VIEW_USAGE_LOGS: Permission = Permission::from_static("view_usage_logs");
pub const MANAGE_ROLES_PERMISSIONS: Permission = Permission::from_static("manage_roles_permissions");
pub const MANAGE_DAILY_APP_USE: Permission = Permission::from_static("manage_daily_app_use");
pub const PREPARE_SERIES_CHANGE: Permission = Permission::from_static("prepare_series_change");
pub const PERFORM_INTERFACE_SWAP: Permission = Permission::from_static("perform_interface_swap");
pub const LEAVE_MAINTENANCE_REMARK: Permission = Permission::from_static("leave_maintenance_remark");
