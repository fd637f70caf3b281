use std::borrow::Cow;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Role name used by the role gate (e.g. "Admin", "User").
///
/// Role names are opaque strings at this layer; the role→permission mapping
/// lives in the credential store and is resolved per request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleName(Cow<'static, str>);

/// Set of role names accepted by a role gate.
pub type RoleSet = BTreeSet<RoleName>;

impl RoleName {
    pub const ADMIN: RoleName = RoleName::from_static("Admin");
    pub const PREVENTIVE_TECHNICIAN: RoleName = RoleName::from_static("PreventiveTechnician");
    pub const CORRECTIVE_TECHNICIAN: RoleName = RoleName::from_static("CorrectiveTechnician");
    pub const USER: RoleName = RoleName::from_static("User");

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The privileged role exempt from the self-service restrictions.
    pub fn is_admin(&self) -> bool {
        self.as_str() == Self::ADMIN.as_str()
    }

    /// All roles seeded by default, privileged first.
    pub fn builtin() -> [RoleName; 4] {
        [
            Self::ADMIN,
            Self::PREVENTIVE_TECHNICIAN,
            Self::CORRECTIVE_TECHNICIAN,
            Self::USER,
        ]
    }
}

impl core::fmt::Display for RoleName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for RoleName {
    fn from(value: &'static str) -> Self {
        Self::from_static(value)
    }
}
