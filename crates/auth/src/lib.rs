//! `labtrack-auth` — session issuance, verification and authorization.
//!
//! This crate is intentionally decoupled from HTTP and storage: the credential
//! store is a trait, and HTTP mapping lives in `labtrack-api`.

pub mod authorize;
pub mod cache;
pub mod claims;
pub mod context;
pub mod error;
pub mod issuer;
pub mod password;
pub mod permissions;
pub mod preconditions;
pub mod revocation;
pub mod roles;
pub mod store;
pub mod token;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

pub use authorize::{
    Decision, DenyReason, Gate, PermissionResolver, Requirement, check_role, permissions_cover,
    require_permissions, require_roles,
};
pub use cache::PermissionCache;
pub use claims::{SessionClaims, TokenValidationError, validate_claims};
pub use context::IdentityContext;
pub use error::{AuthError, UnauthenticatedReason};
pub use issuer::{CredentialIssuer, DEFAULT_SESSION_TTL, IssuedSession};
pub use password::{PasswordError, SecretHasher};
pub use permissions::{Permission, PermissionSet};
pub use revocation::RevocationList;
pub use roles::{RoleName, RoleSet};
pub use store::{
    CredentialStore, IdentitySummary, RoleGrants, StoreError, StoreResult, StoredIdentity,
};
pub use token::{TokenCodec, TokenError};
pub use verifier::{CredentialVerifier, extract_bearer};
