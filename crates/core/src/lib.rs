//! `labtrack-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod value_object;

pub use error::DomainError;
pub use id::{InterfaceId, LocationId, PermissionId, RoleId, UserId};
pub use value_object::{Email, Matricule};
