//! HTTP middleware for LendFlow

pub mod auth;

pub use auth::{ensure_admin, ensure_role, ensure_self_or_admin, AuthenticatedUser};
