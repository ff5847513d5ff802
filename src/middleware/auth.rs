//! Authentication middleware
//!
//! Extracts and verifies the bearer token, making the caller's identity
//! and roles available to handlers.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use uuid::Uuid;

use crate::auth::verify_token;
use crate::error::{ApiError, ApiResult};
use crate::models::UserRole;
use crate::state::AppState;

/// Authenticated caller extracted from the JWT token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub username: String,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.roles.iter().any(|r| r == role.as_str())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::Unauthorized(
                        "Authorization header with Bearer token required".to_string(),
                    )
                })?;

        let claims = verify_token(bearer.token(), &state.jwt_secret)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        let user_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| ApiError::Unauthorized("Invalid user ID in token".to_string()))?;

        Ok(AuthenticatedUser {
            user_id,
            username: claims.username,
            roles: claims.roles,
        })
    }
}

/// Require a specific role on the caller
pub fn ensure_role(user: &AuthenticatedUser, role: UserRole) -> ApiResult<()> {
    if user.has_role(role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Requires the {} role",
            role.as_str()
        )))
    }
}

/// Require the admin role on the caller
pub fn ensure_admin(user: &AuthenticatedUser) -> ApiResult<()> {
    ensure_role(user, UserRole::Admin)
}

/// Require that the caller is the referenced user, or an admin
pub fn ensure_self_or_admin(user: &AuthenticatedUser, target_id: Uuid) -> ApiResult<()> {
    if user.user_id == target_id || user.has_role(UserRole::Admin) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "Not allowed to act on another user's account".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caller(roles: &[&str]) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: Uuid::new_v4(),
            username: "ada".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    #[test]
    fn test_ensure_role() {
        assert!(ensure_role(&caller(&["investor"]), UserRole::Investor).is_ok());
        assert!(ensure_role(&caller(&["investor"]), UserRole::Borrower).is_err());
    }

    #[test]
    fn test_ensure_self_or_admin() {
        let user = caller(&["borrower"]);
        assert!(ensure_self_or_admin(&user, user.user_id).is_ok());
        assert!(ensure_self_or_admin(&user, Uuid::new_v4()).is_err());
        assert!(ensure_self_or_admin(&caller(&["admin"]), Uuid::new_v4()).is_ok());
    }
}
