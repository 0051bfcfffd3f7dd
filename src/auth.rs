use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};

use crate::{
    models::{UserRecord, UserRole},
    policy::role_home,
};

/// CurrentUser
///
/// The directory record of the signed-in user, placed into the request
/// extensions by the route guard once the request has been allowed through.
/// Handlers take it as an argument instead of repeating the session and
/// directory lookups.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

impl CurrentUser {
    pub fn role(&self) -> UserRole {
        self.0.role
    }

    /// require
    ///
    /// Handler-level role check for mutating endpoints. The guard already
    /// filtered by namespace; this keeps a handler safe if it is ever mounted
    /// elsewhere.
    pub fn require(&self, allowed: &[UserRole]) -> Result<(), StatusCode> {
        if allowed.contains(&self.0.role) {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.0.id, role = %self.0.role, "role check failed");
            Err(StatusCode::FORBIDDEN)
        }
    }

    /// The organization an admin or employee belongs to; 404 when unassigned.
    pub fn organization_id(&self) -> Result<uuid::Uuid, StatusCode> {
        self.0.organization_id.ok_or(StatusCode::NOT_FOUND)
    }

    pub fn home(&self) -> &'static str {
        role_home(self.0.role).path()
    }
}

/// CurrentUser Extractor Implementation
///
/// Rejects with 401 when the guard did not resolve a user: no session, or the
/// authorization layer disabled.
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
