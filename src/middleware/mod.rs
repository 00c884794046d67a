use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use base64::{Engine as _, engine::general_purpose};
use std::sync::Arc;
use tracing::error;

use crate::auth::Auth;
use crate::models::{MembershipTier, User};
use crate::storage::{collections, Filter};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    pub membership_tier: MembershipTier,
}

impl Auth for AuthUser {
    fn current_user_id(&self) -> Option<String> {
        Some(self.user_id.clone())
    }
}

// Basic Auth extractor
impl FromRequestParts<Arc<crate::AppState>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<crate::AppState>
    ) -> Result<Self, Self::Rejection> {
        // Authorization header must be present and ASCII
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Only Basic is supported
        let encoded = auth_header
            .strip_prefix("Basic ")
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Decode base64
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        let credentials = String::from_utf8(decoded)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        // email:password
        let (email, password) = credentials
            .split_once(':')
            .ok_or(StatusCode::UNAUTHORIZED)?;

        // Look up the user by email
        let docs = state
            .storage
            .query(collections::USERS, &[Filter::eq("email", email)])
            .await
            .map_err(|e| {
                error!("User lookup failed: {}", e);
                StatusCode::SERVICE_UNAVAILABLE
            })?;

        let user: User = docs
            .into_iter()
            .next()
            .ok_or(StatusCode::UNAUTHORIZED)?
            .decode()
            .map_err(|e| {
                error!("Stored user for {} is unreadable: {}", email, e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?;

        // Inactive accounts fail the same way as a bad password
        if !user.is_active || !user.verify_password(password) {
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
            display_name: user.display_name,
            membership_tier: user.membership_tier,
        })
    }
}
