//! Bearer token authentication

use axum::{extract::FromRequestParts, http::request::Parts};
use scoutdeck_common::{
    auth::{extract_bearer, TokenKind},
    errors::{AppError, Result},
    models::Role,
};

use crate::AppState;

/// The authenticated caller, taken from a valid access token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
}

impl AuthUser {
    /// Only analysts write reports
    pub fn require_analyst(&self, action: &str) -> Result<()> {
        match self.role {
            Role::Analyst => Ok(()),
            Role::Coach => Err(AppError::Forbidden {
                message: format!("Only analysts can {}.", action),
            }),
        }
    }
}

/// Axum extractor for AuthUser
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth_header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Authentication credentials were not provided.".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Invalid Authorization header format".to_string(),
        })?;

        let claims = state.jwt.validate_token(token, TokenKind::Access)?;
        Ok(AuthUser {
            id: claims.user_id()?,
            role: claims.role,
        })
    }
}
