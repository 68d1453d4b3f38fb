use std::ops::Deref;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{DecodingKey, Validation, decode};

use genremnant_db::models::UserRow;
use genremnant_types::api::Claims;
use genremnant_types::models::Role;

use crate::error::ApiError;
use crate::state::AppState;

/// The caller, reloaded from the store on every request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub UserRow);

impl Deref for AuthUser {
    type Target = UserRow;

    fn deref(&self) -> &UserRow {
        &self.0
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_active(&self) -> Result<(), ApiError> {
        if self.is_active() {
            Ok(())
        } else {
            Err(ApiError::forbidden("User account is suspended or inactive"))
        }
    }

    /// Active contributor or admin.
    pub fn require_author(&self) -> Result<(), ApiError> {
        self.require_active()?;
        if self.role.can_author() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }
}

/// Verify the bearer token and attach the caller as an `AuthUser` extension.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, ApiError> {
    if !req.headers().contains_key(header::AUTHORIZATION) {
        return Err(ApiError::Unauthorized("No token provided".into()));
    }

    let bearer = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| ApiError::forbidden("Invalid token"))?;

    let claims = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::forbidden("Invalid token"))?
    .claims;

    // Role and status come from the store, not the token
    let user = state
        .db
        .get_user_by_id(claims.sub)
        .await?
        .ok_or_else(|| ApiError::forbidden("Invalid token"))?;

    req.extensions_mut().insert(AuthUser(user));
    Ok(next.run(req).await)
}

/// Layered inside `require_auth` on admin routes.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<AuthUser>()
        .ok_or_else(|| ApiError::Unauthorized("User not authenticated".into()))?;

    user.require_active()?;
    if !user.is_admin() {
        return Err(ApiError::forbidden("Insufficient permissions"));
    }

    Ok(next.run(req).await)
}
