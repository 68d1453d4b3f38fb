use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use genremnant_db::models::{NewUser, UserRow};
use genremnant_types::api::{AuthResponse, Claims, LoginRequest, MessageResponse, RegisterRequest, UserResponse};
use genremnant_types::models::{Role, UserStatus};

use crate::error::{ApiError, ApiJson, ApiResult, conflict_as};
use crate::middleware::AuthUser;
use crate::state::AppState;

const TOKEN_LIFETIME_DAYS: i64 = 7;
const MIN_PASSWORD_LEN: usize = 6;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(email), Some(display_name), Some(password), Some(confirm)) = (
        non_empty(req.email),
        non_empty(req.display_name),
        non_empty(req.password),
        non_empty(req.confirm_password),
    ) else {
        return Err(ApiError::bad_request("All fields are required"));
    };

    if password != confirm {
        return Err(ApiError::bad_request("Passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request("Password must be at least 6 characters"));
    }

    let email = normalize_email(&email);
    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(ApiError::conflict("Email already registered"));
    }

    let role = match &state.admin_email {
        Some(admin) if normalize_email(admin) == email => Role::Admin,
        _ => Role::Regular,
    };

    let password_hash = hash_password(&password)?;
    let mut user = state
        .db
        .create_user(NewUser {
            email: &email,
            display_name: display_name.trim(),
            password_hash: &password_hash,
            role,
        })
        .await
        .map_err(conflict_as("Email already registered"))?;

    if req.request_to_contribute && role == Role::Regular {
        state.db.create_contributor_request(user.id).await?;
        if let Some(reloaded) = state.db.get_user_by_id(user.id).await? {
            user = reloaded;
        }
    }

    info!("Registered user {} ({})", user.email, user.id);
    let token = create_token(&state.jwt_secret, &user)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            success: true,
            message: "User registered successfully".into(),
            token,
            user: user.into(),
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let (Some(email), Some(password)) = (non_empty(req.email), non_empty(req.password)) else {
        return Err(ApiError::bad_request("Email and password are required"));
    };

    let invalid = || ApiError::Unauthorized("Invalid credentials".into());
    let user = state
        .db
        .get_user_by_email(&normalize_email(&email))
        .await?
        .ok_or_else(invalid)?;

    if user.status == UserStatus::Suspended {
        return Err(ApiError::forbidden("Account is suspended"));
    }

    if !verify_password(&password, &user.password_hash)? {
        return Err(invalid());
    }

    state.db.record_login(user.id).await?;
    let user = state.db.get_user_by_id(user.id).await?.unwrap_or(user);
    let token = create_token(&state.jwt_secret, &user)?;

    Ok(Json(AuthResponse {
        success: true,
        message: "Login successful".into(),
        token,
        user: user.into(),
    }))
}

pub async fn me(Extension(user): Extension<AuthUser>) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        user: user.0.into(),
    })
}

/// Tokens are stateless; the client discards its copy.
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse::ok("Logged out successfully"))
}

pub fn create_token(secret: &str, user: &UserRow) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        role: user.role,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_LIFETIME_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `None` for absent or blank strings.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
