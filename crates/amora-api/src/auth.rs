use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::WithRejection;
use jsonwebtoken::{EncodingKey, Header, encode};
use rand_core::OsRng;
use tracing::{info, warn};
use uuid::Uuid;

use amora_types::api::{Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::error::{ApiError, ApiResult};
use crate::{AppState, run_blocking};

/// Usernames are compared case-insensitively everywhere; this is the
/// canonical stored form.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn validate_username(username: &str) -> bool {
    (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

pub async fn register(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<RegisterRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let username = normalize_username(&req.username);

    // Validate input
    if !validate_username(&username) {
        return Err(ApiError::BadRequest(
            "Username must be 3-32 characters of a-z, 0-9 or _".into(),
        ));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("Password must be at least 8 characters".into()));
    }

    let secret = state.jwt_secret.clone();
    let token_days = state.token_days;
    let response = run_blocking(&state, move |db| {
        let taken = || ApiError::Conflict("Username is taken".into());

        // Skip the hash for names that are obviously gone; the insert below
        // is what actually decides.
        if db.user_exists(&username)? {
            return Err(taken());
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?
            .to_string();

        let user_id = Uuid::new_v4();
        if !db.create_user(&user_id.to_string(), &username, &password_hash)? {
            return Err(taken());
        }

        let token = create_token(&secret, token_days, user_id, &username)?;
        Ok(RegisterResponse {
            user_id,
            username,
            token,
        })
    })
    .await?;

    info!("Registered user {}", response.username);
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<Json<LoginResponse>> {
    let username = normalize_username(&req.username);
    let secret = state.jwt_secret.clone();
    let token_days = state.token_days;

    let response = run_blocking(&state, move |db| {
        let invalid = || ApiError::Unauthorized("Invalid username or password".into());

        let user = db.get_user_by_username(&username)?.ok_or_else(invalid)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| anyhow::anyhow!("Stored hash for {} is corrupt: {}", user.username, e))?;

        if Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .is_err()
        {
            warn!("Failed login for {}", user.username);
            return Err(invalid());
        }

        let user_id: Uuid = user.id.parse().map_err(anyhow::Error::from)?;
        let token = create_token(&secret, token_days, user_id, &user.username)?;

        Ok(LoginResponse {
            user_id,
            username: user.username,
            token,
        })
    })
    .await?;

    Ok(Json(response))
}

/// Issue an HS256 token for `username`, valid for `days` days.
pub fn create_token(secret: &str, days: i64, user_id: Uuid, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(days)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
