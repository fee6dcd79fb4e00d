//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Extension, Json};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::PasswordService,
    error::{get_db_conn, ApiError, ApiResult},
    handlers::{respond, ApiResponse},
    middleware::AuthUser,
    models::{NewUser, User},
    schema::users,
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "securepassword123", min_length = 8)]
    pub password: String,
    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    #[schema(example = "Ada")]
    pub first_name: String,
    #[validate(length(max = 100, message = "Last name is too long"))]
    #[serde(default)]
    #[schema(example = "Lovelace")]
    pub last_name: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "user@example.com")]
    pub email: String,
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    pub has_profile_picture: bool,
    pub created_at: chrono::NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            has_profile_picture: user.profile_picture.is_some(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    #[schema(example = 86400)]
    pub expires_in: i64,
}

fn issue(state: &AppState, user: User) -> ApiResult<AuthResponse> {
    let access_token = state.token_issuer.issue_token(&user).map_err(|e| {
        error!(error = %e, user_id = user.id, "Token generation failed");
        ApiError::internal("Token generation failed", "TOKEN_ERROR")
    })?;

    Ok(AuthResponse {
        access_token,
        expires_in: state.token_issuer.access_token_expiry,
        user: user.into(),
    })
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Authentication",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 409, description = "User already exists", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    if let Err(e) = state.password_policy.validate(&payload.password) {
        return Err(ApiError::bad_request(
            e.to_string(),
            "PASSWORD_POLICY_VIOLATION",
        ));
    }

    let password_hash = PasswordService::hash_password(&payload.password, state.password_hash_cost)
        .map_err(|e| {
            error!(error = %e, "Password hashing failed");
            ApiError::internal("Failed to process password", "PASSWORD_HASH_ERROR")
        })?;

    let new_user = NewUser {
        email: payload.email.trim().to_lowercase(),
        password_hash: Some(password_hash),
        first_name: payload.first_name.trim().to_string(),
        last_name: payload.last_name.trim().to_string(),
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = diesel::insert_into(users::table)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(&mut conn)
        .map_err(|e| match e {
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                _,
            ) => {
                warn!(email = %new_user.email, "Registration with an existing email");
                ApiError::conflict("User with this email already exists", "USER_EXISTS")
            }
            other => {
                error!(error = %other, "Failed to register user");
                ApiError::db_error()
            }
        })?;

    info!(user_id = user.id, email = %user.email, "User registered");

    let body = issue(&state, user)?;
    Ok((StatusCode::CREATED, respond("Registration successful", body)))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<ApiResponse<AuthResponse>>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .filter(users::email.eq(payload.email.trim().to_lowercase()))
        .select(User::as_select())
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?
        .ok_or_else(|| {
            warn!(email = %payload.email, "Login attempt for non-existent user");
            ApiError::unauthorized("Invalid credentials", "INVALID_CREDENTIALS")
        })?;

    let is_valid = PasswordService::verify_password(&payload.password, user.password_hash.as_deref())
        .map_err(|e| {
            error!(error = %e, "Password verification error");
            ApiError::internal("Password verification error", "PASSWORD_VERIFY_ERROR")
        })?;

    if !is_valid {
        warn!(user_id = user.id, "Failed login attempt - invalid password");
        return Err(ApiError::unauthorized(
            "Invalid credentials",
            "INVALID_CREDENTIALS",
        ));
    }

    info!(user_id = user.id, email = %user.email, "User logged in");

    let body = issue(&state, user)?;
    Ok(respond("Login successful", body))
}

/// Returns the currently authenticated user's information.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user information", body = ApiResponse<UserResponse>),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User not found", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user: User = users::table
        .find(auth_user.id)
        .select(User::as_select())
        .first(&mut conn)
        .optional()
        .map_err(|_| ApiError::db_error())?
        .ok_or_else(|| ApiError::not_found("User not found", "USER_NOT_FOUND"))?;

    Ok(respond("Current user", user.into()))
}
