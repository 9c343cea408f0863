use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::{TokenKind, TokenPair};
use crate::db::{self, models::UserPrivate};
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, CurrentUser};
use crate::state::AppState;
use crate::users::repository::{self, NewUser};
use crate::validation;

// -- Request types --

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Email or username
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// -- Handlers --

/// POST /auth/register
pub async fn register(
    State(state): State<AppState>,
    AppJson(req): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserPrivate>)> {
    let username = req.username.trim().to_string();
    validation::username(&username)?;
    let email = req.email.trim().to_lowercase();
    validation::email(&email)?;
    validation::password(&req.password)?;
    let display_name = validation::non_blank(req.display_name)
        .map(|d| d.trim().to_string())
        .unwrap_or_else(|| username.clone());
    validation::length("Display name", &display_name, 1, validation::DISPLAY_NAME_MAX)?;

    let new_user = NewUser {
        username: username.to_lowercase(),
        email,
        password_hash: hash_password(&req.password, state.config.auth.password_cost)?,
        display_name,
    };

    let user = db::write_tx(&state.db, |tx| {
        if repository::find_by_username(tx, &new_user.username)?.is_some() {
            return Err(AppError::Conflict("Username already taken.".into()));
        }
        if repository::find_by_email(tx, &new_user.email)?.is_some() {
            return Err(AppError::Conflict("Email already registered.".into()));
        }
        let id = repository::insert(tx, &new_user).map_err(|e| {
            if db::is_unique_violation(&e) {
                AppError::Conflict("Username or email already registered.".into())
            } else {
                e.into()
            }
        })?;
        repository::find_by_id(tx, id)?
            .ok_or_else(|| AppError::Internal("Registered user vanished".into()))
    })?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");
    Ok((StatusCode::CREATED, Json(user.to_private())))
}

/// POST /auth/login
pub async fn login(
    State(state): State<AppState>,
    AppJson(req): AppJson<LoginRequest>,
) -> AppResult<Json<TokenPair>> {
    let user = {
        let conn = state.db.get()?;
        repository::find_by_login(&conn, &req.identifier)?
    };

    let user = match user {
        Some(user) if verify_password(&req.password, &user.password_hash) => user,
        _ => {
            return Err(AppError::Unauthorized(
                "Incorrect email/username or password.".into(),
            ))
        }
    };

    if !user.is_active {
        return Err(AppError::Forbidden("Account is disabled.".into()));
    }

    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(state.tokens.issue_pair(user.id)?))
}

/// POST /auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    AppJson(req): AppJson<RefreshRequest>,
) -> AppResult<Json<TokenPair>> {
    let user_id = state
        .tokens
        .verify(&req.refresh_token, TokenKind::Refresh)
        .map_err(|_| AppError::Unauthorized("Invalid or expired refresh token.".into()))?;

    let conn = state.db.get()?;
    match repository::find_by_id(&conn, user_id)? {
        Some(user) if user.is_active => Ok(Json(state.tokens.issue_pair(user.id)?)),
        _ => Err(AppError::Unauthorized("User not found.".into())),
    }
}

/// GET /auth/me
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserPrivate> {
    Json(user.to_private())
}
