use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::TokenKind;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::users::repository;

/// JSON body whose rejections render as `{"detail": ...}`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Path parameters with JSON rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

/// Query string with JSON rejections.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);

/// The authenticated caller.
/// Requires a valid access token for an existing, active user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.id
    }

    /// Author-or-admin check applied to every post/comment mutation.
    pub fn ensure_can_modify(&self, author_id: i64) -> AppResult<()> {
        if self.0.can_modify(author_id) {
            Ok(())
        } else {
            Err(AppError::not_authorized())
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Not authenticated.".into()))?;

        let user_id = state.tokens.verify(token, TokenKind::Access)?;

        let conn = state.db.get()?;
        let user = repository::find_by_id(&conn, user_id)?
            .ok_or_else(|| AppError::Unauthorized("User not found.".into()))?;

        if !user.is_active {
            return Err(AppError::Forbidden("Account is disabled.".into()));
        }

        Ok(CurrentUser(user))
    }
}

/// Optional caller. Credential failures degrade to anonymous; storage
/// failures still surface.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(CurrentUser(user)) => Ok(MaybeUser(Some(user))),
            Err(e @ (AppError::Unauthorized(_) | AppError::Forbidden(_))) => {
                if extract_bearer_token(parts).is_some() {
                    tracing::debug!("Ignoring bad credential on read: {}", e);
                }
                Ok(MaybeUser(None))
            }
            Err(e) => Err(e),
        }
    }
}

fn extract_bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
