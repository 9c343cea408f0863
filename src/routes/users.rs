use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::content::{posts, FeedSort};
use crate::db::{self, models::{UserPrivate, UserPublic}};
use crate::enrich::PostView;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, AppPath, AppQuery, CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::users::avatar;
use crate::users::repository::{self, ProfileUpdate};
use crate::validation;

/// Room for the multipart envelope around a maximum-size image.
const AVATAR_BODY_LIMIT: usize = validation::AVATAR_MAX_BYTES + 64 * 1024;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

fn user_not_found() -> AppError {
    AppError::NotFound("User not found.".into())
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Avatar must be <= 2 MB.".into())
    } else {
        AppError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}

/// GET /users/{username}
async fn get_profile(
    State(state): State<AppState>,
    AppPath(username): AppPath<String>,
) -> AppResult<Json<UserPublic>> {
    let conn = state.db.get()?;
    let user = repository::find_by_username(&conn, &username.to_lowercase())?
        .ok_or_else(user_not_found)?;
    Ok(Json(user.to_public()))
}

/// PATCH /users/me
async fn update_me(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<UserPrivate>> {
    let display_name = req.display_name.map(|d| d.trim().to_string());
    if let Some(ref d) = display_name {
        validation::length("Display name", d, 1, validation::DISPLAY_NAME_MAX)?;
    }
    validation::max_length("Bio", req.bio.as_deref(), validation::BIO_MAX)?;
    validation::max_length("Avatar URL", req.avatar_url.as_deref(), validation::AVATAR_URL_MAX)?;

    let update = ProfileUpdate {
        display_name,
        bio: req.bio,
        avatar_url: req.avatar_url,
    };
    let updated = db::write_tx(&state.db, |tx| {
        repository::update_profile(tx, user.id(), &update)?;
        repository::find_by_id(tx, user.id())?.ok_or_else(user_not_found)
    })?;

    tracing::info!(user_id = updated.id, "Profile updated");
    Ok(Json(updated.to_private()))
}

/// POST /users/me/avatar
async fn upload_avatar(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<UserPrivate>> {
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("file") {
            bytes = Some(field.bytes().await.map_err(multipart_error)?);
            break;
        }
    }
    let bytes = bytes.ok_or_else(|| AppError::Validation("Missing file field.".into()))?;

    let update = ProfileUpdate {
        avatar_url: Some(avatar::to_data_uri(&bytes)?),
        ..ProfileUpdate::default()
    };
    let updated = db::write_tx(&state.db, |tx| {
        repository::update_profile(tx, user.id(), &update)?;
        repository::find_by_id(tx, user.id())?.ok_or_else(user_not_found)
    })?;

    tracing::info!(user_id = updated.id, size = bytes.len(), "Avatar uploaded");
    Ok(Json(updated.to_private()))
}

/// GET /users/{username}/posts
async fn list_user_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppPath(username): AppPath<String>,
    AppQuery(query): AppQuery<PageQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let (skip, limit) = validation::page(query.skip, query.limit)?;

    let views = db::read_tx(&state.db, |tx| {
        let author = repository::find_by_username(tx, &username.to_lowercase())?
            .ok_or_else(user_not_found)?;
        Ok::<_, AppError>(posts::feed(
            tx,
            Some(author.id),
            skip,
            limit,
            FeedSort::New,
            viewer.id(),
        )?)
    })?;
    Ok(Json(views))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", patch(update_me))
        .route(
            "/users/me/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(AVATAR_BODY_LIMIT)),
        )
        .route("/users/{username}", get(get_profile))
        .route("/users/{username}/posts", get(list_user_posts))
}
