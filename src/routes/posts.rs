use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;

use crate::content::{posts, FeedSort, NewPost};
use crate::db;
use crate::enrich::PostView;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, AppPath, AppQuery, CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::validation;

// -- Request types --

#[derive(Deserialize, Default)]
pub struct FeedQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub title: String,
    pub body: Option<String>,
    pub link_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePostRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

fn post_not_found() -> AppError {
    AppError::NotFound("Post not found.".into())
}

// -- Handlers --

/// GET /posts
async fn list_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppQuery(query): AppQuery<FeedQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let (skip, limit) = validation::page(query.skip, query.limit)?;
    let sort = match query.sort.as_deref() {
        Some(s) => s.parse::<FeedSort>().map_err(AppError::Validation)?,
        None => FeedSort::New,
    };

    let views = db::read_tx(&state.db, |tx| {
        posts::feed(tx, None, skip, limit, sort, viewer.id()).map_err(AppError::from)
    })?;
    Ok(Json(views))
}

/// POST /posts
async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PostView>)> {
    let title = req.title.trim().to_string();
    validation::length("Title", &title, 1, validation::TITLE_MAX)?;
    let body = validation::non_blank(req.body);
    validation::max_length("Body", body.as_deref(), validation::POST_BODY_MAX)?;
    let link_url = validation::non_blank(req.link_url).map(|l| l.trim().to_string());
    validation::max_length("Link URL", link_url.as_deref(), validation::LINK_URL_MAX)?;

    if body.is_none() && link_url.is_none() {
        return Err(AppError::Validation(
            "Post must have either a body or a link URL.".into(),
        ));
    }

    let new_post = NewPost {
        title,
        body,
        link_url,
    };
    let view = db::write_tx(&state.db, |tx| {
        let id = posts::insert(tx, user.id(), &new_post)?;
        let record = posts::find_live(tx, id)?.ok_or_else(post_not_found)?;
        Ok::<_, AppError>(posts::view(tx, &record, Some(user.id()))?)
    })?;

    tracing::info!(post_id = view.id, author_id = user.id(), "Post created");
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /posts/{id}
async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppPath(post_id): AppPath<i64>,
) -> AppResult<Json<PostView>> {
    let view = db::read_tx(&state.db, |tx| {
        let record = posts::find_live(tx, post_id)?.ok_or_else(post_not_found)?;
        Ok::<_, AppError>(posts::view(tx, &record, viewer.id())?)
    })?;
    Ok(Json(view))
}

/// PATCH /posts/{id}
async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
    AppJson(req): AppJson<UpdatePostRequest>,
) -> AppResult<Json<PostView>> {
    let title = req.title.map(|t| t.trim().to_string());
    if let Some(ref t) = title {
        validation::length("Title", t, 1, validation::TITLE_MAX)?;
    }
    validation::max_length("Body", req.body.as_deref(), validation::POST_BODY_MAX)?;

    let view = db::write_tx(&state.db, |tx| {
        let record = posts::find_live(tx, post_id)?.ok_or_else(post_not_found)?;
        user.ensure_can_modify(record.post.author_id)?;

        posts::update(tx, post_id, title.as_deref(), req.body.as_deref())?;
        let record = posts::find_live(tx, post_id)?.ok_or_else(post_not_found)?;
        Ok::<_, AppError>(posts::view(tx, &record, Some(user.id()))?)
    })?;

    tracing::info!(post_id, user_id = user.id(), "Post updated");
    Ok(Json(view))
}

/// DELETE /posts/{id}
async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
) -> AppResult<StatusCode> {
    db::write_tx(&state.db, |tx| {
        let record = posts::find_live(tx, post_id)?.ok_or_else(post_not_found)?;
        user.ensure_can_modify(record.post.author_id)?;
        posts::soft_delete(tx, post_id)?;
        Ok::<_, AppError>(())
    })?;

    tracing::info!(post_id, user_id = user.id(), "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/{id}",
            get(get_post).patch(update_post).delete(delete_post),
        )
}
