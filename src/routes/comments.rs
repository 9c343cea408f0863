use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;

use crate::content::{comments, posts};
use crate::db;
use crate::enrich::CommentView;
use crate::error::{AppError, AppResult};
use crate::extractors::{AppJson, AppPath, CurrentUser, MaybeUser};
use crate::state::AppState;
use crate::validation;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub body: String,
    pub parent_id: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateCommentRequest {
    pub body: String,
}

fn comment_not_found() -> AppError {
    AppError::NotFound("Comment not found.".into())
}

fn validate_body(body: &str) -> AppResult<()> {
    validation::length("Comment", body, 1, validation::COMMENT_BODY_MAX)
}

/// GET /comments/post/{post_id}
async fn list_for_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    AppPath(post_id): AppPath<i64>,
) -> AppResult<Json<Vec<CommentView>>> {
    let tree = db::read_tx(&state.db, |tx| {
        if posts::find_live(tx, post_id)?.is_none() {
            return Err(AppError::NotFound("Post not found.".into()));
        }
        let (forest, votes) = comments::load_forest(tx, post_id)?;
        Ok(forest.top_level(&votes, viewer.id()))
    })?;
    Ok(Json(tree))
}

/// POST /comments/post/{post_id}
async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(post_id): AppPath<i64>,
    AppJson(req): AppJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentView>)> {
    let body = req.body.trim();
    validate_body(body)?;

    let view = db::write_tx(&state.db, |tx| {
        if posts::find_live(tx, post_id)?.is_none() {
            return Err(AppError::NotFound("Post not found.".into()));
        }
        // A soft-deleted parent still accepts replies; only its post must match
        if let Some(parent_id) = req.parent_id {
            match comments::find(tx, parent_id)? {
                Some(parent) if parent.post_id == post_id => {}
                _ => return Err(AppError::Validation("Invalid parent comment.".into())),
            }
        }

        let id = comments::insert(tx, user.id(), post_id, req.parent_id, body)?;
        let (forest, votes) = comments::load_forest(tx, post_id)?;
        forest
            .subtree(id, &votes, Some(user.id()))
            .ok_or_else(|| AppError::Internal("Created comment vanished".into()))
    })?;

    tracing::info!(comment_id = view.id, post_id, author_id = user.id(), "Comment created");
    Ok((StatusCode::CREATED, Json(view)))
}

/// PATCH /comments/{id}
async fn update_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(comment_id): AppPath<i64>,
    AppJson(req): AppJson<UpdateCommentRequest>,
) -> AppResult<Json<CommentView>> {
    let body = req.body.trim();
    validate_body(body)?;

    let view = db::write_tx(&state.db, |tx| {
        let comment = comments::find_live(tx, comment_id)?.ok_or_else(comment_not_found)?;
        user.ensure_can_modify(comment.author_id)?;

        comments::update_body(tx, comment_id, body)?;
        let (forest, votes) = comments::load_forest(tx, comment.post_id)?;
        forest
            .subtree(comment_id, &votes, Some(user.id()))
            .ok_or_else(comment_not_found)
    })?;

    tracing::info!(comment_id, user_id = user.id(), "Comment updated");
    Ok(Json(view))
}

/// DELETE /comments/{id}
async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    AppPath(comment_id): AppPath<i64>,
) -> AppResult<StatusCode> {
    db::write_tx(&state.db, |tx| {
        let comment = comments::find_live(tx, comment_id)?.ok_or_else(comment_not_found)?;
        user.ensure_can_modify(comment.author_id)?;
        comments::soft_delete(tx, comment_id)?;
        Ok::<_, AppError>(())
    })?;

    tracing::info!(comment_id, user_id = user.id(), "Comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/comments/post/{post_id}",
            get(list_for_post).post(create_comment),
        )
        .route(
            "/comments/{id}",
            patch(update_comment).delete(delete_comment),
        )
}
