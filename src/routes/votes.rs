use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;

use crate::error::AppResult;
use crate::extractors::{AppJson, CurrentUser};
use crate::state::AppState;
use crate::votes::{VoteCommand, VoteRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub message: &'static str,
    pub new_score: i64,
}

/// POST /votes
async fn cast_vote(
    State(state): State<AppState>,
    user: CurrentUser,
    AppJson(req): AppJson<VoteRequest>,
) -> AppResult<Json<VoteResponse>> {
    let command = VoteCommand::try_from(req)?;
    let receipt = state.votes.cast(user.id(), command).await?;
    Ok(Json(VoteResponse {
        message: receipt.outcome.message(),
        new_score: receipt.new_score,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/votes", post(cast_vote))
}
