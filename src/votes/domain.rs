// Vote domain types - pure, no database access
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// A stored vote direction. Zero is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn value(self) -> i64 {
        match self {
            Direction::Up => 1,
            Direction::Down => -1,
        }
    }

    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Direction::Up),
            -1 => Some(Direction::Down),
            _ => None,
        }
    }
}

impl Serialize for Direction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.value())
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.value()))
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        Direction::from_value(raw).ok_or(FromSqlError::OutOfRange(raw))
    }
}

/// What a vote applies to. Exactly one target, enforced by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteTarget {
    Post(i64),
    Comment(i64),
}

impl VoteTarget {
    /// Collapse the two nullable foreign keys into a target.
    pub fn from_columns(post_id: Option<i64>, comment_id: Option<i64>) -> Option<Self> {
        match (post_id, comment_id) {
            (Some(id), None) => Some(VoteTarget::Post(id)),
            (None, Some(id)) => Some(VoteTarget::Comment(id)),
            _ => None,
        }
    }

    /// `(post_id, comment_id)` as persisted.
    pub fn columns(self) -> (Option<i64>, Option<i64>) {
        match self {
            VoteTarget::Post(id) => (Some(id), None),
            VoteTarget::Comment(id) => (None, Some(id)),
        }
    }

    /// Foreign-key column naming this target kind in the `votes` table.
    pub(crate) fn column(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "post_id",
            VoteTarget::Comment(_) => "comment_id",
        }
    }

    pub(crate) fn table(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "posts",
            VoteTarget::Comment(_) => "comments",
        }
    }

    pub fn id(self) -> i64 {
        match self {
            VoteTarget::Post(id) | VoteTarget::Comment(id) => id,
        }
    }

    pub(crate) fn not_found_message(self) -> &'static str {
        match self {
            VoteTarget::Post(_) => "Post not found.",
            VoteTarget::Comment(_) => "Comment not found.",
        }
    }
}

impl fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoteTarget::Post(id) => write!(f, "post:{}", id),
            VoteTarget::Comment(id) => write!(f, "comment:{}", id),
        }
    }
}

/// What the caller asked the ledger to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteAction {
    Set(Direction),
    Remove,
}

impl VoteAction {
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            0 => Some(VoteAction::Remove),
            other => Direction::from_value(other).map(VoteAction::Set),
        }
    }
}

/// Wire form of `POST /votes`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub direction: i64,
    #[serde(default)]
    pub post_id: Option<i64>,
    #[serde(default)]
    pub comment_id: Option<i64>,
}

/// A validated vote command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteCommand {
    pub target: VoteTarget,
    pub action: VoteAction,
}

impl TryFrom<VoteRequest> for VoteCommand {
    type Error = VoteError;

    fn try_from(req: VoteRequest) -> Result<Self, Self::Error> {
        // Target shape is checked first so a bad target fails regardless of direction
        let target = VoteTarget::from_columns(req.post_id, req.comment_id).ok_or_else(|| {
            VoteError::Validation("Provide exactly one of postId or commentId.".into())
        })?;
        let action = VoteAction::from_value(req.direction).ok_or_else(|| {
            VoteError::Validation("Direction must be 1, -1 or 0.".into())
        })?;
        Ok(Self { target, action })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteOutcome {
    Cast,
    Updated,
    Removed,
}

impl VoteOutcome {
    pub fn message(self) -> &'static str {
        match self {
            VoteOutcome::Cast => "cast",
            VoteOutcome::Updated => "updated",
            VoteOutcome::Removed => "removed",
        }
    }
}

/// Result of a ledger mutation, with the score read in the same transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReceipt {
    pub outcome: VoteOutcome,
    pub new_score: i64,
}
