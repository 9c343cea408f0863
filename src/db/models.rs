use rusqlite::Row;
use serde::{Deserialize, Serialize};

use crate::votes::{Direction, VoteTarget};

/// Column list matching [`User::from_row`].
pub const USER_COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.display_name, \
     u.bio, u.avatar_url, u.is_active, u.is_admin, u.created_at, u.updated_at";

/// Column list matching [`UserPublic::from_row_at`].
pub const AUTHOR_COLUMNS: &str =
    "u.id, u.username, u.display_name, u.bio, u.avatar_url, u.created_at";

pub const POST_COLUMNS: &str = "p.id, p.title, p.body, p.link_url, p.author_id, p.is_deleted, \
     p.created_at, p.updated_at";

pub const COMMENT_COLUMNS: &str = "c.id, c.body, c.author_id, c.post_id, c.parent_id, \
     c.is_deleted, c.created_at, c.updated_at";

#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            display_name: row.get(4)?,
            bio: row.get(5)?,
            avatar_url: row.get(6)?,
            is_active: row.get(7)?,
            is_admin: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            bio: self.bio.clone(),
            avatar_url: self.avatar_url.clone(),
            created_at: self.created_at.clone(),
        }
    }

    pub fn to_private(&self) -> UserPrivate {
        UserPrivate {
            public: self.to_public(),
            email: self.email.clone(),
            is_admin: self.is_admin,
        }
    }

    /// Authors and admins may mutate a resource.
    pub fn can_modify(&self, author_id: i64) -> bool {
        self.id == author_id || self.is_admin
    }
}

/// Profile fields safe to show to anyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPublic {
    pub id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

impl UserPublic {
    pub fn from_row_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            username: row.get(at + 1)?,
            display_name: row.get(at + 2)?,
            bio: row.get(at + 3)?,
            avatar_url: row.get(at + 4)?,
            created_at: row.get(at + 5)?,
        })
    }
}

/// Returned only to the user themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrivate {
    #[serde(flatten)]
    pub public: UserPublic,
    pub email: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub body: Option<String>,
    pub link_url: Option<String>,
    pub author_id: i64,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Post {
    pub fn from_row_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            title: row.get(at + 1)?,
            body: row.get(at + 2)?,
            link_url: row.get(at + 3)?,
            author_id: row.get(at + 4)?,
            is_deleted: row.get(at + 5)?,
            created_at: row.get(at + 6)?,
            updated_at: row.get(at + 7)?,
        })
    }
}

/// A post joined with its author's public profile.
#[derive(Debug, Clone)]
pub struct PostRecord {
    pub post: Post,
    pub author: UserPublic,
}

impl PostRecord {
    /// Expects `POST_COLUMNS, AUTHOR_COLUMNS`.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            post: Post::from_row_at(row, 0)?,
            author: UserPublic::from_row_at(row, 8)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub body: String,
    pub author_id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl Comment {
    pub fn from_row_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(at)?,
            body: row.get(at + 1)?,
            author_id: row.get(at + 2)?,
            post_id: row.get(at + 3)?,
            parent_id: row.get(at + 4)?,
            is_deleted: row.get(at + 5)?,
            created_at: row.get(at + 6)?,
            updated_at: row.get(at + 7)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommentRecord {
    pub comment: Comment,
    pub author: UserPublic,
}

impl CommentRecord {
    /// Expects `COMMENT_COLUMNS, AUTHOR_COLUMNS`.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            comment: Comment::from_row_at(row, 0)?,
            author: UserPublic::from_row_at(row, 8)?,
        })
    }
}

/// A stored vote. The two nullable target columns collapse into [`VoteTarget`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vote {
    pub id: i64,
    pub user_id: i64,
    pub target: VoteTarget,
    pub direction: Direction,
}

impl Vote {
    /// Expects `id, user_id, post_id, comment_id, direction`.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let post_id: Option<i64> = row.get(2)?;
        let comment_id: Option<i64> = row.get(3)?;
        let target = VoteTarget::from_columns(post_id, comment_id).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                "vote row must reference exactly one target".into(),
            )
        })?;
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            target,
            direction: row.get(4)?,
        })
    }
}
