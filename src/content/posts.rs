use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;

use crate::content::comments;
use crate::db::models::{PostRecord, AUTHOR_COLUMNS, POST_COLUMNS};
use crate::enrich::{enrich_post, PostView, VoteIndex};
use crate::votes::ledger::votes_for_posts;

#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    pub body: Option<String>,
    pub link_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedSort {
    #[default]
    New,
    Top,
}

impl FromStr for FeedSort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(FeedSort::New),
            "top" => Ok(FeedSort::Top),
            other => Err(format!("Unknown sort '{}'; expected 'new' or 'top'.", other)),
        }
    }
}

pub fn insert(conn: &Connection, author_id: i64, post: &NewPost) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO posts (title, body, link_url, author_id) VALUES (?1, ?2, ?3, ?4)",
        params![post.title, post.body, post.link_url, author_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A post that exists and is not soft-deleted.
pub fn find_live(conn: &Connection, id: i64) -> rusqlite::Result<Option<PostRecord>> {
    conn.query_row(
        &format!(
            "SELECT {}, {} FROM posts p JOIN users u ON u.id = p.author_id
             WHERE p.id = ?1 AND p.is_deleted = 0",
            POST_COLUMNS, AUTHOR_COLUMNS
        ),
        params![id],
        PostRecord::from_row,
    )
    .optional()
}

/// Live posts, newest first, optionally restricted to one author.
pub fn list_live(
    conn: &Connection,
    author_id: Option<i64>,
    skip: i64,
    limit: i64,
) -> rusqlite::Result<Vec<PostRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, {} FROM posts p JOIN users u ON u.id = p.author_id
         WHERE p.is_deleted = 0 AND (?1 IS NULL OR p.author_id = ?1)
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?2 OFFSET ?3",
        POST_COLUMNS, AUTHOR_COLUMNS
    ))?;
    let posts = stmt
        .query_map(params![author_id, limit, skip], PostRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

pub fn update(
    conn: &Connection,
    id: i64,
    title: Option<&str>,
    body: Option<&str>,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE posts SET
            title = COALESCE(?2, title),
            body = COALESCE(?3, body),
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![id, title, body],
    )?;
    Ok(())
}

pub fn soft_delete(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE posts SET is_deleted = 1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

/// Load votes and live comment counts for `records` and project them for `viewer`.
pub fn views(
    conn: &Connection,
    records: &[PostRecord],
    viewer: Option<i64>,
) -> rusqlite::Result<Vec<PostView>> {
    let ids: Vec<i64> = records.iter().map(|r| r.post.id).collect();
    let votes = VoteIndex::new(votes_for_posts(conn, &ids)?);
    let counts = comments::live_counts(conn, &ids)?;

    Ok(records
        .iter()
        .map(|record| {
            let comment_count = counts.get(&record.post.id).copied().unwrap_or(0);
            enrich_post(record, &votes, comment_count, viewer)
        })
        .collect())
}

pub fn view(
    conn: &Connection,
    record: &PostRecord,
    viewer: Option<i64>,
) -> rusqlite::Result<PostView> {
    views(conn, std::slice::from_ref(record), viewer)?
        .pop()
        .ok_or(rusqlite::Error::QueryReturnedNoRows)
}

/// One feed page. The page is always selected newest-first; `Top` then
/// re-orders that page by score.
pub fn feed(
    conn: &Connection,
    author_id: Option<i64>,
    skip: i64,
    limit: i64,
    sort: FeedSort,
    viewer: Option<i64>,
) -> rusqlite::Result<Vec<PostView>> {
    let records = list_live(conn, author_id, skip, limit)?;
    let mut views = views(conn, &records, viewer)?;
    if sort == FeedSort::Top {
        views.sort_by(|a, b| b.score.cmp(&a.score));
    }
    Ok(views)
}
