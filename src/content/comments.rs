use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;

use crate::db::models::{Comment, CommentRecord, AUTHOR_COLUMNS, COMMENT_COLUMNS};
use crate::db::placeholders;
use crate::enrich::{CommentForest, VoteIndex};
use crate::votes::ledger::votes_for_post_comments;

pub fn insert(
    conn: &Connection,
    author_id: i64,
    post_id: i64,
    parent_id: Option<i64>,
    body: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO comments (body, author_id, post_id, parent_id) VALUES (?1, ?2, ?3, ?4)",
        params![body, author_id, post_id, parent_id],
    )?;
    Ok(conn.last_insert_rowid())
}

/// A comment in any state.
pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Comment>> {
    conn.query_row(
        &format!("SELECT {} FROM comments c WHERE c.id = ?1", COMMENT_COLUMNS),
        params![id],
        |row| Comment::from_row_at(row, 0),
    )
    .optional()
}

pub fn find_live(conn: &Connection, id: i64) -> rusqlite::Result<Option<Comment>> {
    Ok(find(conn, id)?.filter(|c| !c.is_deleted))
}

/// Live comment count per post, at any depth. Posts without live comments
/// are absent from the map.
pub fn live_counts(conn: &Connection, post_ids: &[i64]) -> rusqlite::Result<HashMap<i64, i64>> {
    if post_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let sql = format!(
        "SELECT post_id, COUNT(*) FROM comments
         WHERE is_deleted = 0 AND post_id IN ({})
         GROUP BY post_id",
        placeholders(post_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map(params_from_iter(post_ids.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<Result<HashMap<_, _>, _>>()?;
    Ok(counts)
}

/// Every comment of a post with its author, deleted ones included so the
/// tree can be built once and pruned while walking.
pub fn records_for_post(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<CommentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {}, {} FROM comments c JOIN users u ON u.id = c.author_id
         WHERE c.post_id = ?1",
        COMMENT_COLUMNS, AUTHOR_COLUMNS
    ))?;
    let records = stmt
        .query_map(params![post_id], CommentRecord::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Comment tree and its votes for one post, loaded in two queries.
pub fn load_forest(conn: &Connection, post_id: i64) -> rusqlite::Result<(CommentForest, VoteIndex)> {
    let forest = CommentForest::new(records_for_post(conn, post_id)?);
    let votes = VoteIndex::new(votes_for_post_comments(conn, post_id)?);
    Ok((forest, votes))
}

pub fn update_body(conn: &Connection, id: i64, body: &str) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE comments SET body = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![id, body],
    )?;
    Ok(())
}

pub fn soft_delete(conn: &Connection, id: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE comments SET is_deleted = 1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}
