// Vote ledger - every mutation and its score read share one transaction
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::Arc;

use crate::db::{self, models::Vote};
use crate::state::DbPool;
use crate::votes::domain::*;

#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Apply a vote command for `user_id` and return the target's new score.
    async fn cast(&self, user_id: i64, command: VoteCommand) -> Result<VoteReceipt, VoteError>;
}

pub struct SqliteVoteLedger {
    pool: DbPool,
}

impl SqliteVoteLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VoteLedger for SqliteVoteLedger {
    async fn cast(&self, user_id: i64, command: VoteCommand) -> Result<VoteReceipt, VoteError> {
        let receipt = db::write_tx(&self.pool, |tx| apply(tx, user_id, command))?;
        tracing::info!(
            user_id,
            target = %command.target,
            outcome = receipt.outcome.message(),
            new_score = receipt.new_score,
            "Vote applied"
        );
        Ok(receipt)
    }
}

pub type DynVoteLedger = Arc<dyn VoteLedger>;

/// Resolve, mutate and re-score. Callers own the transaction.
pub fn apply(conn: &Connection, user_id: i64, command: VoteCommand) -> Result<VoteReceipt, VoteError> {
    let target = command.target;
    ensure_live_target(conn, target)?;

    let existing = find_vote(conn, user_id, target)?;

    let outcome = match (command.action, existing) {
        (VoteAction::Remove, Some(vote)) => {
            conn.execute("DELETE FROM votes WHERE id = ?1", params![vote.id])?;
            VoteOutcome::Removed
        }
        (VoteAction::Remove, None) => VoteOutcome::Removed,
        (VoteAction::Set(direction), Some(vote)) => {
            conn.execute(
                "UPDATE votes SET direction = ?1 WHERE id = ?2",
                params![direction, vote.id],
            )?;
            VoteOutcome::Updated
        }
        (VoteAction::Set(direction), None) => insert_or_update(conn, user_id, target, direction)?,
    };

    Ok(VoteReceipt {
        outcome,
        new_score: score(conn, target)?,
    })
}

/// Insert a vote; a concurrent insert that won the unique constraint turns
/// this into an update of that row.
fn insert_or_update(
    conn: &Connection,
    user_id: i64,
    target: VoteTarget,
    direction: Direction,
) -> Result<VoteOutcome, VoteError> {
    let (post_id, comment_id) = target.columns();
    match conn.execute(
        "INSERT INTO votes (user_id, post_id, comment_id, direction) VALUES (?1, ?2, ?3, ?4)",
        params![user_id, post_id, comment_id, direction],
    ) {
        Ok(_) => Ok(VoteOutcome::Cast),
        Err(e) if db::is_unique_violation(&e) => {
            tracing::debug!(user_id, %target, "Vote insert raced; updating existing row");
            conn.execute(
                &format!(
                    "UPDATE votes SET direction = ?1 WHERE user_id = ?2 AND {} = ?3",
                    target.column()
                ),
                params![direction, user_id, target.id()],
            )?;
            Ok(VoteOutcome::Updated)
        }
        Err(e) => Err(e.into()),
    }
}

fn ensure_live_target(conn: &Connection, target: VoteTarget) -> Result<(), VoteError> {
    let live: bool = conn.query_row(
        &format!(
            "SELECT COUNT(*) > 0 FROM {} WHERE id = ?1 AND is_deleted = 0",
            target.table()
        ),
        params![target.id()],
        |row| row.get(0),
    )?;
    if live {
        Ok(())
    } else {
        Err(VoteError::NotFound(target.not_found_message().into()))
    }
}

pub fn find_vote(
    conn: &Connection,
    user_id: i64,
    target: VoteTarget,
) -> rusqlite::Result<Option<Vote>> {
    conn.query_row(
        &format!(
            "SELECT id, user_id, post_id, comment_id, direction FROM votes
             WHERE user_id = ?1 AND {} = ?2",
            target.column()
        ),
        params![user_id, target.id()],
        Vote::from_row,
    )
    .optional()
}

/// Sum of current vote directions on `target`.
pub fn score(conn: &Connection, target: VoteTarget) -> rusqlite::Result<i64> {
    conn.query_row(
        &format!(
            "SELECT COALESCE(SUM(direction), 0) FROM votes WHERE {} = ?1",
            target.column()
        ),
        params![target.id()],
        |row| row.get(0),
    )
}

/// All votes on the given posts.
pub fn votes_for_posts(conn: &Connection, post_ids: &[i64]) -> rusqlite::Result<Vec<Vote>> {
    if post_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, user_id, post_id, comment_id, direction FROM votes WHERE post_id IN ({})",
        db::placeholders(post_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let votes = stmt
        .query_map(params_from_iter(post_ids.iter()), Vote::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(votes)
}

/// All votes on any comment of `post_id`, deleted comments included.
pub fn votes_for_post_comments(conn: &Connection, post_id: i64) -> rusqlite::Result<Vec<Vote>> {
    let mut stmt = conn.prepare(
        "SELECT v.id, v.user_id, v.post_id, v.comment_id, v.direction FROM votes v
         JOIN comments c ON c.id = v.comment_id
         WHERE c.post_id = ?1",
    )?;
    let votes = stmt
        .query_map(params![post_id], Vote::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(votes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::*;

    fn command(target: VoteTarget, direction: i64) -> VoteCommand {
        VoteCommand {
            target,
            action: VoteAction::from_value(direction).unwrap(),
        }
    }

    fn vote_count(pool: &DbPool, user_id: i64, target: VoteTarget) -> i64 {
        let conn = pool.get().unwrap();
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM votes WHERE user_id = ?1 AND {} = ?2",
                target.column()
            ),
            params![user_id, target.id()],
            |row| row.get(0),
        )
        .unwrap()
    }

    fn current_score(pool: &DbPool, target: VoteTarget) -> i64 {
        score(&pool.get().unwrap(), target).unwrap()
    }

    #[tokio::test]
    async fn test_score_scenario_across_two_users() {
        let (pool, _tmp) = migrated_pool();
        let a = insert_user(&pool, "alice");
        let b = insert_user(&pool, "bob");
        let post = VoteTarget::Post(insert_post(&pool, a, "P"));
        let ledger = SqliteVoteLedger::new(pool.clone());

        assert_eq!(current_score(&pool, post), 0);

        let r = ledger.cast(a, command(post, 1)).await.unwrap();
        assert_eq!((r.outcome, r.new_score), (VoteOutcome::Cast, 1));

        let r = ledger.cast(b, command(post, -1)).await.unwrap();
        assert_eq!((r.outcome, r.new_score), (VoteOutcome::Cast, 0));

        let r = ledger.cast(a, command(post, -1)).await.unwrap();
        assert_eq!((r.outcome, r.new_score), (VoteOutcome::Updated, -2));

        let r = ledger.cast(a, command(post, 0)).await.unwrap();
        assert_eq!((r.outcome, r.new_score), (VoteOutcome::Removed, -1));
    }

    #[tokio::test]
    async fn test_remove_twice_is_a_no_op() {
        let (pool, _tmp) = migrated_pool();
        let a = insert_user(&pool, "alice");
        let post = VoteTarget::Post(insert_post(&pool, a, "P"));
        let ledger = SqliteVoteLedger::new(pool.clone());

        ledger.cast(a, command(post, 1)).await.unwrap();
        let first = ledger.cast(a, command(post, 0)).await.unwrap();
        let second = ledger.cast(a, command(post, 0)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.outcome, VoteOutcome::Removed);
        assert_eq!(second.new_score, 0);
        assert_eq!(vote_count(&pool, a, post), 0);
    }

    #[tokio::test]
    async fn test_repeated_votes_keep_one_row_per_user_and_target() {
        let (pool, _tmp) = migrated_pool();
        let a = insert_user(&pool, "alice");
        let post_id = insert_post(&pool, a, "P");
        let comment = VoteTarget::Comment(insert_comment(&pool, a, post_id, None));
        let post = VoteTarget::Post(post_id);
        let ledger = SqliteVoteLedger::new(pool.clone());

        for direction in [1, 1, -1, 1, -1, -1] {
            ledger.cast(a, command(post, direction)).await.unwrap();
            ledger.cast(a, command(comment, direction)).await.unwrap();
            assert_eq!(vote_count(&pool, a, post), 1);
            assert_eq!(vote_count(&pool, a, comment), 1);
        }
        assert_eq!(current_score(&pool, post), -1);
        assert_eq!(current_score(&pool, comment), -1);
    }

    #[tokio::test]
    async fn test_deleted_or_missing_target_is_not_found() {
        let (pool, _tmp) = migrated_pool();
        let a = insert_user(&pool, "alice");
        let post_id = insert_post(&pool, a, "P");
        let comment_id = insert_comment(&pool, a, post_id, None);
        {
            let conn = pool.get().unwrap();
            conn.execute("UPDATE posts SET is_deleted = 1 WHERE id = ?1", params![post_id])
                .unwrap();
            conn.execute(
                "UPDATE comments SET is_deleted = 1 WHERE id = ?1",
                params![comment_id],
            )
            .unwrap();
        }
        let ledger = SqliteVoteLedger::new(pool.clone());

        for target in [
            VoteTarget::Post(post_id),
            VoteTarget::Comment(comment_id),
            VoteTarget::Post(9999),
        ] {
            let err = ledger.cast(a, command(target, 1)).await.unwrap_err();
            assert!(matches!(err, VoteError::NotFound(_)), "{}", target);
            // Removal against a missing target is still not found
            let err = ledger.cast(a, command(target, 0)).await.unwrap_err();
            assert!(matches!(err, VoteError::NotFound(_)));
        }
    }

    #[tokio::test]
    async fn test_post_and_comment_votes_are_independent() {
        let (pool, _tmp) = migrated_pool();
        let a = insert_user(&pool, "alice");
        let post_id = insert_post(&pool, a, "P");
        let comment_id = insert_comment(&pool, a, post_id, None);
        let ledger = SqliteVoteLedger::new(pool.clone());

        ledger.cast(a, command(VoteTarget::Post(post_id), 1)).await.unwrap();
        let r = ledger
            .cast(a, command(VoteTarget::Comment(comment_id), -1))
            .await
            .unwrap();
        assert_eq!(r.new_score, -1);
        assert_eq!(current_score(&pool, VoteTarget::Post(post_id)), 1);
    }

    #[test]
    fn test_racing_insert_falls_back_to_update() {
        let (pool, _tmp) = migrated_pool();
        let a = insert_user(&pool, "alice");
        let post = VoteTarget::Post(insert_post(&pool, a, "P"));
        let conn = pool.get().unwrap();

        // Simulate the row a concurrent request committed after our lookup
        conn.execute(
            "INSERT INTO votes (user_id, post_id, direction) VALUES (?1, ?2, 1)",
            params![a, post.id()],
        )
        .unwrap();

        let outcome = insert_or_update(&conn, a, post, Direction::Down).unwrap();
        assert_eq!(outcome, VoteOutcome::Updated);
        assert_eq!(score(&conn, post).unwrap(), -1);
        assert_eq!(vote_count(&pool, a, post), 1);
    }

    #[test]
    fn test_score_matches_sum_of_current_votes() {
        let (pool, _tmp) = migrated_pool();
        let author = insert_user(&pool, "author");
        let post = VoteTarget::Post(insert_post(&pool, author, "P"));
        let conn = pool.get().unwrap();

        let directions = [1, 1, -1, 1, -1, 1, 1];
        for (i, d) in directions.iter().enumerate() {
            let user = insert_user(&pool, &format!("voter{}", i));
            apply(&conn, user, command(post, *d)).unwrap();
        }
        let expected: i64 = directions.iter().sum();
        assert_eq!(score(&conn, post).unwrap(), expected);

        let votes = votes_for_posts(&conn, &[post.id()]).unwrap();
        let derived: i64 = votes.iter().map(|v| v.direction.value()).sum();
        assert_eq!(derived, expected);
    }

    #[test]
    fn test_votes_for_posts_with_no_ids_is_empty() {
        let (pool, _tmp) = migrated_pool();
        let conn = pool.get().unwrap();
        assert!(votes_for_posts(&conn, &[]).unwrap().is_empty());
    }
}
