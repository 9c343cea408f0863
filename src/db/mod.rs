pub mod models;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Transaction, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Open a pool with the default pool size and busy timeout.
pub fn create_pool(db_path: &Path) -> anyhow::Result<DbPool> {
    create_pool_with(db_path, &DatabaseConfig::default())
}

pub fn create_pool_with(db_path: &Path, config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Foreign keys and busy timeout are per-connection settings
    let busy_timeout = Duration::from_millis(config.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(db_path).with_init(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)
    });
    let pool = Pool::builder()
        .max_size(config.pool_size)
        .connection_timeout(busy_timeout * 2)
        .build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    // Create migrations tracking table
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!(migration = %name, "Applying migration");
            conn.execute_batch(sql)?;
            conn.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Run `f` inside a `BEGIN IMMEDIATE` transaction. Commits on `Ok`, rolls
/// back when the transaction is dropped on `Err`.
pub fn write_tx<T, E, F>(pool: &DbPool, f: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error> + From<r2d2::Error>,
{
    with_tx(pool, TransactionBehavior::Immediate, f)
}

/// Run `f` inside a deferred transaction so multi-query reads see one snapshot.
pub fn read_tx<T, E, F>(pool: &DbPool, f: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error> + From<r2d2::Error>,
{
    with_tx(pool, TransactionBehavior::Deferred, f)
}

fn with_tx<T, E, F>(pool: &DbPool, behavior: TransactionBehavior, f: F) -> Result<T, E>
where
    F: FnOnce(&Transaction<'_>) -> Result<T, E>,
    E: From<rusqlite::Error> + From<r2d2::Error>,
{
    let mut conn = pool.get()?;
    let tx = conn.transaction_with_behavior(behavior)?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// True when the error is a UNIQUE constraint rejection.
pub fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// `?, ?, ?` for an `IN (...)` clause with `n` parameters.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn create_pool_creates_db_file() {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("sub/dir/test.db");
        let pool = create_pool(&db_path).unwrap();
        assert!(db_path.exists());

        let conn = pool.get().unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn migrations_run_successfully() {
        let (pool, _tmp) = migrated_pool();
        let conn = pool.get().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };
        for table in ["users", "posts", "comments", "votes"] {
            assert!(tables.contains(&table.to_string()), "missing {}", table);
        }
    }

    #[test]
    fn migrations_are_idempotent() {
        let (pool, _tmp) = migrated_pool();
        run_migrations(&pool).unwrap();

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, MIGRATIONS.len() as i64);
    }

    #[test]
    fn foreign_keys_enforced() {
        let (pool, _tmp) = migrated_pool();
        let conn = pool.get().unwrap();
        let result = conn.execute(
            "INSERT INTO posts (title, body, author_id) VALUES ('t', 'b', 999)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn vote_must_have_exactly_one_target() {
        let (pool, _tmp) = migrated_pool();
        let user = insert_user(&pool, "alice");
        let post = insert_post(&pool, user, "p");
        let comment = insert_comment(&pool, user, post, None);
        let conn = pool.get().unwrap();

        let neither = conn.execute(
            "INSERT INTO votes (user_id, direction) VALUES (?1, 1)",
            params![user],
        );
        assert!(neither.is_err());

        let both = conn.execute(
            "INSERT INTO votes (user_id, post_id, comment_id, direction) VALUES (?1, ?2, ?3, 1)",
            params![user, post, comment],
        );
        assert!(both.is_err());

        let zero = conn.execute(
            "INSERT INTO votes (user_id, post_id, direction) VALUES (?1, ?2, 0)",
            params![user, post],
        );
        assert!(zero.is_err());
    }

    #[test]
    fn duplicate_vote_is_a_unique_violation() {
        let (pool, _tmp) = migrated_pool();
        let user = insert_user(&pool, "alice");
        let post = insert_post(&pool, user, "p");
        let conn = pool.get().unwrap();

        conn.execute(
            "INSERT INTO votes (user_id, post_id, direction) VALUES (?1, ?2, 1)",
            params![user, post],
        )
        .unwrap();
        let err = conn
            .execute(
                "INSERT INTO votes (user_id, post_id, direction) VALUES (?1, ?2, -1)",
                params![user, post],
            )
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn hard_deleting_a_post_cascades_to_comments_and_votes() {
        let (pool, _tmp) = migrated_pool();
        let user = insert_user(&pool, "alice");
        let post = insert_post(&pool, user, "p");
        let comment = insert_comment(&pool, user, post, None);
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO votes (user_id, post_id, direction) VALUES (?1, ?2, 1)",
            params![user, post],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO votes (user_id, comment_id, direction) VALUES (?1, ?2, 1)",
            params![user, comment],
        )
        .unwrap();

        conn.execute("DELETE FROM posts WHERE id = ?1", params![post])
            .unwrap();

        let comments: i64 = conn
            .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
            .unwrap();
        let votes: i64 = conn
            .query_row("SELECT COUNT(*) FROM votes", [], |r| r.get(0))
            .unwrap();
        assert_eq!(comments, 0);
        assert_eq!(votes, 0);
    }

    #[test]
    fn write_tx_rolls_back_on_error() {
        let (pool, _tmp) = migrated_pool();

        let result: Result<(), crate::error::AppError> = write_tx(&pool, |tx| {
            tx.execute(
                "INSERT INTO users (username, email, password_hash) VALUES ('bob', 'b@x.io', 'x')",
                [],
            )?;
            Err(crate::error::AppError::Internal("abort".into()))
        });
        assert!(result.is_err());

        let conn = pool.get().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn placeholders_match_count() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
