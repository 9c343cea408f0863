use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{User, USER_COLUMNS};

/// Registration input; username and email already lowercased.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
}

/// Soft profile fields; `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()
}

pub fn find_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users u WHERE u.username = ?1", USER_COLUMNS),
        params![username.to_lowercase()],
        User::from_row,
    )
    .optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users u WHERE u.email = ?1", USER_COLUMNS),
        params![email.to_lowercase()],
        User::from_row,
    )
    .optional()
}

/// Login accepts either identifier; email wins when both could match.
pub fn find_by_login(conn: &Connection, identifier: &str) -> rusqlite::Result<Option<User>> {
    let identifier = identifier.trim().to_lowercase();
    match find_by_email(conn, &identifier)? {
        Some(user) => Ok(Some(user)),
        None => find_by_username(conn, &identifier),
    }
}

pub fn insert(conn: &Connection, user: &NewUser) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO users (username, email, password_hash, display_name)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            user.username,
            user.email,
            user.password_hash,
            user.display_name
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_profile(conn: &Connection, id: i64, update: &ProfileUpdate) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users SET
            display_name = COALESCE(?2, display_name),
            bio = COALESCE(?3, bio),
            avatar_url = COALESCE(?4, avatar_url),
            updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        params![id, update.display_name, update.bio, update.avatar_url],
    )?;
    Ok(())
}
