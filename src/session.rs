//! Client session lifecycle.
//!
//! A session is created when the backend accepts a login, restored on every
//! request from the opaque cookie token, and destroyed on logout. It carries the
//! cached current user and the backend cookies that credentialed API calls forward.

use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::api::types::User;
use crate::error::AppResult;
use crate::state::DbPool;

#[derive(Debug, Clone)]
pub struct ClientSession {
    pub token: String,
    pub user: User,
    pub backend_cookie: Option<String>,
}

/// Create a session for a freshly signed-in user. Returns the session token.
pub fn login(
    pool: &DbPool,
    user: &User,
    set_cookies: &[String],
    hours: u64,
) -> AppResult<String> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let user_json = serde_json::to_string(user)?;
    let backend_cookie = merge_cookies(None, set_cookies);

    conn.execute(
        "INSERT INTO sessions (id, token, username, user_json, backend_cookie, expires_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, datetime('now', ?6))",
        params![
            id,
            token,
            user.username,
            user_json,
            backend_cookie,
            format!("+{} hours", hours)
        ],
    )?;

    tracing::info!("Session started for {}", user.username);
    Ok(token)
}

/// Load a live session by token.
pub fn restore(pool: &DbPool, token: &str) -> AppResult<Option<ClientSession>> {
    let conn = pool.get()?;
    let row: Option<(String, Option<String>)> = conn
        .query_row(
            "SELECT user_json, backend_cookie FROM sessions \
             WHERE token = ?1 AND expires_at > datetime('now')",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((user_json, backend_cookie)) => Ok(Some(ClientSession {
            token: token.to_string(),
            user: serde_json::from_str(&user_json)?,
            backend_cookie,
        })),
        None => Ok(None),
    }
}

/// Fold `Set-Cookie` values from a backend response into the stored cookie string.
pub fn absorb_cookies(pool: &DbPool, session: &mut ClientSession, set_cookies: &[String]) -> AppResult<()> {
    if set_cookies.is_empty() {
        return Ok(());
    }
    let merged = merge_cookies(session.backend_cookie.as_deref(), set_cookies);
    if merged == session.backend_cookie {
        return Ok(());
    }

    let conn = pool.get()?;
    conn.execute(
        "UPDATE sessions SET backend_cookie = ?1 WHERE token = ?2",
        params![merged, session.token],
    )?;
    session.backend_cookie = merged;
    Ok(())
}

/// Destroy a session.
pub fn logout(pool: &DbPool, token: &str) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop expired sessions. Returns how many were removed.
pub fn purge_expired(pool: &DbPool) -> AppResult<usize> {
    let conn = pool.get()?;
    let removed = conn.execute(
        "DELETE FROM sessions WHERE expires_at <= datetime('now')",
        [],
    )?;
    Ok(removed)
}

/// Merge `Set-Cookie` header values into a `Cookie` header string.
/// Cookies set with an empty value or `Max-Age=0` are removed.
pub fn merge_cookies(existing: Option<&str>, set_cookies: &[String]) -> Option<String> {
    let mut jar: Vec<(String, String)> = existing
        .unwrap_or("")
        .split(';')
        .filter_map(split_pair)
        .collect();

    for header in set_cookies {
        let mut attrs = header.split(';');
        let Some((name, value)) = attrs.next().and_then(split_pair) else {
            continue;
        };
        let expired = value.is_empty()
            || attrs.any(|a| a.trim().eq_ignore_ascii_case("max-age=0"));

        jar.retain(|(n, _)| *n != name);
        if !expired {
            jar.push((name, value));
        }
    }

    if jar.is_empty() {
        None
    } else {
        Some(
            jar.iter()
                .map(|(n, v)| format!("{}={}", n, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

fn split_pair(raw: &str) -> Option<(String, String)> {
    let mut split = raw.trim().splitn(2, '=');
    let name = split.next()?.trim();
    let value = split.next()?.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.to_string()))
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
