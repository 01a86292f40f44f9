// 🔐 Authentication - password hashing and DB-backed sessions
//
// The browser holds a random uuid token; the sessions table only stores
// sha256(secret_key || token).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{user, AccessLevel, User};
use crate::error::{Error, Result};

pub const MIN_PASSWORD_LEN: usize = 6;

// ============================================================================
// PASSWORDS
// ============================================================================

/// Argon2id PHC string with a fresh salt
pub fn hash_password(password: &str) -> Result<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::validation(format!(
            "A senha deve ter pelo menos {MIN_PASSWORD_LEN} caracteres."
        )));
    }
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| Error::internal(format!("hash password: {e}")))?;
    Ok(hash.to_string())
}

/// Verification uses the parameters embedded in the stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::internal(format!("parse password hash: {e}")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Look the user up by email and check the password.
/// Unknown email and wrong password are indistinguishable to the caller.
pub fn authenticate(conn: &Connection, email: &str, password: &str) -> Result<Option<User>> {
    let user = user::find_by_email(conn, email)?;
    check_login(user, password)
}

/// Password half of [`authenticate`]; runs without a connection
pub fn check_login(user: Option<User>, password: &str) -> Result<Option<User>> {
    let Some(user) = user else {
        debug!("login for unknown email");
        return Ok(None);
    };
    if verify_password(password, &user.password_hash)? {
        info!(user_id = user.id, "login");
        Ok(Some(user))
    } else {
        debug!(user_id = user.id, "wrong password");
        Ok(None)
    }
}

// ============================================================================
// SESSIONS
// ============================================================================

fn token_digest(secret_key: &str, token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret_key.as_bytes());
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Start a session; returns the token for the cookie
pub fn create_session(conn: &Connection, secret_key: &str, user_id: i64, ttl: Duration) -> Result<String> {
    let token = Uuid::new_v4().to_string();
    let now = Utc::now();
    conn.execute(
        "INSERT INTO sessions (token_digest, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        params![token_digest(secret_key, &token), user_id, now, now + ttl],
    )?;
    Ok(token)
}

/// The user owning an unexpired session, if any
pub fn resolve_session(conn: &Connection, secret_key: &str, token: &str) -> Result<Option<User>> {
    let user_id: Option<i64> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token_digest = ?1 AND expires_at > ?2",
            params![token_digest(secret_key, token), Utc::now()],
            |row| row.get(0),
        )
        .optional()?;

    match user_id {
        Some(id) => user::get(conn, id),
        None => Ok(None),
    }
}

pub fn revoke_session(conn: &Connection, secret_key: &str, token: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM sessions WHERE token_digest = ?1",
        [token_digest(secret_key, token)],
    )?;
    Ok(())
}

/// Drop expired rows; returns how many were removed
pub fn purge_expired_sessions(conn: &Connection) -> Result<usize> {
    let removed = conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", [Utc::now()])?;
    if removed > 0 {
        debug!(removed, "expired sessions purged");
    }
    Ok(removed)
}

/// Create an admin account unless the email is already registered.
/// Returns the new id, or None when nothing was created.
pub fn ensure_admin(conn: &Connection, name: &str, email: &str, password: &str) -> Result<Option<i64>> {
    if user::find_by_email(conn, email)?.is_some() {
        debug!("admin already present");
        return Ok(None);
    }
    let id = user::insert(
        conn,
        &user::NewUser {
            name: name.to_string(),
            email: email.to_string(),
            password_hash: hash_password(password)?,
            access_level: AccessLevel::ADMIN,
            member_id: None,
        },
    )?;
    info!(user_id = id, "admin account created");
    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::entities::NewUser;

    const SECRET: &str = "test-secret";

    fn seed_user(conn: &Connection) -> i64 {
        user::insert(
            conn,
            &NewUser {
                name: "Admin".to_string(),
                email: "admin@igreja.org".to_string(),
                password_hash: hash_password("senha-forte").unwrap(),
                access_level: AccessLevel::ADMIN,
                member_id: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("minha-senha").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("minha-senha", &hash).unwrap());
        assert!(!verify_password("outra", &hash).unwrap());
        assert!(hash_password("123").is_err());
    }

    #[test]
    fn test_authenticate() {
        let conn = test_connection();
        let id = seed_user(&conn);

        let user = authenticate(&conn, "ADMIN@igreja.org", "senha-forte").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert!(authenticate(&conn, "admin@igreja.org", "errada").unwrap().is_none());
        assert!(authenticate(&conn, "ninguem@igreja.org", "senha-forte").unwrap().is_none());
    }

    #[test]
    fn test_check_login_without_connection() {
        let conn = test_connection();
        seed_user(&conn);
        let found = user::find_by_email(&conn, "admin@igreja.org").unwrap();
        drop(conn);

        assert!(check_login(found.clone(), "senha-forte").unwrap().is_some());
        assert!(check_login(found, "errada").unwrap().is_none());
        assert!(check_login(None, "senha-forte").unwrap().is_none());
    }

    #[test]
    fn test_session_lifecycle() {
        let conn = test_connection();
        let id = seed_user(&conn);

        let token = create_session(&conn, SECRET, id, Duration::hours(1)).unwrap();
        assert_eq!(resolve_session(&conn, SECRET, &token).unwrap().unwrap().id, id);

        // same token under another secret does not resolve
        assert!(resolve_session(&conn, "other", &token).unwrap().is_none());

        revoke_session(&conn, SECRET, &token).unwrap();
        assert!(resolve_session(&conn, SECRET, &token).unwrap().is_none());
    }

    #[test]
    fn test_expired_sessions() {
        let conn = test_connection();
        let id = seed_user(&conn);

        let token = create_session(&conn, SECRET, id, Duration::hours(-1)).unwrap();
        assert!(resolve_session(&conn, SECRET, &token).unwrap().is_none());
        assert_eq!(purge_expired_sessions(&conn).unwrap(), 1);
    }

    #[test]
    fn test_deleting_user_drops_sessions() {
        let conn = test_connection();
        let id = seed_user(&conn);
        create_session(&conn, SECRET, id, Duration::hours(1)).unwrap();

        user::delete(&conn, id).unwrap();
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn test_ensure_admin_is_idempotent() {
        let conn = test_connection();
        let id = ensure_admin(&conn, "Padre", "padre@igreja.org", "senha-forte").unwrap();
        assert!(id.is_some());
        assert!(ensure_admin(&conn, "Outro", "PADRE@igreja.org", "senha-forte").unwrap().is_none());
        assert_eq!(user::count_admins(&conn).unwrap(), 1);
    }
}
