use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;

/// Open (or create) the database file and bring the schema up to date
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    setup_database(&conn)?;
    info!(path = %path.display(), "database ready");
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    // Cascades below depend on this (off by default in SQLite)
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Registry: members, ministries, users, sessions
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS members (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            phone TEXT NOT NULL DEFAULT '',
            mobile TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            cep TEXT NOT NULL DEFAULT '',
            neighborhood TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            state TEXT NOT NULL DEFAULT '',
            birth_date TEXT,
            marital_status TEXT NOT NULL DEFAULT '',
            spouse TEXT NOT NULL DEFAULT '',
            children INTEGER NOT NULL DEFAULT 0,
            baptized INTEGER NOT NULL DEFAULT 0,
            baptism_date TEXT,
            ministry TEXT NOT NULL DEFAULT '',
            photo TEXT,
            status TEXT NOT NULL DEFAULT 'ativo',
            registered_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ministries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            leader TEXT NOT NULL,
            description TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            access_level INTEGER NOT NULL DEFAULT 2,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token_digest TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );",
    )?;

    // ==========================================================================
    // Calendar: events, appointments
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            date TEXT NOT NULL,
            image TEXT
        );

        CREATE TABLE IF NOT EXISTS appointments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            date TEXT NOT NULL,
            time TEXT,
            location TEXT NOT NULL DEFAULT '',
            completed INTEGER NOT NULL DEFAULT 0,
            created_by INTEGER REFERENCES users(id) ON DELETE SET NULL
        );",
    )?;

    // ==========================================================================
    // Ledger: transactions, fixed costs, finance config
    // ==========================================================================
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS transactions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            kind TEXT NOT NULL,
            category TEXT NOT NULL,
            amount REAL NOT NULL,
            method TEXT NOT NULL,
            date TEXT NOT NULL,
            member_id INTEGER REFERENCES members(id) ON DELETE SET NULL,
            recurring INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS fixed_costs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL,
            amount REAL NOT NULL,
            due_day INTEGER,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS finance_config (
            id INTEGER PRIMARY KEY CHECK (id = 1)
        );",
    )?;

    // ==========================================================================
    // Messaging log
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sent_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel TEXT NOT NULL,
            recipient TEXT NOT NULL,
            member_id INTEGER REFERENCES members(id) ON DELETE SET NULL,
            subject TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL,
            status TEXT NOT NULL,
            error TEXT,
            sent_by INTEGER REFERENCES users(id) ON DELETE SET NULL,
            sent_at TEXT NOT NULL
        )",
        [],
    )?;

    migrate_add_columns(conn)?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
         CREATE INDEX IF NOT EXISTS idx_transactions_member ON transactions(member_id);
         CREATE INDEX IF NOT EXISTS idx_members_name ON members(name);
         CREATE INDEX IF NOT EXISTS idx_events_date ON events(date);
         CREATE INDEX IF NOT EXISTS idx_appointments_date ON appointments(date);
         CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
         CREATE INDEX IF NOT EXISTS idx_sent_messages_sent_at ON sent_messages(sent_at);",
    )?;

    Ok(())
}

/// Columns added after the first release. Each entry is applied only when
/// the column is missing, so older databases upgrade in place.
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[
    ("finance_config", "provision", "REAL NOT NULL DEFAULT 0.0"),
    ("finance_config", "average_salary", "REAL NOT NULL DEFAULT 2000.0"),
    (
        "users",
        "member_id",
        "INTEGER REFERENCES members(id) ON DELETE SET NULL",
    ),
];

/// Add any missing column from `ADDED_COLUMNS`; returns how many were added
pub fn migrate_add_columns(conn: &Connection) -> Result<usize> {
    let mut added = 0;

    for (table, column, definition) in ADDED_COLUMNS {
        if column_exists(conn, table, column)? {
            continue;
        }
        conn.execute(
            &format!("ALTER TABLE {table} ADD COLUMN {column} {definition}"),
            [],
        )?;
        debug!(table, column, "column added");
        added += 1;
    }

    if added > 0 {
        info!(added, "schema migration complete");
    }
    Ok(added)
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(names.iter().any(|name| name == column))
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        assert!(column_exists(&conn, "finance_config", "provision").unwrap());
        assert!(column_exists(&conn, "users", "member_id").unwrap());
        assert_eq!(migrate_add_columns(&conn).unwrap(), 0);
    }

    #[test]
    fn test_migration_upgrades_old_users_table() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE members (id INTEGER PRIMARY KEY);
             CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                access_level INTEGER NOT NULL DEFAULT 2,
                created_at TEXT NOT NULL
             );
             CREATE TABLE finance_config (id INTEGER PRIMARY KEY CHECK (id = 1));",
        )
        .unwrap();

        assert!(!column_exists(&conn, "users", "member_id").unwrap());
        assert_eq!(migrate_add_columns(&conn).unwrap(), 3);
        assert!(column_exists(&conn, "users", "member_id").unwrap());
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let conn = test_connection();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }
}
