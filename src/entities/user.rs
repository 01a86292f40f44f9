// 🔑 User Entity - office accounts with an integer access level
//
// Lower level = more privilege. Levels 4 and 5 are restricted to records
// linked to their own member.

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::Serialize;

use crate::error::{Error, Result};

// ============================================================================
// ACCESS LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AccessLevel(u8);

impl AccessLevel {
    pub const ADMIN: AccessLevel = AccessLevel(1);
    pub const SECRETARY: AccessLevel = AccessLevel(2);
    pub const FINANCE: AccessLevel = AccessLevel(3);
    pub const VIEWER: AccessLevel = AccessLevel(4);
    pub const MEMBER: AccessLevel = AccessLevel(5);

    pub const ALL: [AccessLevel; 5] = [
        AccessLevel::ADMIN,
        AccessLevel::SECRETARY,
        AccessLevel::FINANCE,
        AccessLevel::VIEWER,
        AccessLevel::MEMBER,
    ];

    pub fn new(level: i64) -> Result<Self> {
        match level {
            1..=5 => Ok(AccessLevel(level as u8)),
            _ => Err(Error::validation(format!("Nível de acesso inválido: {level}"))),
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }

    /// True when this level is at or above (numerically at or below) `ceiling`
    pub fn allows(&self, ceiling: u8) -> bool {
        self.0 <= ceiling
    }

    pub fn is_admin(&self) -> bool {
        self.0 == 1
    }

    /// Secretarial and finance tiers (1-3)
    pub fn is_office(&self) -> bool {
        self.0 <= 3
    }

    /// Viewer and member tiers only see their own linked records
    pub fn is_restricted(&self) -> bool {
        self.0 >= 4
    }

    /// Where to send the user after login or a denied request
    pub fn landing_path(&self) -> &'static str {
        if self.is_office() {
            "/secretaria"
        } else {
            "/financeiro"
        }
    }

    pub fn label(&self) -> &'static str {
        match self.0 {
            1 => "Admin (acesso total)",
            2 => "Secretária (membros + eventos)",
            3 => "Financeiro (financeiro + secretaria)",
            4 => "Visualizador (apenas os próprios relatórios)",
            _ => "Membro (autoatendimento)",
        }
    }
}

impl ToSql for AccessLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.0)))
    }
}

impl FromSql for AccessLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let level = value.as_i64()?;
        AccessLevel::new(level).map_err(|_| FromSqlError::OutOfRange(level))
    }
}

// ============================================================================
// USER ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub access_level: AccessLevel,
    pub member_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// New account; `password_hash` must already be hashed
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub access_level: AccessLevel,
    pub member_id: Option<i64>,
}

const USER_COLUMNS: &str = "id, name, email, password_hash, access_level, member_id, created_at";

fn from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        access_level: row.get(4)?,
        member_id: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Emails are compared lower-cased and trimmed
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn insert(conn: &Connection, user: &NewUser) -> Result<i64> {
    let email = normalize_email(&user.email);
    if user.name.trim().is_empty() || !email.contains('@') {
        return Err(Error::validation("Nome e e-mail válidos são obrigatórios."));
    }

    let result = conn.execute(
        "INSERT INTO users (name, email, password_hash, access_level, member_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.name.trim(),
            email,
            user.password_hash,
            user.access_level,
            user.member_id,
            Utc::now(),
        ],
    );

    match result {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::Conflict("Este email já está cadastrado.".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            [normalize_email(email)],
            from_row,
        )
        .optional()?)
}

/// Ordered by access level, then name
pub fn list(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY access_level, name COLLATE NOCASE"
    ))?;
    let users = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Link (or unlink with None) a user to a member record
pub fn link_member(conn: &Connection, user_id: i64, member_id: Option<i64>) -> Result<()> {
    if let Some(member_id) = member_id {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM members WHERE id = ?1)",
            [member_id],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(Error::NotFound { resource: "Membro", id: member_id });
        }
    }

    let changed = conn.execute(
        "UPDATE users SET member_id = ?1 WHERE id = ?2",
        params![member_id, user_id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Usuário", id: user_id });
    }
    Ok(())
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Usuário", id });
    }
    Ok(())
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM users WHERE access_level = 1",
        [],
        |row| row.get(0),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::entities::member::{self, MemberInput};

    fn new_user(email: &str, level: AccessLevel) -> NewUser {
        NewUser {
            name: "Secretaria".to_string(),
            email: email.to_string(),
            password_hash: "hash".to_string(),
            access_level: level,
            member_id: None,
        }
    }

    #[test]
    fn test_duplicate_email_is_conflict() {
        let conn = test_connection();
        insert(&conn, &new_user("sec@igreja.org", AccessLevel::SECRETARY)).unwrap();

        let err = insert(&conn, &new_user(" SEC@igreja.org ", AccessLevel::ADMIN)).unwrap_err();
        assert!(matches!(err, Error::Conflict(ref m) if m == "Este email já está cadastrado."));
    }

    #[test]
    fn test_find_by_email_is_case_insensitive() {
        let conn = test_connection();
        let id = insert(&conn, &new_user("Tesouraria@Igreja.org", AccessLevel::FINANCE)).unwrap();

        let user = find_by_email(&conn, "tesouraria@igreja.org").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.access_level, AccessLevel::FINANCE);
    }

    #[test]
    fn test_link_member() {
        let conn = test_connection();
        let user_id = insert(&conn, &new_user("membro@igreja.org", AccessLevel::MEMBER)).unwrap();
        let member_id = member::insert(&conn, &MemberInput::named("Lucas")).unwrap();

        assert!(matches!(
            link_member(&conn, user_id, Some(member_id + 100)),
            Err(Error::NotFound { resource: "Membro", .. })
        ));

        link_member(&conn, user_id, Some(member_id)).unwrap();
        assert_eq!(get(&conn, user_id).unwrap().unwrap().member_id, Some(member_id));

        member::delete(&conn, member_id).unwrap();
        assert_eq!(get(&conn, user_id).unwrap().unwrap().member_id, None);
    }

    #[test]
    fn test_access_level_tiers() {
        assert!(AccessLevel::new(0).is_err());
        assert!(AccessLevel::new(6).is_err());

        assert!(AccessLevel::ADMIN.is_admin());
        assert!(AccessLevel::FINANCE.is_office());
        assert!(!AccessLevel::FINANCE.is_restricted());
        assert!(AccessLevel::VIEWER.is_restricted());
        assert!(AccessLevel::SECRETARY.allows(3));
        assert!(!AccessLevel::VIEWER.allows(3));
        assert_eq!(AccessLevel::MEMBER.landing_path(), "/financeiro");
        assert_eq!(AccessLevel::SECRETARY.landing_path(), "/secretaria");
    }

    #[test]
    fn test_list_orders_by_level() {
        let conn = test_connection();
        insert(&conn, &new_user("b@x.org", AccessLevel::VIEWER)).unwrap();
        insert(&conn, &new_user("a@x.org", AccessLevel::ADMIN)).unwrap();

        let users = list(&conn).unwrap();
        assert_eq!(users[0].email, "a@x.org");
        assert_eq!(count_admins(&conn).unwrap(), 1);
    }
}
