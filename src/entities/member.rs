// 👥 Member Entity - parish registry
//
// A member belongs to at most one ministry, stored by *name* (free text),
// so renaming a ministry does not rewrite member rows.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// MEMBER STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    #[serde(rename = "ativo")]
    Active,
    #[serde(rename = "inativo")]
    Inactive,
}

impl MemberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Active => "ativo",
            MemberStatus::Inactive => "inativo",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MemberStatus::Active => "Ativo",
            MemberStatus::Inactive => "Inativo",
        }
    }
}

impl FromStr for MemberStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ativo" => Ok(MemberStatus::Active),
            "inativo" => Ok(MemberStatus::Inactive),
            other => Err(Error::validation(format!("Status de membro inválido: {other}"))),
        }
    }
}

// ============================================================================
// MEMBER ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// WhatsApp number used for SMS
    pub mobile: String,
    pub address: String,
    pub cep: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub birth_date: Option<NaiveDate>,
    pub marital_status: String,
    pub spouse: String,
    pub children: i64,
    pub baptized: bool,
    pub baptism_date: Option<NaiveDate>,
    /// Ministry name, empty when none
    pub ministry: String,
    /// File name inside the uploads directory
    pub photo: Option<String>,
    pub status: MemberStatus,
    pub registered_at: DateTime<Utc>,
}

impl Member {
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }
}

/// Writable fields of a member (create and edit share it)
#[derive(Debug, Clone)]
pub struct MemberInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub mobile: String,
    pub address: String,
    pub cep: String,
    pub neighborhood: String,
    pub city: String,
    pub state: String,
    pub birth_date: Option<NaiveDate>,
    pub marital_status: String,
    pub spouse: String,
    pub children: i64,
    pub baptized: bool,
    pub baptism_date: Option<NaiveDate>,
    pub ministry: String,
    pub photo: Option<String>,
    pub status: MemberStatus,
}

impl MemberInput {
    /// Blank input with the office's default city/state
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            email: String::new(),
            phone: String::new(),
            mobile: String::new(),
            address: String::new(),
            cep: String::new(),
            neighborhood: String::new(),
            city: "São Paulo".to_string(),
            state: "SP".to_string(),
            birth_date: None,
            marital_status: String::new(),
            spouse: String::new(),
            children: 0,
            baptized: false,
            baptism_date: None,
            ministry: String::new(),
            photo: None,
            status: MemberStatus::Active,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("O nome do membro é obrigatório."));
        }
        if self.children < 0 {
            return Err(Error::validation("Quantidade de filhos não pode ser negativa."));
        }
        if !self.email.is_empty() && !self.email.contains('@') {
            return Err(Error::validation("E-mail inválido."));
        }
        Ok(())
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

const MEMBER_COLUMNS: &str = "id, name, email, phone, mobile, address, cep, neighborhood, city, state,
     birth_date, marital_status, spouse, children, baptized, baptism_date, ministry, photo,
     status, registered_at";

fn from_row(row: &Row) -> rusqlite::Result<Member> {
    let status: String = row.get(18)?;
    Ok(Member {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        mobile: row.get(4)?,
        address: row.get(5)?,
        cep: row.get(6)?,
        neighborhood: row.get(7)?,
        city: row.get(8)?,
        state: row.get(9)?,
        birth_date: row.get(10)?,
        marital_status: row.get(11)?,
        spouse: row.get(12)?,
        children: row.get(13)?,
        baptized: row.get(14)?,
        baptism_date: row.get(15)?,
        ministry: row.get(16)?,
        photo: row.get(17)?,
        status: status.parse().unwrap_or(MemberStatus::Active),
        registered_at: row.get(19)?,
    })
}

pub fn insert(conn: &Connection, input: &MemberInput) -> Result<i64> {
    input.validate()?;
    conn.execute(
        "INSERT INTO members (
            name, email, phone, mobile, address, cep, neighborhood, city, state,
            birth_date, marital_status, spouse, children, baptized, baptism_date,
            ministry, photo, status, registered_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        params![
            input.name.trim(),
            input.email.trim(),
            input.phone.trim(),
            input.mobile.trim(),
            input.address,
            input.cep,
            input.neighborhood,
            input.city,
            input.state,
            input.birth_date,
            input.marital_status,
            input.spouse,
            input.children,
            input.baptized,
            input.baptism_date,
            input.ministry,
            input.photo,
            input.status.as_str(),
            Utc::now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rewrite every field; `photo: None` keeps the stored photo
pub fn update(conn: &Connection, id: i64, input: &MemberInput) -> Result<()> {
    input.validate()?;
    let changed = conn.execute(
        "UPDATE members SET
            name = ?1, email = ?2, phone = ?3, mobile = ?4, address = ?5, cep = ?6,
            neighborhood = ?7, city = ?8, state = ?9, birth_date = ?10, marital_status = ?11,
            spouse = ?12, children = ?13, baptized = ?14, baptism_date = ?15, ministry = ?16,
            photo = COALESCE(?17, photo), status = ?18
         WHERE id = ?19",
        params![
            input.name.trim(),
            input.email.trim(),
            input.phone.trim(),
            input.mobile.trim(),
            input.address,
            input.cep,
            input.neighborhood,
            input.city,
            input.state,
            input.birth_date,
            input.marital_status,
            input.spouse,
            input.children,
            input.baptized,
            input.baptism_date,
            input.ministry,
            input.photo,
            input.status.as_str(),
            id,
        ],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Membro", id });
    }
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Member>> {
    let member = conn
        .query_row(
            &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?;
    Ok(member)
}

/// Like `get`, but a missing row is an error
pub fn require(conn: &Connection, id: i64) -> Result<Member> {
    get(conn, id)?.ok_or(Error::NotFound { resource: "Membro", id })
}

pub fn list(conn: &Connection) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members ORDER BY name COLLATE NOCASE"
    ))?;
    let members = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

/// Case-insensitive substring match on name, mobile or email
pub fn search(conn: &Connection, query: &str) -> Result<Vec<Member>> {
    let query = query.trim();
    if query.is_empty() {
        return list(conn);
    }

    let pattern = format!("%{}%", query.to_lowercase());
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members
         WHERE lower(name) LIKE ?1 OR lower(mobile) LIKE ?1 OR lower(email) LIKE ?1
         ORDER BY name COLLATE NOCASE"
    ))?;
    let members = stmt
        .query_map([pattern], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

pub fn list_active(conn: &Connection) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members WHERE status = 'ativo' ORDER BY name COLLATE NOCASE"
    ))?;
    let members = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

pub fn list_by_ministry(conn: &Connection, ministry: &str) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEMBER_COLUMNS} FROM members
         WHERE status = 'ativo' AND ministry = ?1
         ORDER BY name COLLATE NOCASE"
    ))?;
    let members = stmt
        .query_map([ministry], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(members)
}

pub fn delete(conn: &Connection, id: i64) -> Result<Member> {
    let member = require(conn, id)?;
    conn.execute("DELETE FROM members WHERE id = ?1", [id])?;
    Ok(member)
}

/// Wipe the registry (maintenance command); returns rows removed
pub fn delete_all(conn: &Connection) -> Result<usize> {
    Ok(conn.execute("DELETE FROM members", [])?)
}

pub fn count(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM members", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn sample(name: &str, mobile: &str) -> MemberInput {
        let mut input = MemberInput::named(name);
        input.mobile = mobile.to_string();
        input.email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        input
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_connection();
        let mut input = sample("Maria Souza", "22999990000");
        input.birth_date = NaiveDate::from_ymd_opt(1990, 5, 17);

        let id = insert(&conn, &input).unwrap();
        let member = require(&conn, id).unwrap();

        assert_eq!(member.name, "Maria Souza");
        assert_eq!(member.birth_date, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(member.city, "São Paulo");
        assert!(member.is_active());
        assert!(member.photo.is_none());
    }

    #[test]
    fn test_blank_name_rejected() {
        let conn = test_connection();
        let err = insert(&conn, &MemberInput::named("   ")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(count(&conn).unwrap(), 0);
    }

    #[test]
    fn test_search_matches_name_mobile_and_email() {
        let conn = test_connection();
        insert(&conn, &sample("Ana Lima", "22911112222")).unwrap();
        insert(&conn, &sample("Bruno Costa", "22933334444")).unwrap();

        assert_eq!(search(&conn, "ana").unwrap().len(), 1);
        assert_eq!(search(&conn, "3333").unwrap()[0].name, "Bruno Costa");
        assert_eq!(search(&conn, "BRUNO.COSTA@").unwrap().len(), 1);
        assert_eq!(search(&conn, "").unwrap().len(), 2);
    }

    #[test]
    fn test_update_keeps_photo_when_none() {
        let conn = test_connection();
        let mut input = sample("Carla", "1");
        input.photo = Some("carla.jpg".to_string());
        let id = insert(&conn, &input).unwrap();

        input.photo = None;
        input.ministry = "Ministério de Louvor".to_string();
        update(&conn, id, &input).unwrap();

        let member = require(&conn, id).unwrap();
        assert_eq!(member.photo.as_deref(), Some("carla.jpg"));
        assert_eq!(member.ministry, "Ministério de Louvor");
    }

    #[test]
    fn test_update_missing_member() {
        let conn = test_connection();
        let err = update(&conn, 42, &sample("X", "")).unwrap_err();
        assert!(matches!(err, Error::NotFound { id: 42, .. }));
    }

    #[test]
    fn test_list_by_ministry_skips_inactive() {
        let conn = test_connection();
        let mut a = sample("A", "");
        a.ministry = "Jovem".to_string();
        let mut b = sample("B", "");
        b.ministry = "Jovem".to_string();
        b.status = MemberStatus::Inactive;
        insert(&conn, &a).unwrap();
        insert(&conn, &b).unwrap();

        let members = list_by_ministry(&conn, "Jovem").unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "A");
        assert_eq!(list_active(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Ativo".parse::<MemberStatus>().unwrap(), MemberStatus::Active);
        assert_eq!("inativo".parse::<MemberStatus>().unwrap(), MemberStatus::Inactive);
        assert!("talvez".parse::<MemberStatus>().is_err());
    }
}
