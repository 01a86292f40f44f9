// Ministry catalog (Louvor, Infantil, Jovem, ...)

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Ministry {
    pub id: i64,
    pub name: String,
    pub leader: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct MinistryInput {
    pub name: String,
    pub leader: String,
    pub description: String,
}

impl MinistryInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() || self.leader.trim().is_empty() || self.description.trim().is_empty() {
            return Err(Error::validation("Nome, líder e descrição são obrigatórios."));
        }
        Ok(())
    }
}

/// Seeded by `parish setup` into an empty catalog
pub const DEFAULT_MINISTRIES: &[(&str, &str, &str)] = &[
    ("Ministério de Louvor", "Bruna Maria", "Adoração sincera."),
    ("Ministério Infantil", "Josilaine", "Crianças no caminho do Senhor."),
    ("Ministério Jovem", "Tatiana e Wendel", "Geração apaixonada por Jesus."),
];

fn from_row(row: &Row) -> rusqlite::Result<Ministry> {
    Ok(Ministry {
        id: row.get(0)?,
        name: row.get(1)?,
        leader: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn insert(conn: &Connection, input: &MinistryInput) -> Result<i64> {
    input.validate()?;
    conn.execute(
        "INSERT INTO ministries (name, leader, description) VALUES (?1, ?2, ?3)",
        params![input.name.trim(), input.leader.trim(), input.description.trim()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, input: &MinistryInput) -> Result<()> {
    input.validate()?;
    let changed = conn.execute(
        "UPDATE ministries SET name = ?1, leader = ?2, description = ?3 WHERE id = ?4",
        params![input.name.trim(), input.leader.trim(), input.description.trim(), id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Ministério", id });
    }
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Ministry>> {
    Ok(conn
        .query_row(
            "SELECT id, name, leader, description FROM ministries WHERE id = ?1",
            [id],
            from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, id: i64) -> Result<Ministry> {
    get(conn, id)?.ok_or(Error::NotFound { resource: "Ministério", id })
}

pub fn list(conn: &Connection) -> Result<Vec<Ministry>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, leader, description FROM ministries ORDER BY name COLLATE NOCASE",
    )?;
    let ministries = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ministries)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM ministries WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Ministério", id });
    }
    Ok(())
}

/// Insert `DEFAULT_MINISTRIES` when the catalog is empty; returns rows added
pub fn seed_defaults(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM ministries", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(0);
    }

    for (name, leader, description) in DEFAULT_MINISTRIES {
        insert(
            conn,
            &MinistryInput {
                name: name.to_string(),
                leader: leader.to_string(),
                description: description.to_string(),
            },
        )?;
    }
    Ok(DEFAULT_MINISTRIES.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[test]
    fn test_seed_only_into_empty_catalog() {
        let conn = test_connection();
        assert_eq!(seed_defaults(&conn).unwrap(), 3);
        assert_eq!(seed_defaults(&conn).unwrap(), 0);

        let names: Vec<String> = list(&conn).unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec!["Ministério de Louvor", "Ministério Infantil", "Ministério Jovem"]
        );
    }

    #[test]
    fn test_update_and_delete() {
        let conn = test_connection();
        let id = insert(
            &conn,
            &MinistryInput {
                name: "Intercessão".into(),
                leader: "Paulo".into(),
                description: "Oração".into(),
            },
        )
        .unwrap();

        update(
            &conn,
            id,
            &MinistryInput {
                name: "Intercessão".into(),
                leader: "Marta".into(),
                description: "Oração diária".into(),
            },
        )
        .unwrap();
        assert_eq!(require(&conn, id).unwrap().leader, "Marta");

        delete(&conn, id).unwrap();
        assert!(get(&conn, id).unwrap().is_none());
        assert!(matches!(delete(&conn, id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_required_fields() {
        let input = MinistryInput {
            name: "Louvor".into(),
            leader: "".into(),
            description: "x".into(),
        };
        assert!(input.validate().is_err());
    }
}
