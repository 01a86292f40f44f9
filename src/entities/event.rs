// 📅 Parish events shown on the public site

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    /// File name inside the uploads directory
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventInput {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub image: Option<String>,
}

impl EventInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() || self.description.trim().is_empty() {
            return Err(Error::validation("Título e descrição são obrigatórios."));
        }
        Ok(())
    }
}

const EVENT_COLUMNS: &str = "id, title, description, date, image";

fn from_row(row: &Row) -> rusqlite::Result<Event> {
    Ok(Event {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        date: row.get(3)?,
        image: row.get(4)?,
    })
}

pub fn insert(conn: &Connection, input: &EventInput) -> Result<i64> {
    input.validate()?;
    conn.execute(
        "INSERT INTO events (title, description, date, image) VALUES (?1, ?2, ?3, ?4)",
        params![input.title.trim(), input.description.trim(), input.date, input.image],
    )?;
    Ok(conn.last_insert_rowid())
}

/// `image: None` keeps the stored image
pub fn update(conn: &Connection, id: i64, input: &EventInput) -> Result<()> {
    input.validate()?;
    let changed = conn.execute(
        "UPDATE events SET title = ?1, description = ?2, date = ?3, image = COALESCE(?4, image)
         WHERE id = ?5",
        params![input.title.trim(), input.description.trim(), input.date, input.image, id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Evento", id });
    }
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Event>> {
    Ok(conn
        .query_row(
            &format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, id: i64) -> Result<Event> {
    get(conn, id)?.ok_or(Error::NotFound { resource: "Evento", id })
}

/// Most recent first; `limit` of None lists everything
pub fn list_latest(conn: &Connection, limit: Option<u32>) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM events ORDER BY date DESC, id DESC LIMIT ?1"
    ))?;
    let limit = limit.map(i64::from).unwrap_or(-1);
    let events = stmt
        .query_map([limit], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Earliest first, starting at `from`
pub fn list_upcoming(conn: &Connection, from: NaiveDate, limit: u32) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE date >= ?1 ORDER BY date ASC, id ASC LIMIT ?2"
    ))?;
    let events = stmt
        .query_map(params![from, limit], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM events WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Evento", id });
    }
    Ok(())
}
