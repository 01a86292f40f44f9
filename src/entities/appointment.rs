// 🗓️ Office agenda (compromissos): visits, meetings, celebrations to schedule

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: i64,
    pub title: String,
    pub notes: String,
    pub date: NaiveDate,
    /// "HH:MM", None for all-day entries
    pub time: Option<String>,
    pub location: String,
    pub completed: bool,
    pub created_by: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct AppointmentInput {
    pub title: String,
    pub notes: String,
    pub date: NaiveDate,
    pub time: Option<String>,
    pub location: String,
}

impl AppointmentInput {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("O título do compromisso é obrigatório."));
        }
        if let Some(time) = &self.time {
            NaiveTime::parse_from_str(time, "%H:%M")
                .map_err(|_| Error::validation(format!("Horário inválido: {time}")))?;
        }
        Ok(())
    }
}

const APPOINTMENT_COLUMNS: &str = "id, title, notes, date, time, location, completed, created_by";

fn from_row(row: &Row) -> rusqlite::Result<Appointment> {
    Ok(Appointment {
        id: row.get(0)?,
        title: row.get(1)?,
        notes: row.get(2)?,
        date: row.get(3)?,
        time: row.get(4)?,
        location: row.get(5)?,
        completed: row.get(6)?,
        created_by: row.get(7)?,
    })
}

pub fn insert(conn: &Connection, input: &AppointmentInput, created_by: Option<i64>) -> Result<i64> {
    input.validate()?;
    conn.execute(
        "INSERT INTO appointments (title, notes, date, time, location, created_by)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            input.title.trim(),
            input.notes,
            input.date,
            input.time,
            input.location,
            created_by
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, input: &AppointmentInput) -> Result<()> {
    input.validate()?;
    let changed = conn.execute(
        "UPDATE appointments SET title = ?1, notes = ?2, date = ?3, time = ?4, location = ?5
         WHERE id = ?6",
        params![input.title.trim(), input.notes, input.date, input.time, input.location, id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Compromisso", id });
    }
    Ok(())
}

pub fn set_completed(conn: &Connection, id: i64, completed: bool) -> Result<()> {
    let changed = conn.execute(
        "UPDATE appointments SET completed = ?1 WHERE id = ?2",
        params![completed, id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Compromisso", id });
    }
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Appointment>> {
    Ok(conn
        .query_row(
            &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
            [id],
            from_row,
        )
        .optional()?)
}

pub fn require(conn: &Connection, id: i64) -> Result<Appointment> {
    get(conn, id)?.ok_or(Error::NotFound { resource: "Compromisso", id })
}

/// Chronological; all-day entries sort before timed ones on the same date
pub fn list(conn: &Connection) -> Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments ORDER BY date ASC, time ASC, id ASC"
    ))?;
    let appointments = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(appointments)
}

/// Open entries from `from` on, soonest first
pub fn list_pending(conn: &Connection, from: NaiveDate, limit: u32) -> Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE completed = 0 AND date >= ?1
         ORDER BY date ASC, time ASC, id ASC LIMIT ?2"
    ))?;
    let appointments = stmt
        .query_map(params![from, limit], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(appointments)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM appointments WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Compromisso", id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn input(title: &str, day: u32, time: Option<&str>) -> AppointmentInput {
        AppointmentInput {
            title: title.to_string(),
            notes: String::new(),
            date: NaiveDate::from_ymd_opt(2025, 6, day).unwrap(),
            time: time.map(str::to_string),
            location: "Secretaria".to_string(),
        }
    }

    #[test]
    fn test_pending_excludes_completed_and_past() {
        let conn = test_connection();
        let past = insert(&conn, &input("Reunião antiga", 1, None), None).unwrap();
        let done = insert(&conn, &input("Visita", 10, Some("09:00")), None).unwrap();
        insert(&conn, &input("Batizado", 12, Some("15:30")), None).unwrap();
        insert(&conn, &input("Ensaio", 12, Some("08:00")), None).unwrap();
        set_completed(&conn, done, true).unwrap();

        let from = NaiveDate::from_ymd_opt(2025, 6, 5).unwrap();
        let pending = list_pending(&conn, from, 10).unwrap();
        let titles: Vec<_> = pending.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Ensaio", "Batizado"]);

        assert!(!require(&conn, past).unwrap().completed);
        assert!(require(&conn, done).unwrap().completed);
    }

    #[test]
    fn test_invalid_time_rejected() {
        let conn = test_connection();
        let err = insert(&conn, &input("Visita", 3, Some("25:99")), None).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
