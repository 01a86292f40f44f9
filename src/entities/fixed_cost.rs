// 🔁 Fixed costs (custos fixos): rent, utilities, salaries
//
// Active entries are charged to EVERY month, independent of `created_at`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct FixedCost {
    pub id: i64,
    pub description: String,
    pub amount: f64,
    /// Day of month the bill is due, informational only
    pub due_day: Option<u32>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct FixedCostInput {
    pub description: String,
    pub amount: f64,
    pub due_day: Option<u32>,
}

impl FixedCostInput {
    pub fn validate(&self) -> Result<()> {
        if self.description.trim().is_empty() {
            return Err(Error::validation("A descrição do custo fixo é obrigatória."));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::validation("O valor deve ser maior que zero."));
        }
        if let Some(day) = self.due_day {
            if !(1..=31).contains(&day) {
                return Err(Error::validation("Dia de vencimento deve estar entre 1 e 31."));
            }
        }
        Ok(())
    }
}

fn from_row(row: &Row) -> rusqlite::Result<FixedCost> {
    Ok(FixedCost {
        id: row.get(0)?,
        description: row.get(1)?,
        amount: row.get(2)?,
        due_day: row.get(3)?,
        active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub fn insert(conn: &Connection, input: &FixedCostInput) -> Result<i64> {
    input.validate()?;
    conn.execute(
        "INSERT INTO fixed_costs (description, amount, due_day, active, created_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
        params![input.description.trim(), input.amount, input.due_day, Utc::now()],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<FixedCost>> {
    Ok(conn
        .query_row(
            "SELECT id, description, amount, due_day, active, created_at FROM fixed_costs WHERE id = ?1",
            [id],
            from_row,
        )
        .optional()?)
}

pub fn list(conn: &Connection) -> Result<Vec<FixedCost>> {
    let mut stmt = conn.prepare(
        "SELECT id, description, amount, due_day, active, created_at
         FROM fixed_costs ORDER BY active DESC, description COLLATE NOCASE",
    )?;
    let costs = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(costs)
}

pub fn list_active(conn: &Connection) -> Result<Vec<FixedCost>> {
    let mut stmt = conn.prepare(
        "SELECT id, description, amount, due_day, active, created_at
         FROM fixed_costs WHERE active = 1 ORDER BY description COLLATE NOCASE",
    )?;
    let costs = stmt
        .query_map([], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(costs)
}

/// Flip `active`; returns the new state
pub fn toggle_active(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE fixed_costs SET active = 1 - active WHERE id = ?1",
        [id],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Custo fixo", id });
    }
    let active: bool = conn.query_row("SELECT active FROM fixed_costs WHERE id = ?1", [id], |row| {
        row.get(0)
    })?;
    Ok(active)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM fixed_costs WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Custo fixo", id });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn cost(description: &str, amount: f64) -> FixedCostInput {
        FixedCostInput {
            description: description.to_string(),
            amount,
            due_day: Some(10),
        }
    }

    #[test]
    fn test_toggle_controls_active_listing() {
        let conn = test_connection();
        let rent = insert(&conn, &cost("Aluguel", 1500.0)).unwrap();
        insert(&conn, &cost("Energia", 230.0)).unwrap();
        assert_eq!(list_active(&conn).unwrap().len(), 2);

        assert!(!toggle_active(&conn, rent).unwrap());
        let active = list_active(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].description, "Energia");

        assert!(toggle_active(&conn, rent).unwrap());
        assert_eq!(list(&conn).unwrap().len(), 2);
    }

    #[test]
    fn test_validation() {
        assert!(cost("", 10.0).validate().is_err());
        assert!(cost("Água", -1.0).validate().is_err());
        let mut bad_day = cost("Água", 80.0);
        bad_day.due_day = Some(32);
        assert!(bad_day.validate().is_err());
    }

    #[test]
    fn test_delete_missing() {
        let conn = test_connection();
        assert!(matches!(delete(&conn, 9), Err(Error::NotFound { .. })));
        assert!(matches!(toggle_active(&conn, 9), Err(Error::NotFound { .. })));
    }
}
