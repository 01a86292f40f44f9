// 💰 Ledger Transaction - tithes, offerings, donations and expenses
//
// Amounts are always stored positive; `kind` decides the cash-flow direction.

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// TRANSACTION KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    #[serde(rename = "dizimo")]
    Tithe,
    #[serde(rename = "oferta")]
    Offering,
    #[serde(rename = "doacao")]
    Donation,
    #[serde(rename = "despesa")]
    Expense,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 4] = [
        TransactionKind::Tithe,
        TransactionKind::Offering,
        TransactionKind::Donation,
        TransactionKind::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Tithe => "dizimo",
            TransactionKind::Offering => "oferta",
            TransactionKind::Donation => "doacao",
            TransactionKind::Expense => "despesa",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TransactionKind::Tithe => "Dízimo",
            TransactionKind::Offering => "Oferta",
            TransactionKind::Donation => "Doação",
            TransactionKind::Expense => "Despesa",
        }
    }

    /// Tithe, offering and donation count as income
    pub fn is_income(&self) -> bool {
        !matches!(self, TransactionKind::Expense)
    }
}

impl FromStr for TransactionKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dizimo" => Ok(TransactionKind::Tithe),
            "oferta" => Ok(TransactionKind::Offering),
            "doacao" => Ok(TransactionKind::Donation),
            "despesa" => Ok(TransactionKind::Expense),
            other => Err(Error::validation(format!("Tipo de transação inválido: {other}"))),
        }
    }
}

// ============================================================================
// PAYMENT METHOD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[serde(rename = "dinheiro")]
    Cash,
    #[serde(rename = "pix")]
    Pix,
    #[serde(rename = "cartao")]
    Card,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [PaymentMethod::Cash, PaymentMethod::Pix, PaymentMethod::Card];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "dinheiro",
            PaymentMethod::Pix => "pix",
            PaymentMethod::Card => "cartao",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Dinheiro",
            PaymentMethod::Pix => "Pix",
            PaymentMethod::Card => "Cartão",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "dinheiro" => Ok(PaymentMethod::Cash),
            "pix" => Ok(PaymentMethod::Pix),
            "cartao" => Ok(PaymentMethod::Card),
            other => Err(Error::validation(format!("Método de pagamento inválido: {other}"))),
        }
    }
}

// ============================================================================
// TRANSACTION ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    pub id: i64,
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub member_id: Option<i64>,
    /// Monthly recurring entry, counted again under fixed costs
    pub recurring: bool,
    /// Joined from members for listings and exports
    pub member_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransactionInput {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub member_id: Option<i64>,
    pub recurring: bool,
}

impl TransactionInput {
    pub fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(Error::validation("A categoria é obrigatória."));
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(Error::validation("O valor deve ser maior que zero."));
        }
        Ok(())
    }
}

/// Filter for listings and exports; every field is optional
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    /// Inclusive date window
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub kind: Option<TransactionKind>,
    pub member_id: Option<i64>,
}

impl TransactionFilter {
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            ..Default::default()
        }
    }
}

// ============================================================================
// REPOSITORY
// ============================================================================

const SELECT_TRANSACTIONS: &str = "SELECT t.id, t.kind, t.category, t.amount, t.method, t.date,
            t.member_id, t.recurring, m.name
     FROM transactions t
     LEFT JOIN members m ON m.id = t.member_id";

fn from_row(row: &Row) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(1)?;
    let method: String = row.get(4)?;
    Ok(Transaction {
        id: row.get(0)?,
        kind: kind.parse().map_err(|e: Error| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?,
        category: row.get(2)?,
        amount: row.get(3)?,
        method: method.parse().unwrap_or(PaymentMethod::Cash),
        date: row.get(5)?,
        member_id: row.get(6)?,
        recurring: row.get(7)?,
        member_name: row.get(8)?,
    })
}

pub fn insert(conn: &Connection, input: &TransactionInput) -> Result<i64> {
    input.validate()?;
    conn.execute(
        "INSERT INTO transactions (kind, category, amount, method, date, member_id, recurring)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            input.kind.as_str(),
            input.category.trim(),
            input.amount,
            input.method.as_str(),
            input.date,
            input.member_id,
            input.recurring,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update(conn: &Connection, id: i64, input: &TransactionInput) -> Result<()> {
    input.validate()?;
    let changed = conn.execute(
        "UPDATE transactions SET kind = ?1, category = ?2, amount = ?3, method = ?4, date = ?5,
            member_id = ?6, recurring = ?7
         WHERE id = ?8",
        params![
            input.kind.as_str(),
            input.category.trim(),
            input.amount,
            input.method.as_str(),
            input.date,
            input.member_id,
            input.recurring,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Transação", id });
    }
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    Ok(conn
        .query_row(&format!("{SELECT_TRANSACTIONS} WHERE t.id = ?1"), [id], from_row)
        .optional()?)
}

pub fn require(conn: &Connection, id: i64) -> Result<Transaction> {
    get(conn, id)?.ok_or(Error::NotFound { resource: "Transação", id })
}

/// Newest first
pub fn list(conn: &Connection, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(from) = filter.from {
        clauses.push("t.date >= ?");
        values.push(Box::new(from));
    }
    if let Some(to) = filter.to {
        clauses.push("t.date <= ?");
        values.push(Box::new(to));
    }
    if let Some(kind) = filter.kind {
        clauses.push("t.kind = ?");
        values.push(Box::new(kind.as_str()));
    }
    if let Some(member_id) = filter.member_id {
        clauses.push("t.member_id = ?");
        values.push(Box::new(member_id));
    }

    let mut sql = SELECT_TRANSACTIONS.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY t.date DESC, t.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let transactions = stmt
        .query_map(params.as_slice(), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(transactions)
}

pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(Error::NotFound { resource: "Transação", id });
    }
    Ok(())
}

/// All-time (income, expense) totals for the dashboard
pub fn lifetime_totals(conn: &Connection) -> Result<(f64, f64)> {
    Ok(conn.query_row(
        "SELECT
            COALESCE(SUM(CASE WHEN kind = 'despesa' THEN 0 ELSE amount END), 0.0),
            COALESCE(SUM(CASE WHEN kind = 'despesa' THEN amount ELSE 0 END), 0.0)
         FROM transactions",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::entities::member::{self, MemberInput};

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn input(kind: TransactionKind, amount: f64, date: NaiveDate) -> TransactionInput {
        TransactionInput {
            kind,
            category: "culto".to_string(),
            amount,
            method: PaymentMethod::Pix,
            date,
            member_id: None,
            recurring: false,
        }
    }

    #[test]
    fn test_filter_by_window_kind_and_member() {
        let conn = test_connection();
        let member_id = member::insert(&conn, &MemberInput::named("João")).unwrap();

        let mut tithe = input(TransactionKind::Tithe, 300.0, date(3, 1));
        tithe.member_id = Some(member_id);
        insert(&conn, &tithe).unwrap();
        insert(&conn, &input(TransactionKind::Expense, 100.0, date(3, 31))).unwrap();
        insert(&conn, &input(TransactionKind::Offering, 50.0, date(4, 1))).unwrap();

        let march = list(&conn, &TransactionFilter::between(date(3, 1), date(3, 31))).unwrap();
        assert_eq!(march.len(), 2);
        assert_eq!(march[0].date, date(3, 31));

        let tithes = list(
            &conn,
            &TransactionFilter {
                kind: Some(TransactionKind::Tithe),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(tithes.len(), 1);
        assert_eq!(tithes[0].member_name.as_deref(), Some("João"));

        let own = list(
            &conn,
            &TransactionFilter {
                member_id: Some(member_id),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(own.len(), 1);
    }

    #[test]
    fn test_member_delete_sets_null() {
        let conn = test_connection();
        let member_id = member::insert(&conn, &MemberInput::named("Pedro")).unwrap();
        let mut tithe = input(TransactionKind::Tithe, 80.0, date(5, 5));
        tithe.member_id = Some(member_id);
        let id = insert(&conn, &tithe).unwrap();

        member::delete(&conn, member_id).unwrap();

        let stored = require(&conn, id).unwrap();
        assert_eq!(stored.member_id, None);
        assert_eq!(stored.member_name, None);
    }

    #[test]
    fn test_amount_must_be_positive() {
        let conn = test_connection();
        let err = insert(&conn, &input(TransactionKind::Tithe, 0.0, date(1, 1))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        let err = insert(&conn, &input(TransactionKind::Tithe, f64::NAN, date(1, 1))).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_lifetime_totals() {
        let conn = test_connection();
        assert_eq!(lifetime_totals(&conn).unwrap(), (0.0, 0.0));

        insert(&conn, &input(TransactionKind::Donation, 40.0, date(1, 1))).unwrap();
        insert(&conn, &input(TransactionKind::Expense, 15.0, date(1, 2))).unwrap();
        assert_eq!(lifetime_totals(&conn).unwrap(), (40.0, 15.0));
    }

    #[test]
    fn test_kind_round_trip_through_labels() {
        for kind in TransactionKind::ALL {
            assert_eq!(kind.as_str().parse::<TransactionKind>().unwrap(), kind);
        }
        assert!(TransactionKind::Offering.is_income());
        assert!(!TransactionKind::Expense.is_income());
    }
}
