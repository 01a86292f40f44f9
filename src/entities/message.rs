// ✉️ Sent-message log: one row per delivery attempt

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Channel::Email => "E-mail",
            Channel::Sms => "SMS",
        }
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Channel::Email),
            "sms" => Ok(Channel::Sms),
            other => Err(Error::validation(format!("Canal inválido: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeliveryStatus {
    #[serde(rename = "enviada")]
    Sent,
    #[serde(rename = "falhou")]
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "enviada",
            DeliveryStatus::Failed => "falhou",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SentMessage {
    pub id: i64,
    pub channel: Channel,
    pub recipient: String,
    pub member_id: Option<i64>,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub sent_by: Option<i64>,
    pub sent_at: DateTime<Utc>,
}

/// Row to append to the log
#[derive(Debug, Clone)]
pub struct MessageLogEntry {
    pub channel: Channel,
    pub recipient: String,
    pub member_id: Option<i64>,
    pub subject: String,
    pub body: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub sent_by: Option<i64>,
}

fn from_row(row: &Row) -> rusqlite::Result<SentMessage> {
    let channel: String = row.get(1)?;
    let status: String = row.get(6)?;
    Ok(SentMessage {
        id: row.get(0)?,
        channel: channel.parse().unwrap_or(Channel::Email),
        recipient: row.get(2)?,
        member_id: row.get(3)?,
        subject: row.get(4)?,
        body: row.get(5)?,
        status: if status == "enviada" {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        },
        error: row.get(7)?,
        sent_by: row.get(8)?,
        sent_at: row.get(9)?,
    })
}

pub fn insert(conn: &Connection, entry: &MessageLogEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO sent_messages (
            channel, recipient, member_id, subject, body, status, error, sent_by, sent_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            entry.channel.as_str(),
            entry.recipient,
            entry.member_id,
            entry.subject,
            entry.body,
            entry.status.as_str(),
            entry.error,
            entry.sent_by,
            Utc::now(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent first
pub fn list_recent(conn: &Connection, limit: u32) -> Result<Vec<SentMessage>> {
    let mut stmt = conn.prepare(
        "SELECT id, channel, recipient, member_id, subject, body, status, error, sent_by, sent_at
         FROM sent_messages ORDER BY sent_at DESC, id DESC LIMIT ?1",
    )?;
    let messages = stmt
        .query_map([limit], from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}
