use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::{parse_db_timestamp, to_db_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::MessageRole;
use crate::models::Message;

/// Append one message. The log is append-only: there is no update or delete.
pub fn insert_message(conn: &Connection, msg: &Message) -> Result<(), DatabaseError> {
    let meta = msg
        .meta
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    conn.execute(
        "INSERT INTO messages (id, encounter_id, role, content, created_at, meta)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            msg.id.to_string(),
            msg.encounter_id.to_string(),
            msg.role.as_str(),
            msg.content,
            to_db_timestamp(&msg.created_at),
            meta,
        ],
    )?;
    Ok(())
}

/// Raw `(id, role, content)` rows in log order, role left unparsed.
///
/// Ascending by `created_at`; ties resolved by insertion order.
pub fn get_raw_messages_by_encounter(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<Vec<(String, String, String)>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, role, content FROM messages
         WHERE encounter_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![encounter_id.to_string()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(row?);
    }
    Ok(messages)
}

/// Fully typed messages in log order.
pub fn get_messages_by_encounter(
    conn: &Connection,
    encounter_id: &Uuid,
) -> Result<Vec<Message>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, encounter_id, role, content, created_at, meta
         FROM messages WHERE encounter_id = ?1
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map(params![encounter_id.to_string()], |row| {
        Ok(MessageRow {
            id: row.get(0)?,
            encounter_id: row.get(1)?,
            role: row.get(2)?,
            content: row.get(3)?,
            created_at: row.get(4)?,
            meta: row.get(5)?,
        })
    })?;

    let mut messages = Vec::new();
    for row in rows {
        messages.push(message_from_row(row?)?);
    }
    Ok(messages)
}

struct MessageRow {
    id: String,
    encounter_id: String,
    role: String,
    content: String,
    created_at: String,
    meta: Option<String>,
}

fn message_from_row(row: MessageRow) -> Result<Message, DatabaseError> {
    Ok(Message {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        encounter_id: Uuid::parse_str(&row.encounter_id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        role: MessageRole::from_str(&row.role)?,
        content: row.content,
        created_at: parse_db_timestamp(&row.created_at)?,
        meta: row
            .meta
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
    })
}
