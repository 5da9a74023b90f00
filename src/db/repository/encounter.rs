use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{parse_db_timestamp, to_db_timestamp};
use crate::db::DatabaseError;
use crate::models::enums::EncounterStatus;
use crate::models::{Encounter, EncounterFilter};

pub fn insert_encounter(conn: &Connection, enc: &Encounter) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO encounters (id, chief_complaint, status, started_at, ended_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            enc.id.to_string(),
            enc.chief_complaint,
            enc.status.as_str(),
            to_db_timestamp(&enc.started_at),
            enc.ended_at.as_ref().map(to_db_timestamp),
        ],
    )?;
    Ok(())
}

pub fn get_encounter(conn: &Connection, id: &Uuid) -> Result<Option<Encounter>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, chief_complaint, status, started_at, ended_at
             FROM encounters WHERE id = ?1",
            params![id.to_string()],
            EncounterRow::read,
        )
        .optional()?;

    row.map(encounter_from_row).transpose()
}

/// Status of an encounter, or `None` if it does not exist. One keyed read.
pub fn get_encounter_status(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<EncounterStatus>, DatabaseError> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM encounters WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?;

    status.as_deref().map(EncounterStatus::from_str).transpose()
}

/// Newest first, optionally restricted to one status.
pub fn list_encounters(
    conn: &Connection,
    filter: &EncounterFilter,
) -> Result<Vec<Encounter>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, chief_complaint, status, started_at, ended_at
         FROM encounters
         WHERE (?1 IS NULL OR status = ?1)
         ORDER BY started_at DESC, rowid DESC
         LIMIT ?2 OFFSET ?3",
    )?;

    let rows = stmt.query_map(
        params![
            filter.status.map(|s| s.as_str()),
            filter.limit,
            filter.offset
        ],
        EncounterRow::read,
    )?;

    let mut encounters = Vec::new();
    for row in rows {
        encounters.push(encounter_from_row(row?)?);
    }
    Ok(encounters)
}

/// Close an active encounter. Returns `false` when it was already closed,
/// in which case the original `ended_at` is kept, and `NotFound` when it
/// does not exist.
pub fn close_encounter(conn: &Connection, id: &Uuid) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE encounters SET status = 'closed', ended_at = ?2
         WHERE id = ?1 AND status = 'active'",
        params![id.to_string(), to_db_timestamp(&Utc::now())],
    )?;
    if updated > 0 {
        return Ok(true);
    }
    match get_encounter_status(conn, id)? {
        Some(_) => Ok(false),
        None => Err(DatabaseError::NotFound {
            entity_type: "encounter".into(),
            id: id.to_string(),
        }),
    }
}

struct EncounterRow {
    id: String,
    chief_complaint: Option<String>,
    status: String,
    started_at: String,
    ended_at: Option<String>,
}

impl EncounterRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            chief_complaint: row.get(1)?,
            status: row.get(2)?,
            started_at: row.get(3)?,
            ended_at: row.get(4)?,
        })
    }
}

fn encounter_from_row(row: EncounterRow) -> Result<Encounter, DatabaseError> {
    Ok(Encounter {
        id: Uuid::parse_str(&row.id)
            .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?,
        chief_complaint: row.chief_complaint,
        status: EncounterStatus::from_str(&row.status)?,
        started_at: parse_db_timestamp(&row.started_at)?,
        ended_at: row.ended_at.as_deref().map(parse_db_timestamp).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::Duration;

    #[test]
    fn insert_and_get_encounter() {
        let conn = open_memory_database().unwrap();
        let enc = Encounter::open(Some("headache".into()));
        insert_encounter(&conn, &enc).unwrap();

        let loaded = get_encounter(&conn, &enc.id).unwrap().unwrap();
        assert_eq!(loaded.id, enc.id);
        assert_eq!(loaded.chief_complaint.as_deref(), Some("headache"));
        assert_eq!(loaded.status, EncounterStatus::Active);
        assert!(loaded.ended_at.is_none());
    }

    #[test]
    fn missing_chief_complaint_is_representable() {
        let conn = open_memory_database().unwrap();
        let enc = Encounter::open(None);
        insert_encounter(&conn, &enc).unwrap();
        let loaded = get_encounter(&conn, &enc.id).unwrap().unwrap();
        assert!(loaded.chief_complaint.is_none());
    }

    #[test]
    fn get_missing_encounter_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_encounter(&conn, &Uuid::new_v4()).unwrap().is_none());
        assert!(get_encounter_status(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn close_is_one_way_and_keeps_first_end_time() {
        let conn = open_memory_database().unwrap();
        let enc = Encounter::open(None);
        insert_encounter(&conn, &enc).unwrap();

        assert!(close_encounter(&conn, &enc.id).unwrap());
        let first = get_encounter(&conn, &enc.id).unwrap().unwrap();
        assert_eq!(first.status, EncounterStatus::Closed);
        let ended_at = first.ended_at.unwrap();

        assert!(!close_encounter(&conn, &enc.id).unwrap());
        let second = get_encounter(&conn, &enc.id).unwrap().unwrap();
        assert_eq!(second.ended_at, Some(ended_at));
    }

    #[test]
    fn close_missing_encounter_is_not_found() {
        let conn = open_memory_database().unwrap();
        let id = Uuid::new_v4();
        let err = close_encounter(&conn, &id).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::NotFound { ref entity_type, id: ref missing }
                if entity_type == "encounter" && *missing == id.to_string()
        ));
    }

    #[test]
    fn list_is_newest_first_with_status_filter_and_paging() {
        let conn = open_memory_database().unwrap();
        let base = Utc::now();
        let mut ids = Vec::new();
        for i in 0..3 {
            let mut enc = Encounter::open(Some(format!("complaint {i}")));
            enc.started_at = base + Duration::seconds(i);
            insert_encounter(&conn, &enc).unwrap();
            ids.push(enc.id);
        }
        close_encounter(&conn, &ids[0]).unwrap();

        let all = list_encounters(&conn, &EncounterFilter::default()).unwrap();
        assert_eq!(
            all.iter().map(|e| e.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1], ids[0]]
        );

        let active = list_encounters(
            &conn,
            &EncounterFilter {
                status: Some(EncounterStatus::Active),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(active.len(), 2);
        assert!(active.iter().all(|e| e.is_active()));

        let page = list_encounters(
            &conn,
            &EncounterFilter {
                status: None,
                limit: 1,
                offset: 1,
            },
        )
        .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, ids[1]);
    }
}
