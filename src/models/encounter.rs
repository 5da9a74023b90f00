use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{EncounterStatus, MessageRole};

/// A consultation session. Status only ever moves active → closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Encounter {
    pub id: Uuid,
    pub chief_complaint: Option<String>,
    pub status: EncounterStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Encounter {
    /// A fresh, active encounter stamped with the current time.
    pub fn open(chief_complaint: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            chief_complaint,
            status: EncounterStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == EncounterStatus::Active
    }
}

/// One entry in an encounter's append-only message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub encounter_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Free-form metadata, e.g. `{"model": "gpt-4o-mini"}` on assistant turns.
    pub meta: Option<serde_json::Value>,
}

impl Message {
    pub fn new(encounter_id: Uuid, role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            encounter_id,
            role,
            content: content.into(),
            created_at: Utc::now(),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: serde_json::Value) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Filter for the encounter list endpoint.
#[derive(Debug, Clone)]
pub struct EncounterFilter {
    pub status: Option<EncounterStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for EncounterFilter {
    fn default() -> Self {
        Self {
            status: None,
            limit: 50,
            offset: 0,
        }
    }
}
