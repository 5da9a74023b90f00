//! Narrow storage interface the consult pipeline depends on.

use rusqlite::Connection;
use uuid::Uuid;

use super::history::HistoryEntry;
use crate::db::{repository, DatabaseError};
use crate::models::enums::{EncounterStatus, MessageRole};
use crate::models::Message;

/// Reads and the single append the relay needs.
///
/// Implemented for `rusqlite::Connection`; each stream task owns its own
/// connection for the duration of the request.
pub trait ConsultStore {
    /// `None` when the encounter does not exist.
    fn encounter_status(&self, id: &Uuid) -> Result<Option<EncounterStatus>, DatabaseError>;

    /// Full transcript in log order.
    fn load_history(&self, id: &Uuid) -> Result<Vec<HistoryEntry>, DatabaseError>;

    /// Insert one assistant message and return its id.
    fn append_assistant_message(
        &mut self,
        encounter_id: &Uuid,
        content: &str,
        meta: serde_json::Value,
    ) -> Result<Uuid, DatabaseError>;
}

impl ConsultStore for Connection {
    fn encounter_status(&self, id: &Uuid) -> Result<Option<EncounterStatus>, DatabaseError> {
        repository::get_encounter_status(self, id)
    }

    fn load_history(&self, id: &Uuid) -> Result<Vec<HistoryEntry>, DatabaseError> {
        let rows = repository::get_raw_messages_by_encounter(self, id)?;
        Ok(rows
            .into_iter()
            .map(|(id, role, content)| HistoryEntry { id, role, content })
            .collect())
    }

    fn append_assistant_message(
        &mut self,
        encounter_id: &Uuid,
        content: &str,
        meta: serde_json::Value,
    ) -> Result<Uuid, DatabaseError> {
        let msg = Message::new(*encounter_id, MessageRole::Assistant, content).with_meta(meta);
        let tx = self.transaction()?;
        repository::insert_message(&tx, &msg)?;
        tx.commit()?;
        Ok(msg.id)
    }
}
