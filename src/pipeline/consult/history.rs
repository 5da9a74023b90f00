use uuid::Uuid;

use super::store::ConsultStore;
use crate::db::DatabaseError;

/// A stored message as the prompt assembler sees it.
///
/// `role` is the raw stored string; the assembler decides what is valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: String,
    pub role: String,
    pub content: String,
}

/// Load the whole transcript, oldest first.
///
/// No pagination: consultations are short and every stream re-reads the log.
pub fn load_history<S: ConsultStore + ?Sized>(
    store: &S,
    encounter_id: &Uuid,
) -> Result<Vec<HistoryEntry>, DatabaseError> {
    let history = store.load_history(encounter_id)?;
    tracing::debug!(encounter_id = %encounter_id, messages = history.len(), "History loaded");
    Ok(history)
}
