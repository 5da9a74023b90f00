use uuid::Uuid;

use super::store::ConsultStore;
use crate::db::DatabaseError;
use crate::models::enums::EncounterStatus;

/// Result of validating a stream target before any provider work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionGate {
    Open(Uuid),
    Closed(Uuid),
    Missing,
}

impl SessionGate {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open(_))
    }
}

/// Encounter id as received from a client. Surrounding whitespace is
/// ignored; anything else that is not a UUID names no encounter.
pub fn parse_session_id(raw_id: &str) -> Option<Uuid> {
    Uuid::parse_str(raw_id.trim()).ok()
}

/// Look the encounter up once.
pub fn check_session<S: ConsultStore + ?Sized>(
    store: &S,
    raw_id: &str,
) -> Result<SessionGate, DatabaseError> {
    let Some(id) = parse_session_id(raw_id) else {
        return Ok(SessionGate::Missing);
    };

    Ok(match store.encounter_status(&id)? {
        Some(EncounterStatus::Active) => SessionGate::Open(id),
        Some(EncounterStatus::Closed) => SessionGate::Closed(id),
        None => SessionGate::Missing,
    })
}

pub fn session_is_open_and_exists<S: ConsultStore + ?Sized>(
    store: &S,
    raw_id: &str,
) -> Result<bool, DatabaseError> {
    check_session(store, raw_id).map(|gate| gate.is_open())
}
