//! Shared types for the HTTP API layer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core_state::CoreState;
use crate::models::enums::EncounterStatus;
use crate::models::Encounter;

/// Longest message body accepted from clients, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 200;

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

// ═══════════════════════════════════════════════════════════
// Request / response bodies
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Deserialize)]
pub struct NewConsultRequest {
    #[serde(default)]
    pub chief_complaint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct NewConsultResponse {
    pub encounter_id: Uuid,
}

/// Raw list query. Values are kept as strings so malformed numbers fall
/// back to defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct EncounterListQuery {
    pub status: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
}

/// Encounter as listed to the clinician dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncounterView {
    pub id: Uuid,
    pub chief_complaint: Option<String>,
    pub status: EncounterStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Reserved for triage; always null for now.
    pub triage_level: Option<String>,
    pub needs_attention: bool,
}

impl From<Encounter> for EncounterView {
    fn from(enc: Encounter) -> Self {
        Self {
            id: enc.id,
            chief_complaint: enc.chief_complaint,
            status: enc.status,
            started_at: enc.started_at,
            ended_at: enc.ended_at,
            triage_level: None,
            needs_attention: false,
        }
    }
}

/// Both fields are optional on the wire so that missing or `null` values
/// reach handler validation instead of failing extraction.
#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PostMessageResponse {
    pub message_id: Uuid,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct EndEncounterResponse {
    pub status: EncounterStatus,
}

#[derive(Debug, Serialize)]
pub struct FirstMessageTemplate {
    pub content: &'static str,
    pub locale: &'static str,
}
