//! Encounter endpoints.
//!
//! - `POST /consult/new`: open an encounter
//! - `GET /api/encounters`: list encounters, newest first
//! - `POST /api/encounters/:id/messages`: append a patient/system message
//! - `POST /api/encounters/:id/end`: close an encounter (idempotent)

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{
    ApiContext, EncounterListQuery, EncounterView, EndEncounterResponse, NewConsultRequest,
    NewConsultResponse, PostMessageRequest, PostMessageResponse, DEFAULT_LIST_LIMIT,
    MAX_LIST_LIMIT, MAX_MESSAGE_CHARS,
};
use crate::db::repository;
use crate::models::enums::{EncounterStatus, MessageRole};
use crate::models::{Encounter, EncounterFilter, Message};
use crate::pipeline::consult::parse_session_id;

/// Same id rule as the stream gate; a malformed id is a missing encounter.
pub(crate) fn parse_encounter_id(raw: &str) -> Result<Uuid, ApiError> {
    parse_session_id(raw)
        .ok_or_else(|| ApiError::NotFound(format!("encounter {} not found", raw.trim())))
}

/// `POST /consult/new`: body and its field are both optional.
pub async fn create(
    State(ctx): State<ApiContext>,
    body: Option<Json<NewConsultRequest>>,
) -> Result<(StatusCode, Json<NewConsultResponse>), ApiError> {
    let chief_complaint = body
        .and_then(|Json(req)| req.chief_complaint)
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let conn = ctx.core.open_db()?;
    let enc = Encounter::open(chief_complaint);
    repository::insert_encounter(&conn, &enc)?;
    tracing::info!(encounter_id = %enc.id, "Encounter opened");

    Ok((
        StatusCode::CREATED,
        Json(NewConsultResponse {
            encounter_id: enc.id,
        }),
    ))
}

/// Lenient list query parsing: malformed values fall back to defaults.
pub(crate) fn list_filter(query: &EncounterListQuery) -> EncounterFilter {
    let status = match query.status.as_deref().map(str::trim) {
        Some("active") => Some(EncounterStatus::Active),
        Some("closed") => Some(EncounterStatus::Closed),
        _ => None,
    };
    let limit = query
        .limit
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| v.clamp(1, MAX_LIST_LIMIT as i64) as u32)
        .unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = query
        .offset
        .as_deref()
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(|v| v.clamp(0, u32::MAX as i64) as u32)
        .unwrap_or(0);

    EncounterFilter {
        status,
        limit,
        offset,
    }
}

/// `GET /api/encounters?status=&limit=&offset=`
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<EncounterListQuery>,
) -> Result<Json<Vec<EncounterView>>, ApiError> {
    let filter = list_filter(&query);
    let conn = ctx.core.open_db()?;
    let encounters = repository::list_encounters(&conn, &filter)?;
    Ok(Json(encounters.into_iter().map(EncounterView::from).collect()))
}

/// `POST /api/encounters/:id/messages`
///
/// Validation happens before any storage access.
pub async fn post_message(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(req): Json<PostMessageRequest>,
) -> Result<Json<PostMessageResponse>, ApiError> {
    let role = req
        .role
        .as_deref()
        .and_then(|r| r.parse::<MessageRole>().ok())
        .filter(MessageRole::is_client_postable)
        .ok_or_else(|| ApiError::BadRequest("role must be 'user' or 'system'".into()))?;

    let content = req.content.as_deref().unwrap_or_default().trim();
    if content.is_empty() {
        return Err(ApiError::BadRequest("content is required".into()));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "content too long (max {MAX_MESSAGE_CHARS} chars)"
        )));
    }

    let encounter_id = parse_encounter_id(&id)?;
    let conn = ctx.core.open_db()?;
    match repository::get_encounter_status(&conn, &encounter_id)? {
        None => {
            return Err(ApiError::NotFound(format!(
                "encounter {encounter_id} not found"
            )))
        }
        Some(EncounterStatus::Closed) => {
            return Err(ApiError::Conflict(format!(
                "encounter {encounter_id} is closed"
            )))
        }
        Some(EncounterStatus::Active) => {}
    }

    let msg = Message::new(encounter_id, role, content);
    repository::insert_message(&conn, &msg)?;
    tracing::debug!(encounter_id = %encounter_id, role = %role, "Message queued");

    Ok(Json(PostMessageResponse {
        message_id: msg.id,
        status: "queued",
    }))
}

/// `POST /api/encounters/:id/end`
///
/// Closing a closed encounter succeeds and keeps the original `ended_at`.
pub async fn end(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<EndEncounterResponse>, ApiError> {
    let encounter_id = parse_encounter_id(&id)?;
    let conn = ctx.core.open_db()?;
    if repository::close_encounter(&conn, &encounter_id)? {
        tracing::info!(encounter_id = %encounter_id, "Encounter closed");
    }

    Ok(Json(EndEncounterResponse {
        status: EncounterStatus::Closed,
    }))
}
