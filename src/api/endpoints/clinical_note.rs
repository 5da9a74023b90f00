use axum::extract::{Path, State};
use axum::Json;

use crate::api::endpoints::encounters::parse_encounter_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::repository;
use crate::pipeline::consult::load_history;
use crate::pipeline::note::{self, ClinicalNote};

/// `POST /api/encounters/:id/clinical-note`: synthesize a chart from the
/// encounter transcript. Works on active and closed encounters alike.
pub async fn generate(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ClinicalNote>, ApiError> {
    let encounter_id = parse_encounter_id(&id)?;

    // Read everything up front; the connection is not held across the
    // provider call.
    let history = {
        let conn = ctx.core.open_db()?;
        if repository::get_encounter_status(&conn, &encounter_id)?.is_none() {
            return Err(ApiError::NotFound(format!("encounter {encounter_id} not found")));
        }
        load_history(&conn, &encounter_id)?
    };

    let note = note::synthesize(ctx.core.openai(), &history, ctx.core.locale()).await?;
    tracing::info!(
        encounter_id = %encounter_id,
        has_chief_complaint = note.chief_complaint.is_some(),
        "Clinical note generated"
    );
    Ok(Json(note))
}
