use axum::extract::State;
use axum::Json;

use crate::api::types::{ApiContext, FirstMessageTemplate};

/// `GET /api/templates/first-message`: greeting shown before the patient types.
pub async fn first_message(State(ctx): State<ApiContext>) -> Json<FirstMessageTemplate> {
    let locale = ctx.core.locale();
    Json(FirstMessageTemplate {
        content: locale.first_message(),
        locale: locale.tag(),
    })
}
