//! `GET /api/encounters/:id/stream`: one consultation turn as SSE.
//!
//! The relay runs in its own task with its own connection; this handler
//! only forwards relay events. Dropping the response (client disconnect)
//! does not stop the relay.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::api::types::ApiContext;
use crate::pipeline::consult::ConsultEvent;

/// Events buffered between the relay and a slow client.
const EVENT_BUFFER: usize = 64;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

pub fn to_sse_event(event: &ConsultEvent) -> Event {
    Event::default().event(event.name()).data(event.data())
}

pub async fn stream(State(ctx): State<ApiContext>, Path(id): Path<String>) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let core = ctx.core.clone();

    tokio::spawn(async move {
        let relay = core.relay();
        match core.open_db() {
            Ok(mut conn) => {
                relay.run(&mut conn, &id, tx).await;
            }
            Err(e) => {
                tracing::error!(encounter_id = %id, error = %e, "Cannot open database for stream");
                let _ = tx
                    .send(ConsultEvent::Error {
                        message: "stream failed: database".into(),
                    })
                    .await;
            }
        }
    });

    let events = ReceiverStream::new(rx).map(|event| Ok::<_, Infallible>(to_sse_event(&event)));

    (
        [(header::CACHE_CONTROL, "no-cache")],
        Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL)),
    )
}
