//! Stream relay: drives one consultation turn from gate check to the
//! persisted assistant message, emitting events as fragments arrive.
//!
//! State machine: Validating → Streaming → Finalizing → {Done, Failed}.
//! Exactly one terminal event (`done` or `error`) is emitted per run.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::Instrument;
use uuid::Uuid;

use super::gate::{check_session, SessionGate};
use super::history::load_history;
use super::prompt::PromptInput;
use super::source::CompletionSource;
use super::store::ConsultStore;
use super::CompletionError;
use crate::locale::Locale;

// ═══════════════════════════════════════════════════════════
// Events
// ═══════════════════════════════════════════════════════════

/// One server-sent event of a consultation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsultEvent {
    Token { delta: String },
    Done { message_id: Uuid },
    Error { message: String },
}

impl ConsultEvent {
    /// SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Token { .. } => "token",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// SSE `data:` payload (single-line JSON).
    pub fn data(&self) -> String {
        match self {
            Self::Token { delta } => serde_json::json!({ "delta": delta }),
            Self::Done { message_id } => serde_json::json!({ "messageId": message_id }),
            Self::Error { message } => serde_json::json!({ "message": message }),
        }
        .to_string()
    }

    fn failure(reason: impl Into<String>) -> Self {
        Self::Error {
            message: reason.into(),
        }
    }
}

/// Relay lifecycle. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Validating,
    Streaming,
    Finalizing,
    Done,
    Failed,
}

impl RelayState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Streaming => "streaming",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Summary of a finished run, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub state: RelayState,
    /// Id of the persisted assistant message (only when `Done`).
    pub message_id: Option<Uuid>,
    /// Fragments received from the source, including empty ones.
    pub fragments: usize,
}

impl RelayOutcome {
    fn failed(fragments: usize) -> Self {
        Self {
            state: RelayState::Failed,
            message_id: None,
            fragments,
        }
    }
}

/// Outgoing side of the event channel.
///
/// Once the receiver is gone, sends become no-ops: the turn is still
/// completed and persisted.
struct EventSink {
    tx: mpsc::Sender<ConsultEvent>,
    connected: bool,
}

impl EventSink {
    fn new(tx: mpsc::Sender<ConsultEvent>) -> Self {
        Self {
            tx,
            connected: true,
        }
    }

    async fn emit(&mut self, event: ConsultEvent) {
        if !self.connected {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.connected = false;
            tracing::info!("Client disconnected, continuing without event delivery");
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Relay
// ═══════════════════════════════════════════════════════════

/// Final assistant text: trimmed accumulation, or the localized
/// placeholder when nothing but whitespace was generated.
pub fn finalize_content(accumulated: &str, locale: Locale) -> String {
    let trimmed = accumulated.trim();
    if trimmed.is_empty() {
        locale.no_answer_placeholder().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Runs consultation turns against one completion source.
///
/// Stateless between runs: every run re-reads the encounter's history.
#[derive(Clone)]
pub struct StreamRelay {
    source: Arc<dyn CompletionSource>,
    locale: Locale,
    idle_timeout: Option<Duration>,
}

impl StreamRelay {
    pub fn new(source: Arc<dyn CompletionSource>, locale: Locale) -> Self {
        Self {
            source,
            locale,
            idle_timeout: None,
        }
    }

    /// Bound the wait for each next fragment. Expiry fails the run.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Run one turn for `encounter_id`, sending events to `events`.
    ///
    /// The sender is dropped on return, which ends the client's stream.
    pub async fn run<S: ConsultStore + ?Sized>(
        &self,
        store: &mut S,
        encounter_id: &str,
        events: mpsc::Sender<ConsultEvent>,
    ) -> RelayOutcome {
        let span = tracing::info_span!(
            "consult_stream",
            encounter_id = %encounter_id,
            model = %self.source.label()
        );
        let mut sink = EventSink::new(events);
        let outcome = self
            .drive(store, encounter_id, &mut sink)
            .instrument(span.clone())
            .await;

        let _guard = span.enter();
        match outcome.state {
            RelayState::Done => tracing::info!(
                fragments = outcome.fragments,
                message_id = ?outcome.message_id,
                "Consultation turn completed"
            ),
            state => tracing::warn!(
                state = state.as_str(),
                fragments = outcome.fragments,
                "Consultation turn failed"
            ),
        }
        outcome
    }

    async fn drive<S: ConsultStore + ?Sized>(
        &self,
        store: &mut S,
        encounter_id: &str,
        sink: &mut EventSink,
    ) -> RelayOutcome {
        // ── Validating ────────────────────────────────────────
        tracing::debug!(state = RelayState::Validating.as_str(), "Relay state");
        let id = match check_session(&*store, encounter_id) {
            Ok(SessionGate::Open(id)) => id,
            Ok(SessionGate::Closed(_)) => {
                sink.emit(ConsultEvent::failure(format!(
                    "encounter {encounter_id} is closed"
                )))
                .await;
                return RelayOutcome::failed(0);
            }
            Ok(SessionGate::Missing) => {
                sink.emit(ConsultEvent::failure(format!(
                    "encounter {encounter_id} not found"
                )))
                .await;
                return RelayOutcome::failed(0);
            }
            Err(e) => {
                tracing::error!(error = %e, "Session lookup failed");
                sink.emit(ConsultEvent::failure("stream failed: database"))
                    .await;
                return RelayOutcome::failed(0);
            }
        };

        // ── Streaming ─────────────────────────────────────────
        tracing::debug!(state = RelayState::Streaming.as_str(), "Relay state");
        let history = match load_history(&*store, &id) {
            Ok(history) => history,
            Err(e) => {
                tracing::error!(error = %e, "History load failed");
                sink.emit(ConsultEvent::failure("stream failed: database"))
                    .await;
                return RelayOutcome::failed(0);
            }
        };
        let input = PromptInput::from_history(&history, self.locale);

        let mut fragments = self.source.produce(&input);
        let mut accumulated = String::new();
        let mut received = 0usize;

        loop {
            let next = match self.idle_timeout {
                Some(limit) => match tokio::time::timeout(limit, fragments.next()).await {
                    Ok(next) => next,
                    Err(_) => Some(Err(CompletionError::Timeout(limit))),
                },
                None => fragments.next().await,
            };

            match next {
                Some(Ok(fragment)) => {
                    received += 1;
                    if fragment.is_empty() {
                        continue;
                    }
                    accumulated.push_str(&fragment);
                    sink.emit(ConsultEvent::Token { delta: fragment }).await;
                }
                Some(Err(e)) => {
                    tracing::warn!(error = %e, kind = e.kind(), fragments = received, "Completion source failed");
                    sink.emit(ConsultEvent::failure(format!(
                        "stream failed: {}",
                        e.kind()
                    )))
                    .await;
                    return RelayOutcome::failed(received);
                }
                None => break,
            }
        }

        // ── Finalizing ────────────────────────────────────────
        tracing::debug!(state = RelayState::Finalizing.as_str(), fragments = received, "Relay state");
        let content = finalize_content(&accumulated, self.locale);
        let meta = serde_json::json!({ "model": self.source.label() });

        match store.append_assistant_message(&id, &content, meta) {
            Ok(message_id) => {
                sink.emit(ConsultEvent::Done { message_id }).await;
                RelayOutcome {
                    state: RelayState::Done,
                    message_id: Some(message_id),
                    fragments: received,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Assistant message persistence failed");
                sink.emit(ConsultEvent::failure("stream failed: persistence"))
                    .await;
                RelayOutcome::failed(received)
            }
        }
    }
}
