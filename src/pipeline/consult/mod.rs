//! Streaming consultation pipeline.
//!
//! Coordinates: gate → history → prompt → completion source → relay.
//! The relay is the only component that writes; everything before it is a
//! read against the encounter's message log.

pub mod fallback;
pub mod gate;
pub mod history;
pub mod openai;
pub mod prompt;
pub mod relay;
pub mod source;
pub mod sse;
pub mod store;

use std::time::Duration;

use thiserror::Error;

pub use fallback::FallbackGenerator;
pub use gate::{check_session, parse_session_id, session_is_open_and_exists, SessionGate};
pub use history::{load_history, HistoryEntry};
pub use openai::OpenAiClient;
pub use prompt::{assemble, ChatMessage, PromptInput};
pub use relay::{ConsultEvent, RelayOutcome, RelayState, StreamRelay};
pub use source::{select_source, CompletionSource, FragmentStream, SourceKind};
pub use store::ConsultStore;

/// Failures of a completion provider call.
///
/// Per-chunk extraction problems never surface here: they degrade to an
/// empty fragment (see `openai::extract_delta`).
#[derive(Error, Debug, Clone)]
pub enum CompletionError {
    #[error("Provider connection failed: {0}")]
    Connection(String),

    #[error("Provider returned HTTP {status}: {body}")]
    ProviderStatus { status: u16, body: String },

    #[error("Provider stream interrupted: {0}")]
    Stream(String),

    #[error("No fragment received within {0:?}")]
    Timeout(Duration),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

impl CompletionError {
    /// Stable failure class reported to clients in `error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::ProviderStatus { .. } => "provider_status",
            Self::Stream(_) => "stream",
            Self::Timeout(_) => "timeout",
            Self::Client(_) => "client",
            Self::ResponseParsing(_) => "response_parsing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_and_distinct() {
        let errors = [
            CompletionError::Connection("refused".into()),
            CompletionError::ProviderStatus {
                status: 500,
                body: String::new(),
            },
            CompletionError::Stream("reset".into()),
            CompletionError::Timeout(Duration::from_secs(1)),
            CompletionError::Client("builder".into()),
            CompletionError::ResponseParsing("eof".into()),
        ];
        let mut kinds: Vec<_> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort_unstable();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
        assert_eq!(errors[1].kind(), "provider_status");
    }
}
