use std::sync::Arc;

use futures_util::stream::BoxStream;

use super::fallback::FallbackGenerator;
use super::openai::OpenAiClient;
use super::prompt::PromptInput;
use super::CompletionError;
use crate::locale::Locale;

/// Lazy, finite sequence of text fragments. Consumed once.
pub type FragmentStream = BoxStream<'static, Result<String, CompletionError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Fallback,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Fallback => "fallback",
        }
    }
}

/// Something that turns a prompt into streamed assistant text.
pub trait CompletionSource: Send + Sync {
    fn produce(&self, input: &PromptInput) -> FragmentStream;

    /// Recorded in the persisted message's metadata (`{"model": label}`).
    fn label(&self) -> &str;

    fn kind(&self) -> SourceKind;
}

/// Pick the process-wide source once at startup: the live provider when a
/// client was configured, the deterministic generator otherwise.
pub fn select_source(live: Option<&OpenAiClient>, locale: Locale) -> Arc<dyn CompletionSource> {
    match live {
        Some(client) => {
            tracing::info!(model = %client.model(), "Completion source: live provider");
            Arc::new(client.clone())
        }
        None => {
            tracing::info!("Completion source: fallback generator (no OPENAI_API_KEY)");
            Arc::new(FallbackGenerator::new(locale))
        }
    }
}
