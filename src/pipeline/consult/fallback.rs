use std::time::Duration;

use futures_util::{stream, StreamExt};

use super::prompt::PromptInput;
use super::source::{CompletionSource, FragmentStream, SourceKind};
use crate::locale::Locale;

/// Pause between characters, to look like incremental generation.
pub const DEFAULT_FRAGMENT_DELAY: Duration = Duration::from_millis(20);

/// Deterministic stand-in for the live provider.
///
/// Always streams the same canned follow-up question one character at a
/// time. Never fails and never touches the network.
#[derive(Debug, Clone)]
pub struct FallbackGenerator {
    text: &'static str,
    delay: Duration,
}

impl FallbackGenerator {
    pub fn new(locale: Locale) -> Self {
        Self {
            text: locale.fallback_follow_up(),
            delay: DEFAULT_FRAGMENT_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn text(&self) -> &'static str {
        self.text
    }
}

impl CompletionSource for FallbackGenerator {
    fn produce(&self, input: &PromptInput) -> FragmentStream {
        tracing::debug!(tail_chars = input.tail.chars().count(), "Fallback generator producing canned reply");
        let delay = self.delay;
        stream::iter(self.text.chars())
            .then(move |ch| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(ch.to_string())
            })
            .boxed()
    }

    fn label(&self) -> &str {
        "dummy"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Fallback
    }
}
