//! Live completion provider: OpenAI-compatible `/chat/completions`.
//!
//! Streaming is used for consultations; the clinical note uses the same
//! client in non-streaming mode.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures_util::{stream, Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use super::prompt::{ChatMessage, PromptInput};
use super::source::{CompletionSource, FragmentStream, SourceKind};
use super::sse::{SseBuffer, SseFrame};
use super::CompletionError;
use crate::config::AppConfig;

/// Low temperature keeps intake phrasing consistent rather than creative.
pub const CONSULT_TEMPERATURE: f32 = 0.3;

/// Clinical notes are summaries; even less variation.
pub const NOTE_TEMPERATURE: f32 = 0.2;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on bytes of a single undelimited SSE event held in memory.
const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

/// Error bodies from the provider are truncated to this many chars in logs and errors.
const MAX_ERROR_BODY_CHARS: usize = 512;

// ═══════════════════════════════════════════════════════════
// Client
// ═══════════════════════════════════════════════════════════

/// HTTP client for an OpenAI-compatible chat completion API.
///
/// Cheap to clone: `reqwest::Client` is reference counted.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| CompletionError::Client(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }

    /// `None` when no credential is configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, CompletionError> {
        config
            .openai_api_key
            .as_deref()
            .map(|key| Self::new(&config.openai_base_url, key, &config.model))
            .transpose()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        stream: bool,
    ) -> Result<reqwest::Response, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature,
            stream,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    CompletionError::Connection(e.to_string())
                } else {
                    CompletionError::Client(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!(status = status.as_u16(), body = %body, "Completion provider rejected request");
            return Err(CompletionError::ProviderStatus {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Non-streaming completion. Returns the first choice's content
    /// (empty when the provider sent none).
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, CompletionError> {
        let response = self.send(messages, temperature, false).await?;
        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::ResponseParsing(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| CompletionError::ResponseParsing("response has no choices".into()))
    }
}

impl CompletionSource for OpenAiClient {
    fn produce(&self, input: &PromptInput) -> FragmentStream {
        let client = self.clone();
        let messages = input.messages.clone();
        stream::once(async move {
            let response = client.send(&messages, CONSULT_TEMPERATURE, true).await?;
            Ok::<_, CompletionError>(fragments_from_body(response.bytes_stream()))
        })
        .try_flatten()
        .boxed()
    }

    fn label(&self) -> &str {
        &self.model
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Live
    }
}

// ═══════════════════════════════════════════════════════════
// Wire types
// ═══════════════════════════════════════════════════════════

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChunkPayload {
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

// ═══════════════════════════════════════════════════════════
// Stream decoding
// ═══════════════════════════════════════════════════════════

/// Text delta carried by one streamed chunk.
///
/// Malformed, partial or content-free payloads yield `""`: one bad chunk
/// must not abort an otherwise healthy stream.
pub fn extract_delta(payload: &str) -> String {
    match serde_json::from_str::<ChunkPayload>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, payload_bytes = payload.len(), "Unparseable completion chunk, treating as empty");
            String::new()
        }
    }
}

struct SseDecoder<B> {
    body: Pin<Box<B>>,
    frames: SseBuffer,
    pending: VecDeque<Result<String, CompletionError>>,
    finished: bool,
}

impl<B> SseDecoder<B> {
    /// Decode every complete event into `pending`, then bound what is left.
    fn drain_events(&mut self) {
        while let Some(frame) = self.frames.next_frame() {
            match frame {
                Ok(SseFrame::Data(data)) => self.pending.push_back(Ok(extract_delta(&data))),
                Ok(SseFrame::Done) => {
                    self.finished = true;
                    return;
                }
                Err(e) => {
                    self.fail(e);
                    return;
                }
            }
        }
        if let Err(e) = self.frames.check_tail() {
            self.fail(e);
        }
    }

    fn fail(&mut self, error: CompletionError) {
        self.pending.push_back(Err(error));
        self.finished = true;
    }
}

/// Turn a raw SSE body into a fragment stream, one fragment per chunk.
///
/// Ends at `[DONE]` or at EOF. Transport errors end the stream with an
/// `Err` item.
pub(crate) fn fragments_from_body<B, T>(body: B) -> FragmentStream
where
    B: Stream<Item = Result<T, reqwest::Error>> + Send + 'static,
    T: AsRef<[u8]> + Send + 'static,
{
    let decoder = SseDecoder {
        body: Box::pin(body),
        frames: SseBuffer::with_limit(MAX_SSE_BUFFER_BYTES),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(decoder, |mut decoder| async move {
        loop {
            if let Some(item) = decoder.pending.pop_front() {
                return Some((item, decoder));
            }
            if decoder.finished {
                return None;
            }

            match decoder.body.next().await {
                Some(Ok(chunk)) => {
                    decoder.frames.push(chunk.as_ref());
                    decoder.drain_events();
                }
                Some(Err(e)) => decoder.fail(CompletionError::Stream(e.to_string())),
                None => {
                    decoder.frames.finish();
                    decoder.drain_events();
                    if !decoder.finished {
                        tracing::warn!("Completion stream closed without [DONE]");
                    }
                    decoder.finished = true;
                }
            }
        }
    })
    .boxed()
}
