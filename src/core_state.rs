//! Process-wide application state.
//!
//! Built once at startup and shared behind an `Arc` by every request
//! handler. Nothing in here is mutable: conversation state lives only in
//! storage, and each request opens its own connection.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db;
use crate::locale::Locale;
use crate::pipeline::consult::{select_source, CompletionError, CompletionSource, OpenAiClient, StreamRelay};

// ═══════════════════════════════════════════════════════════
// CoreState
// ═══════════════════════════════════════════════════════════

pub struct CoreState {
    pub config: AppConfig,
    /// Live provider client, when a credential is configured. Also used
    /// for clinical notes.
    openai: Option<OpenAiClient>,
    /// Selected once; never re-selected per request.
    completion: Arc<dyn CompletionSource>,
}

impl CoreState {
    /// Build state from configuration, selecting the completion source.
    pub fn new(config: AppConfig) -> Result<Self, CoreError> {
        let openai = OpenAiClient::from_config(&config)?;
        let completion = select_source(openai.as_ref(), config.locale);
        Ok(Self {
            config,
            openai,
            completion,
        })
    }

    /// Build state around an explicit completion source (no live client).
    pub fn with_source(config: AppConfig, completion: Arc<dyn CompletionSource>) -> Self {
        Self {
            config,
            openai: None,
            completion,
        }
    }

    /// Open a fresh connection to the configured database.
    ///
    /// Per-request: callers own the connection for the request's lifetime.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.config.database_path).map_err(CoreError::Database)
    }

    /// Create the database file and apply migrations at startup, so the
    /// first request does not pay for it and misconfiguration fails fast.
    pub fn initialize_storage(&self) -> Result<(), CoreError> {
        let conn = self.open_db()?;
        db::ping(&conn)?;
        tracing::info!(path = %self.config.database_path.display(), "Database ready");
        Ok(())
    }

    pub fn completion(&self) -> &Arc<dyn CompletionSource> {
        &self.completion
    }

    pub fn openai(&self) -> Option<&OpenAiClient> {
        self.openai.as_ref()
    }

    pub fn locale(&self) -> Locale {
        self.config.locale
    }

    /// Relay for one stream request, bounded by the provider idle timeout.
    pub fn relay(&self) -> StreamRelay {
        StreamRelay::new(self.completion.clone(), self.config.locale)
            .with_idle_timeout(self.config.provider_idle_timeout)
    }
}

/// Errors from CoreState operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("Completion provider setup failed: {0}")]
    Provider(#[from] CompletionError),
}
