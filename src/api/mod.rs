//! HTTP API.
//!
//! `api_router()` returns a composable `Router`; `start_server_on()` binds
//! and serves it in the background.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_server_on, ApiServer, ServerError};
pub use types::ApiContext;
