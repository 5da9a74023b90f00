//! HTTP endpoint handlers, one module per resource.

pub mod clinical_note;
pub mod encounters;
pub mod health;
pub mod stream;
pub mod templates;
