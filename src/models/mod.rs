pub mod encounter;
pub mod enums;

pub use encounter::*;
