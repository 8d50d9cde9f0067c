//! Handler module declarations and re-exports

pub mod file;
pub mod layers;
pub mod ops;
pub mod query;

// Re-export all handlers for convenient access
pub use file::*;
pub use layers::*;
pub use ops::*;
pub use query::*;
