//! Core traits and types shared by the optimizer and its collaborators.

pub mod error;
pub mod function;
pub mod types;

// Re-export core types
pub use error::*;
pub use function::*;
pub use types::*;
