//! Numerical stability utilities.

pub mod stability;

pub use stability::*;
