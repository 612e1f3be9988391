//! Utility functions and helper types.

pub mod test_functions;

pub use test_functions::{Quadratic, Rosenbrock};
