//! Core traits and types for quasi-Newton optimization.
//!
//! This crate provides the building blocks shared by the optimizers in
//! `quasinewton-optim`: the objective and gradient interfaces, the
//! incrementally driven line search contract with a strong Wolfe
//! implementation, the adapter that runs a scalar line search along a
//! vector search direction, and the step-driven optimizer interface.
//!
//! # Modules
//!
//! - [`error`]: Configuration errors
//! - [`function`]: Objective and gradient interfaces and adapters
//! - [`line_search`]: Line search contract and strong Wolfe search
//! - [`line_search_manager`]: Runs a line search along `x0 + α d`
//! - [`numerical`]: Symmetry and definiteness checks
//! - [`optimizer`]: Step-driven optimizer trait and run summaries
//! - [`test_functions`]: Quadratic and Rosenbrock problems with analytic gradients
//! - [`types`]: Scalar trait and matrix aliases

pub mod core;
pub mod numerical;
pub mod optimization;
pub mod utils;

// Module aliases at the crate root
pub use crate::core::{error, function, types};
pub use crate::optimization::{line_search, line_search_manager, optimizer};
pub use crate::utils::test_functions;

pub use crate::core::error::{OptimizerError, OptimizerResult};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use quasinewton_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{OptimizerError, OptimizerResult};
    pub use crate::function::{
        CountingFunction, CountingGradient, FnGradient, FnObjective, GradientFunction,
        NumericalGradient, ObjectiveFunction,
    };
    pub use crate::line_search::{
        LineFunction, LineSearch, LineSearchParams, LineSearchStatus, StrongWolfeLineSearch,
    };
    pub use crate::line_search_manager::{LineSearchManager, LineSearchManagerConfig};
    pub use crate::optimizer::{OptimizationResult, Optimizer, TerminationReason};
    pub use crate::types::{DMatrix, DVector, Scalar};
}
