//! Quasi-Newton optimization algorithms.
//!
//! This crate provides the optimizers built on `quasinewton-core`. Each one
//! is a state machine advanced through [`Optimizer::step`], so callers keep
//! full control over iteration budgets, cancellation and progress reporting.
//!
//! # Available Optimizers
//!
//! - **BFGS**: dense BFGS with a pluggable line search and a choice of
//!   rank-2 update ([`HessianUpdate`])
//!
//! # Examples
//!
//! ```rust
//! use quasinewton_core::prelude::*;
//! use quasinewton_core::test_functions::Rosenbrock;
//! use quasinewton_optim::{BfgsConfig, QuasiNewtonBfgs};
//!
//! let rosenbrock = Rosenbrock::new(2);
//! let config = BfgsConfig::<f64>::new()
//!     .with_tolerances(1e-10, 1e-10)
//!     .with_gradient_tolerance(1e-12);
//! let mut bfgs = QuasiNewtonBfgs::new(rosenbrock, rosenbrock, config)?;
//!
//! let result = bfgs.minimize(&rosenbrock.standard_start(), 1000)?;
//! println!("{} after {} iterations", result.termination_reason, result.iterations);
//! # Ok::<(), OptimizerError>(())
//! ```

pub mod bfgs;

// Re-export main optimizers for convenience
pub use bfgs::{
    direct_update, inverse_update, BfgsConfig, DegenerateUpdate, HessianUpdate,
    InitialInverseHessian, Phase, QuasiNewtonBfgs,
};

// Re-export commonly used items from core
pub use quasinewton_core::optimizer::{OptimizationResult, Optimizer, TerminationReason};
