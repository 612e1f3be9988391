//! Step-driven quasi-Newton optimization.
//!
//! `quasinewton` bundles the core abstractions of `quasinewton-core` and the
//! optimizers of `quasinewton-optim` behind a single dependency.
//!
//! # Quick Start
//!
//! ```rust
//! use quasinewton::prelude::*;
//!
//! let f = FnObjective::new(2, |x: &DVector<f64>| (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2));
//! let g = FnGradient::new(2, |x: &DVector<f64>, g: &mut DVector<f64>| {
//!     g[0] = 2.0 * (x[0] - 1.0);
//!     g[1] = 2.0 * (x[1] - 2.0);
//! });
//!
//! let config = BfgsConfig::new()
//!     .with_tolerances(1e-8, 1e-8)
//!     .with_gradient_tolerance(1e-8);
//! let mut bfgs = QuasiNewtonBfgs::new(f, g, config)?;
//!
//! let result = bfgs.minimize(&DVector::from_vec(vec![0.0, 0.0]), 100)?;
//! assert!(result.converged);
//! # Ok::<(), OptimizerError>(())
//! ```
//!
//! Driving the optimizer by hand gives the caller control between units of
//! work:
//!
//! ```rust
//! use quasinewton::prelude::*;
//! use quasinewton::test_functions::Rosenbrock;
//!
//! let rosenbrock = Rosenbrock::new(2);
//! let mut bfgs = QuasiNewtonBfgs::new(rosenbrock, rosenbrock, BfgsConfig::<f64>::new())?;
//! bfgs.initialize(&rosenbrock.standard_start())?;
//!
//! for _ in 0..25 {
//!     if bfgs.step()? {
//!         break;
//!     }
//! }
//! println!("f = {} after {} iterations", bfgs.function_value(), bfgs.iterations());
//! # Ok::<(), OptimizerError>(())
//! ```

pub use quasinewton_core::{
    error, function, line_search, line_search_manager, numerical, optimizer, test_functions,
    types,
};
pub use quasinewton_optim::bfgs;

pub use nalgebra;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use quasinewton_core::prelude::*;
    pub use quasinewton_optim::{
        BfgsConfig, HessianUpdate, InitialInverseHessian, Phase, QuasiNewtonBfgs,
    };
}
