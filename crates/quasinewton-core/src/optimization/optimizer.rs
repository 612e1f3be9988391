//! Step-driven optimizer interface and run summaries.
//!
//! Optimizers in this crate are state machines. The caller hands over a
//! starting point with [`Optimizer::initialize`] and then calls
//! [`Optimizer::step`] until it returns `true`. Each call performs a small,
//! bounded amount of work, at most one objective/gradient evaluation pair in
//! the common case, so a driver can interleave optimization with other work,
//! inspect intermediate iterates, or stop whenever it likes.
//!
//! [`Optimizer::minimize`] is the convenience loop on top of that protocol.
//!
//! # Termination Analysis
//! - **Converged**: function change and predicted decrease both within tolerance
//! - **LineSearchFailed**: no acceptable step along the search direction
//! - **NumericalDegeneracy**: the curvature information became unusable
//! - **MaxSteps**: the driver's step budget ran out (the run is resumable)

use crate::{
    error::OptimizerResult,
    types::{DVector, Scalar},
};
use std::fmt::{self, Display};
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Reasons an optimization run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TerminationReason {
    /// The absolute or relative convergence test passed
    Converged,
    /// The line search could not produce an acceptable step
    LineSearchFailed,
    /// Curvature or scaling information was degenerate or non-finite
    NumericalDegeneracy,
    /// The caller's step budget was exhausted before a terminal state
    MaxSteps,
}

impl TerminationReason {
    /// Returns `true` for outcomes the optimizer itself declared terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TerminationReason::MaxSteps)
    }
}

impl Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::Converged => "converged",
            TerminationReason::LineSearchFailed => "line search failed",
            TerminationReason::NumericalDegeneracy => "numerical degeneracy",
            TerminationReason::MaxSteps => "step budget exhausted",
        };
        f.write_str(text)
    }
}

/// Summary of an optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationResult<T>
where
    T: Scalar,
{
    /// Final iterate
    pub point: DVector<T>,

    /// Objective value at the final iterate
    pub value: T,

    /// Euclidean norm of the gradient at the final iterate
    pub gradient_norm: T,

    /// Number of accepted steps
    pub iterations: usize,

    /// Number of calls to [`Optimizer::step`] made by the driver
    pub step_calls: usize,

    /// Objective evaluations since the last initialization
    pub function_evaluations: usize,

    /// Gradient evaluations since the last initialization
    pub gradient_evaluations: usize,

    /// Wall-clock time spent in the driver loop
    pub duration: Duration,

    /// Why the run stopped
    pub termination_reason: TerminationReason,

    /// Diagnostic message for failed runs
    pub message: Option<String>,

    /// True if the optimizer converged
    pub converged: bool,
}

impl<T: Scalar> OptimizationResult<T> {
    /// Creates a result; evaluation counters default to zero.
    pub fn new(
        point: DVector<T>,
        value: T,
        iterations: usize,
        duration: Duration,
        termination_reason: TerminationReason,
    ) -> Self {
        Self {
            point,
            value,
            gradient_norm: T::zero(),
            iterations,
            step_calls: 0,
            function_evaluations: 0,
            gradient_evaluations: 0,
            duration,
            converged: termination_reason == TerminationReason::Converged,
            termination_reason,
            message: None,
        }
    }

    /// Sets the gradient norm at the final point.
    pub fn with_gradient_norm(mut self, norm: T) -> Self {
        self.gradient_norm = norm;
        self
    }

    /// Sets the number of step calls.
    pub fn with_step_calls(mut self, count: usize) -> Self {
        self.step_calls = count;
        self
    }

    /// Sets the function evaluation count.
    pub fn with_function_evaluations(mut self, count: usize) -> Self {
        self.function_evaluations = count;
        self
    }

    /// Sets the gradient evaluation count.
    pub fn with_gradient_evaluations(mut self, count: usize) -> Self {
        self.gradient_evaluations = count;
        self
    }

    /// Attaches a diagnostic message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// An incrementally driven minimizer.
pub trait Optimizer<T: Scalar> {
    /// Returns the name of the optimizer.
    fn name(&self) -> &str;

    /// Resets the run and sets the starting point.
    fn initialize(&mut self, x0: &DVector<T>) -> OptimizerResult<()>;

    /// Performs one unit of work.
    ///
    /// Returns `true` only on the call that ends the run. Calls made after
    /// that do no work and return `false` until the next `initialize`.
    fn step(&mut self) -> OptimizerResult<bool>;

    /// The current iterate.
    fn current_parameters(&self) -> &DVector<T>;

    /// Objective value at the current iterate.
    fn function_value(&self) -> T;

    /// Gradient at the current iterate.
    fn gradient(&self) -> &DVector<T>;

    /// Terminal outcome, if the run has ended.
    fn termination(&self) -> Option<TerminationReason>;

    /// Diagnostic message of a failed run.
    fn failure_reason(&self) -> Option<&str>;

    /// Number of accepted steps since initialization.
    fn iterations(&self) -> usize;

    /// Objective evaluations since initialization.
    fn function_evaluations(&self) -> usize;

    /// Gradient evaluations since initialization.
    fn gradient_evaluations(&self) -> usize;

    /// Returns `true` if the run ended by converging.
    fn is_converged(&self) -> bool {
        self.termination() == Some(TerminationReason::Converged)
    }

    /// Initializes at `x0` and steps until terminal or `max_steps` calls.
    fn minimize(&mut self, x0: &DVector<T>, max_steps: usize) -> OptimizerResult<OptimizationResult<T>> {
        self.initialize(x0)?;
        self.resume(max_steps)
    }

    /// Continues the current run for at most `max_steps` further calls.
    ///
    /// A run that stopped on [`TerminationReason::MaxSteps`] can be resumed
    /// where it left off.
    fn resume(&mut self, max_steps: usize) -> OptimizerResult<OptimizationResult<T>> {
        let start = Instant::now();
        let mut step_calls = 0;

        while self.termination().is_none() && step_calls < max_steps {
            self.step()?;
            step_calls += 1;
        }

        let reason = self.termination().unwrap_or(TerminationReason::MaxSteps);
        let mut result = OptimizationResult::new(
            self.current_parameters().clone(),
            self.function_value(),
            self.iterations(),
            start.elapsed(),
            reason,
        )
        .with_gradient_norm(self.gradient().norm())
        .with_step_calls(step_calls)
        .with_function_evaluations(self.function_evaluations())
        .with_gradient_evaluations(self.gradient_evaluations());

        if let Some(message) = self.failure_reason() {
            result = result.with_message(message);
        }
        Ok(result)
    }
}
