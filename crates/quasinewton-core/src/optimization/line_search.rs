//! Line search contract and a strong Wolfe implementation.
//!
//! A line search works on the one-dimensional restriction of the objective
//! along a search direction `d` from a point `x0`:
//!
//! ```text
//! φ(α)  = f(x0 + α d)
//! φ'(α) = ∇f(x0 + α d) · d
//! ```
//!
//! The direction handed to a line search must be a descent direction
//! (`φ'(0) < 0`) and trial steps are always positive. The optimizer is
//! responsible for the sign of the direction, never the line search.
//!
//! # Strong Wolfe Conditions
//!
//! An accepted step α satisfies
//!
//! 1. Sufficient decrease: φ(α) ≤ φ(0) + c₁ α φ'(0)
//! 2. Strong curvature: |φ'(α)| ≤ c₂ |φ'(0)|
//!
//! with 0 < c₁ < c₂ < 1. The curvature condition implies `yᵀs > 0` for the
//! step and gradient change it produces, which is what keeps a BFGS inverse
//! Hessian positive definite.
//!
//! # Incremental Interface
//!
//! Searches are driven one trial at a time through [`LineSearch::iterate`],
//! so the optimizer above them can hand control back to its caller between
//! evaluations.

use crate::{
    error::{OptimizerError, OptimizerResult},
    types::Scalar,
};
use num_traits::Float;
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The restriction `φ(α) = f(x0 + α d)` seen by a line search.
pub trait LineFunction<T: Scalar> {
    /// Returns `(φ(step), φ'(step))`.
    fn evaluate(&mut self, step: T) -> (T, T);
}

/// Outcome of a single [`LineSearch::iterate`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSearchStatus {
    /// More trials are needed.
    Searching,
    /// An acceptable step was found; see [`LineSearch::step`].
    Converged,
    /// The search gave up; see [`LineSearch::warning`].
    Failed,
}

/// A pluggable, incrementally driven line search algorithm.
pub trait LineSearch<T: Scalar>: Debug {
    /// Returns a human-readable name for the algorithm.
    fn name(&self) -> &str;

    /// Starts a new search.
    ///
    /// # Arguments
    ///
    /// * `value_at_zero` - φ(0)
    /// * `derivative_at_zero` - φ'(0), negative for a descent direction
    /// * `initial_step` - first trial step length
    fn init(&mut self, value_at_zero: T, derivative_at_zero: T, initial_step: T);

    /// Performs one unit of work, typically a single trial evaluation.
    fn iterate(&mut self, line: &mut dyn LineFunction<T>) -> LineSearchStatus;

    /// The accepted step length. Meaningful after `Converged`.
    fn step(&self) -> T;

    /// φ at the accepted step. Meaningful after `Converged`.
    fn value_at_step(&self) -> T;

    /// Diagnostic message explaining a failure.
    fn warning(&self) -> Option<&str>;
}

/// Parameters of the strong Wolfe line search.
///
/// # Parameter Values
/// - c₁ = 10⁻⁴ (sufficient decrease)
/// - c₂ = 0.9 (loose curvature, suited to quasi-Newton directions)
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineSearchParams<T>
where
    T: Scalar,
{
    /// Armijo parameter c₁ ∈ (0,1) for sufficient decrease condition
    pub c1: T,

    /// Wolfe parameter c₂ ∈ (c₁,1) for the strong curvature condition
    pub c2: T,

    /// Smallest width of the bracketing interval before declaring failure
    pub min_step: T,

    /// Largest step the bracketing phase may try
    pub max_step: T,

    /// Factor by which the trial step grows while φ keeps decreasing
    pub expansion: T,

    /// Maximum number of trial evaluations per search
    pub max_iterations: usize,
}

impl<T> Default for LineSearchParams<T>
where
    T: Scalar,
{
    fn default() -> Self {
        Self {
            c1: <T as Scalar>::from_f64(1e-4),
            c2: <T as Scalar>::from_f64(0.9),
            min_step: T::MIN_STEP_SIZE,
            max_step: T::MAX_STEP_SIZE,
            expansion: <T as Scalar>::from_f64(2.0),
            max_iterations: 50,
        }
    }
}

impl<T> LineSearchParams<T>
where
    T: Scalar,
{
    /// Creates parameters with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the Wolfe constants.
    pub fn with_wolfe_constants(mut self, c1: T, c2: T) -> Self {
        self.c1 = c1;
        self.c2 = c2;
        self
    }

    /// Sets the admissible step range.
    pub fn with_step_bounds(mut self, min_step: T, max_step: T) -> Self {
        self.min_step = min_step;
        self.max_step = max_step;
        self
    }

    /// Sets the bracketing expansion factor.
    pub fn with_expansion(mut self, expansion: T) -> Self {
        self.expansion = expansion;
        self
    }

    /// Sets the per-search trial budget.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Validates line search parameters against mathematical requirements.
    ///
    /// # Errors
    ///
    /// Returns `OptimizerError::InvalidConfiguration` if:
    /// - Wolfe constants don't satisfy 0 < c₁ < c₂ < 1
    /// - Step bounds are not positive or not ordered
    /// - The expansion factor is not greater than one
    /// - Maximum iterations is zero
    pub fn validate(&self) -> OptimizerResult<()> {
        if !(self.c1 > T::zero() && self.c1 < T::one()) {
            return Err(OptimizerError::invalid_parameter(
                "Armijo constant c1 must be in (0, 1)",
                "c1",
                self.c1,
            ));
        }

        if !(self.c2 > self.c1 && self.c2 < T::one()) {
            return Err(OptimizerError::invalid_parameter(
                "Wolfe constant c2 must satisfy c1 < c2 < 1",
                "c2",
                self.c2,
            ));
        }

        if !(self.min_step > T::zero()) {
            return Err(OptimizerError::invalid_parameter(
                "Minimum step must be positive",
                "min_step",
                self.min_step,
            ));
        }

        if !(self.max_step > self.min_step) {
            return Err(OptimizerError::invalid_parameter(
                "Maximum step must be greater than minimum step",
                "max_step",
                self.max_step,
            ));
        }

        if !(self.expansion > T::one()) {
            return Err(OptimizerError::invalid_parameter(
                "Expansion factor must be greater than 1",
                "expansion",
                self.expansion,
            ));
        }

        if self.max_iterations == 0 {
            return Err(OptimizerError::invalid_parameter(
                "Maximum iterations must be at least 1",
                "max_iterations",
                self.max_iterations,
            ));
        }

        Ok(())
    }
}

/// One evaluated trial on the line.
#[derive(Debug, Clone, Copy)]
struct Sample<T> {
    step: T,
    value: T,
    derivative: T,
}

#[derive(Debug, Clone, Copy)]
enum Stage<T> {
    Idle,
    /// Growing the step until the minimum is bracketed.
    Bracket { previous: Sample<T> },
    /// Shrinking `[lo, hi]`; `lo` always satisfies sufficient decrease.
    Zoom { lo: Sample<T>, hi: Sample<T> },
    Done,
}

/// Strong Wolfe line search (Nocedal & Wright, Algorithms 3.5 and 3.6).
///
/// The bracketing phase multiplies the step by `expansion` while φ keeps
/// decreasing. Once an interval containing acceptable steps is known, the
/// zoom phase shrinks it with safeguarded cubic interpolation, falling back
/// to bisection when the interpolant is unusable. Each call to
/// [`iterate`](LineSearch::iterate) evaluates exactly one trial step.
///
/// Non-finite trial values are treated as an infinitely bad point, which
/// moves the search back toward the last finite sample.
#[derive(Debug, Clone)]
pub struct StrongWolfeLineSearch<T: Scalar> {
    params: LineSearchParams<T>,
    stage: Stage<T>,
    value_at_zero: T,
    derivative_at_zero: T,
    trial: T,
    iterations: usize,
    accepted: Option<Sample<T>>,
    message: Option<String>,
}

impl<T: Scalar> StrongWolfeLineSearch<T> {
    /// Creates a strong Wolfe search with default parameters.
    pub fn new() -> Self {
        Self::with_params(LineSearchParams::default())
    }

    /// Creates a strong Wolfe search with the given parameters.
    pub fn with_params(params: LineSearchParams<T>) -> Self {
        Self {
            params,
            stage: Stage::Idle,
            value_at_zero: T::zero(),
            derivative_at_zero: T::zero(),
            trial: T::zero(),
            iterations: 0,
            accepted: None,
            message: None,
        }
    }

    /// Returns the search parameters.
    pub fn params(&self) -> &LineSearchParams<T> {
        &self.params
    }

    /// Number of trial evaluations in the current search.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    fn sufficient_decrease(&self, sample: &Sample<T>) -> bool {
        sample.value <= self.value_at_zero + self.params.c1 * sample.step * self.derivative_at_zero
    }

    fn strong_curvature(&self, sample: &Sample<T>) -> bool {
        <T as Float>::abs(sample.derivative) <= -self.params.c2 * self.derivative_at_zero
    }

    fn accept(&mut self, sample: Sample<T>) -> LineSearchStatus {
        self.accepted = Some(sample);
        self.stage = Stage::Done;
        LineSearchStatus::Converged
    }

    fn fail(&mut self, message: String) -> LineSearchStatus {
        self.message = Some(message);
        self.stage = Stage::Done;
        LineSearchStatus::Failed
    }

    fn bracket(&mut self, previous: Sample<T>, current: Sample<T>) -> LineSearchStatus {
        let first_trial = self.iterations == 1;
        if !self.sufficient_decrease(&current) || (!first_trial && current.value >= previous.value) {
            return self.zoom_between(previous, current);
        }

        if self.strong_curvature(&current) {
            return self.accept(current);
        }

        if current.derivative >= T::zero() {
            return self.zoom_between(current, previous);
        }

        if current.step >= self.params.max_step {
            return self.fail(format!(
                "Step length reached its upper bound {} while the function kept decreasing",
                current.step
            ));
        }

        self.trial = <T as Float>::min(current.step * self.params.expansion, self.params.max_step);
        self.stage = Stage::Bracket { previous: current };
        LineSearchStatus::Searching
    }

    fn zoom(&mut self, lo: Sample<T>, hi: Sample<T>, current: Sample<T>) -> LineSearchStatus {
        if !self.sufficient_decrease(&current) || current.value >= lo.value {
            return self.zoom_between(lo, current);
        }

        if self.strong_curvature(&current) {
            return self.accept(current);
        }

        let hi = if current.derivative * (hi.step - lo.step) >= T::zero() {
            lo
        } else {
            hi
        };
        self.zoom_between(current, hi)
    }

    fn zoom_between(&mut self, lo: Sample<T>, hi: Sample<T>) -> LineSearchStatus {
        let width = <T as Float>::abs(hi.step - lo.step);
        let magnitude = <T as Float>::max(<T as Float>::abs(lo.step), <T as Float>::abs(hi.step));
        let resolution = <T as Float>::max(self.params.min_step, T::EPSILON * magnitude);
        if width <= resolution {
            return self.fail(format!(
                "Interval of uncertainty collapsed to width {} around step {}",
                width, lo.step
            ));
        }

        self.trial = interpolate(&lo, &hi);
        self.stage = Stage::Zoom { lo, hi };
        LineSearchStatus::Searching
    }
}

impl<T: Scalar> Default for StrongWolfeLineSearch<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> LineSearch<T> for StrongWolfeLineSearch<T> {
    fn name(&self) -> &str {
        "StrongWolfe"
    }

    fn init(&mut self, value_at_zero: T, derivative_at_zero: T, initial_step: T) {
        self.value_at_zero = value_at_zero;
        self.derivative_at_zero = derivative_at_zero;
        self.trial = <T as Float>::min(initial_step, self.params.max_step);
        self.iterations = 0;
        self.accepted = None;
        self.message = None;
        self.stage = Stage::Bracket {
            previous: Sample {
                step: T::zero(),
                value: value_at_zero,
                derivative: derivative_at_zero,
            },
        };
    }

    fn iterate(&mut self, line: &mut dyn LineFunction<T>) -> LineSearchStatus {
        match self.stage {
            Stage::Idle => {
                return self.fail("Line search iterated before being initialized".to_string())
            }
            Stage::Done => {
                return if self.accepted.is_some() {
                    LineSearchStatus::Converged
                } else {
                    LineSearchStatus::Failed
                }
            }
            Stage::Bracket { .. } | Stage::Zoom { .. } => {}
        }

        if self.iterations >= self.params.max_iterations {
            return self.fail(format!(
                "No step satisfying the strong Wolfe conditions after {} trials",
                self.iterations
            ));
        }
        self.iterations += 1;

        let (value, derivative) = line.evaluate(self.trial);
        let current = if <T as Float>::is_finite(value) && <T as Float>::is_finite(derivative) {
            Sample {
                step: self.trial,
                value,
                derivative,
            }
        } else {
            Sample {
                step: self.trial,
                value: <T as Float>::infinity(),
                derivative: <T as Float>::nan(),
            }
        };

        match self.stage {
            Stage::Bracket { previous } => self.bracket(previous, current),
            Stage::Zoom { lo, hi } => self.zoom(lo, hi, current),
            Stage::Idle | Stage::Done => LineSearchStatus::Failed,
        }
    }

    fn step(&self) -> T {
        self.accepted.map(|s| s.step).unwrap_or_else(T::zero)
    }

    fn value_at_step(&self) -> T {
        self.accepted.map(|s| s.value).unwrap_or(self.value_at_zero)
    }

    fn warning(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

/// Minimizer of the cubic matching value and slope at both ends, kept at
/// least a tenth of the interval away from either end.
fn interpolate<T: Scalar>(lo: &Sample<T>, hi: &Sample<T>) -> T {
    let a = <T as Float>::min(lo.step, hi.step);
    let b = <T as Float>::max(lo.step, hi.step);
    let margin = <T as Scalar>::from_f64(0.1) * (b - a);
    let midpoint = (a + b) * <T as Scalar>::from_f64(0.5);

    match cubic_minimizer(lo, hi) {
        Some(alpha) => <T as Float>::min(<T as Float>::max(alpha, a + margin), b - margin),
        None => midpoint,
    }
}

fn cubic_minimizer<T: Scalar>(lo: &Sample<T>, hi: &Sample<T>) -> Option<T> {
    let inputs = [lo.value, lo.derivative, hi.value, hi.derivative];
    if inputs.iter().any(|v| !<T as Float>::is_finite(*v)) {
        return None;
    }

    let three = <T as Scalar>::from_f64(3.0);
    let two = <T as Scalar>::from_f64(2.0);

    let d1 = lo.derivative + hi.derivative
        - three * (lo.value - hi.value) / (lo.step - hi.step);
    let radicand = d1 * d1 - lo.derivative * hi.derivative;
    if radicand < T::zero() {
        return None;
    }

    let d2 = <T as Float>::signum(hi.step - lo.step) * <T as Float>::sqrt(radicand);
    let denominator = hi.derivative - lo.derivative + two * d2;
    if denominator == T::zero() {
        return None;
    }

    let alpha = hi.step - (hi.step - lo.step) * (hi.derivative + d2 - d1) / denominator;
    if <T as Float>::is_finite(alpha) {
        Some(alpha)
    } else {
        None
    }
}
