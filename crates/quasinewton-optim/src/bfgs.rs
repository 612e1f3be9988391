//! Quasi-Newton BFGS optimizer with a delegated line search.
//!
//! BFGS (Broyden-Fletcher-Goldfarb-Shanno) keeps a dense approximation `B`
//! of the inverse Hessian and refines it after every accepted step from the
//! observed change in gradient. The search direction is the quasi-Newton
//! direction `d = -B g`, and a pluggable line search chooses how far to go.
//!
//! # Step Protocol
//!
//! The optimizer is an explicit state machine driven by [`Optimizer::step`]:
//!
//! ```text
//! Evaluate:   fx = f(x), g = ∇f(x), y = g - g_prev
//!             update B from (s, y)          (skipped on the first iteration)
//!             d = -B g
//!             rescale B from a trial point  (first iteration, auto-scaled only)
//!             start the line search from (fx, x, g, d, 1)
//! LineSearch: advance the line search by one trial
//!             on success: s = α d, x = x + s, test convergence
//! ```
//!
//! Each call performs one of those units of work and hands control back.
//!
//! ## Updating B
//!
//! Two rank-2 formulas are available through [`HessianUpdate`]. Both keep
//! `B` symmetric positive definite whenever `yᵀs > 0` and run as a single
//! fused pass over the matrix with one scratch vector `t`.
//!
//! ```text
//! Inverse (default), t = B y, ρ = 1 / yᵀs:
//!     B ← B + ρ (1 + ρ yᵀt) s sᵀ - ρ (t sᵀ + s tᵀ)        B y = s
//! Direct, t = B s:
//!     B ← B - t tᵀ / sᵀt + y yᵀ / yᵀs                    B s = y
//! ```
//!
//! `Inverse` treats `B` as an inverse Hessian, consistent with `d = -B g`.
//! `Direct` applies the Hessian-form expression to that same matrix.
//!
//! ## Convergence
//!
//! After an accepted step of length α from value `fx` to `f_step`, the run
//! converges when, for ε equal to either the absolute tolerance or the
//! relative tolerance times `|fx|`,
//!
//! ```text
//! |f_step - fx| ≤ ε   and   α |∇f(x)·d| ≤ ε
//! ```
//!
//! # References
//!
//! - Nocedal & Wright, "Numerical Optimization" (2006), Section 6.1

use quasinewton_core::{
    error::{OptimizerError, OptimizerResult},
    function::{GradientFunction, ObjectiveFunction},
    line_search::{LineSearch, LineSearchStatus, StrongWolfeLineSearch},
    line_search_manager::{LineSearchManager, LineSearchManagerConfig},
    numerical::{all_finite, is_positive_definite, is_symmetric},
    optimizer::{Optimizer, TerminationReason},
    types::{DMatrix, DVector, Scalar},
};
use num_traits::Float;
use std::fmt::{self, Debug};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the BFGS optimizer.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BfgsConfig<T: Scalar> {
    /// Tolerance relative to `|f(x)|` for the convergence test
    pub relative_tolerance: T,
    /// Absolute tolerance for the convergence test
    pub absolute_tolerance: T,
    /// Thresholds checked before each line search
    pub line_search: LineSearchManagerConfig<T>,
    /// First trial step handed to the line search
    pub initial_step: T,
    /// Rank-2 formula applied after each accepted step
    pub update: HessianUpdate,
}

impl<T: Scalar> Default for BfgsConfig<T> {
    fn default() -> Self {
        Self {
            relative_tolerance: T::DEFAULT_TOLERANCE,
            absolute_tolerance: T::DEFAULT_TOLERANCE,
            line_search: LineSearchManagerConfig::default(),
            initial_step: T::one(),
            update: HessianUpdate::default(),
        }
    }
}

impl<T: Scalar> BfgsConfig<T> {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the relative convergence tolerance.
    pub fn with_relative_tolerance(mut self, tolerance: T) -> Self {
        self.relative_tolerance = tolerance;
        self
    }

    /// Sets the absolute convergence tolerance.
    pub fn with_absolute_tolerance(mut self, tolerance: T) -> Self {
        self.absolute_tolerance = tolerance;
        self
    }

    /// Sets both convergence tolerances.
    pub fn with_tolerances(self, relative: T, absolute: T) -> Self {
        self.with_relative_tolerance(relative)
            .with_absolute_tolerance(absolute)
    }

    /// Sets the function value at which a line search is skipped.
    pub fn with_minimum_function_value(mut self, value: T) -> Self {
        self.line_search.minimum_function_value = value;
        self
    }

    /// Sets the directional-derivative tolerance of the line search.
    pub fn with_gradient_tolerance(mut self, tolerance: T) -> Self {
        self.line_search.gradient_tolerance = tolerance;
        self
    }

    /// Sets the first trial step of every line search.
    pub fn with_initial_step(mut self, step: T) -> Self {
        self.initial_step = step;
        self
    }

    /// Selects the rank-2 update formula.
    pub fn with_update(mut self, update: HessianUpdate) -> Self {
        self.update = update;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `OptimizerError::InvalidConfiguration` if a tolerance is
    /// negative or not finite, the initial step is not positive, or the line
    /// search thresholds are invalid.
    pub fn validate(&self) -> OptimizerResult<()> {
        for (name, value) in [
            ("relative_tolerance", self.relative_tolerance),
            ("absolute_tolerance", self.absolute_tolerance),
        ] {
            if !(value >= T::zero()) || !<T as Float>::is_finite(value) {
                return Err(OptimizerError::invalid_parameter(
                    "Tolerance must be finite and non-negative",
                    name,
                    value,
                ));
            }
        }

        if !(self.initial_step > T::zero()) || !<T as Float>::is_finite(self.initial_step) {
            return Err(OptimizerError::invalid_parameter(
                "Initial step must be finite and positive",
                "initial_step",
                self.initial_step,
            ));
        }

        self.line_search.validate()
    }
}

/// Starting inverse-Hessian approximation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitialInverseHessian<T: Scalar> {
    /// Identity, rescaled from a trial gradient on the first iteration
    AutoScaledIdentity,
    /// A symmetric positive definite matrix supplied by the caller
    CallerSupplied(DMatrix<T>),
}

impl<T: Scalar> Default for InitialInverseHessian<T> {
    fn default() -> Self {
        InitialInverseHessian::AutoScaledIdentity
    }
}

/// Where the optimizer is in its step protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// No starting point has been supplied yet
    Uninitialized,
    /// Next step evaluates f and ∇f and prepares a line search
    Evaluate,
    /// Next step advances the line search
    LineSearch,
    /// Terminal: the convergence test passed
    Converged,
    /// Terminal: the run failed
    Failed {
        /// Category of the failure
        reason: TerminationReason,
        /// Human-readable diagnostic
        message: String,
    },
}

impl Phase {
    /// Returns `true` for `Converged` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Converged | Phase::Failed { .. })
    }
}

/// Rank-2 formula applied to `B` after each accepted step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HessianUpdate {
    /// `B ← B + ρ (1 + ρ yᵀBy) s sᵀ - ρ (By sᵀ + s yᵀB)`, giving `B y = s`
    #[default]
    Inverse,
    /// `B ← B - (Bs)(Bs)ᵀ / sᵀBs + y yᵀ / yᵀs`, giving `B s = y`
    Direct,
}

impl HessianUpdate {
    /// Applies this update to `b` in place, using `scratch` as workspace.
    pub fn apply<T: Scalar>(
        self,
        b: &mut DMatrix<T>,
        s: &DVector<T>,
        y: &DVector<T>,
        scratch: &mut DVector<T>,
    ) -> Result<(), DegenerateUpdate<T>> {
        match self {
            HessianUpdate::Inverse => inverse_update(b, s, y, scratch),
            HessianUpdate::Direct => direct_update(b, s, y, scratch),
        }
    }
}

/// The pair `(s, y)` cannot be used to update `B`.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DegenerateUpdate<T: Scalar> {
    /// `yᵀs` is not finite or not safely positive
    #[error("Curvature y·s = {0} is too small to update the Hessian approximation")]
    Curvature(T),
    /// `sᵀBs` is not finite or not safely positive
    #[error("Step metric s·B·s = {0} is too small to update the Hessian approximation")]
    Metric(T),
}

fn check_dimensions<T: Scalar>(b: &DMatrix<T>, s: &DVector<T>, y: &DVector<T>, scratch: &DVector<T>) {
    let n = s.len();
    assert_eq!(b.shape(), (n, n), "approximation must be square of step length");
    assert_eq!(y.len(), n, "gradient change must match step length");
    assert_eq!(scratch.len(), n, "scratch must match step length");
}

/// `yᵀs`, rejected when not finite or not above `ε ‖y‖ ‖s‖`.
fn curvature<T: Scalar>(s: &DVector<T>, y: &DVector<T>) -> Result<T, DegenerateUpdate<T>> {
    let ys = y.dot(s);
    if !<T as Float>::is_finite(ys) || ys <= T::EPSILON * y.norm() * s.norm() {
        return Err(DegenerateUpdate::Curvature(ys));
    }
    Ok(ys)
}

/// Applies `B ← B - (Bs)(Bs)ᵀ / sᵀBs + y yᵀ / yᵀs` to `b` in place.
///
/// `scratch` receives `B s`. Both denominators are checked before `b` is
/// touched, and the update is a single pass over the matrix.
///
/// # Panics
///
/// Panics if the buffers do not all share the dimension of `b`.
pub fn direct_update<T: Scalar>(
    b: &mut DMatrix<T>,
    s: &DVector<T>,
    y: &DVector<T>,
    scratch: &mut DVector<T>,
) -> Result<(), DegenerateUpdate<T>> {
    check_dimensions(b, s, y, scratch);
    let ys = curvature(s, y)?;

    scratch.gemv(T::one(), b, s, T::zero());
    let sbs = s.dot(scratch);
    if !<T as Float>::is_finite(sbs) || sbs <= T::EPSILON * scratch.norm() * s.norm() {
        return Err(DegenerateUpdate::Metric(sbs));
    }

    let n = s.len();
    for j in 0..n {
        let yj = y[j];
        let tj = scratch[j];
        for i in 0..n {
            b[(i, j)] += y[i] * yj / ys - scratch[i] * tj / sbs;
        }
    }
    Ok(())
}

/// Applies the secant-form inverse BFGS update to `b` in place.
///
/// `scratch` receives `B y`. The update is rejected without touching `b`
/// when `yᵀs` is not finite or not safely positive relative to `‖y‖ ‖s‖`.
///
/// # Panics
///
/// Panics if the buffers do not all share the dimension of `b`.
pub fn inverse_update<T: Scalar>(
    b: &mut DMatrix<T>,
    s: &DVector<T>,
    y: &DVector<T>,
    scratch: &mut DVector<T>,
) -> Result<(), DegenerateUpdate<T>> {
    check_dimensions(b, s, y, scratch);
    let n = s.len();
    let ys = curvature(s, y)?;

    scratch.gemv(T::one(), b, y, T::zero());
    let yt = y.dot(scratch);
    let rho = T::one() / ys;
    let outer = rho * (T::one() + rho * yt);

    for j in 0..n {
        let sj = s[j];
        let tj = scratch[j];
        for i in 0..n {
            b[(i, j)] += outer * s[i] * sj - rho * (scratch[i] * sj + s[i] * tj);
        }
    }
    Ok(())
}

/// BFGS optimizer driven one unit of work at a time.
///
/// # Examples
///
/// ```rust
/// use quasinewton_core::prelude::*;
/// use quasinewton_optim::{BfgsConfig, QuasiNewtonBfgs};
/// use nalgebra::dvector;
///
/// let f = FnObjective::new(2, |x: &DVector<f64>| (x[0] - 1.0).powi(2) + (x[1] - 2.0).powi(2));
/// let g = FnGradient::new(2, |x: &DVector<f64>, g: &mut DVector<f64>| {
///     g[0] = 2.0 * (x[0] - 1.0);
///     g[1] = 2.0 * (x[1] - 2.0);
/// });
///
/// let mut bfgs = QuasiNewtonBfgs::new(f, g, BfgsConfig::<f64>::new().with_tolerances(1e-8, 1e-8))?;
/// bfgs.initialize(&dvector![0.0, 0.0])?;
/// while !bfgs.step()? {}
///
/// assert!(bfgs.is_converged());
/// assert!((bfgs.current_parameters()[1] - 2.0).abs() < 1e-6);
/// # Ok::<(), OptimizerError>(())
/// ```
pub struct QuasiNewtonBfgs<T, F, G, L>
where
    T: Scalar,
{
    function: F,
    gradient_function: G,
    config: BfgsConfig<T>,
    initial_inverse_hessian: InitialInverseHessian<T>,
    line_search: LineSearchManager<T, L>,

    x: DVector<T>,
    fx: T,
    g: DVector<T>,
    s: DVector<T>,
    y: DVector<T>,
    b: DMatrix<T>,
    direction: DVector<T>,
    scratch: DVector<T>,

    phase: Phase,
    first_iteration: bool,
    iterations: usize,
    function_evaluations: usize,
    gradient_evaluations: usize,
}

impl<T, F, G> QuasiNewtonBfgs<T, F, G, StrongWolfeLineSearch<T>>
where
    T: Scalar,
    F: ObjectiveFunction<T>,
    G: GradientFunction<T>,
{
    /// Binds a problem using the default strong Wolfe line search.
    pub fn new(function: F, gradient: G, config: BfgsConfig<T>) -> OptimizerResult<Self> {
        Self::bind(function, gradient, StrongWolfeLineSearch::new(), config)
    }
}

impl<T, F, G, L> QuasiNewtonBfgs<T, F, G, L>
where
    T: Scalar,
    F: ObjectiveFunction<T>,
    G: GradientFunction<T>,
    L: LineSearch<T>,
{
    /// Binds an objective, its gradient and a line search.
    ///
    /// All N-sized buffers are allocated here. No evaluation takes place.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if the function and gradient disagree on N
    /// - `InvalidConfiguration` if `config` fails validation
    pub fn bind(function: F, gradient: G, line_search: L, config: BfgsConfig<T>) -> OptimizerResult<Self> {
        let n = function.dimension();
        if gradient.dimension() != n {
            return Err(OptimizerError::dimension_mismatch(
                "gradient binding",
                n,
                gradient.dimension(),
            ));
        }
        config.validate()?;

        Ok(Self {
            function,
            gradient_function: gradient,
            line_search: LineSearchManager::new(line_search, config.line_search.clone(), n),
            config,
            initial_inverse_hessian: InitialInverseHessian::AutoScaledIdentity,
            x: DVector::zeros(n),
            fx: T::zero(),
            g: DVector::zeros(n),
            s: DVector::zeros(n),
            y: DVector::zeros(n),
            b: DMatrix::identity(n, n),
            direction: DVector::zeros(n),
            scratch: DVector::zeros(n),
            phase: Phase::Uninitialized,
            first_iteration: true,
            iterations: 0,
            function_evaluations: 0,
            gradient_evaluations: 0,
        })
    }

    /// Problem dimension N.
    pub fn dimension(&self) -> usize {
        self.x.len()
    }

    /// Installs a starting inverse Hessian, used from the next `initialize`.
    ///
    /// The matrix replaces the auto-scaled identity for every subsequent
    /// run until [`use_auto_scaled_identity`](Self::use_auto_scaled_identity)
    /// is called.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch` if `h0` is not N×N
    /// - `InvalidConfiguration` if `h0` is not symmetric positive definite
    pub fn set_initial_inverse_hessian(&mut self, h0: DMatrix<T>) -> OptimizerResult<()> {
        let n = self.dimension();
        if h0.shape() != (n, n) {
            return Err(OptimizerError::dimension_mismatch(
                "initial inverse Hessian",
                format!("{}x{}", n, n),
                format!("{}x{}", h0.nrows(), h0.ncols()),
            ));
        }
        if !is_symmetric(&h0, T::SYMMETRY_TOLERANCE) {
            return Err(OptimizerError::invalid_configuration(
                "Initial inverse Hessian must be symmetric",
                "initial_inverse_hessian",
                "asymmetric matrix",
            ));
        }
        if !is_positive_definite(&h0) {
            return Err(OptimizerError::invalid_configuration(
                "Initial inverse Hessian must be positive definite",
                "initial_inverse_hessian",
                "indefinite matrix",
            ));
        }

        self.initial_inverse_hessian = InitialInverseHessian::CallerSupplied(h0);
        Ok(())
    }

    /// Returns to the auto-scaled identity from the next `initialize`.
    pub fn use_auto_scaled_identity(&mut self) {
        self.initial_inverse_hessian = InitialInverseHessian::AutoScaledIdentity;
    }

    /// The starting inverse Hessian policy.
    pub fn initial_inverse_hessian(&self) -> &InitialInverseHessian<T> {
        &self.initial_inverse_hessian
    }

    /// Current approximation `B` multiplying the gradient.
    pub fn inverse_hessian(&self) -> &DMatrix<T> {
        &self.b
    }

    /// Direction handed to the most recent line search.
    pub fn search_direction(&self) -> &DVector<T> {
        &self.direction
    }

    /// Most recent accepted step `x_k - x_{k-1}`.
    pub fn last_step(&self) -> &DVector<T> {
        &self.s
    }

    /// Current position in the step protocol.
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// The configuration in use.
    pub fn config(&self) -> &BfgsConfig<T> {
        &self.config
    }

    /// The line search adapter.
    pub fn line_search(&self) -> &LineSearchManager<T, L> {
        &self.line_search
    }

    /// The bound objective.
    pub fn function(&self) -> &F {
        &self.function
    }

    /// The bound gradient.
    pub fn gradient_function(&self) -> &G {
        &self.gradient_function
    }

    /// Moves the run into a terminal phase. Only the first call has effect.
    fn terminate(&mut self, outcome: Phase) {
        if self.phase.is_terminal() || !outcome.is_terminal() {
            return;
        }

        match &outcome {
            Phase::Converged => log::info!(
                "BFGS converged after {} iterations: f = {}",
                self.iterations,
                self.fx
            ),
            Phase::Failed { reason, message } => log::warn!(
                "BFGS stopped after {} iterations ({}): {}",
                self.iterations,
                reason,
                message
            ),
            _ => {}
        }
        self.phase = outcome;
    }

    fn fail(&mut self, reason: TerminationReason, message: impl Into<String>) -> bool {
        self.terminate(Phase::Failed {
            reason,
            message: message.into(),
        });
        true
    }

    fn compute_direction(&mut self) {
        self.direction.gemv(-T::one(), &self.b, &self.g, T::zero());
    }

    /// Replaces the identity with `a I`, `a = (y·d) / ‖y‖` from a trial gradient at `x + d`.
    ///
    /// Returns `false` if the run failed.
    fn scale_initial_inverse_hessian(&mut self) -> bool {
        if self.direction.iter().all(|v| *v == T::zero()) {
            return true;
        }

        self.s.copy_from(&self.x);
        self.s += &self.direction;
        self.gradient_function.gradient(&self.s, &mut self.scratch);
        self.gradient_evaluations += 1;
        self.scratch -= &self.g;
        self.s.fill(T::zero());

        let norm = self.scratch.norm();
        if !(norm > T::zero()) || !<T as Float>::is_finite(norm) {
            self.fail(
                TerminationReason::NumericalDegeneracy,
                format!("Gradient change over the scaling trial step has norm {}", norm),
            );
            return false;
        }

        let scale = self.scratch.dot(&self.direction) / norm;
        if !(scale > T::zero()) || !<T as Float>::is_finite(scale) {
            log::warn!(
                "Rejected inverse Hessian scale {}, keeping the identity",
                scale
            );
            return true;
        }

        self.b.fill_with_identity();
        self.b *= scale;
        self.compute_direction();
        log::debug!("Initial inverse Hessian scaled by {}", scale);
        true
    }

    fn evaluate(&mut self) -> bool {
        self.fx = self.function.value(&self.x);
        self.gradient_function.gradient(&self.x, &mut self.scratch);
        self.function_evaluations += 1;
        self.gradient_evaluations += 1;

        self.y.copy_from(&self.scratch);
        self.y -= &self.g;
        self.g.copy_from(&self.scratch);

        if !<T as Float>::is_finite(self.fx) || !all_finite(&self.g) {
            return self.fail(
                TerminationReason::NumericalDegeneracy,
                format!("Non-finite function value or gradient at iterate {}", self.iterations),
            );
        }

        if !self.first_iteration {
            let update = self.config.update;
            if let Err(err) = update.apply(&mut self.b, &self.s, &self.y, &mut self.scratch) {
                return self.fail(TerminationReason::NumericalDegeneracy, err.to_string());
            }
        }

        self.compute_direction();

        let auto_scaled = matches!(
            self.initial_inverse_hessian,
            InitialInverseHessian::AutoScaledIdentity
        );
        if self.first_iteration && auto_scaled && !self.scale_initial_inverse_hessian() {
            return true;
        }

        self.line_search.start(
            self.fx,
            &self.x,
            &self.g,
            &self.direction,
            self.config.initial_step,
        );
        self.phase = Phase::LineSearch;
        self.first_iteration = false;
        false
    }

    fn advance_line_search(&mut self) -> bool {
        let before = self.line_search.evaluations();
        let status = self
            .line_search
            .advance(&self.function, &self.gradient_function);
        let used = self.line_search.evaluations().saturating_sub(before);
        self.function_evaluations += used;
        self.gradient_evaluations += used;

        match status {
            LineSearchStatus::Searching => false,
            LineSearchStatus::Failed => {
                let message = self
                    .line_search
                    .warning()
                    .unwrap_or("Line search failed")
                    .to_string();
                self.fail(TerminationReason::LineSearchFailed, message)
            }
            LineSearchStatus::Converged => self.accept_step(),
        }
    }

    fn accept_step(&mut self) -> bool {
        let step = self.line_search.step();
        let f_step = self.line_search.value_at_step();
        let slope = <T as Float>::abs(self.line_search.derivative_at_zero());

        self.s.copy_from(&self.direction);
        self.s *= step;
        self.x += &self.s;
        self.iterations += 1;

        let change = <T as Float>::abs(f_step - self.fx);
        let predicted = step * slope;
        log::debug!(
            "BFGS iteration {}: step = {}, f = {} -> {}",
            self.iterations,
            step,
            self.fx,
            f_step
        );

        let absolute = self.config.absolute_tolerance;
        let relative = self.config.relative_tolerance * <T as Float>::abs(self.fx);
        let converged = (change <= absolute && predicted <= absolute)
            || (change <= relative && predicted <= relative);

        self.fx = f_step;
        if converged {
            self.terminate(Phase::Converged);
            return true;
        }

        self.phase = Phase::Evaluate;
        false
    }
}

impl<T, F, G, L> Optimizer<T> for QuasiNewtonBfgs<T, F, G, L>
where
    T: Scalar,
    F: ObjectiveFunction<T>,
    G: GradientFunction<T>,
    L: LineSearch<T>,
{
    fn name(&self) -> &str {
        "BFGS"
    }

    /// Resets the run at `x0`.
    ///
    /// `B` starts as the identity, or as the caller-supplied matrix if one
    /// was installed. The step, gradient change, counters and terminal
    /// status are cleared.
    fn initialize(&mut self, x0: &DVector<T>) -> OptimizerResult<()> {
        if x0.len() != self.dimension() {
            return Err(OptimizerError::dimension_mismatch(
                "initial guess",
                self.dimension(),
                x0.len(),
            ));
        }

        self.x.copy_from(x0);
        self.fx = T::zero();
        self.g.fill(T::zero());
        self.s.fill(T::zero());
        self.y.fill(T::zero());
        self.direction.fill(T::zero());
        match &self.initial_inverse_hessian {
            InitialInverseHessian::AutoScaledIdentity => self.b.fill_with_identity(),
            InitialInverseHessian::CallerSupplied(h0) => self.b.copy_from(h0),
        }

        self.phase = Phase::Evaluate;
        self.first_iteration = true;
        self.iterations = 0;
        self.function_evaluations = 0;
        self.gradient_evaluations = 0;
        Ok(())
    }

    /// Performs one unit of work.
    ///
    /// Returns `true` only on the call that reached a terminal state. Later
    /// calls do no work and return `false` until the next `initialize`.
    fn step(&mut self) -> OptimizerResult<bool> {
        let terminal = match self.phase {
            Phase::Uninitialized => return Err(OptimizerError::NotInitialized),
            Phase::Converged | Phase::Failed { .. } => false,
            Phase::Evaluate => self.evaluate(),
            Phase::LineSearch => self.advance_line_search(),
        };
        Ok(terminal)
    }

    fn current_parameters(&self) -> &DVector<T> {
        &self.x
    }

    fn function_value(&self) -> T {
        self.fx
    }

    /// Gradient at the most recently evaluated iterate.
    fn gradient(&self) -> &DVector<T> {
        &self.g
    }

    fn termination(&self) -> Option<TerminationReason> {
        match &self.phase {
            Phase::Converged => Some(TerminationReason::Converged),
            Phase::Failed { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    fn failure_reason(&self) -> Option<&str> {
        match &self.phase {
            Phase::Failed { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }

    fn iterations(&self) -> usize {
        self.iterations
    }

    fn function_evaluations(&self) -> usize {
        self.function_evaluations
    }

    fn gradient_evaluations(&self) -> usize {
        self.gradient_evaluations
    }
}

impl<T, F, G, L> Debug for QuasiNewtonBfgs<T, F, G, L>
where
    T: Scalar,
    L: Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuasiNewtonBfgs")
            .field("dimension", &self.x.len())
            .field("phase", &self.phase)
            .field("iterations", &self.iterations)
            .field("fx", &self.fx)
            .field("config", &self.config)
            .field("line_search", &self.line_search)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{dmatrix, dvector};
    use quasinewton_core::{
        function::{FnGradient, FnObjective},
        test_functions::Quadratic,
    };

    fn bowl() -> Quadratic<f64> {
        Quadratic::weighted_distance(&dvector![1.0, 1.0], &dvector![1.0, 2.0])
    }

    fn config() -> BfgsConfig<f64> {
        BfgsConfig::new()
            .with_tolerances(1e-8, 1e-8)
            .with_gradient_tolerance(1e-12)
    }

    #[test]
    fn test_config_validation() {
        assert!(BfgsConfig::<f64>::default().validate().is_ok());
        assert!(BfgsConfig::<f64>::new()
            .with_absolute_tolerance(-1.0)
            .validate()
            .is_err());
        assert!(BfgsConfig::<f64>::new()
            .with_relative_tolerance(f64::NAN)
            .validate()
            .is_err());
        assert!(BfgsConfig::<f64>::new().with_initial_step(0.0).validate().is_err());
        assert!(BfgsConfig::<f64>::new()
            .with_gradient_tolerance(-1e-3)
            .validate()
            .is_err());
    }

    #[test]
    fn test_bind_rejects_mismatched_gradient() {
        let f = FnObjective::new(3, |x: &DVector<f64>| x.norm_squared());
        let g = FnGradient::new(2, |x: &DVector<f64>, g: &mut DVector<f64>| g.copy_from(x));
        let err = QuasiNewtonBfgs::new(f, g, BfgsConfig::new()).unwrap_err();
        assert!(matches!(err, OptimizerError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_step_before_initialize() {
        let q = bowl();
        let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config()).unwrap();
        assert_eq!(bfgs.phase(), &Phase::Uninitialized);
        assert_eq!(bfgs.step(), Err(OptimizerError::NotInitialized));
    }

    #[test]
    fn test_initialize_rejects_wrong_length() {
        let q = bowl();
        let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config()).unwrap();
        let err = bfgs.initialize(&dvector![0.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, OptimizerError::DimensionMismatch { .. }));
        assert_eq!(bfgs.phase(), &Phase::Uninitialized);
    }

    #[test]
    fn test_first_evaluation_scales_identity() {
        let q = bowl();
        let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config()).unwrap();
        bfgs.initialize(&dvector![0.0, 0.0]).unwrap();

        assert_eq!(bfgs.step(), Ok(false));
        assert_eq!(bfgs.phase(), &Phase::LineSearch);
        assert_relative_eq!(bfgs.function_value(), 5.0);

        // g = (-2, -4), d = -g, y = 2 d, so a = (y·d) / ‖y‖ = ‖g‖ = √20.
        let a = 20.0_f64.sqrt();
        assert_relative_eq!(bfgs.inverse_hessian(), &(DMatrix::identity(2, 2) * a), epsilon = 1e-12);
        assert_relative_eq!(bfgs.search_direction(), &dvector![2.0 * a, 4.0 * a], epsilon = 1e-12);
        assert_eq!(bfgs.last_step(), &DVector::zeros(2));
        // One f and ∇f at x0 plus the trial gradient.
        assert_eq!(bfgs.function_evaluations(), 1);
        assert_eq!(bfgs.gradient_evaluations(), 2);
    }

    #[test]
    fn test_caller_supplied_hessian_skips_scaling() {
        let q = bowl();
        let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config()).unwrap();
        let h0 = dmatrix![0.5, 0.0; 0.0, 0.5];
        bfgs.set_initial_inverse_hessian(h0.clone()).unwrap();
        bfgs.initialize(&dvector![0.0, 0.0]).unwrap();

        assert_eq!(bfgs.step(), Ok(false));
        assert_eq!(bfgs.inverse_hessian(), &h0);
        assert_relative_eq!(bfgs.search_direction(), &dvector![1.0, 2.0]);
        assert_eq!(bfgs.gradient_evaluations(), 1);
    }

    #[test]
    fn test_set_initial_inverse_hessian_validation() {
        let q = bowl();
        let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config()).unwrap();

        assert!(matches!(
            bfgs.set_initial_inverse_hessian(DMatrix::identity(3, 3)),
            Err(OptimizerError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            bfgs.set_initial_inverse_hessian(dmatrix![1.0, 0.5; 0.0, 1.0]),
            Err(OptimizerError::InvalidConfiguration { .. })
        ));
        assert!(matches!(
            bfgs.set_initial_inverse_hessian(dmatrix![1.0, 0.0; 0.0, -1.0]),
            Err(OptimizerError::InvalidConfiguration { .. })
        ));
        assert_eq!(bfgs.initial_inverse_hessian(), &InitialInverseHessian::AutoScaledIdentity);

        bfgs.set_initial_inverse_hessian(dmatrix![2.0, 0.0; 0.0, 1.0]).unwrap();
        bfgs.use_auto_scaled_identity();
        assert_eq!(bfgs.initial_inverse_hessian(), &InitialInverseHessian::AutoScaledIdentity);
    }

    #[test]
    fn test_inverse_update_satisfies_secant_equation() {
        let mut b = DMatrix::<f64>::identity(3, 3);
        let s = dvector![1.0, 0.5, -0.25];
        let y = dvector![2.0, 0.3, 0.1];
        let mut scratch = DVector::zeros(3);

        inverse_update(&mut b, &s, &y, &mut scratch).unwrap();

        assert_relative_eq!(&b * &y, s, epsilon = 1e-12);
        assert_relative_eq!(b.clone(), b.transpose(), epsilon = 1e-14);
    }

    #[test]
    fn test_direct_update_matches_closed_form() {
        let mut b = dmatrix![2.0, 0.3; 0.3, 1.0];
        let s = dvector![1.0, 0.5];
        let y = dvector![2.0, 0.3];
        let mut scratch = DVector::zeros(2);

        direct_update(&mut b, &s, &y, &mut scratch).unwrap();

        // B s = (2.15, 0.8), sᵀBs = 2.55, yᵀs = 2.15.
        let expected = dmatrix![
            2.0 - 2.15 * 2.15 / 2.55 + 4.0 / 2.15, 0.3 - 2.15 * 0.8 / 2.55 + 0.6 / 2.15;
            0.3 - 2.15 * 0.8 / 2.55 + 0.6 / 2.15, 1.0 - 0.8 * 0.8 / 2.55 + 0.09 / 2.15
        ];
        assert_relative_eq!(b, expected, epsilon = 1e-12);
        assert_relative_eq!(b[(0, 0)], 2.0477, epsilon = 1e-4);
        assert_relative_eq!(b[(0, 1)], -0.0954, epsilon = 1e-4);
        assert_relative_eq!(b[(1, 1)], 0.7909, epsilon = 1e-4);
        assert_eq!(b[(0, 1)], b[(1, 0)]);
        assert_relative_eq!(&b * &s, y, epsilon = 1e-12);
    }

    #[test]
    fn test_update_rejects_negative_curvature() {
        let s = dvector![1.0, 0.0];
        let y = dvector![-1.0, 0.0];
        let mut scratch = DVector::zeros(2);

        for update in [HessianUpdate::Inverse, HessianUpdate::Direct] {
            let mut b = DMatrix::<f64>::identity(2, 2);
            let err = update.apply(&mut b, &s, &y, &mut scratch).unwrap_err();
            assert_eq!(err, DegenerateUpdate::Curvature(-1.0));
            assert_eq!(b, DMatrix::identity(2, 2));
            assert!(err.to_string().contains("too small"));
        }
    }

    #[test]
    fn test_direct_update_rejects_flat_metric() {
        let mut b = DMatrix::<f64>::zeros(2, 2);
        let s = dvector![1.0, 2.0];
        let y = dvector![1.0, 1.0];
        let mut scratch = DVector::zeros(2);

        let err = direct_update(&mut b, &s, &y, &mut scratch).unwrap_err();
        assert_eq!(err, DegenerateUpdate::Metric(0.0));
        assert_eq!(b, DMatrix::zeros(2, 2));
    }

    #[test]
    fn test_configured_update_is_applied() {
        for update in [HessianUpdate::Inverse, HessianUpdate::Direct] {
            let q = bowl();
            let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config().with_update(update)).unwrap();
            bfgs.initialize(&dvector![0.0, 0.0]).unwrap();
            while bfgs.iterations() == 0 {
                assert_eq!(bfgs.step(), Ok(false));
            }
            assert_eq!(bfgs.phase(), &Phase::Evaluate);
            assert_eq!(bfgs.step(), Ok(false));

            // The Hessian of the bowl is 2 I, so y = 2 s.
            let s = bfgs.last_step().clone();
            let y = &s * 2.0;
            let b = bfgs.inverse_hessian();
            match update {
                HessianUpdate::Inverse => {
                    assert_relative_eq!(b * &y, s, epsilon = 1e-10);
                }
                HessianUpdate::Direct => {
                    assert_relative_eq!(b * &s, y, epsilon = 1e-10);
                }
            }
        }
    }

    #[test]
    fn test_steps_after_termination_do_nothing() {
        let q = bowl();
        let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config()).unwrap();
        bfgs.initialize(&dvector![0.0, 0.0]).unwrap();
        while !bfgs.step().unwrap() {}

        assert!(bfgs.is_converged());
        let x = bfgs.current_parameters().clone();
        let evaluations = bfgs.function_evaluations();

        assert_eq!(bfgs.step(), Ok(false));
        assert_eq!(bfgs.step(), Ok(false));
        assert_eq!(bfgs.current_parameters(), &x);
        assert_eq!(bfgs.function_evaluations(), evaluations);
        assert_eq!(bfgs.termination(), Some(TerminationReason::Converged));
        assert!(bfgs.failure_reason().is_none());
    }

    #[test]
    fn test_terminate_keeps_first_outcome() {
        let q = bowl();
        let mut bfgs = QuasiNewtonBfgs::new(q.clone(), q, config()).unwrap();
        bfgs.initialize(&dvector![0.0, 0.0]).unwrap();

        bfgs.terminate(Phase::Failed {
            reason: TerminationReason::LineSearchFailed,
            message: "first".to_string(),
        });
        bfgs.terminate(Phase::Converged);
        bfgs.terminate(Phase::Evaluate);

        assert_eq!(bfgs.failure_reason(), Some("first"));
        assert!(!bfgs.is_converged());
    }

    #[test]
    fn test_non_finite_gradient_fails() {
        let f = FnObjective::new(1, |x: &DVector<f64>| x[0].sqrt());
        let g = FnGradient::new(1, |x: &DVector<f64>, g: &mut DVector<f64>| g[0] = 0.5 / x[0].sqrt());
        let mut bfgs = QuasiNewtonBfgs::new(f, g, BfgsConfig::new()).unwrap();
        bfgs.initialize(&dvector![-1.0]).unwrap();

        assert_eq!(bfgs.step(), Ok(true));
        assert_eq!(bfgs.termination(), Some(TerminationReason::NumericalDegeneracy));
        assert!(bfgs.failure_reason().unwrap().contains("Non-finite"));
    }

    #[test]
    fn test_flat_scaling_step_fails_with_degeneracy() {
        // Linear function: the gradient never changes, so the scaling trial step
        // has nothing to measure.
        let f = FnObjective::new(2, |x: &DVector<f64>| x[0] + x[1]);
        let g = FnGradient::new(2, |_: &DVector<f64>, g: &mut DVector<f64>| g.fill(1.0));
        let mut bfgs = QuasiNewtonBfgs::new(f, g, BfgsConfig::new()).unwrap();
        bfgs.initialize(&dvector![0.0, 0.0]).unwrap();

        assert_eq!(bfgs.step(), Ok(true));
        assert_eq!(bfgs.termination(), Some(TerminationReason::NumericalDegeneracy));
    }
}
