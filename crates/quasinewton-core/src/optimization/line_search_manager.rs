//! Adapter between a vector-valued optimizer and a scalar line search.
//!
//! The manager turns the multidimensional problem at `(x0, d)` into the
//! one-dimensional function φ(α) = f(x0 + α d) and drives a [`LineSearch`]
//! over it. Trial points and trial gradients live in buffers owned by the
//! manager and sized once, so a search performs no allocation.
//!
//! Two short-circuits resolve a search before any trial is evaluated:
//!
//! - `f(x0)` is already at or below the configured minimum function value
//! - `|∇f(x0) · d|` is within the gradient tolerance
//!
//! In both cases the search reports success with a zero step. A direction
//! along which the function increases is rejected outright.

use crate::{
    error::{OptimizerError, OptimizerResult},
    function::{GradientFunction, ObjectiveFunction},
    line_search::{LineFunction, LineSearch, LineSearchStatus},
    types::{DVector, Scalar},
};
use num_traits::Float;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Thresholds applied before a line search is started.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineSearchManagerConfig<T: Scalar> {
    /// Function values at or below this are accepted without searching
    pub minimum_function_value: T,
    /// Directional derivatives with magnitude at or below this count as zero
    pub gradient_tolerance: T,
}

impl<T: Scalar> Default for LineSearchManagerConfig<T> {
    fn default() -> Self {
        Self {
            minimum_function_value: <T as Float>::neg_infinity(),
            gradient_tolerance: T::zero(),
        }
    }
}

impl<T: Scalar> LineSearchManagerConfig<T> {
    /// Creates a configuration that never short-circuits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the function value below which no search is performed.
    pub fn with_minimum_function_value(mut self, value: T) -> Self {
        self.minimum_function_value = value;
        self
    }

    /// Sets the directional-derivative tolerance.
    pub fn with_gradient_tolerance(mut self, tolerance: T) -> Self {
        self.gradient_tolerance = tolerance;
        self
    }

    /// Validates the thresholds.
    pub fn validate(&self) -> OptimizerResult<()> {
        if <T as Float>::is_nan(self.minimum_function_value) {
            return Err(OptimizerError::invalid_parameter(
                "Minimum function value must not be NaN",
                "minimum_function_value",
                self.minimum_function_value,
            ));
        }
        if !(self.gradient_tolerance >= T::zero()) || !<T as Float>::is_finite(self.gradient_tolerance) {
            return Err(OptimizerError::invalid_parameter(
                "Gradient tolerance must be finite and non-negative",
                "gradient_tolerance",
                self.gradient_tolerance,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum SearchState<T> {
    Idle,
    Searching,
    Succeeded { step: T, value: T },
    Failed { message: String },
}

/// Drives a [`LineSearch`] along `x0 + α d` for an optimizer.
#[derive(Debug)]
pub struct LineSearchManager<T: Scalar, L> {
    search: L,
    config: LineSearchManagerConfig<T>,
    origin: DVector<T>,
    direction: DVector<T>,
    trial_point: DVector<T>,
    trial_gradient: DVector<T>,
    value_at_zero: T,
    derivative_at_zero: T,
    state: SearchState<T>,
    evaluations: usize,
}

impl<T, L> LineSearchManager<T, L>
where
    T: Scalar,
    L: LineSearch<T>,
{
    /// Creates a manager for problems of the given dimension.
    pub fn new(search: L, config: LineSearchManagerConfig<T>, dimension: usize) -> Self {
        Self {
            search,
            config,
            origin: DVector::zeros(dimension),
            direction: DVector::zeros(dimension),
            trial_point: DVector::zeros(dimension),
            trial_gradient: DVector::zeros(dimension),
            value_at_zero: T::zero(),
            derivative_at_zero: T::zero(),
            state: SearchState::Idle,
            evaluations: 0,
        }
    }

    /// Starts a search from `origin` along `direction`.
    ///
    /// `value` and `gradient` are f and ∇f at `origin`. The outcome may be
    /// known immediately, in which case [`advance`](Self::advance) reports
    /// it without evaluating anything.
    pub fn start(
        &mut self,
        value: T,
        origin: &DVector<T>,
        gradient: &DVector<T>,
        direction: &DVector<T>,
        initial_step: T,
    ) {
        let slope = gradient.dot(direction);
        self.value_at_zero = value;
        self.derivative_at_zero = slope;
        self.evaluations = 0;

        if !<T as Float>::is_finite(value) || !<T as Float>::is_finite(slope) {
            self.state = SearchState::Failed {
                message: format!(
                    "Line search started from non-finite data: f = {}, slope = {}",
                    value, slope
                ),
            };
            return;
        }

        if value <= self.config.minimum_function_value
            || <T as Float>::abs(slope) <= self.config.gradient_tolerance
        {
            log::trace!("Line search skipped: f = {}, slope = {}", value, slope);
            self.state = SearchState::Succeeded {
                step: T::zero(),
                value,
            };
            return;
        }

        if slope > T::zero() {
            self.state = SearchState::Failed {
                message: format!(
                    "Search direction is not a descent direction: directional derivative {}",
                    slope
                ),
            };
            return;
        }

        self.origin.copy_from(origin);
        self.direction.copy_from(direction);
        self.search.init(value, slope, initial_step);
        self.state = SearchState::Searching;
    }

    /// Performs one unit of line search work.
    pub fn advance<F, G>(&mut self, function: &F, gradient: &G) -> LineSearchStatus
    where
        F: ObjectiveFunction<T> + ?Sized,
        G: GradientFunction<T> + ?Sized,
    {
        match self.state {
            SearchState::Succeeded { .. } => return LineSearchStatus::Converged,
            SearchState::Failed { .. } => return LineSearchStatus::Failed,
            SearchState::Idle => {
                self.state = SearchState::Failed {
                    message: "Line search advanced before being started".to_string(),
                };
                return LineSearchStatus::Failed;
            }
            SearchState::Searching => {}
        }

        let mut ray = Ray {
            function,
            gradient,
            origin: &self.origin,
            direction: &self.direction,
            point: &mut self.trial_point,
            point_gradient: &mut self.trial_gradient,
            evaluations: &mut self.evaluations,
        };
        let status = self.search.iterate(&mut ray);

        match status {
            LineSearchStatus::Searching => {}
            LineSearchStatus::Converged => {
                self.state = SearchState::Succeeded {
                    step: self.search.step(),
                    value: self.search.value_at_step(),
                };
            }
            LineSearchStatus::Failed => {
                let message = self
                    .search
                    .warning()
                    .unwrap_or("Line search failed without a diagnostic")
                    .to_string();
                log::debug!(
                    "{} line search failed after {} evaluations: {}",
                    self.search.name(),
                    self.evaluations,
                    message
                );
                self.state = SearchState::Failed { message };
            }
        }
        status
    }

    /// Accepted step length, zero until the search succeeds.
    pub fn step(&self) -> T {
        match self.state {
            SearchState::Succeeded { step, .. } => step,
            _ => T::zero(),
        }
    }

    /// Function value at the accepted step, φ(0) until the search succeeds.
    pub fn value_at_step(&self) -> T {
        match self.state {
            SearchState::Succeeded { value, .. } => value,
            _ => self.value_at_zero,
        }
    }

    /// The slope φ'(0) = ∇f(x0) · d of the current search.
    pub fn derivative_at_zero(&self) -> T {
        self.derivative_at_zero
    }

    /// Diagnostic message of a failed search.
    pub fn warning(&self) -> Option<&str> {
        match &self.state {
            SearchState::Failed { message } => Some(message.as_str()),
            _ => None,
        }
    }

    /// Number of (f, ∇f) trial evaluations in the current search.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// Returns the wrapped line search.
    pub fn search(&self) -> &L {
        &self.search
    }

    /// Returns the thresholds in use.
    pub fn config(&self) -> &LineSearchManagerConfig<T> {
        &self.config
    }
}

/// φ(α) = f(origin + α direction) evaluated into borrowed buffers.
struct Ray<'a, T: Scalar, F: ?Sized, G: ?Sized> {
    function: &'a F,
    gradient: &'a G,
    origin: &'a DVector<T>,
    direction: &'a DVector<T>,
    point: &'a mut DVector<T>,
    point_gradient: &'a mut DVector<T>,
    evaluations: &'a mut usize,
}

impl<T, F, G> LineFunction<T> for Ray<'_, T, F, G>
where
    T: Scalar,
    F: ObjectiveFunction<T> + ?Sized,
    G: GradientFunction<T> + ?Sized,
{
    fn evaluate(&mut self, step: T) -> (T, T) {
        self.point.copy_from(self.origin);
        self.point.axpy(step, self.direction, T::one());

        let value = self.function.value(&*self.point);
        self.gradient.gradient(&*self.point, &mut *self.point_gradient);
        *self.evaluations += 1;

        (value, self.point_gradient.dot(self.direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{CountingFunction, CountingGradient, FnGradient, FnObjective};
    use crate::line_search::StrongWolfeLineSearch;
    use approx::assert_relative_eq;
    use nalgebra::dvector;

    fn run<L: LineSearch<f64>>(
        manager: &mut LineSearchManager<f64, L>,
        f: &dyn ObjectiveFunction<f64>,
        g: &dyn GradientFunction<f64>,
    ) -> LineSearchStatus {
        loop {
            match manager.advance(f, g) {
                LineSearchStatus::Searching => continue,
                status => return status,
            }
        }
    }

    fn sphere() -> (
        FnObjective<impl Fn(&DVector<f64>) -> f64>,
        FnGradient<impl Fn(&DVector<f64>, &mut DVector<f64>)>,
    ) {
        (
            FnObjective::new(2, |x: &DVector<f64>| x.norm_squared()),
            FnGradient::new(2, |x: &DVector<f64>, g: &mut DVector<f64>| g.copy_from(&(x * 2.0))),
        )
    }

    #[test]
    fn test_steepest_descent_on_sphere() {
        let (f, g) = sphere();
        let x0 = dvector![1.0, -2.0];
        let g0 = dvector![2.0, -4.0];
        let d = -&g0;

        let mut manager =
            LineSearchManager::new(StrongWolfeLineSearch::new(), LineSearchManagerConfig::new(), 2);
        manager.start(5.0, &x0, &g0, &d, 1.0);
        assert_relative_eq!(manager.derivative_at_zero(), -20.0);

        assert_eq!(run(&mut manager, &f, &g), LineSearchStatus::Converged);
        // Exact minimizer along the ray is α = 1/2.
        assert_relative_eq!(manager.step(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(manager.value_at_step(), 0.0, epsilon = 1e-12);
        assert!(manager.warning().is_none());
    }

    #[test]
    fn test_flat_direction_short_circuits() {
        let (f, g) = sphere();
        let f = CountingFunction::new(f);
        let g = CountingGradient::new(g);
        let x0 = dvector![0.0, 0.0];
        let g0 = dvector![0.0, 0.0];
        let d = dvector![0.0, 0.0];

        let mut manager =
            LineSearchManager::new(StrongWolfeLineSearch::new(), LineSearchManagerConfig::new(), 2);
        manager.start(0.0, &x0, &g0, &d, 1.0);

        assert_eq!(manager.advance(&f, &g), LineSearchStatus::Converged);
        assert_eq!(manager.step(), 0.0);
        assert_eq!(f.count(), 0);
        assert_eq!(g.count(), 0);
    }

    #[test]
    fn test_minimum_function_value_short_circuits() {
        let (f, g) = sphere();
        let x0 = dvector![1.0, 0.0];
        let g0 = dvector![2.0, 0.0];
        let d = -&g0;

        let config = LineSearchManagerConfig::new().with_minimum_function_value(2.0);
        let mut manager = LineSearchManager::new(StrongWolfeLineSearch::new(), config, 2);
        manager.start(1.0, &x0, &g0, &d, 1.0);

        assert_eq!(manager.advance(&f, &g), LineSearchStatus::Converged);
        assert_eq!(manager.step(), 0.0);
        assert_eq!(manager.value_at_step(), 1.0);
        assert_eq!(manager.evaluations(), 0);
    }

    #[test]
    fn test_ascent_direction_rejected() {
        let (f, g) = sphere();
        let x0 = dvector![1.0, 0.0];
        let g0 = dvector![2.0, 0.0];

        let mut manager =
            LineSearchManager::new(StrongWolfeLineSearch::new(), LineSearchManagerConfig::new(), 2);
        manager.start(1.0, &x0, &g0, &g0, 1.0);

        assert_eq!(manager.advance(&f, &g), LineSearchStatus::Failed);
        assert!(manager.warning().unwrap().contains("descent"));
        assert_eq!(manager.evaluations(), 0);
    }

    #[test]
    fn test_advance_without_start_fails() {
        let (f, g) = sphere();
        let mut manager =
            LineSearchManager::new(StrongWolfeLineSearch::new(), LineSearchManagerConfig::new(), 2);

        assert_eq!(manager.advance(&f, &g), LineSearchStatus::Failed);
        assert!(manager.warning().is_some());
    }

    #[test]
    fn test_config_validation() {
        assert!(LineSearchManagerConfig::<f64>::default().validate().is_ok());
        assert!(LineSearchManagerConfig::new()
            .with_gradient_tolerance(-1.0)
            .validate()
            .is_err());
        assert!(LineSearchManagerConfig::new()
            .with_minimum_function_value(f64::NAN)
            .validate()
            .is_err());
    }
}
