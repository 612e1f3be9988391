//! Objective and gradient interfaces consumed by the optimizer.
//!
//! The optimizer never owns the mathematics of the problem. It talks to two
//! collaborators: an [`ObjectiveFunction`] mapping `R^N -> R` and a
//! [`GradientFunction`] mapping `R^N -> R^N`. Both report their input
//! dimension so that a mismatched pair can be rejected before any
//! evaluation happens.
//!
//! # Provided adapters
//!
//! - [`FnObjective`] / [`FnGradient`]: wrap plain closures
//! - [`NumericalGradient`]: central-difference gradient of any objective
//! - [`CountingFunction`] / [`CountingGradient`]: evaluation counters

use crate::types::{DVector, Scalar};
use num_traits::Float;
use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};

/// A scalar objective `f: R^N -> R`.
pub trait ObjectiveFunction<T: Scalar> {
    /// Number of parameters `N` the function takes.
    fn dimension(&self) -> usize;

    /// Evaluates the function at `x`.
    ///
    /// `x` always has length [`dimension`](Self::dimension).
    fn value(&self, x: &DVector<T>) -> T;
}

/// The gradient `∇f: R^N -> R^N` of an objective.
pub trait GradientFunction<T: Scalar> {
    /// Number of parameters `N` the gradient takes.
    fn dimension(&self) -> usize;

    /// Writes the gradient at `x` into `gradient`.
    ///
    /// Both vectors always have length [`dimension`](Self::dimension).
    fn gradient(&self, x: &DVector<T>, gradient: &mut DVector<T>);
}

impl<T: Scalar, F: ObjectiveFunction<T> + ?Sized> ObjectiveFunction<T> for &F {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn value(&self, x: &DVector<T>) -> T {
        (**self).value(x)
    }
}

impl<T: Scalar, G: GradientFunction<T> + ?Sized> GradientFunction<T> for &G {
    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn gradient(&self, x: &DVector<T>, gradient: &mut DVector<T>) {
        (**self).gradient(x, gradient)
    }
}

/// Objective backed by a closure.
pub struct FnObjective<F> {
    dimension: usize,
    function: F,
}

impl<F> FnObjective<F> {
    /// Wraps `function`, declaring that it takes `dimension` parameters.
    pub fn new<T>(dimension: usize, function: F) -> Self
    where
        T: Scalar,
        F: Fn(&DVector<T>) -> T,
    {
        Self {
            dimension,
            function,
        }
    }
}

impl<T, F> ObjectiveFunction<T> for FnObjective<F>
where
    T: Scalar,
    F: Fn(&DVector<T>) -> T,
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn value(&self, x: &DVector<T>) -> T {
        (self.function)(x)
    }
}

impl<F> Debug for FnObjective<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObjective")
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Gradient backed by a closure writing into an output buffer.
pub struct FnGradient<G> {
    dimension: usize,
    gradient: G,
}

impl<G> FnGradient<G> {
    /// Wraps `gradient`, declaring that it takes `dimension` parameters.
    pub fn new<T>(dimension: usize, gradient: G) -> Self
    where
        T: Scalar,
        G: Fn(&DVector<T>, &mut DVector<T>),
    {
        Self {
            dimension,
            gradient,
        }
    }
}

impl<T, G> GradientFunction<T> for FnGradient<G>
where
    T: Scalar,
    G: Fn(&DVector<T>, &mut DVector<T>),
{
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn gradient(&self, x: &DVector<T>, gradient: &mut DVector<T>) {
        (self.gradient)(x, gradient)
    }
}

impl<G> Debug for FnGradient<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGradient")
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Gradient approximated by central finite differences of an objective.
///
/// Component `i` is `(f(x + h e_i) - f(x - h e_i)) / 2h` with
/// `h = sqrt(eps) * max(1, |x_i|)`. Each gradient costs `2N` objective
/// evaluations.
#[derive(Debug)]
pub struct NumericalGradient<T: Scalar, F> {
    function: F,
    shifted: RefCell<DVector<T>>,
}

impl<T, F> NumericalGradient<T, F>
where
    T: Scalar,
    F: ObjectiveFunction<T>,
{
    /// Creates a finite-difference gradient for `function`.
    pub fn new(function: F) -> Self {
        let n = function.dimension();
        Self {
            function,
            shifted: RefCell::new(DVector::zeros(n)),
        }
    }

    /// Returns the wrapped objective.
    pub fn function(&self) -> &F {
        &self.function
    }
}

impl<T, F> GradientFunction<T> for NumericalGradient<T, F>
where
    T: Scalar,
    F: ObjectiveFunction<T>,
{
    fn dimension(&self) -> usize {
        self.function.dimension()
    }

    fn gradient(&self, x: &DVector<T>, gradient: &mut DVector<T>) {
        let mut shifted = self.shifted.borrow_mut();
        shifted.copy_from(x);
        let root_eps = <T as Float>::sqrt(T::EPSILON);

        for i in 0..x.len() {
            let xi = x[i];
            let h = root_eps * <T as Float>::max(T::one(), <T as Float>::abs(xi));

            shifted[i] = xi + h;
            let f_plus = self.function.value(&shifted);
            shifted[i] = xi - h;
            let f_minus = self.function.value(&shifted);
            shifted[i] = xi;

            gradient[i] = (f_plus - f_minus) / (h + h);
        }
    }
}

/// Wrapper counting objective evaluations.
#[derive(Debug)]
pub struct CountingFunction<F> {
    /// The underlying objective
    pub inner: F,
    count: Cell<usize>,
}

impl<F> CountingFunction<F> {
    /// Creates a new counting wrapper around an objective.
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            count: Cell::new(0),
        }
    }

    /// Number of evaluations since creation or the last reset.
    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Resets the counter to zero.
    pub fn reset_count(&self) {
        self.count.set(0);
    }
}

impl<T: Scalar, F: ObjectiveFunction<T>> ObjectiveFunction<T> for CountingFunction<F> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn value(&self, x: &DVector<T>) -> T {
        self.count.set(self.count.get() + 1);
        self.inner.value(x)
    }
}

/// Wrapper counting gradient evaluations.
#[derive(Debug)]
pub struct CountingGradient<G> {
    /// The underlying gradient
    pub inner: G,
    count: Cell<usize>,
}

impl<G> CountingGradient<G> {
    /// Creates a new counting wrapper around a gradient.
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            count: Cell::new(0),
        }
    }

    /// Number of evaluations since creation or the last reset.
    pub fn count(&self) -> usize {
        self.count.get()
    }

    /// Resets the counter to zero.
    pub fn reset_count(&self) {
        self.count.set(0);
    }
}

impl<T: Scalar, G: GradientFunction<T>> GradientFunction<T> for CountingGradient<G> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn gradient(&self, x: &DVector<T>, gradient: &mut DVector<T>) {
        self.count.set(self.count.get() + 1);
        self.inner.gradient(x, gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn bowl() -> FnObjective<impl Fn(&DVector<f64>) -> f64> {
        // f(x) = x1^2 + 2*x2^2
        FnObjective::new(2, |x: &DVector<f64>| x[0] * x[0] + 2.0 * x[1] * x[1])
    }

    #[test]
    fn test_closure_adapters() {
        let f = bowl();
        let g = FnGradient::new(2, |x: &DVector<f64>, g: &mut DVector<f64>| {
            g[0] = 2.0 * x[0];
            g[1] = 4.0 * x[1];
        });
        let x = DVector::from_vec(vec![1.0, 2.0]);

        assert_eq!(ObjectiveFunction::<f64>::dimension(&f), 2);
        assert_eq!(GradientFunction::<f64>::dimension(&g), 2);
        assert_relative_eq!(f.value(&x), 9.0);

        let mut grad = DVector::zeros(2);
        g.gradient(&x, &mut grad);
        assert_relative_eq!(grad[0], 2.0);
        assert_relative_eq!(grad[1], 8.0);
    }

    #[test]
    fn test_numerical_gradient() {
        let numeric = NumericalGradient::<f64, _>::new(bowl());
        let x = DVector::from_vec(vec![1.0, 2.0]);
        let mut grad = DVector::zeros(2);
        numeric.gradient(&x, &mut grad);

        // Analytical gradient: [2*x1, 4*x2] = [2, 8]
        assert_relative_eq!(grad[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(grad[1], 8.0, epsilon = 1e-6);
    }

    #[test]
    fn test_numerical_gradient_leaves_point_untouched() {
        let numeric = NumericalGradient::<f64, _>::new(bowl());
        let x = DVector::from_vec(vec![-3.0, 0.5]);
        let mut grad = DVector::zeros(2);
        numeric.gradient(&x, &mut grad);
        numeric.gradient(&x, &mut grad);

        assert_eq!(x, DVector::from_vec(vec![-3.0, 0.5]));
        assert_relative_eq!(grad[0], -6.0, epsilon = 1e-6);
        assert_relative_eq!(grad[1], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_counting_wrappers() {
        let f = CountingFunction::new(bowl());
        let g = CountingGradient::new(NumericalGradient::<f64, _>::new(bowl()));
        let x = DVector::from_vec(vec![1.0, 1.0]);
        let mut grad = DVector::zeros(2);

        assert_eq!(f.count(), 0);
        assert_eq!(g.count(), 0);

        f.value(&x);
        f.value(&x);
        g.gradient(&x, &mut grad);
        assert_eq!(f.count(), 2);
        assert_eq!(g.count(), 1);

        f.reset_count();
        g.reset_count();
        assert_eq!(f.count(), 0);
        assert_eq!(g.count(), 0);
    }

    #[test]
    fn test_reference_forwarding() {
        let f = CountingFunction::new(bowl());
        let by_ref = &f;
        let x = DVector::from_vec(vec![0.0, 1.0]);

        assert_relative_eq!(by_ref.value(&x), 2.0);
        assert_eq!(f.count(), 1);
    }
}
