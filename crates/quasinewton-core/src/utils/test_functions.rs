//! Standard test problems with analytic gradients.
//!
//! Each problem implements both [`ObjectiveFunction`] and
//! [`GradientFunction`], so the same value can be bound as either
//! collaborator.

use crate::{
    function::{GradientFunction, ObjectiveFunction},
    types::{DMatrix, DVector, Scalar},
};

/// Convex quadratic `f(x) = ½ xᵀA x - bᵀx + c`.
#[derive(Debug, Clone)]
pub struct Quadratic<T: Scalar> {
    a: DMatrix<T>,
    b: DVector<T>,
    c: T,
}

impl<T: Scalar> Quadratic<T> {
    /// Creates the quadratic from its coefficients.
    ///
    /// `a` should be symmetric positive definite for a bounded minimum.
    pub fn new(a: DMatrix<T>, b: DVector<T>, c: T) -> Self {
        assert_eq!(a.nrows(), a.ncols(), "quadratic term must be square");
        assert_eq!(a.nrows(), b.len(), "linear term must match quadratic term");
        Self { a, b, c }
    }

    /// `f(x) = Σ wᵢ (xᵢ - cᵢ)²`, minimized at `center` with value zero.
    pub fn weighted_distance(weights: &DVector<T>, center: &DVector<T>) -> Self {
        assert_eq!(weights.len(), center.len());
        let two = <T as Scalar>::from_f64(2.0);
        let a = DMatrix::from_diagonal(&(weights * two));
        let b = a.clone() * center;
        let c = weights
            .iter()
            .zip(center.iter())
            .fold(T::zero(), |acc, (w, ci)| acc + *w * *ci * *ci);
        Self { a, b, c }
    }

    /// The constant Hessian `A`.
    pub fn hessian(&self) -> &DMatrix<T> {
        &self.a
    }

    /// The minimizer `A⁻¹ b`, if `A` is positive definite.
    pub fn minimizer(&self) -> Option<DVector<T>> {
        self.a.clone().cholesky().map(|chol| chol.solve(&self.b))
    }
}

impl<T: Scalar> ObjectiveFunction<T> for Quadratic<T> {
    fn dimension(&self) -> usize {
        self.b.len()
    }

    fn value(&self, x: &DVector<T>) -> T {
        let half = <T as Scalar>::from_f64(0.5);
        half * x.dot(&(&self.a * x)) - self.b.dot(x) + self.c
    }
}

impl<T: Scalar> GradientFunction<T> for Quadratic<T> {
    fn dimension(&self) -> usize {
        self.b.len()
    }

    fn gradient(&self, x: &DVector<T>, gradient: &mut DVector<T>) {
        gradient.gemv(T::one(), &self.a, x, T::zero());
        *gradient -= &self.b;
    }
}

/// Chained Rosenbrock function
/// `f(x) = Σ 100 (xᵢ₊₁ - xᵢ²)² + (1 - xᵢ)²`, minimized at all ones.
#[derive(Debug, Clone, Copy)]
pub struct Rosenbrock {
    dimension: usize,
}

impl Rosenbrock {
    /// Creates the function in `dimension >= 2` variables.
    pub fn new(dimension: usize) -> Self {
        assert!(dimension >= 2, "Rosenbrock needs at least two variables");
        Self { dimension }
    }

    /// The classic starting point `(-1.2, 1, -1.2, 1, ...)`.
    pub fn standard_start<T: Scalar>(&self) -> DVector<T> {
        DVector::from_fn(self.dimension, |i, _| {
            if i % 2 == 0 {
                <T as Scalar>::from_f64(-1.2)
            } else {
                T::one()
            }
        })
    }
}

impl<T: Scalar> ObjectiveFunction<T> for Rosenbrock {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn value(&self, x: &DVector<T>) -> T {
        let hundred = <T as Scalar>::from_f64(100.0);
        let mut sum = T::zero();
        for i in 0..self.dimension - 1 {
            let valley = x[i + 1] - x[i] * x[i];
            let offset = T::one() - x[i];
            sum += hundred * valley * valley + offset * offset;
        }
        sum
    }
}

impl<T: Scalar> GradientFunction<T> for Rosenbrock {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn gradient(&self, x: &DVector<T>, gradient: &mut DVector<T>) {
        let two = <T as Scalar>::from_f64(2.0);
        let four_hundred = <T as Scalar>::from_f64(400.0);
        let two_hundred = <T as Scalar>::from_f64(200.0);

        gradient.fill(T::zero());
        for i in 0..self.dimension - 1 {
            let valley = x[i + 1] - x[i] * x[i];
            gradient[i] -= four_hundred * x[i] * valley + two * (T::one() - x[i]);
            gradient[i + 1] += two_hundred * valley;
        }
    }
}
