//! Numerical checks on the inverse-Hessian approximation.
//!
//! The BFGS update keeps `B` symmetric positive definite only as long as
//! the line search honours the curvature condition. These helpers let the
//! optimizer validate a caller-supplied starting matrix and let tests check
//! the invariant after each update.

use crate::types::{DMatrix, DVector, Scalar};
use num_traits::Float;

/// Largest absolute difference between `m[(i, j)]` and `m[(j, i)]`.
///
/// Returns infinity for a non-square matrix.
pub fn max_asymmetry<T: Scalar>(m: &DMatrix<T>) -> T {
    if !m.is_square() {
        return <T as Float>::infinity();
    }

    let n = m.nrows();
    let mut worst = T::zero();
    for i in 0..n {
        for j in i + 1..n {
            let diff = <T as Float>::abs(m[(i, j)] - m[(j, i)]);
            worst = <T as Float>::max(worst, diff);
        }
    }
    worst
}

/// Checks symmetry relative to the magnitude of the entries.
pub fn is_symmetric<T: Scalar>(m: &DMatrix<T>, tol: T) -> bool {
    let scale = m
        .iter()
        .fold(T::one(), |acc, v| <T as Float>::max(acc, <T as Float>::abs(*v)));
    max_asymmetry(m) <= tol * scale
}

/// Cholesky-based positivity check.
///
/// Only the lower triangle is read, so callers should check symmetry
/// separately.
pub fn is_positive_definite<T: Scalar>(m: &DMatrix<T>) -> bool {
    if !m.is_square() || m.iter().any(|v| !<T as Float>::is_finite(*v)) {
        return false;
    }
    m.clone().cholesky().is_some()
}

/// Returns `true` when every component of `v` is finite.
pub fn all_finite<T: Scalar>(v: &DVector<T>) -> bool {
    v.iter().all(|x| <T as Float>::is_finite(*x))
}
