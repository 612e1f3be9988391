//! Type definitions and aliases for quasi-Newton optimization.
//!
//! This module provides the scalar trait shared by every numeric routine in
//! the workspace and the dense buffer aliases.

use nalgebra::{OMatrix, OVector, Dyn, RealField, Scalar as NalgebraScalar};
use num_traits::{Float, FromPrimitive};
use std::fmt::{Debug, Display};

/// Trait for scalar types used in optimization (f32 or f64).
///
/// This trait combines all the numeric traits required by the optimizer,
/// the line search and the objective adapters.
pub trait Scalar:
    NalgebraScalar
    + RealField
    + Float
    + FromPrimitive
    + Display
    + Debug
    + Default
    + Copy
    + Send
    + Sync
    + 'static
{
    /// Machine epsilon for this scalar type.
    const EPSILON: Self;

    /// Default tolerance for the optimizer's convergence tests.
    const DEFAULT_TOLERANCE: Self;

    /// Tolerance used when checking a matrix for symmetry.
    const SYMMETRY_TOLERANCE: Self;

    /// Maximum value for line search step size.
    const MAX_STEP_SIZE: Self;

    /// Minimum value for line search step size.
    const MIN_STEP_SIZE: Self;

    /// Convert from f64 (for constants).
    ///
    /// # Panics
    ///
    /// Panics if the conversion fails. Use `try_from_f64` for a non-panicking version.
    fn from_f64(v: f64) -> Self {
        <Self as FromPrimitive>::from_f64(v).expect("Failed to convert from f64")
    }

    /// Try to convert from f64.
    ///
    /// Returns None if the conversion fails.
    fn try_from_f64(v: f64) -> Option<Self> {
        <Self as FromPrimitive>::from_f64(v)
    }
}

impl Scalar for f32 {
    const EPSILON: Self = f32::EPSILON;
    const DEFAULT_TOLERANCE: Self = 1e-5;
    const SYMMETRY_TOLERANCE: Self = 1e-5;
    const MAX_STEP_SIZE: Self = 1e10;
    const MIN_STEP_SIZE: Self = 1e-10;
}

impl Scalar for f64 {
    const EPSILON: Self = f64::EPSILON;
    const DEFAULT_TOLERANCE: Self = 1e-10;
    const SYMMETRY_TOLERANCE: Self = 1e-10;
    const MAX_STEP_SIZE: Self = 1e20;
    const MIN_STEP_SIZE: Self = 1e-20;
}

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a dynamically-sized vector.
pub type DVector<T> = OVector<T, Dyn>;

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scalar_trait_f32() {
        assert_eq!(<f32 as Scalar>::EPSILON, f32::EPSILON);
        assert!(<f32 as Scalar>::DEFAULT_TOLERANCE > 0.0);
        assert!(<f32 as Scalar>::MIN_STEP_SIZE < <f32 as Scalar>::MAX_STEP_SIZE);
    }

    #[test]
    fn test_scalar_trait_f64() {
        assert_eq!(<f64 as Scalar>::EPSILON, f64::EPSILON);
        assert!(<f64 as Scalar>::DEFAULT_TOLERANCE > 0.0);
        assert!(<f64 as Scalar>::MIN_STEP_SIZE < <f64 as Scalar>::MAX_STEP_SIZE);
    }

    #[test]
    fn test_scalar_conversions() {
        let val_f64 = 3.14159;
        let val_f32 = <f32 as Scalar>::from_f64(val_f64);
        assert_relative_eq!(val_f32 as f64, val_f64, epsilon = 1e-6);
        assert_eq!(<f64 as Scalar>::try_from_f64(val_f64), Some(val_f64));
    }

    #[test]
    fn test_tolerance_ordering() {
        assert!(<f32 as Scalar>::EPSILON < <f32 as Scalar>::DEFAULT_TOLERANCE);
        assert!(<f64 as Scalar>::EPSILON < <f64 as Scalar>::DEFAULT_TOLERANCE);
        assert!(<f64 as Scalar>::MIN_STEP_SIZE < 1.0);
        assert!(<f64 as Scalar>::MAX_STEP_SIZE > 1.0);
    }
}
