//! Tensor-product B-spline geometry for isogeometric analysis.
//!
//! The crate provides the small geometry kernel needed by `fenris-iga`: knot vectors with basis
//! evaluation and refinement primitives ([`BsplineBasis`]), curves, surfaces and volumes over
//! such bases ([`SplineGeometry`]), the structured `g2` text format used to exchange patches,
//! and Gauss-Legendre rules for integrating over knot spans.
//!
//! Rational geometries store *homogeneous* coefficients, i.e. each control point is stored as
//! `(w x, w y, w z, w)`.

use std::fmt;
use std::fmt::{Display, Formatter};

pub mod basis;
pub mod g2;
pub mod geometry;
pub mod quadrature;

pub use basis::BsplineBasis;
pub use geometry::{BasisEvaluation, SplineGeometry};

/// Library-wide error type.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum SplineError {
    /// The order (polynomial degree + 1) must be positive.
    InvalidOrder { order: usize },
    /// The knot vector is too short, not non-decreasing or has an empty parametric domain.
    InvalidKnotVector { reason: String },
    /// Only spatial dimensions 1, 2 and 3 are supported.
    InvalidDimension { dimension: usize },
    /// Only 1, 2 or 3 parametric directions are supported.
    InvalidParametricDimension { param_dim: usize },
    /// A parametric direction index is not valid for the geometry.
    DirectionOutOfRange { direction: usize, param_dim: usize },
    /// The coefficient array does not match the bases.
    CoefficientCount { expected: usize, actual: usize },
    /// Rational geometries require strictly positive weights.
    NonPositiveWeight { index: usize },
    /// A knot to insert does not lie in the interior of the parametric domain.
    KnotOutsideDomain { knot: f64 },
    /// A parameter point has the wrong number of components.
    ParameterDimension { expected: usize, actual: usize },
    /// A coefficient block requested for extraction is not inside the geometry.
    ExtractionOutOfBounds {
        direction: usize,
        start: usize,
        count: usize,
        available: usize,
    },
    /// The least-squares system of an order elevation did not reproduce the original geometry.
    ElevationFailed { residual: f64 },
    /// Malformed `g2` input.
    Parse { message: String },
    /// The output sink rejected formatted `g2` data.
    Format,
}

impl Display for SplineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidOrder { order } => write!(f, "invalid spline order {order}"),
            Self::InvalidKnotVector { reason } => write!(f, "invalid knot vector: {reason}"),
            Self::InvalidDimension { dimension } => {
                write!(f, "unsupported spatial dimension {dimension}")
            }
            Self::InvalidParametricDimension { param_dim } => {
                write!(f, "unsupported number of parametric directions {param_dim}")
            }
            Self::DirectionOutOfRange { direction, param_dim } => write!(
                f,
                "parametric direction {direction} out of range for a geometry with {param_dim} directions"
            ),
            Self::CoefficientCount { expected, actual } => write!(
                f,
                "expected {expected} coefficients, but {actual} were given"
            ),
            Self::NonPositiveWeight { index } => {
                write!(f, "control point {index} has a non-positive weight")
            }
            Self::KnotOutsideDomain { knot } => {
                write!(f, "knot {knot} is not in the interior of the parametric domain")
            }
            Self::ParameterDimension { expected, actual } => write!(
                f,
                "expected a parameter point with {expected} components, got {actual}"
            ),
            Self::ExtractionOutOfBounds {
                direction,
                start,
                count,
                available,
            } => write!(
                f,
                "cannot extract coefficients [{start}, {}) in direction {direction}: only {available} available",
                start + count
            ),
            Self::ElevationFailed { residual } => {
                write!(f, "order elevation failed (residual {residual:e})")
            }
            Self::Parse { message } => write!(f, "failed to parse g2 data: {message}"),
            Self::Format => write!(f, "failed to write g2 data"),
        }
    }
}

impl std::error::Error for SplineError {}

impl From<fmt::Error> for SplineError {
    fn from(_: fmt::Error) -> Self {
        Self::Format
    }
}
