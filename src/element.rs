//! Element data handed to integrands.
use crate::error::IntegrationError;
use crate::topology::{Boundary, Side};
use fenris_spline::{BasisEvaluation, SplineError, SplineGeometry};
use nalgebra::{DMatrix, DVector, Vector3};

/// Basis functions and geometry at one quadrature point of an element.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadraturePoint {
    /// Parameter values (unused directions are zero).
    pub parameters: [f64; 3],
    /// Physical coordinates, padded with zeros.
    pub x: Vector3<f64>,
    /// Values of the element basis functions.
    pub basis: DVector<f64>,
    /// Spatial gradients of the basis functions, one row per function and one column per
    /// spatial dimension.
    pub gradients: DMatrix<f64>,
    /// Quadrature weight times the Jacobian determinant (or the surface measure on boundaries).
    pub weight: f64,
    /// Outward unit normal, for boundary points of patches whose parametric and spatial
    /// dimensions agree.
    pub normal: Option<Vector3<f64>>,
}

/// An element with its nodes and evaluated quadrature points.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementData {
    /// Index of the element within its patch.
    pub index: usize,
    /// Node numbers of the element, global once the patch has been numbered.
    pub nodes: Vec<usize>,
    pub points: Vec<QuadraturePoint>,
}

impl ElementData {
    /// The measure of the element (volume, area or length), or of its boundary for boundary
    /// elements.
    pub fn measure(&self) -> f64 {
        self.points.iter().map(|point| point.weight).sum()
    }
}

/// Evaluates basis functions and the geometry mapping at a parameter point inside the given
/// knot spans.
///
/// `boundary` selects the measure and normal of a boundary point instead of the interior
/// measure.
pub(crate) fn evaluate_point(
    geometry: &SplineGeometry,
    element: usize,
    spans: &[usize],
    u: &[f64],
    quadrature_weight: f64,
    boundary: Option<Boundary>,
) -> Result<QuadraturePoint, IntegrationError> {
    let evaluation = geometry.evaluate_basis_in_spans(spans, u)?;
    let (x, jacobian, parametric) = map_point(geometry, &evaluation);
    let pd = geometry.param_dim();

    // dN/dX = dN/du (J^T J)^{-1} J^T, which reduces to dN/du J^{-1} for square Jacobians
    let metric = jacobian.transpose() * &jacobian;
    let metric_det = metric.determinant();
    let inverse_metric = metric
        .try_inverse()
        .filter(|_| metric_det > f64::EPSILON * metric_norm(&jacobian))
        .ok_or(IntegrationError::SingularJacobian { element })?;
    let gradients = &parametric * inverse_metric * jacobian.transpose();

    let (measure, normal) = match boundary {
        None => (metric_det.sqrt(), None),
        Some(boundary) => boundary_measure(&jacobian, boundary),
    };

    let mut parameters = [0.0; 3];
    parameters[..pd].copy_from_slice(u);
    Ok(QuadraturePoint {
        parameters,
        x,
        basis: DVector::from_vec(evaluation.values),
        gradients,
        weight: quadrature_weight * measure,
        normal,
    })
}

/// Physical point, Jacobian (`nsd x pd`) and parametric basis derivatives (`nen x pd`).
fn map_point(geometry: &SplineGeometry, evaluation: &BasisEvaluation) -> (Vector3<f64>, DMatrix<f64>, DMatrix<f64>) {
    let indices = evaluation.control_point_indices(geometry.num_coefs());
    let nsd = geometry.dimension();
    let pd = geometry.param_dim();

    let mut x = Vector3::zeros();
    let mut jacobian = DMatrix::zeros(nsd, pd);
    let mut parametric = DMatrix::zeros(indices.len(), pd);
    for (a, &index) in indices.iter().enumerate() {
        let point = geometry.control_point(index);
        let value = evaluation.values[a];
        for k in 0..nsd {
            x[k] += value * point[k];
            for d in 0..pd {
                jacobian[(k, d)] += point[k] * evaluation.derivatives[a][d];
            }
        }
        for d in 0..pd {
            parametric[(a, d)] = evaluation.derivatives[a][d];
        }
    }
    (x, jacobian, parametric)
}

/// Determinant of the geometry mapping of a volume in 3D (or of any patch with `nsd == pd`)
/// at the parameter point `u`.
pub(crate) fn jacobian_determinant(geometry: &SplineGeometry, u: &[f64]) -> Result<f64, SplineError> {
    let evaluation = geometry.evaluate_basis(u)?;
    let (_, jacobian, _) = map_point(geometry, &evaluation);
    Ok(if jacobian.is_square() { jacobian.determinant() } else { 0.0 })
}

fn metric_norm(jacobian: &DMatrix<f64>) -> f64 {
    let norm = jacobian.norm_squared();
    norm.powi(jacobian.ncols() as i32).max(f64::MIN_POSITIVE)
}

fn column(jacobian: &DMatrix<f64>, d: usize) -> Vector3<f64> {
    let mut v = Vector3::zeros();
    for k in 0..jacobian.nrows() {
        v[k] = jacobian[(k, d)];
    }
    v
}

/// Measure and outward normal of a boundary point.
fn boundary_measure(jacobian: &DMatrix<f64>, boundary: Boundary) -> (f64, Option<Vector3<f64>>) {
    let (nsd, pd) = jacobian.shape();
    let outward = if boundary.side == Side::Max { 1.0 } else { -1.0 };
    let d = boundary.direction;
    match pd {
        1 => {
            let tangent = column(jacobian, 0);
            let normal = (nsd == 1).then(|| outward * tangent / tangent.norm());
            (1.0, normal)
        }
        2 => {
            let t = column(jacobian, 1 - d);
            // Rotating the tangent clockwise gives the outward normal of the max side in a
            // right-handed parametrization
            let rotated = if d == 0 {
                Vector3::new(t[1], -t[0], 0.0)
            } else {
                Vector3::new(-t[1], t[0], 0.0)
            };
            let length = t.norm();
            let normal = (nsd == 2).then(|| outward * rotated / length);
            (length, normal)
        }
        _ => {
            let (a, b) = match d {
                0 => (1, 2),
                1 => (2, 0),
                _ => (0, 1),
            };
            let n = column(jacobian, a).cross(&column(jacobian, b));
            let area = n.norm();
            (area, Some(outward * n / area))
        }
    }
}
