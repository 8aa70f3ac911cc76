use crate::basis::BsplineBasis;
use crate::SplineError;
use nalgebra::DMatrix;

/// A tensor-product spline curve, surface or volume.
///
/// Coefficients are stored with the spatial components varying fastest, followed by the index
/// in the first, second and third parametric direction. A rational geometry stores homogeneous
/// coefficients with the weight as the last component.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineGeometry {
    bases: Vec<BsplineBasis>,
    dimension: usize,
    rational: bool,
    coefs: Vec<f64>,
}

/// Tensor-product basis functions evaluated at a single parameter point.
#[derive(Debug, Clone, PartialEq)]
pub struct BasisEvaluation {
    /// Index of the first non-zero function in each direction (0 for unused directions).
    pub first: [usize; 3],
    /// Number of non-zero functions in each direction (1 for unused directions).
    pub counts: [usize; 3],
    /// Function values, ordered with the first direction varying fastest.
    pub values: Vec<f64>,
    /// Parametric derivatives of the functions. Only the first `param_dim` components are used.
    pub derivatives: Vec<[f64; 3]>,
}

impl BasisEvaluation {
    /// Linear control point indices of the non-zero functions, in the order of `values`.
    pub fn control_point_indices(&self, num_coefs: [usize; 3]) -> Vec<usize> {
        let [o1, o2, o3] = self.counts;
        let mut indices = Vec::with_capacity(o1 * o2 * o3);
        for c in 0..o3 {
            for b in 0..o2 {
                for a in 0..o1 {
                    let (i, j, k) = (self.first[0] + a, self.first[1] + b, self.first[2] + c);
                    indices.push(i + num_coefs[0] * (j + num_coefs[1] * k));
                }
            }
        }
        indices
    }
}

impl SplineGeometry {
    pub fn new(
        bases: Vec<BsplineBasis>,
        dimension: usize,
        rational: bool,
        coefs: Vec<f64>,
    ) -> Result<Self, SplineError> {
        if bases.is_empty() || bases.len() > 3 {
            return Err(SplineError::InvalidParametricDimension { param_dim: bases.len() });
        }
        if dimension == 0 || dimension > 3 {
            return Err(SplineError::InvalidDimension { dimension });
        }
        let stride = dimension + usize::from(rational);
        let expected = stride * bases.iter().map(BsplineBasis::num_coefs).product::<usize>();
        if coefs.len() != expected {
            return Err(SplineError::CoefficientCount {
                expected,
                actual: coefs.len(),
            });
        }
        let geometry = Self {
            bases,
            dimension,
            rational,
            coefs,
        };
        if rational {
            if let Some(index) = (0..geometry.num_control_points()).find(|&i| !(geometry.weight(i) > 0.0)) {
                return Err(SplineError::NonPositiveWeight { index });
            }
        }
        Ok(geometry)
    }

    pub fn param_dim(&self) -> usize {
        self.bases.len()
    }

    /// The number of spatial components of the control points.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn is_rational(&self) -> bool {
        self.rational
    }

    /// Number of stored values per control point.
    pub fn stride(&self) -> usize {
        self.dimension + usize::from(self.rational)
    }

    pub fn bases(&self) -> &[BsplineBasis] {
        &self.bases
    }

    pub fn basis(&self, direction: usize) -> Result<&BsplineBasis, SplineError> {
        self.bases
            .get(direction)
            .ok_or(SplineError::DirectionOutOfRange {
                direction,
                param_dim: self.param_dim(),
            })
    }

    /// Raw coefficients, homogeneous if the geometry is rational.
    pub fn coefs(&self) -> &[f64] {
        &self.coefs
    }

    /// Number of coefficients per direction, padded with 1 for unused directions.
    pub fn num_coefs(&self) -> [usize; 3] {
        let mut n = [1; 3];
        for (n, basis) in n.iter_mut().zip(&self.bases) {
            *n = basis.num_coefs();
        }
        n
    }

    /// Order per direction, padded with 1 for unused directions.
    pub fn orders(&self) -> [usize; 3] {
        let mut orders = [1; 3];
        for (order, basis) in orders.iter_mut().zip(&self.bases) {
            *order = basis.order();
        }
        orders
    }

    pub fn num_control_points(&self) -> usize {
        self.coefs.len() / self.stride()
    }

    pub fn weight(&self, index: usize) -> f64 {
        if self.rational {
            self.coefs[self.stride() * index + self.dimension]
        } else {
            1.0
        }
    }

    /// Cartesian coordinates of a control point, padded with zeros to three components.
    pub fn control_point(&self, index: usize) -> [f64; 3] {
        let w = self.weight(index);
        let offset = self.stride() * index;
        let mut x = [0.0; 3];
        for (c, x) in x.iter_mut().take(self.dimension).enumerate() {
            *x = if self.rational {
                self.coefs[offset + c] / w
            } else {
                self.coefs[offset + c]
            };
        }
        x
    }

    /// Moves a control point by the given Cartesian displacement, keeping its weight.
    pub fn translate_control_point(&mut self, index: usize, displacement: &[f64]) {
        let w = self.weight(index);
        let offset = self.stride() * index;
        for (c, u) in displacement.iter().take(self.dimension).enumerate() {
            self.coefs[offset + c] += w * u;
        }
    }

    fn check_direction(&self, direction: usize) -> Result<(), SplineError> {
        self.basis(direction).map(|_| ())
    }

    /// The coefficients arranged as a matrix with one row per coefficient index along the
    /// given direction.
    fn direction_matrix(&self, direction: usize) -> DMatrix<f64> {
        let n = self.num_coefs();
        let stride = self.stride();
        let rows = n[direction];
        let cols = self.coefs.len() / rows;
        let mut matrix = DMatrix::zeros(rows, cols);
        for (index, ijk) in lattice(n).enumerate() {
            let (row, col) = split_index(ijk, n, direction);
            for c in 0..stride {
                matrix[(row, stride * col + c)] = self.coefs[stride * index + c];
            }
        }
        matrix
    }

    fn replace_direction(&mut self, direction: usize, basis: BsplineBasis, matrix: DMatrix<f64>) {
        debug_assert_eq!(basis.num_coefs(), matrix.nrows());
        self.bases[direction] = basis;
        let n = self.num_coefs();
        let stride = self.stride();
        let mut coefs = vec![0.0; stride * n.iter().product::<usize>()];
        for (index, ijk) in lattice(n).enumerate() {
            let (row, col) = split_index(ijk, n, direction);
            for c in 0..stride {
                coefs[stride * index + c] = matrix[(row, stride * col + c)];
            }
        }
        self.coefs = coefs;
    }

    fn transform_direction(
        &mut self,
        direction: usize,
        basis: BsplineBasis,
        transfer: DMatrix<f64>,
    ) {
        let matrix = transfer * self.direction_matrix(direction);
        self.replace_direction(direction, basis, matrix);
    }

    /// Inserts the given knots in one parametric direction.
    pub fn insert_knots(&mut self, direction: usize, knots: &[f64]) -> Result<(), SplineError> {
        let (basis, transfer) = self.basis(direction)?.insert_knots(knots)?;
        self.transform_direction(direction, basis, transfer);
        Ok(())
    }

    /// Inserts `n` equidistant knots inside every knot span of the given direction.
    pub fn uniform_refine(&mut self, direction: usize, n: usize) -> Result<(), SplineError> {
        let knots = self.basis(direction)?.uniform_refinement_knots(n);
        self.insert_knots(direction, &knots)
    }

    /// Raises the order in the given direction by `times`.
    pub fn raise_order(&mut self, direction: usize, times: usize) -> Result<(), SplineError> {
        if times == 0 {
            return self.check_direction(direction);
        }
        let (basis, transfer) = self.basis(direction)?.raise_order(times)?;
        self.transform_direction(direction, basis, transfer);
        Ok(())
    }

    /// Reverses the parametrization in the given direction.
    pub fn reverse(&mut self, direction: usize) -> Result<(), SplineError> {
        let basis = self.basis(direction)?.reversed();
        let matrix = self.direction_matrix(direction);
        let rows = matrix.nrows();
        let reversed = DMatrix::from_fn(rows, matrix.ncols(), |r, c| matrix[(rows - 1 - r, c)]);
        self.replace_direction(direction, basis, reversed);
        Ok(())
    }

    /// Extracts the coefficient block `[start[d], start[d] + count[d])` in every direction as a
    /// new geometry.
    ///
    /// The knot vectors of the block are slices of the parent knot vectors, and coefficients are
    /// copied without any arithmetic, so neighbouring blocks share bit-identical control points.
    pub fn extract(&self, start: &[usize], count: &[usize]) -> Result<SplineGeometry, SplineError> {
        let param_dim = self.param_dim();
        for len in [start.len(), count.len()] {
            if len != param_dim {
                return Err(SplineError::ParameterDimension {
                    expected: param_dim,
                    actual: len,
                });
            }
        }
        let bases = self
            .bases
            .iter()
            .enumerate()
            .map(|(d, basis)| {
                basis
                    .block(start[d], count[d])
                    .map_err(|err| match err {
                        SplineError::ExtractionOutOfBounds {
                            start,
                            count,
                            available,
                            ..
                        } => SplineError::ExtractionOutOfBounds {
                            direction: d,
                            start,
                            count,
                            available,
                        },
                        other => other,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let n = self.num_coefs();
        let stride = self.stride();
        let mut block_start = [0; 3];
        let mut block_count = [1; 3];
        block_start[..param_dim].copy_from_slice(start);
        block_count[..param_dim].copy_from_slice(count);

        let mut coefs = Vec::with_capacity(stride * block_count.iter().product::<usize>());
        for [i, j, k] in lattice(block_count) {
            let index = (block_start[0] + i) + n[0] * ((block_start[1] + j) + n[1] * (block_start[2] + k));
            coefs.extend_from_slice(&self.coefs[stride * index..stride * (index + 1)]);
        }
        SplineGeometry::new(bases, self.dimension, self.rational, coefs)
    }

    /// Evaluates the non-zero basis functions (rational if the geometry is) and their
    /// parametric derivatives at `u`, using the given knot span in each direction.
    pub fn evaluate_basis_in_spans(&self, spans: &[usize], u: &[f64]) -> Result<BasisEvaluation, SplineError> {
        let param_dim = self.param_dim();
        for len in [spans.len(), u.len()] {
            if len != param_dim {
                return Err(SplineError::ParameterDimension {
                    expected: param_dim,
                    actual: len,
                });
            }
        }

        let mut first = [0; 3];
        let mut counts = [1; 3];
        let mut univariate = [(vec![1.0], vec![0.0]), (vec![1.0], vec![0.0]), (vec![1.0], vec![0.0])];
        for (d, basis) in self.bases.iter().enumerate() {
            first[d] = spans[d] - basis.degree();
            counts[d] = basis.order();
            univariate[d] = basis.values_and_derivatives(spans[d], u[d]);
        }

        let [(n1, d1), (n2, d2), (n3, d3)] = &univariate;
        let total = counts.iter().product();
        let mut values = Vec::with_capacity(total);
        let mut derivatives = Vec::with_capacity(total);
        for c in 0..counts[2] {
            for b in 0..counts[1] {
                for a in 0..counts[0] {
                    values.push(n1[a] * n2[b] * n3[c]);
                    derivatives.push([d1[a] * n2[b] * n3[c], n1[a] * d2[b] * n3[c], n1[a] * n2[b] * d3[c]]);
                }
            }
        }

        let mut evaluation = BasisEvaluation {
            first,
            counts,
            values,
            derivatives,
        };
        if self.rational {
            self.apply_weights(&mut evaluation);
        }
        Ok(evaluation)
    }

    /// Evaluates the basis at `u`, locating the knot spans first.
    pub fn evaluate_basis(&self, u: &[f64]) -> Result<BasisEvaluation, SplineError> {
        if u.len() != self.param_dim() {
            return Err(SplineError::ParameterDimension {
                expected: self.param_dim(),
                actual: u.len(),
            });
        }
        let spans: Vec<usize> = self
            .bases
            .iter()
            .zip(u)
            .map(|(basis, &u)| basis.find_span(u))
            .collect();
        self.evaluate_basis_in_spans(&spans, u)
    }

    fn apply_weights(&self, evaluation: &mut BasisEvaluation) {
        let indices = evaluation.control_point_indices(self.num_coefs());
        let weights: Vec<f64> = indices.iter().map(|&i| self.weight(i)).collect();
        let w: f64 = evaluation
            .values
            .iter()
            .zip(&weights)
            .map(|(n, w)| n * w)
            .sum();
        let mut dw = [0.0; 3];
        for (dn, weight) in evaluation.derivatives.iter().zip(&weights) {
            for k in 0..3 {
                dw[k] += dn[k] * weight;
            }
        }
        for ((n, dn), weight) in evaluation
            .values
            .iter_mut()
            .zip(evaluation.derivatives.iter_mut())
            .zip(&weights)
        {
            let r = *n * weight / w;
            for k in 0..3 {
                dn[k] = (dn[k] * weight - r * dw[k]) / w;
            }
            *n = r;
        }
    }

    /// Evaluates the geometry at the parameter point `u`.
    pub fn evaluate(&self, u: &[f64]) -> Result<[f64; 3], SplineError> {
        let evaluation = self.evaluate_basis(u)?;
        let indices = evaluation.control_point_indices(self.num_coefs());
        let mut x = [0.0; 3];
        for (value, index) in evaluation.values.iter().zip(indices) {
            let point = self.control_point(index);
            for k in 0..3 {
                x[k] += value * point[k];
            }
        }
        Ok(x)
    }
}

/// All multi-indices of a `[n1, n2, n3]` lattice with the first index varying fastest.
pub fn lattice(n: [usize; 3]) -> impl Iterator<Item = [usize; 3]> {
    (0..n[2]).flat_map(move |k| (0..n[1]).flat_map(move |j| (0..n[0]).map(move |i| [i, j, k])))
}

/// Splits a multi-index into the index along `direction` and the linear index of the
/// remaining two directions.
fn split_index(ijk: [usize; 3], n: [usize; 3], direction: usize) -> (usize, usize) {
    let (a, b) = match direction {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    };
    (ijk[direction], ijk[a] + n[a] * ijk[b])
}
