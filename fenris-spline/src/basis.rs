//! Univariate B-spline bases.
//!
//! Algorithm numbers refer to Piegl & Tiller, *The NURBS Book* (2nd ed.).
use crate::SplineError;
use itertools::Itertools;
use nalgebra::DMatrix;

/// A univariate B-spline basis defined by a non-decreasing knot vector and an order.
///
/// The order is the polynomial degree plus one. A basis with `n` functions has `n + order`
/// knots and the parametric domain `[t_{p}, t_{n}]`, where `p` is the degree. The knot vector
/// does not need to be clamped (open), which is the case for bases extracted from the interior
/// of a larger basis.
#[derive(Debug, Clone, PartialEq)]
pub struct BsplineBasis {
    knots: Vec<f64>,
    order: usize,
}

impl BsplineBasis {
    pub fn new(knots: Vec<f64>, order: usize) -> Result<Self, SplineError> {
        if order == 0 {
            return Err(SplineError::InvalidOrder { order });
        }
        if knots.len() < 2 * order {
            return Err(SplineError::InvalidKnotVector {
                reason: format!("{} knots is too few for order {order}", knots.len()),
            });
        }
        // The negated comparison also rejects NaN
        if knots.iter().tuple_windows().any(|(a, b)| !(a <= b)) {
            return Err(SplineError::InvalidKnotVector {
                reason: "knots must be non-decreasing".to_string(),
            });
        }
        let n = knots.len() - order;
        if !(knots[order - 1] < knots[n]) {
            return Err(SplineError::InvalidKnotVector {
                reason: "empty parametric domain".to_string(),
            });
        }
        Ok(Self { knots, order })
    }

    /// A clamped basis with `num_spans` uniform knot spans on `[start, end]`.
    pub fn uniform(order: usize, num_spans: usize, start: f64, end: f64) -> Result<Self, SplineError> {
        if num_spans == 0 {
            return Err(SplineError::InvalidKnotVector {
                reason: "at least one knot span is required".to_string(),
            });
        }
        let h = (end - start) / num_spans as f64;
        let interior = (1..num_spans).map(|i| start + h * i as f64);
        let knots = std::iter::repeat(start)
            .take(order)
            .chain(interior)
            .chain(std::iter::repeat(end).take(order))
            .collect();
        Self::new(knots, order)
    }

    pub fn knots(&self) -> &[f64] {
        &self.knots
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn degree(&self) -> usize {
        self.order - 1
    }

    pub fn num_coefs(&self) -> usize {
        self.knots.len() - self.order
    }

    pub fn start(&self) -> f64 {
        self.knots[self.degree()]
    }

    pub fn end(&self) -> f64 {
        self.knots[self.num_coefs()]
    }

    /// Indices `s` of the non-empty knot spans `[t_s, t_{s+1})` inside the parametric domain.
    pub fn spans(&self) -> Vec<usize> {
        (self.degree()..self.num_coefs())
            .filter(|&s| self.knots[s] < self.knots[s + 1])
            .collect()
    }

    /// The number of non-empty knot spans, i.e. the number of elements.
    pub fn num_elements(&self) -> usize {
        self.spans().len()
    }

    /// Distinct knot values with their multiplicities, in increasing order.
    pub fn distinct_knots(&self) -> Vec<(f64, usize)> {
        self.knots
            .iter()
            .dedup_with_count()
            .map(|(count, &value)| (value, count))
            .collect()
    }

    /// Finds the non-empty knot span containing `u` (Algorithm A2.1).
    ///
    /// Parameters outside the domain are clamped to the first or last non-empty span.
    pub fn find_span(&self, u: f64) -> usize {
        let p = self.degree();
        let n = self.num_coefs();
        let t = &self.knots;
        if u >= t[n] {
            let mut s = n - 1;
            while t[s] == t[s + 1] {
                s -= 1;
            }
            return s;
        }
        if u <= t[p] {
            let mut s = p;
            while t[s] == t[s + 1] {
                s += 1;
            }
            return s;
        }

        // Invariant: t[low] <= u < t[high]
        let mut low = p;
        let mut high = n;
        while high - low > 1 {
            let mid = (low + high) / 2;
            if u < t[mid] {
                high = mid;
            } else {
                low = mid;
            }
        }
        low
    }

    /// The `order` non-zero basis functions on the given span, evaluated at `u`.
    ///
    /// Returns values of `N_{span - p}, ..., N_{span}` (Algorithm A2.2).
    pub fn values(&self, span: usize, u: f64) -> Vec<f64> {
        values_of_degree(&self.knots, span, u, self.degree())
    }

    /// Values and first derivatives of the non-zero basis functions on the given span.
    pub fn values_and_derivatives(&self, span: usize, u: f64) -> (Vec<f64>, Vec<f64>) {
        let p = self.degree();
        let values = self.values(span, u);
        if p == 0 {
            return (values, vec![0.0]);
        }

        // dN_{i,p} = p / (t_{i+p} - t_i) N_{i,p-1} - p / (t_{i+p+1} - t_{i+1}) N_{i+1,p-1}
        let lower = values_of_degree(&self.knots, span, u, p - 1);
        let t = &self.knots;
        let scaled = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
        let derivatives = (0..=p)
            .map(|j| {
                let i = span - p + j;
                let left = if j > 0 {
                    scaled(p as f64 * lower[j - 1], t[i + p] - t[i])
                } else {
                    0.0
                };
                let right = if j < p {
                    scaled(p as f64 * lower[j], t[i + p + 1] - t[i + 1])
                } else {
                    0.0
                };
                left - right
            })
            .collect();
        (values, derivatives)
    }

    /// Values of all `num_coefs` basis functions at `u`.
    pub fn all_values(&self, u: f64) -> Vec<f64> {
        let span = self.find_span(u);
        let mut all = vec![0.0; self.num_coefs()];
        for (j, value) in self.values(span, u).into_iter().enumerate() {
            all[span - self.degree() + j] = value;
        }
        all
    }

    /// Inserts a single knot (Algorithm A5.1).
    ///
    /// Returns the refined basis together with the matrix `T` such that the coefficients of the
    /// refined basis are `T * c` for coefficients `c` of this basis.
    pub fn insert_knot(&self, knot: f64) -> Result<(BsplineBasis, DMatrix<f64>), SplineError> {
        if !(self.start() < knot && knot < self.end()) {
            return Err(SplineError::KnotOutsideDomain { knot });
        }
        let p = self.degree();
        let n = self.num_coefs();
        let t = &self.knots;
        // Last index with t[k] <= knot, which lies in [p, n - 1] since knot is interior
        let k = t.partition_point(|&x| x <= knot) - 1;

        let mut transfer = DMatrix::zeros(n + 1, n);
        for i in 0..=n {
            if i + p <= k {
                transfer[(i, i)] = 1.0;
            } else if i <= k {
                let den = t[i + p] - t[i];
                let alpha = if den > 0.0 { (knot - t[i]) / den } else { 0.0 };
                transfer[(i, i)] = alpha;
                transfer[(i, i - 1)] = 1.0 - alpha;
            } else {
                transfer[(i, i - 1)] = 1.0;
            }
        }

        let mut knots = self.knots.clone();
        knots.insert(k + 1, knot);
        Ok((BsplineBasis::new(knots, self.order)?, transfer))
    }

    /// Inserts the given knots one at a time, composing the transfer matrices.
    pub fn insert_knots(&self, knots: &[f64]) -> Result<(BsplineBasis, DMatrix<f64>), SplineError> {
        let mut basis = self.clone();
        let mut transfer = DMatrix::identity(self.num_coefs(), self.num_coefs());
        for &knot in knots {
            let (refined, step) = basis.insert_knot(knot)?;
            transfer = step * transfer;
            basis = refined;
        }
        Ok((basis, transfer))
    }

    /// The knots inserted by a uniform refinement: `n` equidistant knots inside every element.
    pub fn uniform_refinement_knots(&self, n: usize) -> Vec<f64> {
        let spans = self.spans();
        let mut knots = Vec::with_capacity(n * spans.len());
        for s in spans {
            let (a, b) = (self.knots[s], self.knots[s + 1]);
            let h = (b - a) / (n + 1) as f64;
            knots.extend((1..=n).map(|i| a + h * i as f64));
        }
        knots
    }

    /// Raises the order by `times`, keeping the continuity at every knot.
    ///
    /// The multiplicity of every distinct knot is increased by `times`. The coefficients of the
    /// elevated basis are found by collocation: both bases are sampled at `order + times`
    /// points inside every element and the resulting (overdetermined, but consistent) system is
    /// solved in the least-squares sense. Since the original space is contained in the elevated
    /// space, the solution reproduces the original functions exactly up to round-off.
    pub fn raise_order(&self, times: usize) -> Result<(BsplineBasis, DMatrix<f64>), SplineError> {
        if times == 0 {
            let n = self.num_coefs();
            return Ok((self.clone(), DMatrix::identity(n, n)));
        }
        let order = self.order + times;
        let knots = self
            .distinct_knots()
            .into_iter()
            .flat_map(|(value, mult)| std::iter::repeat(value).take(mult + times))
            .collect();
        let elevated = BsplineBasis::new(knots, order)?;

        let samples: Vec<f64> = self
            .spans()
            .into_iter()
            .flat_map(|s| {
                let (a, b) = (self.knots[s], self.knots[s + 1]);
                (1..=order).map(move |i| a + (b - a) * i as f64 / (order + 1) as f64)
            })
            .collect();

        let old_values = collocation_matrix(self, &samples);
        let new_values = collocation_matrix(&elevated, &samples);

        let transfer = new_values
            .clone()
            .svd(true, true)
            .solve(&old_values, 1e-13)
            .map_err(|_| SplineError::ElevationFailed { residual: f64::NAN })?;
        let residual = (&new_values * &transfer - &old_values).amax();
        if !(residual < 1e-10) {
            return Err(SplineError::ElevationFailed { residual });
        }
        Ok((elevated, transfer))
    }

    /// The basis with the parametric direction reversed, `u -> start + end - u`.
    pub fn reversed(&self) -> BsplineBasis {
        let (a, b) = (self.start(), self.end());
        let knots = self.knots.iter().rev().map(|&t| a + b - t).collect();
        BsplineBasis {
            knots,
            order: self.order,
        }
    }

    /// The basis of the coefficient block `[start, start + count)`.
    ///
    /// The knot vector of the block is the slice of this knot vector beginning at `start`, so
    /// the block reproduces the parent functions over its own domain.
    pub fn block(&self, start: usize, count: usize) -> Result<BsplineBasis, SplineError> {
        if count < self.order || start + count > self.num_coefs() {
            return Err(SplineError::ExtractionOutOfBounds {
                direction: 0,
                start,
                count,
                available: self.num_coefs(),
            });
        }
        let knots = self.knots[start..start + count + self.order].to_vec();
        BsplineBasis::new(knots, self.order)
    }
}

fn collocation_matrix(basis: &BsplineBasis, samples: &[f64]) -> DMatrix<f64> {
    let mut output = DMatrix::zeros(samples.len(), basis.num_coefs());
    for (r, &u) in samples.iter().enumerate() {
        let span = basis.find_span(u);
        for (j, value) in basis.values(span, u).into_iter().enumerate() {
            output[(r, span - basis.degree() + j)] = value;
        }
    }
    output
}

/// Cox-de Boor triangle for the `degree + 1` functions of the given degree that are non-zero on
/// `span`. The knot vector may belong to a basis of higher degree.
fn values_of_degree(knots: &[f64], span: usize, u: f64, degree: usize) -> Vec<f64> {
    let mut values = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    values[0] = 1.0;
    for j in 1..=degree {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = values[r] / (right[r + 1] + left[j - r]);
            values[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        values[j] = saved;
    }
    values
}
