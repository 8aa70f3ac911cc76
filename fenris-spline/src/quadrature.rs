//! Gauss-Legendre quadrature for knot spans.
use fenris_quadrature::univariate;

/// A univariate quadrature rule on the reference interval `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussRule {
    pub points: Vec<f64>,
    pub weights: Vec<f64>,
}

impl GaussRule {
    /// The `n`-point Gauss-Legendre rule, exact for polynomials of degree `2n - 1`.
    ///
    /// # Panics
    ///
    /// Panics if zero points are requested.
    pub fn new(n: usize) -> Self {
        let (weights, points) = univariate::gauss(n);
        Self {
            points: points.into_iter().map(|[x]| x).collect(),
            weights,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points and weights mapped to the interval `[a, b]`.
    pub fn mapped(&self, a: f64, b: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        let half = 0.5 * (b - a);
        let mid = 0.5 * (a + b);
        self.points
            .iter()
            .zip(&self.weights)
            .map(move |(&xi, &w)| (mid + half * xi, half * w))
    }
}
