//! Group-wise integration over patch elements.
//!
//! An [`Integrand`] is evaluated once per element and its output is accumulated into a
//! [`GlobalIntegral`]. Elements are visited group by group, where the groups come from the
//! thread partitioner. Every group accumulates into its own partial result, and the partial
//! results are merged into the global integral in group order once all groups have finished.
//! The merge order is therefore independent of the scheduling of the groups.
use crate::element::ElementData;
use crate::error::IntegrationError;
use crate::partition::ElementGroups;
use nalgebra::DVector;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Time level parameters passed to integrands.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TimeDomain {
    pub t: f64,
    pub dt: f64,
    pub dt_prev: f64,
    /// Iteration counter within the current time step.
    pub iteration: usize,
    /// Whether this is the first time step.
    pub first: bool,
}

impl Default for TimeDomain {
    fn default() -> Self {
        Self {
            t: 0.0,
            dt: 0.0,
            dt_prev: 0.0,
            iteration: 0,
            first: true,
        }
    }
}

impl TimeDomain {
    /// Advances to the next time step of size `dt`.
    pub fn advance(&mut self, dt: f64) {
        self.dt_prev = self.dt;
        self.dt = dt;
        self.t += dt;
        self.iteration = 0;
        self.first = false;
    }
}

/// Whether element groups are processed one after another or distributed over the rayon
/// thread pool.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum IntegrationMode {
    Sequential,
    #[default]
    Parallel,
}

/// The physics evaluated on every element.
pub trait Integrand: Sync {
    type Output: Send;

    /// Number of Gauss points per direction for a basis of the given order.
    fn quadrature_points(&self, order: usize) -> usize {
        order
    }

    fn evaluate(&self, element: &ElementData, time: &TimeDomain) -> eyre::Result<Self::Output>;

    /// Evaluation on boundary elements. The quadrature points of `element` lie on the boundary,
    /// and their weights include the boundary measure.
    fn evaluate_boundary(&self, element: &ElementData, time: &TimeDomain) -> eyre::Result<Self::Output> {
        self.evaluate(element, time)
    }
}

/// A global quantity assembled from per-element contributions of type `Local`.
pub trait GlobalIntegral<Local> {
    /// Accumulator owned by a single element group.
    type Partial: Send;

    /// A fresh, empty partial result.
    fn partial(&self) -> Self::Partial;

    fn accumulate(&self, partial: &mut Self::Partial, element: &ElementData, local: Local);

    fn merge(&mut self, partial: Self::Partial);
}

/// Evaluates all groups into one partial result per group, in group order, without touching
/// `global`.
///
/// Integration stops at the first failing element. Groups that have not started when the
/// failure is observed are skipped.
pub(crate) fn group_partials<Local, G, F>(
    groups: &ElementGroups,
    mode: IntegrationMode,
    global: &G,
    evaluate: F,
) -> Result<Vec<G::Partial>, IntegrationError>
where
    Local: Send,
    G: GlobalIntegral<Local> + Sync,
    F: Fn(usize) -> Result<(ElementData, Local), IntegrationError> + Sync,
{
    let partials: Vec<G::Partial> = groups.iter().map(|_| global.partial()).collect();
    let failed = AtomicBool::new(false);

    let run_group = |(group, mut partial): (&[usize], G::Partial)| {
        if failed.load(Ordering::Relaxed) {
            return Ok(None);
        }
        for &element in group {
            match evaluate(element) {
                Ok((data, local)) => global.accumulate(&mut partial, &data, local),
                Err(err) => {
                    failed.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }
        Ok(Some(partial))
    };

    let group_slices: Vec<&[usize]> = groups.iter().collect();
    let results: Vec<Result<Option<G::Partial>, IntegrationError>> = match mode {
        IntegrationMode::Sequential => group_slices.into_iter().zip(partials).map(run_group).collect(),
        IntegrationMode::Parallel => group_slices
            .into_par_iter()
            .zip(partials.into_par_iter())
            .map(run_group)
            .collect(),
    };

    // A skipped group implies that some other group failed, so the error is always reported
    let mut finished = Vec::with_capacity(results.len());
    for result in results {
        if let Some(partial) = result? {
            finished.push(partial);
        }
    }
    Ok(finished)
}

/// Merges partial results into `global` in the given order.
pub(crate) fn merge_partials<Local, G>(global: &mut G, partials: Vec<G::Partial>)
where
    G: GlobalIntegral<Local>,
{
    for partial in partials {
        global.merge(partial);
    }
}

/// Sum of scalar element contributions.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct ScalarIntegral {
    pub value: f64,
}

impl GlobalIntegral<f64> for ScalarIntegral {
    type Partial = f64;

    fn partial(&self) -> f64 {
        0.0
    }

    fn accumulate(&self, partial: &mut f64, _element: &ElementData, local: f64) {
        *partial += local;
    }

    fn merge(&mut self, partial: f64) {
        self.value += partial;
    }
}

/// A global vector with `components` entries per node, assembled from element vectors.
///
/// Element vectors are ordered node by node with the components of a node stored
/// contiguously, and are scattered according to the node numbers of the element.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIntegral {
    components: usize,
    values: DVector<f64>,
}

impl VectorIntegral {
    pub fn zeros(num_nodes: usize, components: usize) -> Self {
        Self {
            components,
            values: DVector::zeros(num_nodes * components),
        }
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    pub fn into_values(self) -> DVector<f64> {
        self.values
    }
}

impl GlobalIntegral<DVector<f64>> for VectorIntegral {
    type Partial = Vec<(usize, f64)>;

    fn partial(&self) -> Self::Partial {
        Vec::new()
    }

    fn accumulate(&self, partial: &mut Self::Partial, element: &ElementData, local: DVector<f64>) {
        let c = self.components;
        debug_assert_eq!(local.len(), c * element.nodes.len());
        for (a, &node) in element.nodes.iter().enumerate() {
            for k in 0..c {
                partial.push((c * node + k, local[c * a + k]));
            }
        }
    }

    fn merge(&mut self, partial: Self::Partial) {
        for (index, value) in partial {
            self.values[index] += value;
        }
    }
}
