use crate::unit_tests::{unit_square, Measure, UnitSource};
use fenris_iga::element::ElementData;
use fenris_iga::error::IntegrationError;
use fenris_iga::integrate::{Integrand, IntegrationMode, ScalarIntegral, TimeDomain, VectorIntegral};
use fenris_iga::Patch;
use matrixcompare::assert_scalar_eq;
use nalgebra::DVector;

const MODES: [IntegrationMode; 2] = [IntegrationMode::Sequential, IntegrationMode::Parallel];

fn grouped_square(n: usize, raise: usize) -> Patch {
    let mut patch = unit_square(n, n, [raise, raise]);
    patch.generate_thread_groups();
    patch
}

/// Fails on a single element.
struct FailOn(usize);

impl Integrand for FailOn {
    type Output = f64;

    fn evaluate(&self, element: &ElementData, _time: &TimeDomain) -> eyre::Result<f64> {
        if element.index == self.0 {
            eyre::bail!("element {} is broken", element.index);
        }
        Ok(element.measure())
    }
}

/// Integrates `x . n` over boundaries, which equals the dimension times the enclosed area.
struct Flux;

impl Integrand for Flux {
    type Output = f64;

    fn evaluate(&self, _element: &ElementData, _time: &TimeDomain) -> eyre::Result<f64> {
        eyre::bail!("only defined on boundaries")
    }

    fn evaluate_boundary(&self, element: &ElementData, _time: &TimeDomain) -> eyre::Result<f64> {
        let mut flux = 0.0;
        for point in &element.points {
            let normal = point.normal.ok_or_else(|| eyre::eyre!("missing normal"))?;
            flux += point.weight * point.x.dot(&normal);
        }
        Ok(flux)
    }
}

/// A vector with two components per node: the basis function and twice the basis function.
struct TwoComponents;

impl Integrand for TwoComponents {
    type Output = DVector<f64>;

    fn quadrature_points(&self, order: usize) -> usize {
        order + 1
    }

    fn evaluate(&self, element: &ElementData, _time: &TimeDomain) -> eyre::Result<DVector<f64>> {
        let mut local = DVector::zeros(2 * element.nodes.len());
        for point in &element.points {
            for (a, value) in point.basis.iter().enumerate() {
                local[2 * a] += point.weight * value;
                local[2 * a + 1] += 2.0 * point.weight * value;
            }
        }
        Ok(local)
    }
}

/// One Gauss point per direction regardless of the order.
struct MidpointMeasure;

impl Integrand for MidpointMeasure {
    type Output = f64;

    fn quadrature_points(&self, _order: usize) -> usize {
        1
    }

    fn evaluate(&self, element: &ElementData, _time: &TimeDomain) -> eyre::Result<f64> {
        assert_eq!(element.points.len(), 1);
        Ok(element.measure())
    }
}

#[test]
fn time_domain_advances() {
    let mut time = TimeDomain::default();
    assert!(time.first);
    time.advance(0.1);
    time.advance(0.2);
    assert_scalar_eq!(time.t, 0.3, comp = abs, tol = 1e-15);
    assert_eq!(time.dt, 0.2);
    assert_eq!(time.dt_prev, 0.1);
    assert!(!time.first);
    assert_eq!(IntegrationMode::default(), IntegrationMode::Parallel);
}

#[test]
fn integration_requires_thread_groups() {
    let patch = unit_square(2, 2, [0, 0]);
    let mut area = ScalarIntegral::default();
    let result = patch.integrate(&Measure, &mut area, &TimeDomain::default(), IntegrationMode::Sequential);
    assert!(matches!(result, Err(IntegrationError::StaleThreadGroups { .. })));
}

#[test]
fn area_is_independent_of_the_mode() {
    let patch = grouped_square(4, 1);
    let mut results = Vec::new();
    for mode in MODES {
        let mut area = ScalarIntegral::default();
        patch.integrate(&Measure, &mut area, &TimeDomain::default(), mode).unwrap();
        assert_scalar_eq!(area.value, 1.0, comp = abs, tol = 1e-13);
        results.push(area.value);
    }
    // Partial results are merged in group order in both modes
    assert_eq!(results[0], results[1]);
}

#[test]
fn quadrature_points_follow_the_integrand() {
    let patch = grouped_square(3, 1);
    let mut area = ScalarIntegral::default();
    patch
        .integrate(&MidpointMeasure, &mut area, &TimeDomain::default(), IntegrationMode::Parallel)
        .unwrap();
    assert_scalar_eq!(area.value, 1.0, comp = abs, tol = 1e-13);
}

#[test]
fn load_vector_sums_to_the_area() {
    let patch = grouped_square(3, 0);
    for mode in MODES {
        let mut load = VectorIntegral::zeros(patch.num_nodes(), 1);
        patch.integrate(&UnitSource, &mut load, &TimeDomain::default(), mode).unwrap();
        assert_eq!(load.components(), 1);
        assert_scalar_eq!(load.values().sum(), 1.0, comp = abs, tol = 1e-13);
        // Corner nodes touch a single element of area 1/9 and get a quarter of it
        assert_scalar_eq!(load.values()[0], 1.0 / 36.0, comp = abs, tol = 1e-14);
    }
}

#[test]
fn vector_components_are_interleaved() {
    let patch = grouped_square(2, 1);
    let mut load = VectorIntegral::zeros(patch.num_nodes(), 2);
    patch
        .integrate(&TwoComponents, &mut load, &TimeDomain::default(), IntegrationMode::Parallel)
        .unwrap();
    let values = load.into_values();
    assert_eq!(values.len(), 2 * patch.num_nodes());
    for node in 0..patch.num_nodes() {
        assert_scalar_eq!(values[2 * node + 1], 2.0 * values[2 * node], comp = abs, tol = 1e-14);
    }
}

#[test]
fn failing_integrand_aborts_integration() {
    let patch = grouped_square(4, 0);
    for mode in MODES {
        let mut area = ScalarIntegral::default();
        let result = patch.integrate(&FailOn(5), &mut area, &TimeDomain::default(), mode);
        match result {
            Err(IntegrationError::Integrand { element, source }) => {
                assert_eq!(element, 5);
                assert_eq!(source.to_string(), "element 5 is broken");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert_eq!(area.value, 0.0);
    }
}

#[test]
fn boundary_integration() {
    let patch = grouped_square(3, 1);
    let time = TimeDomain::default();

    let mut length = ScalarIntegral::default();
    patch
        .integrate_boundary(3, &Measure, &mut length, &time, IntegrationMode::Sequential)
        .unwrap();
    assert_scalar_eq!(length.value, 1.0, comp = abs, tol = 1e-13);

    let mut flux = ScalarIntegral::default();
    for index in 1..=4 {
        patch
            .integrate_boundary(index, &Flux, &mut flux, &time, IntegrationMode::Parallel)
            .unwrap();
    }
    assert_scalar_eq!(flux.value, 2.0, comp = abs, tol = 1e-12);

    let result = patch.integrate_boundary(5, &Measure, &mut length, &time, IntegrationMode::Sequential);
    assert!(matches!(result, Err(IntegrationError::InvalidBoundary { index: 5 })));
}
