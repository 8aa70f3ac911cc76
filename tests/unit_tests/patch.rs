use crate::unit_tests::{trilinear_box, unit_square};
use fenris_iga::error::{IntegrationError, ModelError};
use fenris_iga::numbering::{BlockNodes, NodeCounter};
use fenris_iga::topology::Boundary;
use fenris_iga::Patch;
use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{Matrix2, Vector3};

#[test]
fn fem_topology_of_a_refined_square() {
    let patch = unit_square(2, 3, [1, 0]);
    assert_eq!(patch.param_dim(), 2);
    assert_eq!(patch.spatial_dim(), 2);
    assert_eq!(patch.order(), [3, 2, 1]);
    assert_eq!(patch.node_counts(), [4, 4, 1]);
    assert_eq!(patch.element_counts(), [2, 3, 1]);
    assert_eq!(patch.num_nodes(), 16);
    assert_eq!(patch.num_elements(), 6);
    assert!(!patch.is_numbered());
    assert!(patch.global_nodes().is_empty());

    // Element (1, 2) starts at node (1, 2)
    assert_eq!(
        patch.local_element_nodes(5),
        Some(&[9, 10, 11, 13, 14, 15][..])
    );
    assert_eq!(patch.element_nodes(5), patch.local_element_nodes(5));
    assert_eq!(patch.local_element_nodes(6), None);
}

#[test]
fn coordinates_and_evaluation() {
    let patch = unit_square(2, 2, [0, 0]);
    assert_eq!(patch.coord(4), Some(Vector3::new(0.5, 0.5, 0.0)));
    assert_eq!(patch.coord(9), None);
    assert_eq!(patch.nodal_coordinates().len(), 9);
    assert_eq!(
        patch.element_coordinates(3).unwrap()[3],
        Vector3::new(1.0, 1.0, 0.0)
    );

    let x = patch.eval_point(&[0.25, 0.75]).unwrap();
    assert_matrix_eq!(x, Vector3::new(0.25, 0.75, 0.0), comp = abs, tol = 1e-14);
    assert_eq!(
        patch.eval_point(&[0.5]),
        Err(ModelError::DimensionMismatch { expected: 2, actual: 1 })
    );
}

#[test]
fn update_coords_translates_control_points() {
    let mut patch = unit_square(1, 1, [0, 0]);
    assert_eq!(
        patch.update_coords(&[0.0; 4]),
        Err(ModelError::DimensionMismatch { expected: 8, actual: 4 })
    );
    patch
        .update_coords(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0])
        .unwrap();
    assert_eq!(patch.coord(3), Some(Vector3::new(2.0, 2.0, 0.0)));
    assert_matrix_eq!(
        patch.eval_point(&[1.0, 1.0]).unwrap(),
        Vector3::new(2.0, 2.0, 0.0),
        comp = abs,
        tol = 1e-14
    );
}

#[test]
fn left_handed_volume_is_flipped() {
    let right = trilinear_box([1.0, 2.0, 3.0], false);
    assert!(!right.is_swapped());

    let left = trilinear_box([1.0, 2.0, 3.0], true);
    assert!(left.is_swapped());
    // The third direction is reversed, so the first node is at z = 3
    assert_eq!(left.coord(0), Some(Vector3::new(0.0, 0.0, 3.0)));
    let data = left.element_data(0, [2, 2, 2], None).unwrap();
    assert_scalar_eq!(data.measure(), 6.0, comp = abs, tol = 1e-12);
}

#[test]
fn refinement_discards_numbering_and_groups() {
    let mut patch = unit_square(2, 2, [0, 0]);
    let mut counter = NodeCounter::default();
    patch.assign_node_numbers(BlockNodes::unassigned(9), &mut counter);
    patch.generate_thread_groups();
    assert!(patch.is_numbered());
    assert!(patch.thread_groups().is_some());

    patch.uniform_refine(0, 1).unwrap();
    assert!(!patch.is_numbered());
    assert!(patch.thread_groups().is_none());
    assert_eq!(patch.element_counts(), [4, 2, 1]);

    patch.refine(1, &[0.25]).unwrap();
    assert_eq!(patch.element_counts(), [4, 3, 1]);
    patch.raise_order([1, 0, 0]).unwrap();
    assert_eq!(patch.node_counts(), [9, 4, 1]);
    assert_matrix_eq!(
        patch.eval_point(&[0.3, 0.6]).unwrap(),
        Vector3::new(0.3, 0.6, 0.0),
        comp = abs,
        tol = 1e-13
    );
}

#[test]
fn periodic_closure_requires_an_existing_direction() {
    let mut patch = unit_square(2, 2, [0, 0]);
    assert!(patch.close_periodic(2).is_err());
    patch.close_periodic(1).unwrap();
    assert_eq!(patch.periodic(), [false, true, false]);
}

#[test]
fn clearing_drops_the_geometry() {
    let mut patch = unit_square(2, 2, [0, 0]);
    patch.clear(true);
    assert_eq!(patch.num_elements(), 4);

    patch.clear(false);
    assert!(patch.geometry().is_none());
    assert_eq!(patch.num_nodes(), 0);
    assert_eq!(patch.num_elements(), 0);
    assert_eq!(patch.param_dim(), 0);
    assert_eq!(patch.to_g2(), Err(ModelError::MissingGeometry { patch: 0 }));
}

#[test]
fn g2_round_trip_preserves_the_patch() {
    let patch = unit_square(3, 2, [1, 1]);
    let copy = Patch::read(&patch.to_g2().unwrap()).unwrap();
    assert_eq!(copy.node_counts(), patch.node_counts());
    assert_eq!(copy.element_counts(), patch.element_counts());
    assert_eq!(copy.geometry(), patch.geometry());
    assert!(Patch::read("").is_err());
}

#[test]
fn boundary_elements_and_nodes() {
    let mut patch = unit_square(3, 2, [0, 0]);
    assert_eq!(patch.boundary_elements(2), Some(vec![2, 5]));
    assert_eq!(patch.boundary_elements(3), Some(vec![0, 1, 2]));
    assert_eq!(patch.boundary_elements(5), None);
    assert_eq!(patch.num_boundary_elements(4), 3);
    assert_eq!(patch.num_boundary_elements(7), 0);

    assert_eq!(patch.boundary_nodes(2, 1).unwrap(), vec![3, 7, 11]);
    assert_eq!(patch.boundary_nodes(4, 0).unwrap(), vec![11]);
    assert_eq!(
        patch.boundary_nodes(5, 1),
        Err(ModelError::InvalidEntity {
            patch: 0,
            index: 5,
            dim: 1
        })
    );

    let mut counter = NodeCounter::default();
    counter.next();
    patch.assign_node_numbers(BlockNodes::unassigned(12), &mut counter);
    assert_eq!(patch.boundary_nodes(2, 1).unwrap(), vec![4, 8, 12]);
}

#[test]
fn interior_element_data() {
    let patch = unit_square(2, 2, [0, 0]);
    let data = patch.element_data(3, [2, 2, 1], None).unwrap();
    assert_eq!(data.index, 3);
    assert_eq!(data.nodes, vec![4, 5, 7, 8]);
    assert_eq!(data.points.len(), 4);
    assert_scalar_eq!(data.measure(), 0.25, comp = abs, tol = 1e-14);

    let coords = patch.element_coordinates(3).unwrap();
    for point in &data.points {
        assert!(point.normal.is_none());
        assert!(point.x[0] > 0.5 && point.x[1] > 0.5);
        assert_scalar_eq!(point.basis.sum(), 1.0, comp = abs, tol = 1e-14);

        // Linear functions are reproduced exactly: sum_a x_a (grad N_a)^T = I
        let mut identity = Matrix2::zeros();
        for (a, x) in coords.iter().enumerate() {
            for i in 0..2 {
                for j in 0..2 {
                    identity[(i, j)] += x[i] * point.gradients[(a, j)];
                }
            }
        }
        assert_matrix_eq!(identity, Matrix2::identity(), comp = abs, tol = 1e-12);
    }
}

#[test]
fn boundary_element_data() {
    let patch = unit_square(2, 2, [1, 1]);
    let boundary = Boundary::from_index(2, 2).unwrap();
    let data = patch.element_data(1, [3, 3, 1], Some(boundary)).unwrap();
    assert_eq!(data.points.len(), 3);
    assert_scalar_eq!(data.measure(), 0.5, comp = abs, tol = 1e-12);
    for point in &data.points {
        assert_scalar_eq!(point.x[0], 1.0, comp = abs, tol = 1e-12);
        assert_eq!(point.parameters[0], 1.0);
        let normal = point.normal.unwrap();
        assert_matrix_eq!(normal, Vector3::new(1.0, 0.0, 0.0), comp = abs, tol = 1e-12);
    }
}

#[test]
fn element_data_for_missing_elements() {
    let patch = unit_square(1, 1, [0, 0]);
    assert!(matches!(
        patch.element_data(1, [2, 2, 1], None),
        Err(IntegrationError::ElementOutOfRange { element: 1 })
    ));

    let mut empty = patch.clone();
    empty.clear(false);
    assert!(matches!(
        empty.element_data(0, [2, 2, 1], None),
        Err(IntegrationError::MissingGeometry { patch: 0 })
    ));
}
