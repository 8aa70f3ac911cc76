use crate::integration_tests::{assert_groups_are_valid, measure, numbered_model, Measure};
use fenris_iga::error::ModelError;
use fenris_iga::generator::{GeneratorSettings, MultiPatchModelGenerator2D};
use fenris_iga::integrate::{IntegrationMode, ScalarIntegral, TimeDomain};
use fenris_iga::topology::{Connection, TopItem};
use fenris_iga::Model;
use matrixcompare::assert_scalar_eq;
use std::collections::BTreeSet;

fn all_global_nodes(model: &Model) -> BTreeSet<usize> {
    model
        .patches()
        .iter()
        .flat_map(|patch| patch.global_nodes().iter().copied())
        .collect()
}

#[test]
fn two_segments_share_one_vertex() {
    let model = numbered_model::<1>(GeneratorSettings {
        lx: 2.0,
        nx: 2,
        ..GeneratorSettings::default()
    });

    assert_eq!(model.num_patches(), 2);
    assert_eq!(model.connections(), &[Connection::new(1, 2, 2, 1, 0)]);
    let boundary: Vec<TopItem> = model.topology().get("Boundary").unwrap().iter().copied().collect();
    assert_eq!(boundary, vec![TopItem::new(1, 1, 0), TopItem::new(2, 2, 0)]);

    assert_eq!(model.num_global_nodes(), 3);
    assert_eq!(model.patch(1).unwrap().global_nodes(), &[0, 1]);
    assert_eq!(model.patch(2).unwrap().global_nodes(), &[1, 2]);
    assert_eq!(model.topology_set_nodes("Boundary").unwrap(), BTreeSet::from([0, 2]));
    assert_scalar_eq!(measure(&model, IntegrationMode::Parallel), 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn rectangles_are_tiled_and_glued() {
    let model = numbered_model::<2>(GeneratorSettings {
        lx: 2.0,
        nx: 2,
        ny: 2,
        ..GeneratorSettings::default()
    });

    // The patches tile the domain with the first direction varying fastest
    let corners: Vec<[f64; 2]> = model
        .patches()
        .iter()
        .map(|patch| {
            let x = patch.coord(0).unwrap();
            [x[0], x[1]]
        })
        .collect();
    assert_eq!(corners, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 0.5], [1.0, 0.5]]);

    assert_eq!(
        model.connections(),
        &[
            Connection::new(1, 2, 2, 1, 1),
            Connection::new(3, 2, 4, 1, 1),
            Connection::new(1, 4, 3, 3, 1),
            Connection::new(2, 4, 4, 3, 1),
        ]
    );

    assert_eq!(model.num_global_nodes(), 9);
    assert_eq!(all_global_nodes(&model), (0..9).collect());
    assert_eq!(model.patch(2).unwrap().global_nodes(), &[1, 4, 3, 5]);
    assert_eq!(model.patch(4).unwrap().global_nodes(), &[3, 5, 7, 8]);
    // The centre of the domain is a single node shared by all patches
    for (patch, local) in [(1, 3), (2, 2), (3, 1), (4, 0)] {
        assert_eq!(model.patch(patch).unwrap().global_node(local), Some(3));
    }

    assert_eq!(
        model.topology_set_nodes("Boundary").unwrap(),
        BTreeSet::from([0, 1, 2, 4, 5, 6, 7, 8])
    );
    assert_eq!(model.topology_set_nodes("Edge2").unwrap(), BTreeSet::from([4, 5, 8]));
    assert_eq!(model.topology_set_nodes("Vertex4").unwrap(), BTreeSet::from([8]));
    assert!(matches!(
        model.topology_set_nodes("Inlet"),
        Err(ModelError::UnknownTopologySet(name)) if name == "Inlet"
    ));

    assert_groups_are_valid(&model);
    assert_scalar_eq!(measure(&model, IntegrationMode::Sequential), 2.0, comp = abs, tol = 1e-14);
}

#[test]
fn shared_faces_have_a_single_set_of_global_nodes() {
    let model = numbered_model::<3>(GeneratorSettings {
        lx: 2.0,
        lz: 0.5,
        nx: 2,
        ..GeneratorSettings::default()
    });
    assert_eq!(model.num_global_nodes(), 12);

    let master = model.patch(1).unwrap().boundary_nodes(2, 2).unwrap();
    let slave = model.patch(2).unwrap().boundary_nodes(1, 2).unwrap();
    assert_eq!(master, slave);
    let distinct: BTreeSet<usize> = master.iter().chain(&slave).copied().collect();
    assert_eq!(distinct.len(), 4);

    assert_scalar_eq!(measure(&model, IntegrationMode::Parallel), 1.0, comp = abs, tol = 1e-13);
    let mut area = ScalarIntegral::default();
    model
        .integrate_boundary("Boundary", &Measure, &mut area, &TimeDomain::default(), IntegrationMode::Parallel)
        .unwrap();
    assert_scalar_eq!(area.value, 7.0, comp = abs, tol = 1e-12);
}

#[test]
fn numbering_can_be_repeated() {
    let mut model = numbered_model::<2>(GeneratorSettings {
        nx: 3,
        ny: 2,
        ..GeneratorSettings::default()
    });
    let first: Vec<Vec<usize>> = model.patches().iter().map(|p| p.global_nodes().to_vec()).collect();
    assert_eq!(model.number_nodes().unwrap(), 12);
    let second: Vec<Vec<usize>> = model.patches().iter().map(|p| p.global_nodes().to_vec()).collect();
    assert_eq!(first, second);
}

#[test]
fn connections_are_validated() {
    let generator = MultiPatchModelGenerator2D::new(GeneratorSettings {
        nx: 2,
        ..GeneratorSettings::default()
    })
    .unwrap();
    let mut model = generator.create_model(2).unwrap();

    // The left edge of the first patch does not touch the right edge of the second
    assert!(matches!(
        model.add_connection(Connection::new(1, 1, 2, 2, 1)),
        Err(ModelError::NonMatchingNodes { master: 1, slave: 2, .. })
    ));
    assert_eq!(model.connections().len(), 1);
    model
        .add_connection(Connection::new(1, 1, 2, 2, 1).without_coordinate_check())
        .unwrap();
    assert_eq!(model.connections().len(), 2);

    assert_eq!(
        model.add_connection(Connection::new(1, 2, 3, 1, 1)),
        Err(ModelError::PatchOutOfRange { patch: 3, num_patches: 2 })
    );
    assert!(matches!(model.patch(0), Err(ModelError::PatchOutOfRange { patch: 0, .. })));
    assert!(matches!(
        model.add_connection(Connection::new(1, 2, 2, 1, 1).with_thickness(3)),
        Err(ModelError::InvalidThickness { thickness: 3, available: 2 })
    ));

    // Gluing both sides makes the row periodic in effect
    assert_eq!(model.number_nodes().unwrap(), 4);
}

#[test]
fn models_can_be_read_from_g2() {
    let generator = MultiPatchModelGenerator2D::new(GeneratorSettings {
        nx: 2,
        ..GeneratorSettings::default()
    })
    .unwrap();
    let mut model = Model::from_g2(&generator.create_g2(2).unwrap()).unwrap();
    assert_eq!(model.num_patches(), 2);
    assert_eq!(model.number_nodes().unwrap(), 8);

    generator.create_topology(&mut model).unwrap();
    assert_eq!(model.number_nodes().unwrap(), 6);
    assert_eq!(model.patch(2).unwrap().index(), 2);
}
