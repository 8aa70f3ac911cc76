use fenris_iga::error::ModelError;
use fenris_iga::generator::{
    grid_topology_sets, linear_patches_g2, split_blocks, split_g2, GeneratorSettings, MultiPatchModelGenerator1D,
    MultiPatchModelGenerator2D,
};
use fenris_iga::topology::TopItem;
use fenris_iga::Model;
use fenris_spline::g2::read_g2;
use fenris_spline::{BsplineBasis, SplineGeometry};
use std::collections::BTreeSet;

fn items(list: &[(usize, usize, usize)]) -> BTreeSet<TopItem> {
    list.iter()
        .map(|&(patch, item, dim)| TopItem::new(patch, item, dim))
        .collect()
}

#[test]
fn linear_segments_in_g2() {
    let settings = GeneratorSettings {
        lx: 2.0,
        ..GeneratorSettings::default()
    };
    let g2 = linear_patches_g2(1, &settings, 1, [2, 1, 1]).unwrap();
    let expected = "100 1 0 0\n1 0\n2 2\n0 0 1 1\n0\n1\n\
                    100 1 0 0\n1 0\n2 2\n0 0 1 1\n1\n2\n";
    assert_eq!(g2, expected);
}

#[test]
fn rational_rectangle_embedded_in_space() {
    let settings = GeneratorSettings {
        lx: 2.0,
        ly: 3.0,
        x0: [1.0, 1.0, 0.0],
        rational: true,
        ..GeneratorSettings::default()
    };
    let g2 = linear_patches_g2(2, &settings, 3, [1, 1, 1]).unwrap();
    let lines: Vec<&str> = g2.lines().collect();
    assert_eq!(lines[0], "200 1 0 0");
    assert_eq!(lines[1], "3 1");
    assert_eq!(&lines[6..], &["1 1 0 1", "3 1 0 1", "1 4 0 1", "3 4 0 1"]);

    let geometry = &read_g2(&g2).unwrap()[0];
    assert!(geometry.is_rational());
    assert_eq!(geometry.dimension(), 3);
}

#[test]
fn spatial_dimension_is_at_least_the_parametric_dimension() {
    let g2 = linear_patches_g2(3, &GeneratorSettings::default(), 2, [1, 1, 1]).unwrap();
    assert_eq!(read_g2(&g2).unwrap()[0].dimension(), 3);
    assert!(linear_patches_g2(2, &GeneratorSettings::default(), 0, [1, 1, 1]).is_err());
    assert!(linear_patches_g2(4, &GeneratorSettings::default(), 3, [1, 1, 1]).is_err());
}

#[test]
fn split_blocks_overlap_in_degree_coefficients() {
    assert_eq!(split_blocks(0, 5, 1, 1).unwrap(), vec![(0, 5)]);
    assert_eq!(split_blocks(0, 5, 1, 2).unwrap(), vec![(0, 3), (2, 3)]);
    assert_eq!(split_blocks(2, 9, 3, 4).unwrap(), vec![(0, 5), (2, 5), (4, 4), (5, 4)]);
    assert_eq!(
        split_blocks(1, 4, 2, 3),
        Err(ModelError::TooManySubdivisions {
            direction: 1,
            requested: 3,
            available: 2
        })
    );
}

#[test]
fn split_geometry_shares_control_points() {
    let basis = BsplineBasis::uniform(3, 4, 0.0, 1.0).unwrap();
    let coefs = vec![0.0, 0.1, 0.3, 0.7, 0.9, 1.0];
    let geometry = SplineGeometry::new(vec![basis], 1, false, coefs).unwrap();

    let blocks = read_g2(&split_g2(&geometry, [2, 1, 1]).unwrap()).unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].coefs(), &[0.0, 0.1, 0.3, 0.7]);
    assert_eq!(blocks[1].coefs(), &[0.3, 0.7, 0.9, 1.0]);
    assert_eq!(blocks[0].bases()[0].knots(), &[0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0]);
    assert_eq!(blocks[1].bases()[0].knots(), &[0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0]);
    for block in &blocks {
        assert_eq!(block.bases()[0].spans().len(), 2);
    }

    assert!(matches!(
        split_g2(&geometry, [5, 1, 1]),
        Err(ModelError::TooManySubdivisions { .. })
    ));
}

#[test]
fn topology_sets_of_a_row_of_rectangles() {
    let sets = grid_topology_sets(2, [2, 1, 1], Some);
    let names: Vec<&str> = sets.names().collect();
    assert_eq!(
        names,
        vec!["Boundary", "Corners", "Edge1", "Edge2", "Edge3", "Edge4", "Vertex1", "Vertex2", "Vertex3", "Vertex4"]
    );
    assert_eq!(sets.get("Edge1").unwrap(), &items(&[(1, 1, 1)]));
    assert_eq!(sets.get("Edge3").unwrap(), &items(&[(1, 3, 1), (2, 3, 1)]));
    assert_eq!(
        sets.get("Boundary").unwrap(),
        &items(&[(1, 1, 1), (1, 3, 1), (1, 4, 1), (2, 2, 1), (2, 3, 1), (2, 4, 1)])
    );
    assert_eq!(
        sets.get("Corners").unwrap(),
        &items(&[(1, 1, 0), (1, 3, 0), (2, 2, 0), (2, 4, 0)])
    );
}

#[test]
fn topology_sets_of_a_box() {
    let sets = grid_topology_sets(3, [1, 1, 1], Some);
    assert_eq!(sets.len(), 3 + 6 + 12 + 8);
    assert_eq!(sets.get("Boundary").unwrap().len(), 6);
    assert_eq!(sets.get("Frame").unwrap().len(), 12);
    assert_eq!(sets.get("Corners").unwrap().len(), 8);
    assert_eq!(sets.get("Edge12").unwrap(), &items(&[(1, 12, 1)]));
    assert_eq!(sets.get("Face5").unwrap(), &items(&[(1, 5, 2)]));
}

#[test]
fn topology_sets_of_a_box_grid() {
    let sets = grid_topology_sets(3, [2, 2, 2], Some);
    assert_eq!(sets.get("Face1").unwrap(), &items(&[(1, 1, 2), (3, 1, 2), (5, 1, 2), (7, 1, 2)]));
    assert_eq!(sets.get("Edge1").unwrap(), &items(&[(1, 1, 1), (2, 1, 1)]));
    assert_eq!(sets.get("Edge5").unwrap(), &items(&[(1, 5, 1), (3, 5, 1)]));
    assert_eq!(sets.get("Edge9").unwrap(), &items(&[(1, 9, 1), (5, 9, 1)]));
    assert_eq!(sets.get("Vertex8").unwrap(), &items(&[(8, 8, 0)]));
    assert_eq!(sets.get("Boundary").unwrap().len(), 24);
    assert_eq!(sets.get("Frame").unwrap().len(), 24);
    assert_eq!(sets.get("Corners").unwrap().len(), 8);

    // The half of the grid at x = 0 is numbered locally as patches 1 to 4
    let half = grid_topology_sets(3, [2, 2, 2], |patch| (patch % 2 == 1).then_some((patch + 1) / 2));
    assert_eq!(half.get("Face1").unwrap(), &items(&[(1, 1, 2), (2, 1, 2), (3, 1, 2), (4, 1, 2)]));
    assert!(half.get("Face2").unwrap().is_empty());
    assert_eq!(half.get("Edge1").unwrap(), &items(&[(1, 1, 1)]));
    assert_eq!(half.get("Edge9").unwrap(), &items(&[(1, 9, 1), (3, 9, 1)]));
    assert_eq!(half.get("Boundary").unwrap().len(), 12);
    assert_eq!(half.get("Frame").unwrap().len(), 12);
    assert_eq!(half.get("Corners").unwrap().len(), 4);
}

#[test]
fn unresolved_patches_are_left_out() {
    // Only patch 2 of the row is part of this model, as local patch 1
    let sets = grid_topology_sets(1, [2, 1, 1], |patch| (patch == 2).then_some(1));
    assert!(sets.get("Vertex1").unwrap().is_empty());
    assert_eq!(sets.get("Vertex2").unwrap(), &items(&[(1, 2, 0)]));
    assert_eq!(sets.get("Boundary").unwrap(), &items(&[(1, 2, 0)]));
}

#[test]
fn generator_indexing() {
    let settings = GeneratorSettings {
        nx: 2,
        ny: 3,
        nz: 4,
        ..GeneratorSettings::default()
    };
    let generator = MultiPatchModelGenerator2D::new(settings.clone()).unwrap();
    assert_eq!(generator.counts(), [2, 3, 1]);
    assert_eq!(generator.num_patches(), 6);
    assert_eq!(generator.patch_index([0, 0, 0]), 1);
    assert_eq!(generator.patch_index([1, 1, 0]), 4);
    assert_eq!(generator.settings(), &settings);

    let generator = MultiPatchModelGenerator1D::new(settings).unwrap();
    assert_eq!(generator.counts(), [2, 1, 1]);

    let invalid = GeneratorSettings {
        ny: 0,
        ..GeneratorSettings::default()
    };
    assert!(MultiPatchModelGenerator2D::new(invalid).is_err());
}

#[test]
fn topology_sets_can_be_disabled() {
    let settings = GeneratorSettings {
        nx: 2,
        topology_sets: false,
        ..GeneratorSettings::default()
    };
    let generator = MultiPatchModelGenerator2D::new(settings).unwrap();
    assert!(generator.create_topology_sets(Some).is_empty());
    let model = generator.create_model(2).unwrap();
    assert!(model.topology().is_empty());
}

#[test]
fn topology_requires_the_generated_patches() {
    let settings = GeneratorSettings {
        nx: 2,
        ..GeneratorSettings::default()
    };
    let generator = MultiPatchModelGenerator2D::new(settings).unwrap();
    let mut model = Model::new();
    assert!(matches!(
        generator.create_topology(&mut model),
        Err(ModelError::InvalidConfiguration(_))
    ));
}
