//! Generators for structured multi-patch models of lines, rectangles and boxes.
//!
//! A generator produces the patches of an axis-aligned domain split into `nx x ny x nz`
//! sub-patches, the connections between neighbouring sub-patches (including periodic wrap
//! around), and named topology sets for the boundary of the domain. Sub-patches are indexed
//! `1 + i + nx * (j + ny * k)`.
//!
//! There are two ways to split the domain:
//!
//! - without [`Subdivision`], every sub-patch is a separate linear patch,
//! - with [`Subdivision`], a single linear patch for the whole domain is refined and raised in
//!   order as requested, and then cut into blocks along its knot spans. Neighbouring blocks
//!   overlap in `degree` layers of control points, all of which are shared by the connection
//!   between them.
use crate::error::ModelError;
use crate::model::Model;
use crate::patch::Patch;
use crate::topology::{Connection, TopologySet};
use fenris_spline::g2::read_g2;
use fenris_spline::geometry::lattice;
use itertools::Itertools;
use log::info;

mod sets;
mod settings;
mod synthesis;

pub use sets::grid_topology_sets;
pub use settings::{GeneratorSettings, Subdivision, SubdivisionStep};
pub use synthesis::{linear_patches_g2, split_blocks, split_g2};

/// Generator for a domain with `D` parametric directions.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPatchModelGenerator<const D: usize> {
    settings: GeneratorSettings,
}

pub type MultiPatchModelGenerator1D = MultiPatchModelGenerator<1>;
pub type MultiPatchModelGenerator2D = MultiPatchModelGenerator<2>;
pub type MultiPatchModelGenerator3D = MultiPatchModelGenerator<3>;

impl<const D: usize> MultiPatchModelGenerator<D> {
    pub fn new(settings: GeneratorSettings) -> Result<Self, ModelError> {
        if !(1..=3).contains(&D) {
            return Err(ModelError::InvalidConfiguration(format!(
                "invalid parametric dimension {D}"
            )));
        }
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Sub-patch counts, 1 in unused directions.
    pub fn counts(&self) -> [usize; 3] {
        let mut counts = [1; 3];
        counts[..D].copy_from_slice(&self.settings.counts()[..D]);
        counts
    }

    pub fn num_patches(&self) -> usize {
        self.counts().iter().product()
    }

    /// 1-based index of the sub-patch at grid position `cell`.
    pub fn patch_index(&self, cell: [usize; 3]) -> usize {
        let n = self.counts();
        1 + cell[0] + n[0] * (cell[1] + n[1] * cell[2])
    }

    /// The linear patches in g2 format: one per sub-patch, or a single patch for the whole
    /// domain when the model is subdivided after refinement.
    pub fn create_g2(&self, nsd: usize) -> Result<String, ModelError> {
        let s = &self.settings;
        if s.rational {
            info!("Rational basis");
        }
        let cells = if s.subdivision.is_some() {
            [1; 3]
        } else {
            let counts = self.counts();
            info!("Split in {}", counts[..D].iter().join(" x "));
            counts
        };
        linear_patches_g2(D, s, nsd, cells)
    }

    /// The patches of the model in sub-patch order.
    pub fn create_geometry(&self, nsd: usize) -> Result<Vec<Patch>, ModelError> {
        let g2 = self.create_g2(nsd)?;
        let g2 = match &self.settings.subdivision {
            None => g2,
            Some(subdivision) => {
                let mut geometry = read_g2(&g2)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ModelError::InvalidConfiguration("no geometry generated".to_string()))?;
                for step in &subdivision.steps {
                    let amounts = step.amounts();
                    for (direction, &amount) in amounts.iter().enumerate().take(D) {
                        match step {
                            SubdivisionStep::Refine { .. } if amount > 0 => {
                                geometry.uniform_refine(direction, amount)?
                            }
                            SubdivisionStep::RaiseOrder { .. } if amount > 0 => {
                                geometry.raise_order(direction, amount)?
                            }
                            _ => {}
                        }
                    }
                }
                let counts = self.counts();
                for d in 0..D {
                    info!("Subdivision in direction {}: {}", d + 1, counts[d]);
                }
                split_g2(&geometry, counts)?
            }
        };
        read_g2(&g2)?.into_iter().map(Patch::new).collect()
    }

    /// Connects neighbouring sub-patches of `model`, which must hold the patches of
    /// [`create_geometry`](Self::create_geometry), and applies periodicity.
    ///
    /// A periodic direction with more than one sub-patch connects the first and last sub-patch
    /// of every row, without checking coordinates. With a single sub-patch, each patch is
    /// closed onto itself instead.
    pub fn create_topology(&self, model: &mut Model) -> Result<(), ModelError> {
        let counts = self.counts();
        if model.num_patches() != self.num_patches() {
            return Err(ModelError::InvalidConfiguration(format!(
                "expected {} patches, the model has {}",
                self.num_patches(),
                model.num_patches()
            )));
        }

        let mut thickness = [1; 3];
        if self.settings.subdivision.is_some() {
            let order = model.patch(1)?.order();
            for d in 0..D {
                thickness[d] = order[d] - 1;
            }
        }

        for d in 0..D {
            for cell in lattice(counts).filter(|cell| cell[d] + 1 < counts[d]) {
                let mut next = cell;
                next[d] += 1;
                let connection = Connection::new(
                    self.patch_index(cell),
                    2 * d + 2,
                    self.patch_index(next),
                    2 * d + 1,
                    D - 1,
                )
                .with_thickness(thickness[d]);
                model.add_connection(connection)?;
            }
        }

        // Periodic wraps always have thickness 1, also after splitting, 1D models included
        for d in (0..D).filter(|&d| self.settings.periodic()[d]) {
            for cell in lattice(counts).filter(|cell| cell[d] == 0) {
                let first = self.patch_index(cell);
                if counts[d] > 1 {
                    let mut last = cell;
                    last[d] = counts[d] - 1;
                    let connection = Connection::new(first, 2 * d + 1, self.patch_index(last), 2 * d + 2, D - 1)
                        .without_coordinate_check();
                    model.add_connection(connection)?;
                } else {
                    model.close_periodic(first, d)?;
                }
            }
        }
        Ok(())
    }

    /// Named topology sets of the domain boundary, or an empty collection if topology sets
    /// were not requested.
    ///
    /// `resolve` maps the global index of a sub-patch to its local index, or to `None` for
    /// sub-patches that do not belong to this model.
    pub fn create_topology_sets(&self, resolve: impl Fn(usize) -> Option<usize>) -> TopologySet {
        if !self.settings.topology_sets {
            return TopologySet::new();
        }
        grid_topology_sets(D, self.counts(), resolve)
    }

    /// Creates geometry, topology and topology sets of the complete model.
    pub fn create_model(&self, nsd: usize) -> Result<Model, ModelError> {
        let mut model = Model::new();
        for patch in self.create_geometry(nsd)? {
            model.add_patch(patch);
        }
        self.create_topology(&mut model)?;
        model.set_topology(self.create_topology_sets(Some));
        Ok(model)
    }
}
