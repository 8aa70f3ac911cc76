//! Multi-patch models: patches, their connections and global node numbers.
use crate::error::{IntegrationError, ModelError};
use crate::integrate::{merge_partials, GlobalIntegral, Integrand, IntegrationMode, TimeDomain};
use crate::numbering::GlobalNodeNumbering;
use crate::patch::Patch;
use crate::topology::{Connection, TopologySet};
use fenris_spline::g2::read_g2;
use log::{debug, info};
use std::collections::BTreeSet;

/// Maximum distance between control points that a checked connection treats as coincident.
pub const COORDINATE_TOLERANCE: f64 = 1e-4;

/// A collection of patches glued together by connections.
///
/// Patches are addressed by 1-based indices in the order they were added.
#[derive(Debug, Clone, Default)]
pub struct Model {
    patches: Vec<Patch>,
    connections: Vec<Connection>,
    topology: TopologySet,
    num_global_nodes: usize,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model with one patch per geometry of a g2 text.
    pub fn from_g2(text: &str) -> Result<Self, ModelError> {
        let mut model = Self::new();
        for geometry in read_g2(text)? {
            model.add_patch(Patch::new(geometry)?);
        }
        Ok(model)
    }

    /// Adds a patch and returns its 1-based index.
    pub fn add_patch(&mut self, mut patch: Patch) -> usize {
        let index = self.patches.len() + 1;
        patch.set_index(index);
        self.patches.push(patch);
        index
    }

    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    fn check_patch(&self, patch: usize) -> Result<usize, ModelError> {
        if patch == 0 || patch > self.patches.len() {
            Err(ModelError::PatchOutOfRange {
                patch,
                num_patches: self.patches.len(),
            })
        } else {
            Ok(patch - 1)
        }
    }

    pub fn patch(&self, patch: usize) -> Result<&Patch, ModelError> {
        let i = self.check_patch(patch)?;
        Ok(&self.patches[i])
    }

    /// Mutable access to a patch. Changing its basis invalidates the numbering of the model.
    pub fn patch_mut(&mut self, patch: usize) -> Result<&mut Patch, ModelError> {
        let i = self.check_patch(patch)?;
        Ok(&mut self.patches[i])
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Validates and stores a connection.
    ///
    /// Fails if either patch does not exist, the entities or orientation are invalid, the
    /// node layouts of the two entities differ, or (with the coordinate check enabled) the
    /// aliased nodes are further apart than [`COORDINATE_TOLERANCE`].
    pub fn add_connection(&mut self, connection: Connection) -> Result<(), ModelError> {
        let master = self.patch(connection.master)?;
        let slave = self.patch(connection.slave)?;
        let pairs = connection.node_pairs(
            (master.param_dim(), master.node_counts()),
            (slave.param_dim(), slave.node_counts()),
        )?;

        if connection.coordinate_check {
            for &(m, s) in &pairs {
                let xm = master.coord(m).ok_or(ModelError::MissingGeometry {
                    patch: connection.master,
                })?;
                let xs = slave.coord(s).ok_or(ModelError::MissingGeometry {
                    patch: connection.slave,
                })?;
                let distance = (xm - xs).norm();
                if distance > COORDINATE_TOLERANCE {
                    return Err(ModelError::NonMatchingNodes {
                        master: connection.master,
                        slave: connection.slave,
                        distance,
                    });
                }
            }
        }

        debug!(
            "Connecting patch {} (item {}) with patch {} (item {}): {} node pairs",
            connection.master,
            connection.master_item,
            connection.slave,
            connection.slave_item,
            pairs.len()
        );
        self.connections.push(connection);
        Ok(())
    }

    /// Makes a patch periodic in the given direction.
    pub fn close_periodic(&mut self, patch: usize, direction: usize) -> Result<(), ModelError> {
        info!("Periodic direction {} in patch {}", direction + 1, patch);
        self.patch_mut(patch)?.close_periodic(direction)
    }

    pub fn topology(&self) -> &TopologySet {
        &self.topology
    }

    pub fn set_topology(&mut self, topology: TopologySet) {
        self.topology = topology;
    }

    /// Assigns global node numbers to all patches and partitions their elements into groups.
    ///
    /// Returns the number of distinct global nodes. Numbering always starts from scratch, so
    /// it can be repeated after patches were refined.
    pub fn number_nodes(&mut self) -> Result<usize, ModelError> {
        let mut numbering = GlobalNodeNumbering::new(self.patches.iter().map(Patch::num_nodes));
        for connection in &self.connections {
            let master = self.patch(connection.master)?;
            let slave = self.patch(connection.slave)?;
            numbering.connect(connection, master, slave)?;
        }
        for (p, patch) in self.patches.iter().enumerate() {
            for (direction, &periodic) in patch.periodic().iter().enumerate() {
                if periodic {
                    numbering.close_periodic(p, patch.node_counts(), direction);
                }
            }
        }

        let num_nodes = numbering.assign(&mut self.patches);
        for patch in &mut self.patches {
            patch.generate_thread_groups();
        }
        info!("Number of unique nodes: {num_nodes}");
        self.num_global_nodes = num_nodes;
        Ok(num_nodes)
    }

    /// Number of distinct global nodes after the last call to
    /// [`number_nodes`](Self::number_nodes).
    pub fn num_global_nodes(&self) -> usize {
        self.num_global_nodes
    }

    /// Global numbers of all nodes on the entities of a named topology set.
    pub fn topology_set_nodes(&self, name: &str) -> Result<BTreeSet<usize>, ModelError> {
        let items = self
            .topology
            .get(name)
            .ok_or_else(|| ModelError::UnknownTopologySet(name.to_string()))?;
        let mut nodes = BTreeSet::new();
        for item in items {
            nodes.extend(self.patch(item.patch)?.boundary_nodes(item.item, item.dim)?);
        }
        Ok(nodes)
    }

    /// Integrates over all elements of all patches.
    ///
    /// Partial results are merged into `global` patch by patch, in group order, once every
    /// patch has been integrated. If any element fails, `global` is left untouched.
    pub fn integrate<I, G>(
        &self,
        integrand: &I,
        global: &mut G,
        time: &TimeDomain,
        mode: IntegrationMode,
    ) -> Result<(), IntegrationError>
    where
        I: Integrand,
        G: GlobalIntegral<I::Output> + Sync,
    {
        let mut partials = Vec::new();
        for patch in &self.patches {
            partials.extend(patch.interior_partials(integrand, global, time, mode)?);
        }
        merge_partials::<I::Output, G>(global, partials);
        Ok(())
    }

    /// Integrates over the boundaries listed in a named topology set. Entities that are not
    /// boundaries of their patch (vertices of a volume, for instance) are skipped. As with
    /// [`integrate`](Self::integrate), nothing is merged into `global` unless all boundaries
    /// succeed.
    pub fn integrate_boundary<I, G>(
        &self,
        name: &str,
        integrand: &I,
        global: &mut G,
        time: &TimeDomain,
        mode: IntegrationMode,
    ) -> Result<(), IntegrationError>
    where
        I: Integrand,
        G: GlobalIntegral<I::Output> + Sync,
    {
        let items = self
            .topology
            .get(name)
            .ok_or_else(|| IntegrationError::UnknownTopologySet(name.to_string()))?;
        let mut partials = Vec::new();
        for item in items {
            let patch = self
                .patch(item.patch)
                .map_err(|_| IntegrationError::PatchOutOfRange { patch: item.patch })?;
            if item.dim + 1 == patch.param_dim() {
                partials.extend(patch.boundary_partials(item.item, integrand, global, time, mode)?);
            }
        }
        merge_partials::<I::Output, G>(global, partials);
        Ok(())
    }
}
