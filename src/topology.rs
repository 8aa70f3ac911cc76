//! Topological bookkeeping for multi-patch models.
//!
//! Patches and their entities are referred to by index only. Patch indices are 1-based, and so
//! are the local indices of vertices, edges and faces:
//!
//! - vertices are numbered `1 + i + 2 j + 4 k` with `i, j, k` in `{0, 1}` marking the min/max
//!   end of each parametric direction,
//! - faces of a volume (edges of a surface, vertices of a curve) are numbered `2 d + s + 1` for
//!   the normal direction `d` and side `s` (0 for min, 1 for max),
//! - edges of a volume: 1-4 run along the first direction, 5-8 along the second and 9-12
//!   along the third. Within each group the two fixed directions (in increasing order) take
//!   the sides (min, min), (max, min), (min, max), (max, max).
use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A vertex (`dim = 0`), edge (`dim = 1`) or face (`dim = 2`) of a specific patch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopItem {
    pub patch: usize,
    pub item: usize,
    pub dim: usize,
}

impl TopItem {
    pub fn new(patch: usize, item: usize, dim: usize) -> Self {
        Self { patch, item, dim }
    }
}

/// Named sets of topological entities, e.g. `"Boundary"`, `"Edge3"` or `"Corners"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySet {
    sets: BTreeMap<String, BTreeSet<TopItem>>,
}

impl TopologySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, item: TopItem) {
        self.sets.entry(name.to_string()).or_default().insert(item);
    }

    /// The set with the given name, created empty if it does not exist yet.
    pub fn entry(&mut self, name: &str) -> &mut BTreeSet<TopItem> {
        self.sets.entry(name.to_string()).or_default()
    }

    pub fn get(&self, name: &str) -> Option<&BTreeSet<TopItem>> {
        self.sets.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<TopItem>)> {
        self.sets.iter().map(|(name, items)| (name.as_str(), items))
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Relative orientation of two connected entities.
///
/// Describes how the parametrization `(u, v)` of the slave entity maps onto the master entity:
/// the parameters may be swapped, and each of them may be reversed (after swapping). Edges only
/// use [`Identity`](Orientation::Identity) and [`ReverseU`](Orientation::ReverseU), vertices
/// only [`Identity`](Orientation::Identity).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Identity,
    ReverseV,
    ReverseU,
    ReverseUV,
    Swap,
    SwapReverseV,
    SwapReverseU,
    SwapReverseUV,
}

impl Orientation {
    /// Decodes the compact orientation code for an entity of the given dimension.
    ///
    /// Face codes use three bits (swap, reverse u, reverse v from the most significant bit),
    /// edge codes are 0 (same direction) or 1 (reversed) and vertices only accept 0.
    pub fn from_code(code: u8, dim: usize) -> Result<Self, ModelError> {
        use Orientation::*;
        let orientation = match (dim, code) {
            (0, 0) | (1, 0) | (2, 0) => Identity,
            (1, 1) => ReverseU,
            (2, 1) => ReverseV,
            (2, 2) => ReverseU,
            (2, 3) => ReverseUV,
            (2, 4) => Swap,
            (2, 5) => SwapReverseV,
            (2, 6) => SwapReverseU,
            (2, 7) => SwapReverseUV,
            _ => return Err(ModelError::InvalidOrientation { code, dim }),
        };
        Ok(orientation)
    }

    pub fn is_swapped(&self) -> bool {
        use Orientation::*;
        matches!(self, Swap | SwapReverseV | SwapReverseU | SwapReverseUV)
    }

    /// Whether the orientation can relate entities with the given number of free directions.
    fn is_valid_for(&self, dim: usize) -> bool {
        use Orientation::*;
        match dim {
            0 => *self == Identity,
            1 => matches!(self, Identity | ReverseU),
            _ => true,
        }
    }

    /// Maps the grid point `(i, j)` of a slave entity with `(n1, n2)` nodes onto the master
    /// entity.
    pub fn map(&self, (i, j): (usize, usize), (n1, n2): (usize, usize)) -> (usize, usize) {
        use Orientation::*;
        match self {
            Identity => (i, j),
            ReverseV => (i, n2 - 1 - j),
            ReverseU => (n1 - 1 - i, j),
            ReverseUV => (n1 - 1 - i, n2 - 1 - j),
            Swap => (j, i),
            SwapReverseV => (j, n1 - 1 - i),
            SwapReverseU => (n2 - 1 - j, i),
            SwapReverseUV => (n2 - 1 - j, n1 - 1 - i),
        }
    }
}

/// The min or max end of a parametric direction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Min,
    Max,
}

impl Side {
    fn from_bit(bit: usize) -> Self {
        if bit == 0 {
            Side::Min
        } else {
            Side::Max
        }
    }

    /// Index of the node layer at the given depth from this end of `n` layers.
    pub fn layer(&self, n: usize, depth: usize) -> usize {
        match self {
            Side::Min => depth,
            Side::Max => n - 1 - depth,
        }
    }
}

/// A boundary of a patch: a face of a volume, an edge of a surface or an end of a curve.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Boundary {
    pub direction: usize,
    pub side: Side,
}

impl Boundary {
    /// The boundary with the given 1-based local index.
    pub fn from_index(param_dim: usize, index: usize) -> Option<Self> {
        (1..=2 * param_dim).contains(&index).then(|| Boundary {
            direction: (index - 1) / 2,
            side: Side::from_bit((index - 1) % 2),
        })
    }

    pub fn index(&self) -> usize {
        2 * self.direction + usize::from(self.side == Side::Max) + 1
    }
}

/// A vertex, edge or face of a patch, described by the directions in which it sits at one end
/// of the node range and the directions along which it extends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntity {
    fixed: Vec<(usize, Side)>,
    free: Vec<usize>,
}

impl LocalEntity {
    /// The entity with the given 1-based local index and dimension of a patch with `param_dim`
    /// parametric directions, if it exists.
    pub fn new(param_dim: usize, index: usize, dim: usize) -> Option<Self> {
        if index == 0 || dim >= param_dim || param_dim > 3 {
            return None;
        }
        let others = |d: usize| (0..param_dim).filter(move |&e| e != d);
        if dim == 0 {
            if index > 1 << param_dim {
                return None;
            }
            let bits = index - 1;
            let fixed = (0..param_dim)
                .map(|d| (d, Side::from_bit((bits >> d) & 1)))
                .collect();
            return Some(Self { fixed, free: vec![] });
        }
        if dim + 1 == param_dim {
            let boundary = Boundary::from_index(param_dim, index)?;
            return Some(Self {
                fixed: vec![(boundary.direction, boundary.side)],
                free: others(boundary.direction).collect(),
            });
        }
        // Edges of a volume
        if index > 12 {
            return None;
        }
        let free = (index - 1) / 4;
        let sides = (index - 1) % 4;
        let fixed = others(free)
            .enumerate()
            .map(|(n, d)| (d, Side::from_bit((sides >> n) & 1)))
            .collect();
        Some(Self { fixed, free: vec![free] })
    }

    pub fn dim(&self) -> usize {
        self.free.len()
    }

    /// Directions in which the entity sits at one end, and which end.
    pub fn fixed(&self) -> &[(usize, Side)] {
        &self.fixed
    }

    /// Directions along which the entity extends.
    pub fn free(&self) -> &[usize] {
        &self.free
    }

    /// Number of entities of dimension `dim` of a patch with `param_dim` directions.
    pub fn count(param_dim: usize, dim: usize) -> usize {
        match (param_dim, dim) {
            (1..=3, 0) => 1 << param_dim,
            (p, d) if d + 1 == p => 2 * p,
            (3, 1) => 12,
            _ => 0,
        }
    }

    /// The direction normal to the entity if it is a boundary (codimension one).
    pub fn normal(&self) -> Option<(usize, Side)> {
        match self.fixed.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Node counts along the free directions, padded with 1.
    pub fn grid_size(&self, node_counts: [usize; 3]) -> (usize, usize) {
        let size = |n: usize| self.free.get(n).map(|&d| node_counts[d]).unwrap_or(1);
        (size(0), size(1))
    }

    /// Local node indices of the entity, `depth` layers away from it along its normal
    /// direction. Nodes are ordered with the first free direction varying fastest.
    pub fn nodes(&self, node_counts: [usize; 3], depth: usize) -> Vec<usize> {
        let mut ijk = [0; 3];
        for &(d, side) in &self.fixed {
            ijk[d] = side.layer(node_counts[d], if self.fixed.len() == 1 { depth } else { 0 });
        }
        let (n1, n2) = self.grid_size(node_counts);
        let mut nodes = Vec::with_capacity(n1 * n2);
        for b in 0..n2 {
            for a in 0..n1 {
                if let Some(&d) = self.free.first() {
                    ijk[d] = a;
                }
                if let Some(&d) = self.free.get(1) {
                    ijk[d] = b;
                }
                nodes.push(ijk[0] + node_counts[0] * (ijk[1] + node_counts[1] * ijk[2]));
            }
        }
        nodes
    }
}

/// A requirement that two patch entities share their nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// 1-based index of the master patch.
    pub master: usize,
    /// Local index of the master entity.
    pub master_item: usize,
    /// 1-based index of the slave patch.
    pub slave: usize,
    /// Local index of the slave entity.
    pub slave_item: usize,
    /// Dimension of the connected entities.
    pub dim: usize,
    pub orientation: Orientation,
    /// Number of node layers normal to the interface that are shared.
    pub thickness: usize,
    /// Whether the coordinates of shared nodes must coincide.
    pub coordinate_check: bool,
}

impl Connection {
    /// A face-to-face (edge-to-edge, vertex-to-vertex) connection with identity orientation.
    pub fn new(master: usize, master_item: usize, slave: usize, slave_item: usize, dim: usize) -> Self {
        Self {
            master,
            master_item,
            slave,
            slave_item,
            dim,
            orientation: Orientation::Identity,
            thickness: 1,
            coordinate_check: true,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_thickness(mut self, thickness: usize) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn without_coordinate_check(mut self) -> Self {
        self.coordinate_check = false;
        self
    }

    /// Pairs of aliased local nodes `(master node, slave node)`.
    ///
    /// The `layer`-th pair of node layers couples the master layer at depth `layer` with the
    /// slave layer at depth `thickness - 1 - layer`, so that the outermost master layer meets
    /// the innermost shared slave layer, as for two overlapping blocks of one spline.
    pub fn node_pairs(
        &self,
        (master_dim, master_nodes): (usize, [usize; 3]),
        (slave_dim, slave_nodes): (usize, [usize; 3]),
    ) -> Result<Vec<(usize, usize)>, ModelError> {
        let master = LocalEntity::new(master_dim, self.master_item, self.dim).ok_or(ModelError::InvalidEntity {
            patch: self.master,
            index: self.master_item,
            dim: self.dim,
        })?;
        let slave = LocalEntity::new(slave_dim, self.slave_item, self.dim).ok_or(ModelError::InvalidEntity {
            patch: self.slave,
            index: self.slave_item,
            dim: self.dim,
        })?;
        if !self.orientation.is_valid_for(self.dim) {
            return Err(ModelError::InvalidOrientation {
                code: face_code(self.orientation),
                dim: self.dim,
            });
        }

        let (n1, n2) = slave.grid_size(slave_nodes);
        let expected = if self.orientation.is_swapped() { (n2, n1) } else { (n1, n2) };
        let (m1, m2) = master.grid_size(master_nodes);
        if (m1, m2) != expected {
            return Err(ModelError::IncompatibleEntities {
                master: self.master,
                slave: self.slave,
            });
        }

        let available = match (master.normal(), slave.normal()) {
            (Some((dm, _)), Some((ds, _))) => master_nodes[dm].min(slave_nodes[ds]),
            _ => 1,
        };
        if self.thickness == 0 || self.thickness > available {
            return Err(ModelError::InvalidThickness {
                thickness: self.thickness,
                available,
            });
        }

        let mut pairs = Vec::with_capacity(self.thickness * n1 * n2);
        for layer in 0..self.thickness {
            let master_layer = master.nodes(master_nodes, layer);
            let slave_layer = slave.nodes(slave_nodes, self.thickness - 1 - layer);
            for j in 0..n2 {
                for i in 0..n1 {
                    let (k, l) = self.orientation.map((i, j), (n1, n2));
                    pairs.push((master_layer[k + m1 * l], slave_layer[i + n1 * j]));
                }
            }
        }
        Ok(pairs)
    }
}

fn face_code(orientation: Orientation) -> u8 {
    use Orientation::*;
    match orientation {
        Identity => 0,
        ReverseV => 1,
        ReverseU => 2,
        ReverseUV => 3,
        Swap => 4,
        SwapReverseV => 5,
        SwapReverseU => 6,
        SwapReverseUV => 7,
    }
}
