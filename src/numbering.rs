//! Global node numbering across connected patches.
//!
//! Nodes of different patches that must coincide are collected into equivalence classes. The
//! patches are then numbered one after another in model order, each in its own I-J-K order,
//! with a single running counter. Before a patch is numbered it receives a [`BlockNodes`]
//! record holding the numbers its shared nodes already got from previously numbered patches,
//! so every physical node ends up with exactly one global number.
use crate::error::ModelError;
use crate::patch::Patch;
use crate::topology::Connection;
use log::debug;
use rustc_hash::FxHashMap;

/// Hands out consecutive global node numbers during one numbering pass.
#[derive(Debug, Default)]
pub struct NodeCounter {
    next: usize,
}

impl NodeCounter {
    pub fn next(&mut self) -> usize {
        let number = self.next;
        self.next += 1;
        number
    }

    /// The number of node numbers handed out so far.
    pub fn count(&self) -> usize {
        self.next
    }
}

/// Global node numbers already assigned to the nodes of a patch before the patch is numbered.
///
/// The shared entities of a patch (its vertices, edges, faces and interior) are not kept
/// apart: the record is flattened to one entry per local node, in the patch's node order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockNodes {
    preassigned: Vec<Option<usize>>,
    aliases: Vec<Option<usize>>,
}

impl BlockNodes {
    /// A record for a patch with `num_nodes` nodes and no shared nodes.
    pub fn unassigned(num_nodes: usize) -> Self {
        Self {
            preassigned: vec![None; num_nodes],
            aliases: vec![None; num_nodes],
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.preassigned.len()
    }

    /// The number assigned to the node by a previously numbered patch.
    pub fn preassigned(&self, node: usize) -> Option<usize> {
        self.preassigned[node]
    }

    /// An earlier local node of the same patch that the node coincides with (periodic
    /// closure or a connection of the patch with itself).
    pub fn alias(&self, node: usize) -> Option<usize> {
        self.aliases[node]
    }

    pub fn num_preassigned(&self) -> usize {
        self.preassigned.iter().flatten().count()
    }
}

/// Equivalence classes of `(patch, local node)` pairs, stored as a disjoint-set forest over
/// the concatenated local node ranges of all patches.
#[derive(Debug)]
pub struct GlobalNodeNumbering {
    offsets: Vec<usize>,
    parent: Vec<usize>,
}

impl GlobalNodeNumbering {
    /// Prepares numbering for patches with the given numbers of nodes.
    pub fn new(num_nodes: impl IntoIterator<Item = usize>) -> Self {
        let mut offsets = vec![0];
        for n in num_nodes {
            let last = *offsets.last().unwrap_or(&0);
            offsets.push(last + n);
        }
        let total = *offsets.last().unwrap_or(&0);
        Self {
            offsets,
            parent: (0..total).collect(),
        }
    }

    pub fn num_patches(&self) -> usize {
        self.offsets.len() - 1
    }

    fn id(&self, patch: usize, node: usize) -> usize {
        debug_assert!(self.offsets[patch] + node < self.offsets[patch + 1]);
        self.offsets[patch] + node
    }

    fn find(&mut self, mut id: usize) -> usize {
        while self.parent[id] != id {
            self.parent[id] = self.parent[self.parent[id]];
            id = self.parent[id];
        }
        id
    }

    /// Declares that two nodes (0-based patch indices) are the same physical node.
    pub fn alias(&mut self, (patch_a, node_a): (usize, usize), (patch_b, node_b): (usize, usize)) {
        let a = self.find(self.id(patch_a, node_a));
        let b = self.find(self.id(patch_b, node_b));
        // The smaller id is kept as root so the forest does not depend on the order of calls
        if a < b {
            self.parent[b] = a;
        } else if b < a {
            self.parent[a] = b;
        }
    }

    /// Aliases the node pairs of a connection between two patches.
    pub fn connect(&mut self, connection: &Connection, master: &Patch, slave: &Patch) -> Result<(), ModelError> {
        let pairs = connection.node_pairs(
            (master.param_dim(), master.node_counts()),
            (slave.param_dim(), slave.node_counts()),
        )?;
        for (m, s) in pairs {
            self.alias((connection.master - 1, m), (connection.slave - 1, s));
        }
        Ok(())
    }

    /// Aliases the first and last node layers of a patch in the given direction.
    pub fn close_periodic(&mut self, patch: usize, node_counts: [usize; 3], direction: usize) {
        let n = node_counts;
        for k in 0..n[2] {
            for j in 0..n[1] {
                for i in 0..n[0] {
                    let ijk = [i, j, k];
                    if ijk[direction] != 0 {
                        continue;
                    }
                    let mut last = ijk;
                    last[direction] = n[direction] - 1;
                    let first = i + n[0] * (j + n[1] * k);
                    let last = last[0] + n[0] * (last[1] + n[1] * last[2]);
                    self.alias((patch, first), (patch, last));
                }
            }
        }
    }

    fn block_nodes(&mut self, patch: usize, numbers: &[Option<usize>]) -> BlockNodes {
        let num_nodes = self.offsets[patch + 1] - self.offsets[patch];
        let mut block = BlockNodes::unassigned(num_nodes);
        let mut first_in_patch = FxHashMap::default();
        for node in 0..num_nodes {
            let root = self.find(self.id(patch, node));
            block.preassigned[node] = numbers[root];
            let first = *first_in_patch.entry(root).or_insert(node);
            if first != node {
                block.aliases[node] = Some(first);
            }
        }
        block
    }

    /// Numbers all patches in order and returns the number of distinct global nodes.
    ///
    /// The counter only lives for the duration of this call.
    pub fn assign(mut self, patches: &mut [Patch]) -> usize {
        debug_assert_eq!(patches.len(), self.num_patches());
        let mut numbers: Vec<Option<usize>> = vec![None; self.parent.len()];
        let mut counter = NodeCounter::default();
        for (index, patch) in patches.iter_mut().enumerate() {
            let block = self.block_nodes(index, &numbers);
            let shared = block.num_preassigned();
            patch.assign_node_numbers(block, &mut counter);
            for (node, &number) in patch.global_nodes().iter().enumerate() {
                let root = self.find(self.id(index, node));
                numbers[root] = Some(number);
            }
            debug!(
                "Patch {}: {} nodes, {} shared with previous patches",
                index + 1,
                patch.num_nodes(),
                shared
            );
        }
        counter.count()
    }
}
