//! Partitioning of patch elements into groups that can be assembled concurrently.
//!
//! Within one group no two elements share a node. Groups are derived from the element lattice
//! of the patch: two elements whose first node indices differ by less than the order in every
//! direction may share nodes, so elements are grouped by the first node index modulo the order
//! in each direction. With periodic closure the lattice wraps around and this may fail near the
//! seam, in which case offending groups are split further by a greedy coloring.
use fenris_nested_vec::NestedVec;
use log::debug;
use std::collections::BTreeMap;
use std::mem;

/// An ordered sequence of element groups.
#[derive(Debug, Clone, Default)]
pub struct ElementGroups {
    groups: NestedVec<usize>,
}

impl ElementGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&[usize]> {
        self.groups.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &[usize]> {
        self.groups.iter()
    }

    /// Total number of elements over all groups.
    pub fn num_elements(&self) -> usize {
        self.groups.iter().map(<[usize]>::len).sum()
    }

    /// Checks that no two elements of a group share a node.
    pub fn is_node_disjoint<'a>(&self, element_nodes: impl Fn(usize) -> &'a [usize]) -> bool {
        self.groups
            .iter()
            .all(|group| first_conflict(group, &element_nodes).is_none())
    }
}

impl From<Vec<Vec<usize>>> for ElementGroups {
    fn from(groups: Vec<Vec<usize>>) -> Self {
        Self {
            groups: NestedVec::from(groups),
        }
    }
}

/// Element groups for interior integration and for each boundary of a patch.
#[derive(Debug, Clone, Default)]
pub struct ThreadGroups {
    pub interior: ElementGroups,
    /// Groups for the boundaries, indexed by local boundary index minus one.
    pub boundaries: Vec<ElementGroups>,
}

impl ThreadGroups {
    /// The groups of the boundary with the given 1-based local index.
    pub fn boundary(&self, index: usize) -> Option<&ElementGroups> {
        index.checked_sub(1).and_then(|i| self.boundaries.get(i))
    }
}

fn first_conflict<'a>(group: &[usize], element_nodes: &impl Fn(usize) -> &'a [usize]) -> Option<usize> {
    let mut seen = rustc_hash::FxHashSet::default();
    for &element in group {
        // An element may list a node twice when a periodic patch has a single element
        let nodes = element_nodes(element);
        if nodes.iter().any(|node| seen.contains(node)) {
            return Some(element);
        }
        seen.extend(nodes.iter().copied());
    }
    None
}

/// Groups elements by their first node index modulo the order in each direction.
///
/// `elements` lists the elements to partition in ascending order, and `first_nodes` gives the
/// per-direction index of the first node of every element of the patch. Groups are ordered by
/// their residue class (third direction slowest), and elements keep their relative order.
pub fn structured_groups<'a>(
    elements: &[usize],
    first_nodes: &[[usize; 3]],
    orders: [usize; 3],
    element_nodes: impl Fn(usize) -> &'a [usize],
) -> ElementGroups {
    let mut classes: BTreeMap<[usize; 3], Vec<usize>> = BTreeMap::new();
    for &element in elements {
        let first = first_nodes[element];
        let key = [first[2] % orders[2], first[1] % orders[1], first[0] % orders[0]];
        classes.entry(key).or_default().push(element);
    }

    let mut groups = Vec::with_capacity(classes.len());
    let mut num_split = 0;
    for (_, class) in classes {
        if first_conflict(&class, &element_nodes).is_none() {
            groups.push(class);
        } else {
            num_split += 1;
            groups.extend(greedy_split(&class, &element_nodes));
        }
    }
    if num_split > 0 {
        debug!("Split {num_split} element groups with nodes shared across a periodic seam");
    }
    ElementGroups::from(groups)
}

/// Greedily splits a set of elements into node-disjoint groups.
///
/// Every round sweeps the remaining elements in order, taking each element whose nodes are not
/// yet used in the current round and postponing the rest to the next round.
pub fn greedy_split<'a>(elements: &[usize], element_nodes: &impl Fn(usize) -> &'a [usize]) -> Vec<Vec<usize>> {
    let mut groups = Vec::new();
    let mut current: Vec<usize> = elements.to_vec();
    let mut postponed = Vec::new();
    // Round in which each node was last used. Resized as larger node indices show up.
    let mut last_round: Vec<Option<usize>> = Vec::new();

    let mut round = 0;
    while !current.is_empty() {
        let mut group = Vec::new();
        for &element in &current {
            let nodes = element_nodes(element);
            let blocked = nodes
                .iter()
                .any(|&node| last_round.get(node).copied().flatten() == Some(round));
            if blocked {
                postponed.push(element);
            } else {
                for &node in nodes {
                    if node >= last_round.len() {
                        last_round.resize(2 * node + 1, None);
                    }
                    last_round[node] = Some(round);
                }
                group.push(element);
            }
        }
        groups.push(group);
        mem::swap(&mut current, &mut postponed);
        postponed.clear();
        round += 1;
    }
    groups
}
