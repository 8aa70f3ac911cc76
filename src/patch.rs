//! Structured spline patches and their finite element topology.
use crate::element::{evaluate_point, jacobian_determinant, ElementData};
use crate::error::{IntegrationError, ModelError};
use crate::integrate::{group_partials, merge_partials, GlobalIntegral, Integrand, IntegrationMode, TimeDomain};
use crate::numbering::{BlockNodes, NodeCounter};
use crate::partition::{structured_groups, ElementGroups, ThreadGroups};
use crate::topology::{Boundary, LocalEntity, Side};
use fenris_nested_vec::NestedVec;
use fenris_spline::g2::{read_g2, to_g2_string};
use fenris_spline::geometry::lattice;
use fenris_spline::quadrature::GaussRule;
use fenris_spline::{BsplineBasis, SplineError, SplineGeometry};
use log::{debug, warn};
use nalgebra::Vector3;

/// A single spline patch together with its nodes, elements and element groups.
///
/// Every control point of the geometry is a node, and every non-empty knot span (or product of
/// spans) is an element. Nodes are numbered locally in I-J-K order with I varying fastest. Once
/// the patch is part of a numbered model, every local node also carries a global number.
///
/// Any change of the basis (refinement, order elevation, periodic closure) regenerates the
/// element topology and discards both the global numbering and the element groups, which then
/// need to be recomputed before the patch can be integrated again.
#[derive(Debug, Clone)]
pub struct Patch {
    geometry: Option<SplineGeometry>,
    index: usize,
    swapped: bool,
    periodic: [bool; 3],
    node_counts: [usize; 3],
    element_counts: [usize; 3],
    /// Knot span of every element in each direction.
    element_spans: Vec<[usize; 3]>,
    /// Per-direction index of the first node of every element.
    first_nodes: Vec<[usize; 3]>,
    /// Local nodes of every element.
    mnpc: NestedVec<usize>,
    global_nodes: Option<Vec<usize>>,
    /// Global nodes of every element, once numbered.
    global_mnpc: NestedVec<usize>,
    groups: Option<ThreadGroups>,
}

impl Patch {
    /// Creates a patch from a geometry.
    ///
    /// A volume in 3D whose parametrization is left-handed is flipped by reversing its third
    /// parametric direction, and marked as swapped.
    pub fn new(mut geometry: SplineGeometry) -> Result<Self, ModelError> {
        let mut swapped = false;
        if geometry.param_dim() == 3 && geometry.dimension() == 3 {
            let centre: Vec<f64> = geometry
                .bases()
                .iter()
                .map(|basis| 0.5 * (basis.start() + basis.end()))
                .collect();
            if jacobian_determinant(&geometry, &centre)? < 0.0 {
                warn!("Left-handed volume patch, reversing the third parametric direction");
                geometry.reverse(2)?;
                swapped = true;
            }
        }

        let mut patch = Self {
            geometry: Some(geometry),
            index: 0,
            swapped,
            periodic: [false; 3],
            node_counts: [0; 3],
            element_counts: [0; 3],
            element_spans: Vec::new(),
            first_nodes: Vec::new(),
            mnpc: NestedVec::new(),
            global_nodes: None,
            global_mnpc: NestedVec::new(),
            groups: None,
        };
        patch.generate_fem_topology();
        Ok(patch)
    }

    /// Reads the first patch of a g2 text.
    pub fn read(text: &str) -> Result<Self, ModelError> {
        let geometry = read_g2(text)?
            .into_iter()
            .next()
            .ok_or_else(|| SplineError::Parse {
                message: "no patch found".to_string(),
            })?;
        Self::new(geometry)
    }

    /// The geometry in g2 format.
    pub fn to_g2(&self) -> Result<String, ModelError> {
        Ok(to_g2_string(self.geometry_ref()?)?)
    }

    /// 1-based index of the patch within its model, or 0 for a patch not added to a model.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn geometry(&self) -> Option<&SplineGeometry> {
        self.geometry.as_ref()
    }

    fn geometry_ref(&self) -> Result<&SplineGeometry, ModelError> {
        self.geometry
            .as_ref()
            .ok_or(ModelError::MissingGeometry { patch: self.index })
    }

    fn geometry_mut(&mut self) -> Result<&mut SplineGeometry, ModelError> {
        let patch = self.index;
        self.geometry.as_mut().ok_or(ModelError::MissingGeometry { patch })
    }

    /// Number of parametric directions (0 without geometry).
    pub fn param_dim(&self) -> usize {
        self.geometry.as_ref().map_or(0, SplineGeometry::param_dim)
    }

    /// Number of spatial dimensions (0 without geometry).
    pub fn spatial_dim(&self) -> usize {
        self.geometry.as_ref().map_or(0, SplineGeometry::dimension)
    }

    pub fn is_rational(&self) -> bool {
        self.geometry.as_ref().map_or(false, SplineGeometry::is_rational)
    }

    /// Whether the third parametric direction was reversed to obtain a right-handed volume.
    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    /// Polynomial order per direction, padded with 1.
    pub fn order(&self) -> [usize; 3] {
        self.geometry.as_ref().map_or([1; 3], SplineGeometry::orders)
    }

    /// Number of nodes per direction.
    pub fn node_counts(&self) -> [usize; 3] {
        self.node_counts
    }

    /// Number of elements per direction.
    pub fn element_counts(&self) -> [usize; 3] {
        self.element_counts
    }

    pub fn num_nodes(&self) -> usize {
        self.node_counts.iter().product()
    }

    pub fn num_elements(&self) -> usize {
        self.mnpc.len()
    }

    pub fn periodic(&self) -> [bool; 3] {
        self.periodic
    }

    /// Drops topology, numbering and element groups, and the geometry too unless
    /// `retain_geometry` is set.
    pub fn clear(&mut self, retain_geometry: bool) {
        if !retain_geometry {
            self.geometry = None;
            self.swapped = false;
            self.periodic = [false; 3];
        }
        self.generate_fem_topology();
    }

    /// Rebuilds the element lattice and connectivity from the current basis.
    fn generate_fem_topology(&mut self) {
        self.global_nodes = None;
        self.global_mnpc = NestedVec::new();
        self.groups = None;
        self.element_spans.clear();
        self.first_nodes.clear();
        self.mnpc = NestedVec::new();

        let Some(geometry) = &self.geometry else {
            self.node_counts = [0; 3];
            self.element_counts = [0; 3];
            return;
        };

        let spans: Vec<Vec<usize>> = (0..3)
            .map(|d| geometry.bases().get(d).map_or_else(|| vec![0], BsplineBasis::spans))
            .collect();
        let orders = geometry.orders();
        let n = geometry.num_coefs();
        self.node_counts = n;
        self.element_counts = [spans[0].len(), spans[1].len(), spans[2].len()];

        for [a, b, c] in lattice(self.element_counts) {
            let span = [spans[0][a], spans[1][b], spans[2][c]];
            let first = [
                span[0] + 1 - orders[0],
                span[1] + 1 - orders[1],
                span[2] + 1 - orders[2],
            ];
            let mut nodes = self.mnpc.begin_array();
            for [i, j, k] in lattice(orders) {
                nodes.push_single((first[0] + i) + n[0] * ((first[1] + j) + n[1] * (first[2] + k)));
            }
            drop(nodes);
            self.element_spans.push(span);
            self.first_nodes.push(first);
        }
    }

    /// Inserts `n` equidistant knots inside every knot span of the given direction.
    pub fn uniform_refine(&mut self, direction: usize, n: usize) -> Result<(), ModelError> {
        self.geometry_mut()?.uniform_refine(direction, n)?;
        self.generate_fem_topology();
        Ok(())
    }

    /// Inserts the given knots in one direction.
    pub fn refine(&mut self, direction: usize, knots: &[f64]) -> Result<(), ModelError> {
        self.geometry_mut()?.insert_knots(direction, knots)?;
        self.generate_fem_topology();
        Ok(())
    }

    /// Raises the order by `times[d]` in each direction `d`. Entries for unused directions must
    /// be zero.
    pub fn raise_order(&mut self, times: [usize; 3]) -> Result<(), ModelError> {
        let geometry = self.geometry_mut()?;
        for (direction, &t) in times.iter().enumerate() {
            if t > 0 {
                geometry.raise_order(direction, t)?;
            }
        }
        self.generate_fem_topology();
        Ok(())
    }

    /// Makes the patch periodic in the given direction: the first and last node layers become
    /// the same nodes when the model is numbered.
    pub fn close_periodic(&mut self, direction: usize) -> Result<(), ModelError> {
        self.geometry_ref()?.basis(direction)?;
        if self.node_counts[direction] < 2 {
            return Err(ModelError::InvalidConfiguration(format!(
                "patch {} has a single node layer in direction {direction}",
                self.index
            )));
        }
        self.periodic[direction] = true;
        self.global_nodes = None;
        self.global_mnpc = NestedVec::new();
        self.groups = None;
        Ok(())
    }

    /// Adds a displacement to every node. `displacement` holds `spatial_dim` values per node.
    pub fn update_coords(&mut self, displacement: &[f64]) -> Result<(), ModelError> {
        let nsd = self.spatial_dim();
        let expected = nsd * self.num_nodes();
        if displacement.len() != expected {
            return Err(ModelError::DimensionMismatch {
                expected,
                actual: displacement.len(),
            });
        }
        let geometry = self.geometry_mut()?;
        for (node, u) in displacement.chunks_exact(nsd).enumerate() {
            geometry.translate_control_point(node, u);
        }
        Ok(())
    }

    /// Coordinates of a local node.
    pub fn coord(&self, node: usize) -> Option<Vector3<f64>> {
        let geometry = self.geometry.as_ref()?;
        (node < self.num_nodes()).then(|| Vector3::from(geometry.control_point(node)))
    }

    pub fn nodal_coordinates(&self) -> Vec<Vector3<f64>> {
        (0..self.num_nodes()).filter_map(|node| self.coord(node)).collect()
    }

    pub fn element_coordinates(&self, element: usize) -> Option<Vec<Vector3<f64>>> {
        let nodes = self.mnpc.get(element)?;
        nodes.iter().map(|&node| self.coord(node)).collect()
    }

    /// Maps relative parameters in `[0, 1]` in each direction to a physical point.
    pub fn eval_point(&self, xi: &[f64]) -> Result<Vector3<f64>, ModelError> {
        let geometry = self.geometry_ref()?;
        if xi.len() != geometry.param_dim() {
            return Err(ModelError::DimensionMismatch {
                expected: geometry.param_dim(),
                actual: xi.len(),
            });
        }
        let u: Vec<f64> = geometry
            .bases()
            .iter()
            .zip(xi)
            .map(|(basis, &xi)| basis.start() + xi * (basis.end() - basis.start()))
            .collect();
        Ok(Vector3::from(geometry.evaluate(&u)?))
    }

    /// Local nodes of an element.
    pub fn local_element_nodes(&self, element: usize) -> Option<&[usize]> {
        self.mnpc.get(element)
    }

    /// Nodes of an element, global if the patch has been numbered and local otherwise.
    pub fn element_nodes(&self, element: usize) -> Option<&[usize]> {
        self.connectivity().get(element)
    }

    fn connectivity(&self) -> &NestedVec<usize> {
        if self.global_nodes.is_some() {
            &self.global_mnpc
        } else {
            &self.mnpc
        }
    }

    pub fn is_numbered(&self) -> bool {
        self.global_nodes.is_some()
    }

    /// Global numbers of the local nodes, empty before numbering.
    pub fn global_nodes(&self) -> &[usize] {
        self.global_nodes.as_deref().unwrap_or(&[])
    }

    pub fn global_node(&self, node: usize) -> Option<usize> {
        self.global_nodes.as_ref()?.get(node).copied()
    }

    /// Assigns global numbers to all nodes, walking the local nodes in I-J-K order.
    ///
    /// Nodes that already received a number from a previously numbered patch keep it, nodes
    /// that coincide with an earlier node of this patch share its number, and all other nodes
    /// draw a fresh number from the counter.
    pub fn assign_node_numbers(&mut self, block: BlockNodes, counter: &mut NodeCounter) {
        debug_assert_eq!(block.num_nodes(), self.num_nodes());
        let mut numbers: Vec<usize> = Vec::with_capacity(block.num_nodes());
        for node in 0..block.num_nodes() {
            let number = match (block.preassigned(node), block.alias(node)) {
                (Some(number), _) => number,
                (None, Some(alias)) => numbers[alias],
                (None, None) => counter.next(),
            };
            numbers.push(number);
        }

        let mut global_mnpc = NestedVec::new();
        for nodes in self.mnpc.iter() {
            let mut array = global_mnpc.begin_array();
            for &node in nodes {
                array.push_single(numbers[node]);
            }
        }
        self.global_mnpc = global_mnpc;
        self.global_nodes = Some(numbers);
        self.groups = None;
    }

    /// Elements adjacent to the boundary with the given 1-based local index.
    pub fn boundary_elements(&self, index: usize) -> Option<Vec<usize>> {
        let boundary = Boundary::from_index(self.param_dim(), index)?;
        let d = boundary.direction;
        let layer = match boundary.side {
            Side::Min => 0,
            Side::Max => self.element_counts[d].checked_sub(1)?,
        };
        let elements = lattice(self.element_counts)
            .enumerate()
            .filter(|(_, abc)| abc[d] == layer)
            .map(|(element, _)| element)
            .collect();
        Some(elements)
    }

    pub fn num_boundary_elements(&self, index: usize) -> usize {
        self.boundary_elements(index).map_or(0, |elements| elements.len())
    }

    /// Nodes on a vertex, edge or face of the patch, given by its 1-based local index and
    /// dimension. The numbers are global if the patch has been numbered.
    pub fn boundary_nodes(&self, index: usize, dim: usize) -> Result<Vec<usize>, ModelError> {
        let entity = LocalEntity::new(self.param_dim(), index, dim).ok_or(ModelError::InvalidEntity {
            patch: self.index,
            index,
            dim,
        })?;
        let nodes = entity.nodes(self.node_counts, 0);
        Ok(match &self.global_nodes {
            Some(global) => nodes.into_iter().map(|node| global[node]).collect(),
            None => nodes,
        })
    }

    /// Partitions the elements, and the elements of every boundary, into node-disjoint groups.
    pub fn generate_thread_groups(&mut self) {
        let connectivity = self.connectivity();
        let nodes_of = |element: usize| connectivity.get(element).unwrap_or(&[]);
        let orders = self.order();
        let groups_for = |elements: &[usize]| structured_groups(elements, &self.first_nodes, orders, nodes_of);

        let all: Vec<usize> = (0..self.num_elements()).collect();
        let interior = groups_for(&all);
        let boundaries: Vec<ElementGroups> = (1..=2 * self.param_dim())
            .map(|index| groups_for(&self.boundary_elements(index).unwrap_or_default()))
            .collect();
        debug!(
            "Patch {}: {} elements in {} groups",
            self.index,
            all.len(),
            interior.len()
        );
        self.groups = Some(ThreadGroups { interior, boundaries });
    }

    /// The element groups, if they are up to date.
    pub fn thread_groups(&self) -> Option<&ThreadGroups> {
        self.groups.as_ref()
    }

    fn quadrature_points<I: Integrand>(&self, integrand: &I) -> [usize; 3] {
        let order = self.order();
        let mut points = [1; 3];
        for d in 0..self.param_dim() {
            points[d] = integrand.quadrature_points(order[d]).max(1);
        }
        points
    }

    /// Evaluates the basis and geometry of an element at tensor-product Gauss points, or at
    /// the Gauss points of one of its boundaries.
    pub fn element_data(
        &self,
        element: usize,
        points: [usize; 3],
        boundary: Option<Boundary>,
    ) -> Result<ElementData, IntegrationError> {
        let geometry = self
            .geometry
            .as_ref()
            .ok_or(IntegrationError::MissingGeometry { patch: self.index })?;
        let nodes = self
            .element_nodes(element)
            .ok_or(IntegrationError::ElementOutOfRange { element })?
            .to_vec();
        let param_dim = geometry.param_dim();
        let spans = self.element_spans[element];

        let mut rules: Vec<Vec<(f64, f64)>> = vec![vec![(0.0, 1.0)]; 3];
        for (d, basis) in geometry.bases().iter().enumerate() {
            rules[d] = match boundary {
                Some(b) if b.direction == d => {
                    let u = match b.side {
                        Side::Min => basis.start(),
                        Side::Max => basis.end(),
                    };
                    vec![(u, 1.0)]
                }
                _ => {
                    let knots = basis.knots();
                    GaussRule::new(points[d])
                        .mapped(knots[spans[d]], knots[spans[d] + 1])
                        .collect()
                }
            };
        }

        let sizes = [rules[0].len(), rules[1].len(), rules[2].len()];
        let mut quadrature_points = Vec::with_capacity(sizes.iter().product());
        for ijk in lattice(sizes) {
            let u: Vec<f64> = (0..param_dim).map(|d| rules[d][ijk[d]].0).collect();
            let weight: f64 = (0..param_dim).map(|d| rules[d][ijk[d]].1).product();
            quadrature_points.push(evaluate_point(
                geometry,
                element,
                &spans[..param_dim],
                &u,
                weight,
                boundary,
            )?);
        }

        Ok(ElementData {
            index: element,
            nodes,
            points: quadrature_points,
        })
    }

    /// Integrates over all elements of the patch.
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
        let partials = self.interior_partials(integrand, global, time, mode)?;
        merge_partials::<I::Output, G>(global, partials);
        Ok(())
    }

    /// Integrates over the boundary with the given 1-based local index.
    pub fn integrate_boundary<I, G>(
        &self,
        index: usize,
        integrand: &I,
        global: &mut G,
        time: &TimeDomain,
        mode: IntegrationMode,
    ) -> Result<(), IntegrationError>
    where
        I: Integrand,
        G: GlobalIntegral<I::Output> + Sync,
    {
        let partials = self.boundary_partials(index, integrand, global, time, mode)?;
        merge_partials::<I::Output, G>(global, partials);
        Ok(())
    }

    /// Group partials of the interior integration, not yet merged into `global`.
    pub(crate) fn interior_partials<I, G>(
        &self,
        integrand: &I,
        global: &G,
        time: &TimeDomain,
        mode: IntegrationMode,
    ) -> Result<Vec<G::Partial>, IntegrationError>
    where
        I: Integrand,
        G: GlobalIntegral<I::Output> + Sync,
    {
        let groups = self
            .groups
            .as_ref()
            .ok_or(IntegrationError::StaleThreadGroups { patch: self.index })?;
        let points = self.quadrature_points(integrand);
        group_partials(&groups.interior, mode, global, |element| {
            let data = self.element_data(element, points, None)?;
            let local = integrand
                .evaluate(&data, time)
                .map_err(|source| IntegrationError::Integrand { element, source })?;
            Ok((data, local))
        })
    }

    pub(crate) fn boundary_partials<I, G>(
        &self,
        index: usize,
        integrand: &I,
        global: &G,
        time: &TimeDomain,
        mode: IntegrationMode,
    ) -> Result<Vec<G::Partial>, IntegrationError>
    where
        I: Integrand,
        G: GlobalIntegral<I::Output> + Sync,
    {
        let boundary =
            Boundary::from_index(self.param_dim(), index).ok_or(IntegrationError::InvalidBoundary { index })?;
        let groups = self
            .groups
            .as_ref()
            .ok_or(IntegrationError::StaleThreadGroups { patch: self.index })?
            .boundary(index)
            .ok_or(IntegrationError::InvalidBoundary { index })?;
        let points = self.quadrature_points(integrand);
        group_partials(groups, mode, global, |element| {
            let data = self.element_data(element, points, Some(boundary))?;
            let local = integrand
                .evaluate_boundary(&data, time)
                .map_err(|source| IntegrationError::Integrand { element, source })?;
            Ok((data, local))
        })
    }
}
