//! Recursive construction of the placement tree.

use std::iter::Sum;
use std::ops::Add;
use std::ops::AddAssign;

use num_traits::Zero;
use rand::Rng;

use crate::algorithms::k_way_partition;
use crate::algorithms::FixedVertexBackend;
use crate::split::split_problem;
use crate::split::SubProblem;
use crate::CommMatrix;
use crate::Error;
use crate::TopologyShape;

/// Handle of a node inside its [`PlacementTree`].
pub type NodeId = usize;

/// A node of the placement tree.
///
/// Nodes own their children; the parent link is a plain index used only for
/// upward traversal.
#[derive(Clone, Debug)]
pub struct Node {
    id: usize,
    depth: usize,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    entity: Option<usize>,
}

impl Node {
    /// The physical leaf index at leaves, the child rank everywhere else.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// The entity bound to this leaf, or `None` for an unused physical slot
    /// (and for non-leaf nodes).
    pub fn entity(&self) -> Option<usize> {
        self.entity
    }
}

/// The result of a placement run: one leaf per physical slot, each carrying
/// either a real entity id or nothing.
///
/// The tree exclusively owns all its nodes and is dropped as a unit; it is
/// never mutated once built.
#[derive(Clone, Debug)]
pub struct PlacementTree {
    nodes: Vec<Node>,
    constrained: bool,
}

impl PlacementTree {
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// The leaves, in physical slot order.
    pub fn leaves(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| node.is_leaf())
    }

    /// Whether the tree was built under constraint-aware construction.
    pub fn constrained(&self) -> bool {
        self.constrained
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }
}

/// Pad the per-entity objective weights with synthetic entries for the filler
/// slots, using the mean of the real entries.
fn complete_objective_weights(weights: &mut Vec<f64>, filler: usize) {
    let synthetic = if weights.is_empty() {
        0.0
    } else {
        weights.iter().sum::<f64>() / weights.len() as f64
    };
    weights.extend(std::iter::repeat(synthetic).take(filler));
}

/// Build a [`PlacementTree`] by recursive k-way partitioning of a
/// communication matrix over a topology shape.
///
/// # Example
///
/// ```rust
/// use rand::SeedableRng as _;
///
/// let matrix = affinitree::CommMatrix::from_fn(4, |i, j| {
///     if i == j { 0.0 } else if (i < 2) == (j < 2) { 10.0 } else { 0.1 }
/// }).unwrap();
/// let topology = affinitree::TopologyShape::new(vec![2, 2]);
///
/// let tree = affinitree::TreeBuilder {
///     topology: &topology,
///     backend: None,
///     force_greedy: false,
///     trials: affinitree::MAX_TRIALS,
///     rng: rand::rngs::StdRng::seed_from_u64(1),
/// }
/// .build(&matrix, &[], None)
/// .unwrap();
///
/// assert_eq!(tree.leaves().count(), 4);
/// ```
pub struct TreeBuilder<'a, W, R> {
    pub topology: &'a TopologyShape,
    /// External partitioner to use at every level, when available.
    pub backend: Option<&'a mut dyn FixedVertexBackend<W>>,
    /// Ignore `backend` and always use the greedy partitioner.
    pub force_greedy: bool,
    /// Trial count of the greedy partitioner.
    pub trials: usize,
    pub rng: R,
}

impl<W, R> std::fmt::Debug for TreeBuilder<'_, W, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("topology", &self.topology)
            .field("backend", &self.backend.as_ref().map(|_| ".."))
            .field("force_greedy", &self.force_greedy)
            .field("trials", &self.trials)
            .finish_non_exhaustive()
    }
}

impl<W, R> TreeBuilder<'_, W, R>
where
    W: Copy + PartialOrd + AddAssign + Add<Output = W> + Zero + Sum + Send + Sync,
    R: Rng,
{
    /// Place the entities of `matrix` onto the topology's leaves.
    ///
    /// `constraints` is the ascending list of leaf slots already bound by an
    /// earlier decision; pass an empty slice for an unconstrained run.  When
    /// given, `obj_weights` is padded in place with one synthetic entry per
    /// filler slot, so that collaborators consuming it downstream see one
    /// entry per leaf.
    ///
    /// # Errors
    ///
    /// - [`Error::NotEnoughCapacity`] if the topology has fewer leaves than
    ///   `matrix.order()`,
    /// - [`Error::TooManyConstraints`] if `constraints` outnumber the
    ///   leaves,
    /// - [`Error::MalformedConstraints`] if `constraints` is not strictly
    ///   increasing within the leaf range.
    pub fn build(
        mut self,
        matrix: &CommMatrix<W>,
        constraints: &[usize],
        obj_weights: Option<&mut Vec<f64>>,
    ) -> Result<PlacementTree, Error> {
        let entities = matrix.order();
        let capacity = self.topology.leaf_count();
        let filler = match capacity.checked_sub(entities) {
            Some(filler) => filler,
            None => {
                tracing::error!(entities, capacity, "not enough leaves");
                return Err(Error::NotEnoughCapacity { entities, capacity });
            }
        };
        if constraints.len() > capacity {
            tracing::error!(
                count = constraints.len(),
                capacity,
                "more constraints than leaves"
            );
            return Err(Error::TooManyConstraints {
                count: constraints.len(),
                limit: capacity,
            });
        }
        if !constraints.windows(2).all(|pair| pair[0] < pair[1])
            || constraints.last().is_some_and(|&last| last >= capacity)
        {
            tracing::error!("constraints must be strictly increasing and in range");
            return Err(Error::MalformedConstraints);
        }
        tracing::info!(
            entities,
            capacity,
            filler,
            constraint_count = constraints.len(),
            "building placement tree"
        );

        if filler > 0 {
            if let Some(weights) = obj_weights {
                complete_objective_weights(weights, filler);
            }
        }

        // The vertex map numbers the leaves of the tree: real ids first,
        // filler sentinels for the padded tail.
        let real = if constraints.is_empty() {
            entities
        } else {
            entities.min(constraints.len())
        };
        let vertices: Vec<Option<usize>> = (0..capacity)
            .map(|slot| (slot < real).then_some(slot))
            .collect();

        let mut tree = PlacementTree {
            nodes: Vec::new(),
            constrained: true,
        };
        let root = tree.push(Node {
            id: 0,
            depth: 0,
            parent: None,
            children: Vec::new(),
            entity: None,
        });
        let problem = SubProblem {
            matrix: matrix.clone(),
            vertices,
            constraints: constraints.to_vec(),
        };
        self.build_level(&mut tree, root, problem, 0, 0)?;
        tracing::info!("placement tree done");
        Ok(tree)
    }

    fn build_level(
        &mut self,
        tree: &mut PlacementTree,
        node: NodeId,
        problem: SubProblem<W>,
        depth: usize,
        leaf_base: usize,
    ) -> Result<(), Error> {
        if depth == self.topology.levels() - 1 {
            tracing::debug!(leaf = leaf_base, entity = ?problem.vertices[0], "binding leaf");
            tree.nodes[node].id = leaf_base;
            tree.nodes[node].entity = problem.vertices[0];
            return Ok(());
        }

        let part_count = self.topology.arity(depth);
        let size = problem.vertices.len();
        tracing::debug!(
            order = problem.matrix.order(),
            size,
            part_count,
            depth,
            "partitioning level"
        );

        let mut partition = vec![0; size];
        k_way_partition(
            &mut partition,
            &problem.matrix,
            &problem.constraints,
            part_count,
            self.backend
                .as_mut()
                .map(|backend| &mut **backend as &mut dyn FixedVertexBackend<W>),
            self.force_greedy,
            self.trials,
            &mut self.rng,
        )?;
        tracing::debug!(depth, ?partition, "level partitioned");

        let leaf_width = self.topology.leaves_below(depth + 1);
        let children = split_problem(
            &problem.matrix,
            &partition,
            &problem.vertices,
            &problem.constraints,
            part_count,
            leaf_width,
        );

        for (rank, child_problem) in children.into_iter().enumerate() {
            let child = tree.push(Node {
                id: rank,
                depth: depth + 1,
                parent: Some(node),
                children: Vec::new(),
                entity: None,
            });
            tree.nodes[node].children.push(child);
            self.build_level(
                tree,
                child,
                child_problem,
                depth + 1,
                leaf_base + rank * leaf_width,
            )?;
        }
        Ok(())
    }
}
