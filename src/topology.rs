//! Shape of a hierarchical hardware topology.

/// Branching structure of a hardware topology, root to leaf.
///
/// The shape is given as one branching factor per depth (e.g. sockets, then
/// NUMA nodes, then cores) plus an oversubscription factor allowing more than
/// one placement slot per processing unit.  The oversubscription factor is
/// folded into the deepest branching factor, so that recursing through every
/// level always ends on single-slot problems.
#[derive(Clone, Debug)]
pub struct TopologyShape {
    arities: Vec<usize>,
    oversub: usize,
}

impl TopologyShape {
    /// A topology with the given branching factors and no oversubscription.
    ///
    /// # Panics
    ///
    /// Panics if `arities` is empty or contains a zero.
    pub fn new(arities: Vec<usize>) -> Self {
        Self::with_oversubscription(arities, 1)
    }

    /// A topology with the given branching factors, where each processing
    /// unit offers `oversub` placement slots.
    ///
    /// # Panics
    ///
    /// Panics if `arities` is empty, contains a zero, or `oversub` is zero.
    pub fn with_oversubscription(arities: Vec<usize>, oversub: usize) -> Self {
        assert!(!arities.is_empty(), "topology must have at least one level");
        assert!(
            arities.iter().all(|&arity| arity != 0),
            "branching factors must be non-zero"
        );
        assert_ne!(oversub, 0, "oversubscription factor must be non-zero");
        Self { arities, oversub }
    }

    /// The number of node levels of the placement tree, leaves included.
    pub fn levels(&self) -> usize {
        self.arities.len() + 1
    }

    /// The effective branching factor at `depth`, oversubscription included.
    pub fn arity(&self, depth: usize) -> usize {
        let factor = if depth + 1 == self.arities.len() {
            self.oversub
        } else {
            1
        };
        self.arities[depth] * factor
    }

    /// The number of leaves below one node at `depth`.
    pub fn leaves_below(&self, depth: usize) -> usize {
        (depth..self.arities.len()).map(|d| self.arity(d)).product()
    }

    /// Total number of placement slots.
    pub fn leaf_count(&self) -> usize {
        self.leaves_below(0)
    }

    /// Total number of physical processing units.
    pub fn processing_units(&self) -> usize {
        self.arities.iter().product()
    }

    /// The oversubscription factor.
    pub fn oversubscription(&self) -> usize {
        self.oversub
    }
}
