//! End-to-end placement runs through the public API.

use affinitree::imbalance::part_sizes;
use affinitree::sprs::CsMatView;
use affinitree::BackendError;
use affinitree::CommMatrix;
use affinitree::FixedVertexBackend;
use affinitree::PlacementTree;
use affinitree::StrategyHint;
use affinitree::TopologyShape;
use affinitree::TreeBuilder;
use affinitree::MAX_TRIALS;
use affinitree::UNASSIGNED;
use rand::SeedableRng as _;
use rand_pcg::Pcg64;

fn build(
    matrix: &CommMatrix<f64>,
    topology: &TopologyShape,
    constraints: &[usize],
    seed: u64,
) -> PlacementTree {
    TreeBuilder {
        topology,
        backend: None,
        force_greedy: false,
        trials: MAX_TRIALS,
        rng: Pcg64::seed_from_u64(seed),
    }
    .build(matrix, constraints, None)
    .unwrap()
}

fn bound_entities(tree: &PlacementTree) -> Vec<usize> {
    let mut bound: Vec<usize> = tree.leaves().filter_map(|leaf| leaf.entity()).collect();
    bound.sort_unstable();
    bound
}

/// The leaf slot each entity ended up on, indexed by entity id.
fn placement(tree: &PlacementTree, entities: usize) -> Vec<usize> {
    let mut slots = vec![usize::MAX; entities];
    for leaf in tree.leaves() {
        if let Some(entity) = leaf.entity() {
            slots[entity] = leaf.id();
        }
    }
    slots
}

#[test]
fn cliques_land_on_the_same_subtree() {
    // Two tightly-coupled pairs on a 2-socket, 2-core machine: each pair must
    // share a socket.
    let matrix = CommMatrix::from_fn(4, |i, j| {
        if i == j {
            0.0
        } else if (i < 2) == (j < 2) {
            100.0
        } else {
            1.0
        }
    })
    .unwrap();
    let topology = TopologyShape::new(vec![2, 2]);

    for seed in 0..8 {
        let tree = build(&matrix, &topology, &[], seed);
        let slots = placement(&tree, 4);
        assert_eq!(slots[0] / 2, slots[1] / 2, "seed {seed}: {slots:?}");
        assert_eq!(slots[2] / 2, slots[3] / 2, "seed {seed}: {slots:?}");
        assert_eq!(bound_entities(&tree), vec![0, 1, 2, 3]);
    }
}

#[test]
fn undersubscribed_run_leaves_slots_free() {
    // 6 entities on an 8-leaf machine: every entity is bound exactly once and
    // exactly 2 leaves stay free.
    let matrix = CommMatrix::from_fn(6, |i, j| if i == j { 0.0 } else { (i + j) as f64 }).unwrap();
    let topology = TopologyShape::new(vec![2, 2, 2]);
    let tree = build(&matrix, &topology, &[], 3);

    assert_eq!(tree.leaves().count(), 8);
    assert_eq!(bound_entities(&tree), vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(tree.leaves().filter(|leaf| leaf.entity().is_none()).count(), 2);
}

#[test]
fn constraints_select_the_usable_leaves() {
    // Only slots 0 and 4 are usable, one per socket: the two entities must
    // land exactly on those slots, whichever way around.
    let matrix = CommMatrix::from_fn(2, |i, j| if i == j { 0.0 } else { 5.0 }).unwrap();
    let topology = TopologyShape::new(vec![2, 4]);

    for seed in 0..8 {
        let tree = build(&matrix, &topology, &[0, 4], seed);
        let mut slots = placement(&tree, 2);
        slots.sort_unstable();
        assert_eq!(slots, vec![0, 4], "seed {seed}");
        assert_eq!(bound_entities(&tree), vec![0, 1]);
    }
}

#[test]
fn oversubscription_folds_into_the_deepest_level() {
    // 8 entities on a 4-core machine with 2 slots per core.
    let matrix = CommMatrix::from_fn(8, |i, j| {
        if i == j {
            0.0
        } else if i / 2 == j / 2 {
            50.0
        } else {
            1.0
        }
    })
    .unwrap();
    let topology = TopologyShape::with_oversubscription(vec![2, 2], 2);
    assert_eq!(topology.leaf_count(), 8);

    let tree = build(&matrix, &topology, &[], 7);
    assert_eq!(bound_entities(&tree), (0..8).collect::<Vec<usize>>());
    // The deepest internal nodes fan out into 2 slots each.
    for node in tree.nodes() {
        if node.depth() == topology.levels() - 2 {
            assert_eq!(node.children().len(), 4);
        }
    }
}

#[test]
fn tree_structure_is_consistent() {
    let matrix = CommMatrix::from_fn(12, |i, j| ((i * 7 + j * 3) % 11) as f64).unwrap();
    let topology = TopologyShape::new(vec![2, 3, 2]);
    let tree = build(&matrix, &topology, &[], 21);

    let root = tree.node(tree.root());
    assert_eq!(root.depth(), 0);
    assert!(root.parent().is_none());
    for (id, node) in tree.nodes().enumerate() {
        for &child in node.children() {
            assert_eq!(tree.node(child).parent(), Some(id));
            assert_eq!(tree.node(child).depth(), node.depth() + 1);
        }
        if node.is_leaf() {
            assert_eq!(node.depth(), topology.levels() - 1);
        } else {
            assert_eq!(node.children().len(), topology.arity(node.depth()));
        }
    }
}

/// A backend that balances free slots round-robin while keeping the fixed
/// ones, ignoring affinities entirely.
struct RoundRobin;

impl FixedVertexBackend<f64> for RoundRobin {
    fn partition_fixed(
        &mut self,
        _adjacency: CsMatView<'_, f64>,
        part_count: usize,
        _hint: StrategyHint,
        part_ids: &mut [usize],
    ) -> Result<(), BackendError> {
        let target = part_ids.len() / part_count;
        let mut sizes = part_sizes(part_ids, part_count);
        for id in part_ids.iter_mut().filter(|id| **id == UNASSIGNED) {
            let part = (0..part_count)
                .find(|&part| sizes[part] < target)
                .ok_or("no room left")?;
            *id = part;
            sizes[part] += 1;
        }
        Ok(())
    }
}

#[test]
fn backend_driven_build_binds_everything() {
    let matrix = CommMatrix::from_fn(8, |i, j| if i == j { 0.0 } else { 1.0 }).unwrap();
    let topology = TopologyShape::new(vec![2, 2, 2]);
    let mut backend = RoundRobin;
    let tree = TreeBuilder {
        topology: &topology,
        backend: Some(&mut backend),
        force_greedy: false,
        trials: MAX_TRIALS,
        rng: Pcg64::seed_from_u64(0),
    }
    .build(&matrix, &[], None)
    .unwrap();
    assert_eq!(bound_entities(&tree), (0..8).collect::<Vec<usize>>());
}

/// A backend that must never be reached.
struct Untouchable;

impl FixedVertexBackend<f64> for Untouchable {
    fn partition_fixed(
        &mut self,
        _adjacency: CsMatView<'_, f64>,
        _part_count: usize,
        _hint: StrategyHint,
        _part_ids: &mut [usize],
    ) -> Result<(), BackendError> {
        panic!("the backend must not be invoked when greedy is forced");
    }
}

#[test]
fn forced_greedy_never_touches_the_backend() {
    let matrix = CommMatrix::from_fn(4, |i, j| if i == j { 0.0 } else { 2.0 }).unwrap();
    let topology = TopologyShape::new(vec![2, 2]);
    let mut backend = Untouchable;
    let tree = TreeBuilder {
        topology: &topology,
        backend: Some(&mut backend),
        force_greedy: true,
        trials: MAX_TRIALS,
        rng: Pcg64::seed_from_u64(13),
    }
    .build(&matrix, &[], None)
    .unwrap();
    assert_eq!(bound_entities(&tree), vec![0, 1, 2, 3]);
}
