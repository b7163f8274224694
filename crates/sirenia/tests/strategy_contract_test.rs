use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sirenia::{
    CancelToken, GridSnapStrategy, LayoutConfig, LayoutEdge, LayoutStrategy, PositionedNode,
    ProgressiveForceStrategy, SimulatedAnnealingStrategy,
};

fn random_graph(seed: u64, n: usize, m: usize) -> (Vec<PositionedNode>, Vec<LayoutEdge>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let nodes: Vec<PositionedNode> = (0..n)
        .map(|i| {
            PositionedNode::new(
                format!("n{i}"),
                rng.gen_range(40.0..160.0),
                rng.gen_range(20.0..80.0),
                rng.gen_range(0.0..1200.0),
                rng.gen_range(0.0..800.0),
            )
        })
        .collect();
    let edges: Vec<LayoutEdge> = (0..m)
        .map(|k| LayoutEdge {
            id: format!("e{k}"),
            source: format!("n{}", rng.gen_range(0..n)),
            target: format!("n{}", rng.gen_range(0..n)),
            label: (k % 3 == 0).then(|| format!("label {k}")),
            points: Vec::new(),
        })
        .collect();
    (nodes, edges)
}

fn strategies() -> Vec<Box<dyn LayoutStrategy>> {
    vec![
        Box::new(ProgressiveForceStrategy::default()),
        Box::new(SimulatedAnnealingStrategy::default()),
        Box::new(GridSnapStrategy::default()),
    ]
}

#[test]
fn strategies_preserve_node_and_edge_identity() {
    let cfg = LayoutConfig::default().with_seed(31);
    let (nodes, edges) = random_graph(31, 12, 18);
    let before = nodes.clone();
    for s in strategies() {
        let out = s
            .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
            .unwrap_or_else(|e| panic!("{} failed: {e}", s.name()));
        assert_eq!(nodes, before, "{} mutated its input", s.name());
        assert_eq!(out.layout.nodes.len(), nodes.len(), "{}", s.name());
        for (a, b) in nodes.iter().zip(&out.layout.nodes) {
            assert_eq!(a.id, b.id, "{}", s.name());
            assert_eq!((a.width, a.height), (b.width, b.height), "{}", s.name());
            assert!(b.x.is_finite() && b.y.is_finite(), "{}", s.name());
        }
        assert_eq!(out.layout.edges, edges, "{}", s.name());
        assert!(
            out.layout.edges.iter().all(|e| e.points.is_empty()),
            "{} routed an edge",
            s.name()
        );
    }
}

#[test]
fn strategies_handle_empty_input() {
    let cfg = LayoutConfig::default().with_seed(1);
    for s in strategies() {
        let out = s
            .apply(&[], &[], &cfg, None, &CancelToken::new())
            .unwrap_or_else(|e| panic!("{} failed: {e}", s.name()));
        assert!(out.layout.nodes.is_empty(), "{}", s.name());
        assert_eq!(out.metrics.overlap_count, 0);
    }
}

#[test]
fn strategies_stop_when_cancelled() {
    let cfg = LayoutConfig::default().with_seed(2);
    let (nodes, edges) = random_graph(2, 10, 10);
    let token = CancelToken::new();
    token.cancel();
    for s in strategies() {
        assert!(
            s.apply(&nodes, &edges, &cfg, None, &token).is_err(),
            "{} ignored cancellation",
            s.name()
        );
    }
}

#[test]
fn grid_snap_is_overlap_free_for_random_sizes() {
    let cfg = LayoutConfig::default();
    for seed in 0..10 {
        let (nodes, edges) = random_graph(seed, 5 + seed as usize * 7, 0);
        let out = GridSnapStrategy::default()
            .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
            .expect("grid");
        assert_eq!(out.metrics.overlap_count, 0, "seed {seed}");
        assert!(out.success);
    }
}

#[test]
fn grid_snap_is_deterministic() {
    let cfg = LayoutConfig::default();
    let (nodes, edges) = random_graph(5, 9, 4);
    let a = GridSnapStrategy::default()
        .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
        .expect("grid");
    let b = GridSnapStrategy::default()
        .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
        .expect("grid");
    assert_eq!(a.layout.nodes, b.layout.nodes);
}
