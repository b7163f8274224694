use super::{CancelToken, LayoutStrategy, ensure_finite, finish, rng_for};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::geometry::Rect;
use crate::graph::{DiagramLayout, LayoutEdge, LayoutResult, PositionedNode};
use crate::metrics::MetricsEvaluator;
use rand::Rng;
use std::time::Instant;

const RNG_SALT: u64 = 0xA2_2E_A1;

#[derive(Debug, Clone)]
pub struct AnnealingOptions {
    pub iterations: usize,
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Initial move radius as a fraction of the smaller canvas side.
    pub initial_radius_fraction: f64,
    /// Initial radius multiplier when a seed layout is given.
    pub warm_radius_factor: f64,
    pub min_radius: f64,
}

impl Default for AnnealingOptions {
    fn default() -> Self {
        Self {
            iterations: 1500,
            initial_temperature: 20.0,
            final_temperature: 0.05,
            initial_radius_fraction: 0.25,
            warm_radius_factor: 0.5,
            min_radius: 5.0,
        }
    }
}

/// Metropolis search over single-node moves, scored by the shared energy function.
///
/// The temperature decays geometrically from `initial_temperature` to `final_temperature`, and
/// the move radius shrinks with it. Moves that would make the moved node (inflated by half the
/// margin) touch more nodes than before are discarded outright. The lowest-energy state seen is
/// returned.
#[derive(Debug, Clone, Default)]
pub struct SimulatedAnnealingStrategy {
    pub options: AnnealingOptions,
}

impl SimulatedAnnealingStrategy {
    pub fn new(options: AnnealingOptions) -> Self {
        Self { options }
    }
}

impl LayoutStrategy for SimulatedAnnealingStrategy {
    fn name(&self) -> &'static str {
        "simulated-annealing"
    }

    fn apply(
        &self,
        nodes: &[PositionedNode],
        edges: &[LayoutEdge],
        config: &LayoutConfig,
        seed_layout: Option<&DiagramLayout>,
        cancel: &CancelToken,
    ) -> Result<LayoutResult> {
        let started = Instant::now();
        if nodes.is_empty() {
            return Ok(finish(Vec::new(), edges, config, started));
        }
        let opts = &self.options;
        let evaluator = MetricsEvaluator::new(nodes, edges, config);
        let mut rng = rng_for(config, RNG_SALT);

        let mut current: Vec<PositionedNode> = nodes.to_vec();
        let mut current_energy = evaluator.evaluate(&current).energy();
        let mut best = current.clone();
        let mut best_energy = current_energy;

        let t0 = opts.initial_temperature.max(1e-9);
        let t_final = opts.final_temperature.clamp(1e-12, t0);
        let iterations = opts.iterations.max(1);
        let mut r0 = opts.initial_radius_fraction * config.canvas_width.min(config.canvas_height);
        if seed_layout.is_some() {
            r0 *= opts.warm_radius_factor;
        }
        let gap = config.margin / 2.0;

        let mut accepted = 0usize;
        for k in 0..iterations {
            cancel.check()?;
            let temperature = t0 * (t_final / t0).powf(k as f64 / iterations as f64);
            let radius = opts.min_radius + (r0 - opts.min_radius).max(0.0) * (temperature / t0);

            let idx = rng.gen_range(0..current.len());
            let (old_x, old_y) = (current[idx].x, current[idx].y);
            let dx = rng.gen_range(-1.0..=1.0) * radius;
            let dy = rng.gen_range(-1.0..=1.0) * radius;
            let (x, y) = keep_inside(old_x + dx, old_y + dy, &current[idx], config);

            let before = touching(&current, idx, gap);
            current[idx].x = x;
            current[idx].y = y;
            if touching(&current, idx, gap) > before {
                current[idx].x = old_x;
                current[idx].y = old_y;
                continue;
            }

            let energy = evaluator.evaluate(&current).energy();
            let delta = energy - current_energy;
            let accept = delta < 0.0 || rng.gen_range(0.0..1.0) < (-delta / temperature).exp();
            if accept && energy.is_finite() {
                current_energy = energy;
                accepted += 1;
                if energy < best_energy {
                    best_energy = energy;
                    best.clone_from(&current);
                }
            } else {
                current[idx].x = old_x;
                current[idx].y = old_y;
            }
        }

        ensure_finite(self.name(), &best)?;
        tracing::trace!(iterations, accepted, best_energy, "annealing finished");
        Ok(finish(best, edges, config, started))
    }
}

/// Clamps a candidate center so the node stays on the canvas, when the canvas is large enough.
fn keep_inside(x: f64, y: f64, node: &PositionedNode, config: &LayoutConfig) -> (f64, f64) {
    fn axis(v: f64, half: f64, extent: f64) -> f64 {
        if extent >= 2.0 * half {
            v.clamp(half, extent - half)
        } else {
            v
        }
    }
    (
        axis(x, node.width / 2.0, config.canvas_width),
        axis(y, node.height / 2.0, config.canvas_height),
    )
}

/// Number of nodes the (inflated) node `idx` overlaps.
fn touching(nodes: &[PositionedNode], idx: usize, gap: f64) -> usize {
    let r = Rect::of(&nodes[idx]).inflate(gap);
    nodes
        .iter()
        .enumerate()
        .filter(|(j, n)| *j != idx && r.overlaps(&Rect::of(n)))
        .count()
}

#[cfg(test)]
mod tests {
    use super::{AnnealingOptions, SimulatedAnnealingStrategy};
    use crate::config::LayoutConfig;
    use crate::graph::{LayoutEdge, PositionedNode};
    use crate::metrics::compute_metrics;
    use crate::strategy::{CancelToken, LayoutStrategy};

    fn edge(s: &str, t: &str) -> LayoutEdge {
        LayoutEdge {
            id: format!("{s}-{t}"),
            source: s.to_string(),
            target: t.to_string(),
            label: None,
            points: Vec::new(),
        }
    }

    fn crossed_square() -> (Vec<PositionedNode>, Vec<LayoutEdge>) {
        let nodes = vec![
            PositionedNode::new("a", 40.0, 40.0, 300.0, 200.0),
            PositionedNode::new("b", 40.0, 40.0, 700.0, 200.0),
            PositionedNode::new("c", 40.0, 40.0, 300.0, 600.0),
            PositionedNode::new("d", 40.0, 40.0, 700.0, 600.0),
        ];
        let edges = vec![edge("a", "d"), edge("b", "c")];
        (nodes, edges)
    }

    #[test]
    fn never_returns_a_worse_layout_than_its_input() {
        let cfg = LayoutConfig::default().with_seed(21);
        let (nodes, edges) = crossed_square();
        let before = compute_metrics(&nodes, &edges, &cfg).energy();
        let out = SimulatedAnnealingStrategy::default()
            .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
            .expect("annealing");
        assert!(out.metrics.energy() <= before + 1e-9);
        assert_eq!(out.metrics.overlap_count, 0);
    }

    #[test]
    fn does_not_introduce_overlaps() {
        let cfg = LayoutConfig::default().with_seed(4);
        let nodes: Vec<PositionedNode> = (0..9)
            .map(|i| {
                PositionedNode::new(
                    format!("n{i}"),
                    80.0,
                    40.0,
                    200.0 + 150.0 * (i % 3) as f64,
                    200.0 + 120.0 * (i / 3) as f64,
                )
            })
            .collect();
        let out = SimulatedAnnealingStrategy::new(AnnealingOptions {
            iterations: 3000,
            ..Default::default()
        })
        .apply(&nodes, &[], &cfg, None, &CancelToken::new())
        .expect("annealing");
        assert_eq!(out.metrics.overlap_count, 0);
    }

    #[test]
    fn same_seed_same_result() {
        let cfg = LayoutConfig::default().with_seed(99);
        let (nodes, edges) = crossed_square();
        let s = SimulatedAnnealingStrategy::default();
        let a = s
            .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
            .expect("first");
        let b = s
            .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
            .expect("second");
        assert_eq!(a.layout.nodes, b.layout.nodes);
    }

    #[test]
    fn honours_cancellation() {
        let cfg = LayoutConfig::default().with_seed(1);
        let (nodes, edges) = crossed_square();
        let token = CancelToken::new();
        token.cancel();
        assert!(
            SimulatedAnnealingStrategy::default()
                .apply(&nodes, &edges, &cfg, None, &token)
                .is_err()
        );
    }
}
