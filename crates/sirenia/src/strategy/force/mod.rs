use super::{CancelToken, LayoutStrategy, ensure_finite, finish, rng_for, seed_positions};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::geometry::Rect;
use crate::graph::{DiagramLayout, LayoutEdge, LayoutResult, PositionedNode};
use crate::metrics::MetricsEvaluator;
use nalgebra::Vector2;
use rand::Rng;
use std::time::Instant;

mod spectral;

const RNG_SALT: u64 = 0xF0_4C_E5;

#[derive(Debug, Clone)]
pub struct ForceOptions {
    pub max_iterations: usize,
    /// Numerator of the inverse-square repulsion between node borders.
    pub repulsion_strength: f64,
    /// Spring constant of the edge springs.
    pub spring_strength: f64,
    /// Spring constant pulling nodes back inside the canvas.
    pub boundary_strength: f64,
    /// Spring constant pulling warm-started nodes toward their seed positions.
    pub anchor_strength: f64,
    /// Cooling factor of the first iteration on a cold start.
    pub initial_cooling: f64,
    /// Cooling factor of the first iteration when most nodes are warm-started.
    pub incremental_cooling: f64,
    pub final_cooling: f64,
    /// Per-axis displacement cap at cooling factor 1.
    pub max_node_displacement: f64,
    pub convergence_check_period: usize,
    /// Place nodes by classical MDS of hop distances before simulating (cold starts only).
    pub spectral_start: bool,
}

impl Default for ForceOptions {
    fn default() -> Self {
        Self {
            max_iterations: 600,
            repulsion_strength: 4500.0,
            spring_strength: 0.45,
            boundary_strength: 0.5,
            anchor_strength: 0.1,
            initial_cooling: 1.0,
            incremental_cooling: 0.3,
            final_cooling: 0.04,
            max_node_displacement: 100.0,
            convergence_check_period: 50,
            spectral_start: true,
        }
    }
}

/// Spring embedder with a progressive cooling schedule.
///
/// Nodes repel each other (inverse-square between their borders, or by the overlap amount when
/// they intersect), edges act as springs toward `config.node_spacing`, and the canvas is a soft
/// box. Large early steps spread a random start; the cooling factor then decays geometrically.
/// There is no overlap guarantee.
#[derive(Debug, Clone, Default)]
pub struct ProgressiveForceStrategy {
    pub options: ForceOptions,
}

impl ProgressiveForceStrategy {
    pub fn new(options: ForceOptions) -> Self {
        Self { options }
    }
}

impl LayoutStrategy for ProgressiveForceStrategy {
    fn name(&self) -> &'static str {
        "progressive-force"
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
        let endpoints = MetricsEvaluator::new(nodes, edges, config)
            .endpoints()
            .to_vec();
        let anchors = seed_positions(nodes, seed_layout);
        let mut sim = Simulation::new(nodes, endpoints, anchors, config, &self.options);
        let mut rng = rng_for(config, RNG_SALT);

        let warm = sim.warm_started();
        if !warm && self.options.spectral_start {
            sim.spectral_start(&mut rng);
        }
        let iterations = sim.run(warm, cancel)?;

        let out: Vec<PositionedNode> = nodes
            .iter()
            .zip(&sim.pos)
            .map(|(n, p)| PositionedNode {
                x: p.x,
                y: p.y,
                ..n.clone()
            })
            .collect();
        ensure_finite(self.name(), &out)?;
        tracing::trace!(iterations, warm, "force simulation finished");
        Ok(finish(out, edges, config, started))
    }
}

struct Simulation<'a> {
    pos: Vec<Vector2<f64>>,
    half: Vec<Vector2<f64>>,
    force: Vec<Vector2<f64>>,
    anchors: Vec<Option<Vector2<f64>>>,
    endpoints: Vec<(usize, usize)>,
    config: &'a LayoutConfig,
    opts: &'a ForceOptions,
}

impl<'a> Simulation<'a> {
    fn new(
        nodes: &[PositionedNode],
        endpoints: Vec<(usize, usize)>,
        anchors: Vec<Option<(f64, f64)>>,
        config: &'a LayoutConfig,
        opts: &'a ForceOptions,
    ) -> Self {
        Self {
            pos: nodes.iter().map(|n| Vector2::new(n.x, n.y)).collect(),
            half: nodes
                .iter()
                .map(|n| Vector2::new(n.width / 2.0, n.height / 2.0))
                .collect(),
            force: vec![Vector2::zeros(); nodes.len()],
            anchors: anchors
                .into_iter()
                .map(|a| a.map(|(x, y)| Vector2::new(x, y)))
                .collect(),
            endpoints: endpoints.into_iter().filter(|(a, b)| a != b).collect(),
            config,
            opts,
        }
    }

    fn rect(&self, i: usize) -> Rect {
        Rect {
            cx: self.pos[i].x,
            cy: self.pos[i].y,
            half_w: self.half[i].x,
            half_h: self.half[i].y,
        }
    }

    /// At least half of the nodes came from a previous layout.
    fn warm_started(&self) -> bool {
        let seeded = self.anchors.iter().filter(|a| a.is_some()).count();
        !self.pos.is_empty() && seeded * 2 >= self.pos.len()
    }

    fn spectral_start<R: Rng>(&mut self, rng: &mut R) {
        let n = self.pos.len();
        if n == 0 {
            return;
        }
        let mean_size = self.half.iter().map(|h| h.x + h.y).sum::<f64>() / n as f64;
        let unit = mean_size + self.config.node_spacing;
        let Some(coords) = spectral::spectral_positions(n, &self.endpoints, unit) else {
            return;
        };
        let (cx, cy) = self.config.canvas_center();
        let jitter = 0.05 * unit;
        for (p, (x, y)) in self.pos.iter_mut().zip(coords) {
            p.x = cx + x + rng.gen_range(-jitter..=jitter);
            p.y = cy + y + rng.gen_range(-jitter..=jitter);
        }
    }

    /// Runs the simulation; returns the number of iterations performed.
    fn run(&mut self, warm: bool, cancel: &CancelToken) -> Result<usize> {
        let n = self.pos.len();
        if n == 0 {
            return Ok(0);
        }
        let max_iterations = self.opts.max_iterations.max(1);
        let initial = if warm {
            self.opts.incremental_cooling
        } else {
            self.opts.initial_cooling
        }
        .max(self.opts.final_cooling);
        let final_cooling = self.opts.final_cooling.max(1e-6);
        let check_period = self.opts.convergence_check_period.max(1);
        let threshold = 0.03 * self.config.node_spacing * n as f64;

        let mut iteration = 0usize;
        while iteration < max_iterations {
            cancel.check()?;
            let progress = iteration as f64 / max_iterations as f64;
            let cooling = initial * (final_cooling / initial).powf(progress);

            self.accumulate_forces();
            let total_displacement = self.step(cooling);
            iteration += 1;

            if !total_displacement.is_finite() {
                break;
            }
            if iteration % check_period == 0 && total_displacement < threshold {
                break;
            }
        }
        Ok(iteration)
    }

    fn accumulate_forces(&mut self) {
        let n = self.pos.len();
        for f in &mut self.force {
            *f = Vector2::zeros();
        }

        let ideal = self.config.node_spacing;
        for k in 0..self.endpoints.len() {
            let (a, b) = self.endpoints[k];
            let (ra, rb) = (self.rect(a), self.rect(b));
            if ra.overlaps(&rb) {
                continue;
            }
            let (ax, ay) = ra.clip_towards(&rb);
            let (bx, by) = rb.clip_towards(&ra);
            let l = Vector2::new(bx - ax, by - ay);
            let len = l.norm();
            if len < 1e-9 {
                continue;
            }
            let f = l * (self.opts.spring_strength * (len - ideal) / len);
            self.force[a] += f;
            self.force[b] -= f;
        }

        let min_dist = (ideal / 10.0).max(0.0005);
        let buffer = ideal / 2.0;
        for i in 0..n {
            let ri = self.rect(i);
            for j in (i + 1)..n {
                let f = repulsion(&ri, &self.rect(j), self.opts.repulsion_strength, min_dist, buffer);
                self.force[i] += f;
                self.force[j] -= f;
            }
        }

        let (w, h) = (self.config.canvas_width, self.config.canvas_height);
        let kb = self.opts.boundary_strength;
        for i in 0..n {
            let r = self.rect(i);
            let f = &mut self.force[i];
            if r.left() < 0.0 {
                f.x += kb * -r.left();
            } else if r.right() > w {
                f.x -= kb * (r.right() - w);
            }
            if r.top() < 0.0 {
                f.y += kb * -r.top();
            } else if r.bottom() > h {
                f.y -= kb * (r.bottom() - h);
            }
            if let Some(anchor) = self.anchors[i] {
                *f += (anchor - self.pos[i]) * self.opts.anchor_strength;
            }
        }
    }

    fn step(&mut self, cooling: f64) -> f64 {
        let max_d = cooling * self.opts.max_node_displacement;
        let mut total = 0.0f64;
        for (p, f) in self.pos.iter_mut().zip(&self.force) {
            let d = Vector2::new(
                (cooling * f.x).clamp(-max_d, max_d),
                (cooling * f.y).clamp(-max_d, max_d),
            );
            *p += d;
            total += d.x.abs() + d.y.abs();
        }
        total
    }
}

/// Force on `a` caused by `b`.
fn repulsion(a: &Rect, b: &Rect, strength: f64, min_dist: f64, buffer: f64) -> Vector2<f64> {
    if a.overlaps(b) {
        let (sx, sy) = separation_amount(a, b, buffer);
        return Vector2::new(-sx, -sy);
    }
    let (ax, ay) = a.clip_towards(b);
    let (bx, by) = b.clip_towards(a);
    let mut dx = bx - ax;
    let mut dy = by - ay;
    if dx.abs() < min_dist {
        dx = dx.signum() * min_dist;
    }
    if dy.abs() < min_dist {
        dy = dy.signum() * min_dist;
    }
    let dist_sq = dx * dx + dy * dy;
    let dist = dist_sq.sqrt();
    if dist == 0.0 {
        return Vector2::zeros();
    }
    let magnitude = strength / dist_sq;
    Vector2::new(-magnitude * dx / dist, -magnitude * dy / dist)
}

/// How far `a` must move (and `b` the opposite way) to stop overlapping, plus `buffer`.
fn separation_amount(a: &Rect, b: &Rect, buffer: f64) -> (f64, f64) {
    let dir_x = if a.cx < b.cx { -1.0 } else { 1.0 };
    let dir_y = if a.cy < b.cy { -1.0 } else { 1.0 };

    let mut overlap_x = a.right().min(b.right()) - a.left().max(b.left());
    let mut overlap_y = a.bottom().min(b.bottom()) - a.top().max(b.top());

    // Containment: account for the distance to the nearer outer edge.
    if a.left() <= b.left() && a.right() >= b.right() {
        overlap_x += (b.left() - a.left()).min(a.right() - b.right());
    } else if b.left() <= a.left() && b.right() >= a.right() {
        overlap_x += (a.left() - b.left()).min(b.right() - a.right());
    }
    if a.top() <= b.top() && a.bottom() >= b.bottom() {
        overlap_y += (b.top() - a.top()).min(a.bottom() - b.bottom());
    } else if b.top() <= a.top() && b.bottom() >= a.bottom() {
        overlap_y += (a.top() - b.top()).min(b.bottom() - a.bottom());
    }

    let slope = if a.cx == b.cx && a.cy == b.cy {
        1.0
    } else {
        ((b.cy - a.cy) / (b.cx - a.cx)).abs()
    };

    let mut move_x = overlap_y / slope;
    let mut move_y = slope * overlap_x;
    if overlap_x < move_x {
        move_x = overlap_x;
    } else {
        move_y = overlap_y;
    }

    (
        -dir_x * (move_x / 2.0 + buffer),
        -dir_y * (move_y / 2.0 + buffer),
    )
}

#[cfg(test)]
mod tests {
    use super::{ForceOptions, ProgressiveForceStrategy, repulsion};
    use crate::config::LayoutConfig;
    use crate::geometry::Rect;
    use crate::graph::{DiagramLayout, LayoutEdge, PositionedNode};
    use crate::strategy::{CancelToken, LayoutStrategy};
    use std::time::{Duration, Instant};

    fn rect(cx: f64, cy: f64) -> Rect {
        Rect {
            cx,
            cy,
            half_w: 10.0,
            half_h: 10.0,
        }
    }

    fn chain(n: usize) -> (Vec<PositionedNode>, Vec<LayoutEdge>) {
        let nodes = (0..n)
            .map(|i| PositionedNode::new(format!("n{i}"), 100.0, 50.0, 600.0, 400.0))
            .collect();
        let edges = (1..n)
            .map(|i| LayoutEdge {
                id: format!("e{i}"),
                source: format!("n{}", i - 1),
                target: format!("n{i}"),
                label: None,
                points: Vec::new(),
            })
            .collect();
        (nodes, edges)
    }

    #[test]
    fn repulsion_pushes_apart() {
        let f = repulsion(&rect(0.0, 0.0), &rect(50.0, 0.0), 4500.0, 5.0, 25.0);
        assert!(f.x < 0.0);
        let f = repulsion(&rect(0.0, 0.0), &rect(5.0, 0.0), 4500.0, 5.0, 25.0);
        assert!(f.x < 0.0, "overlapping nodes separate along x");
    }

    #[test]
    fn coincident_nodes_are_separated() {
        let f = repulsion(&rect(0.0, 0.0), &rect(0.0, 0.0), 4500.0, 5.0, 25.0);
        assert!(f.x != 0.0 || f.y != 0.0);
    }

    #[test]
    fn stacked_chain_spreads_without_overlap() {
        let cfg = LayoutConfig::default().with_seed(5);
        let (nodes, edges) = chain(5);
        let out = ProgressiveForceStrategy::default()
            .apply(&nodes, &edges, &cfg, None, &CancelToken::new())
            .expect("force");
        assert_eq!(out.layout.nodes.len(), 5);
        assert_eq!(out.metrics.overlap_count, 0);
        assert_eq!(out.metrics.edge_crossings, 0);
        // Input untouched.
        assert!(nodes.iter().all(|n| n.x == 600.0 && n.y == 400.0));
    }

    #[test]
    fn warm_start_stays_close_to_the_seed() {
        let cfg = LayoutConfig::default().with_seed(9);
        let (mut nodes, edges) = chain(3);
        for (i, n) in nodes.iter_mut().enumerate() {
            n.x = 400.0 + 200.0 * i as f64;
        }
        let seed = DiagramLayout {
            nodes: nodes.clone(),
            edges: edges.clone(),
        };
        let out = ProgressiveForceStrategy::default()
            .apply(&nodes, &edges, &cfg, Some(&seed), &CancelToken::new())
            .expect("force");
        for (before, after) in nodes.iter().zip(&out.layout.nodes) {
            let moved = (before.x - after.x).hypot(before.y - after.y);
            assert!(moved < 100.0, "{} moved {moved}", before.id);
        }
    }

    #[test]
    fn honours_cancellation() {
        let cfg = LayoutConfig::default().with_seed(1);
        let (nodes, edges) = chain(4);
        let token = CancelToken::with_deadline(Instant::now() - Duration::from_millis(1));
        let strategy = ProgressiveForceStrategy::new(ForceOptions {
            max_iterations: 1_000_000,
            ..Default::default()
        });
        assert!(strategy.apply(&nodes, &edges, &cfg, None, &token).is_err());
    }
}
