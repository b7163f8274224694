//! Layout quality metrics and the energy function every strategy is compared by.

use crate::config::LayoutConfig;
use crate::geometry::{Rect, bounds_of, segments_intersect};
use crate::graph::{LayoutEdge, LayoutMetrics, PositionedNode};
use rustc_hash::FxHashMap;

pub const OVERLAP_WEIGHT: f64 = 10.0;
pub const CROSSING_WEIGHT: f64 = 5.0;
pub const AREA_WEIGHT: f64 = 0.001;
pub const SPACING_WEIGHT: f64 = 0.1;
pub const BALANCE_WEIGHT: f64 = 2.0;

impl LayoutMetrics {
    /// Lower is better. Overlaps and crossings dominate, area breaks ties, spacing and balance
    /// are rewards.
    pub fn energy(&self) -> f64 {
        OVERLAP_WEIGHT * self.overlap_count as f64 + CROSSING_WEIGHT * self.edge_crossings as f64
            + AREA_WEIGHT * self.total_area
            - SPACING_WEIGHT * self.node_spacing
            - BALANCE_WEIGHT * self.layout_balance
    }
}

/// Metrics evaluator with edge endpoints resolved to node indices once.
///
/// Strategies that evaluate many candidate positions for the same graph (annealing) build one
/// evaluator and call [`MetricsEvaluator::evaluate`] per candidate.
#[derive(Debug, Clone)]
pub struct MetricsEvaluator {
    endpoints: Vec<(usize, usize)>,
    canvas_center: (f64, f64),
    canvas_half: (f64, f64),
}

impl MetricsEvaluator {
    pub fn new(nodes: &[PositionedNode], edges: &[LayoutEdge], config: &LayoutConfig) -> Self {
        let mut id_to_idx: FxHashMap<&str, usize> = FxHashMap::default();
        id_to_idx.reserve(nodes.len());
        for (idx, n) in nodes.iter().enumerate() {
            id_to_idx.entry(n.id.as_str()).or_insert(idx);
        }
        let endpoints = edges
            .iter()
            .filter_map(|e| {
                let a = *id_to_idx.get(e.source.as_str())?;
                let b = *id_to_idx.get(e.target.as_str())?;
                Some((a, b))
            })
            .collect();
        Self {
            endpoints,
            canvas_center: config.canvas_center(),
            canvas_half: (config.canvas_width / 2.0, config.canvas_height / 2.0),
        }
    }

    pub fn endpoints(&self) -> &[(usize, usize)] {
        &self.endpoints
    }

    /// `nodes` must be in the order the evaluator was built with.
    pub fn evaluate(&self, nodes: &[PositionedNode]) -> LayoutMetrics {
        if nodes.is_empty() {
            return LayoutMetrics::default();
        }
        let rects: Vec<Rect> = nodes.iter().map(Rect::of).collect();

        let mut overlap_count = 0usize;
        let mut min_spacing = f64::INFINITY;
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if rects[i].overlaps(&rects[j]) {
                    overlap_count += 1;
                }
                let d = (rects[i].cx - rects[j].cx).hypot(rects[i].cy - rects[j].cy);
                min_spacing = min_spacing.min(d);
            }
        }

        let total_area = bounds_of(nodes)
            .map(|b| b.width() * b.height())
            .unwrap_or(0.0);

        LayoutMetrics {
            overlap_count,
            edge_crossings: self.count_crossings(&rects),
            total_area,
            node_spacing: if min_spacing.is_finite() { min_spacing } else { 0.0 },
            layout_balance: self.balance(&rects),
        }
    }

    fn count_crossings(&self, rects: &[Rect]) -> usize {
        let mut crossings = 0usize;
        for (i, &(a1, b1)) in self.endpoints.iter().enumerate() {
            if a1 == b1 {
                continue;
            }
            let p1 = (rects[a1].cx, rects[a1].cy);
            let p2 = (rects[b1].cx, rects[b1].cy);
            for &(a2, b2) in &self.endpoints[(i + 1)..] {
                if a2 == b2 || a1 == a2 || a1 == b2 || b1 == a2 || b1 == b2 {
                    continue;
                }
                let q1 = (rects[a2].cx, rects[a2].cy);
                let q2 = (rects[b2].cx, rects[b2].cy);
                if segments_intersect(p1, p2, q1, q2) {
                    crossings += 1;
                }
            }
        }
        crossings
    }

    fn balance(&self, rects: &[Rect]) -> f64 {
        let n = rects.len() as f64;
        let cx = rects.iter().map(|r| r.cx).sum::<f64>() / n;
        let cy = rects.iter().map(|r| r.cy).sum::<f64>() / n;
        let dx = (cx - self.canvas_center.0) / self.canvas_half.0;
        let dy = (cy - self.canvas_center.1) / self.canvas_half.1;
        let balance = 1.0 - dx.hypot(dy);
        if balance.is_finite() {
            balance.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

pub fn compute_metrics(
    nodes: &[PositionedNode],
    edges: &[LayoutEdge],
    config: &LayoutConfig,
) -> LayoutMetrics {
    MetricsEvaluator::new(nodes, edges, config).evaluate(nodes)
}

#[cfg(test)]
mod tests {
    use super::compute_metrics;
    use crate::config::LayoutConfig;
    use crate::graph::{LayoutEdge, LayoutMetrics, PositionedNode};

    fn edge(id: &str, s: &str, t: &str) -> LayoutEdge {
        LayoutEdge {
            id: id.to_string(),
            source: s.to_string(),
            target: t.to_string(),
            label: None,
            points: Vec::new(),
        }
    }

    fn square(id: &str, x: f64, y: f64) -> PositionedNode {
        PositionedNode::new(id, 10.0, 10.0, x, y)
    }

    #[test]
    fn empty_graph_has_zero_metrics() {
        let m = compute_metrics(&[], &[], &LayoutConfig::default());
        assert_eq!(m, LayoutMetrics::default());
    }

    #[test]
    fn canvas_centered_singleton_is_balanced() {
        let cfg = LayoutConfig::default();
        let (cx, cy) = cfg.canvas_center();
        let m = compute_metrics(&[square("a", cx, cy)], &[], &cfg);
        assert_eq!(m.overlap_count, 0);
        assert_eq!(m.node_spacing, 0.0);
        assert!((m.layout_balance - 1.0).abs() < 1e-12);
        assert!((m.total_area - 100.0).abs() < 1e-12);
    }

    #[test]
    fn balance_is_clamped_at_zero() {
        let cfg = LayoutConfig::default();
        let m = compute_metrics(&[square("a", 10_000.0, 10_000.0)], &[], &cfg);
        assert_eq!(m.layout_balance, 0.0);
    }

    #[test]
    fn counts_each_overlapping_pair_once() {
        let nodes = vec![
            square("a", 0.0, 0.0),
            square("b", 5.0, 0.0),
            square("c", 5.0, 5.0),
            square("d", 100.0, 100.0),
        ];
        let m = compute_metrics(&nodes, &[], &LayoutConfig::default());
        assert_eq!(m.overlap_count, 3);
    }

    #[test]
    fn crossing_edges_are_counted_but_adjacent_edges_are_not() {
        // a---b
        //  \ /
        //  / \
        // c---d
        let nodes = vec![
            square("a", 0.0, 0.0),
            square("b", 100.0, 0.0),
            square("c", 0.0, 100.0),
            square("d", 100.0, 100.0),
        ];
        let edges = vec![
            edge("ad", "a", "d"),
            edge("bc", "b", "c"),
            edge("ab", "a", "b"),
            edge("cd", "c", "d"),
        ];
        let m = compute_metrics(&nodes, &edges, &LayoutConfig::default());
        assert_eq!(m.edge_crossings, 1);
        assert!((m.node_spacing - 100.0).abs() < 1e-12);
    }

    #[test]
    fn energy_weights_overlaps_and_crossings() {
        let m = LayoutMetrics {
            overlap_count: 2,
            edge_crossings: 3,
            total_area: 1000.0,
            node_spacing: 10.0,
            layout_balance: 0.5,
        };
        assert!((m.energy() - (20.0 + 15.0 + 1.0 - 1.0 - 1.0)).abs() < 1e-12);
    }
}
