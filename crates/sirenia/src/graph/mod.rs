use crate::config::LayoutConfig;
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Input node as produced by the diagram-data stage. Unknown semantic fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDatum {
    pub id: String,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

impl NodeDatum {
    pub fn new(id: impl Into<String>, width: f64, height: f64) -> Self {
        Self {
            id: id.into(),
            width: Some(width),
            height: Some(height),
        }
    }
}

/// Input edge. Edges whose endpoints are not in the node set are dropped before layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDatum {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
}

impl EdgeDatum {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: None,
        }
    }
}

/// A node with a concrete size and a center position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedNode {
    pub id: String,
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

impl PositionedNode {
    pub fn new(id: impl Into<String>, width: f64, height: f64, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            x,
            y,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    /// Routed polyline. Empty: the renderer draws a straight source-to-target line.
    #[serde(default)]
    pub points: Vec<Point>,
}

impl From<&EdgeDatum> for LayoutEdge {
    fn from(e: &EdgeDatum) -> Self {
        Self {
            id: e.id.clone(),
            source: e.source.clone(),
            target: e.target.clone(),
            label: e.label.clone(),
            points: Vec::new(),
        }
    }
}

/// Final output of a layout, or the warm-start seed of the next one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiagramLayout {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<LayoutEdge>,
}

impl DiagramLayout {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutMetrics {
    pub overlap_count: usize,
    pub edge_crossings: usize,
    /// Area of the bounding box enclosing every node rectangle.
    pub total_area: f64,
    /// Minimum center-to-center distance over all node pairs.
    pub node_spacing: f64,
    /// How close the node centroid is to the canvas center, in `[0, 1]`.
    pub layout_balance: f64,
}

/// One strategy invocation as seen by the resolver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptReport {
    pub strategy: String,
    pub duration_ms: f64,
    pub energy: Option<f64>,
    pub metrics: Option<LayoutMetrics>,
    pub error: Option<String>,
    /// Whether this attempt replaced the best result.
    pub improved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutResult {
    pub layout: DiagramLayout,
    pub bounds: Bounds,
    /// Wall-clock milliseconds since the call started.
    pub processing_time: f64,
    pub success: bool,
    pub error: Option<String>,
    pub metrics: LayoutMetrics,
    /// Filled by the resolver; empty for a single strategy run.
    #[serde(default)]
    pub attempts: Vec<AttemptReport>,
}

/// Positioned copies of the caller's graph, ready to be handed to strategies.
#[derive(Debug, Clone)]
pub struct PreparedGraph {
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<LayoutEdge>,
    pub dropped_edges: usize,
    /// Number of nodes whose position came from the existing layout.
    pub warm_started: usize,
}

/// Sizes every node, seeds its position from `existing` (or at random inside the canvas) and
/// drops edges whose endpoints are missing.
pub fn prepare<R: Rng>(
    nodes: &[NodeDatum],
    edges: &[EdgeDatum],
    config: &LayoutConfig,
    existing: Option<&DiagramLayout>,
    rng: &mut R,
) -> PreparedGraph {
    let mut previous: FxHashMap<&str, (f64, f64)> = FxHashMap::default();
    if let Some(layout) = existing {
        previous.reserve(layout.nodes.len());
        for n in &layout.nodes {
            if n.x.is_finite() && n.y.is_finite() {
                previous.entry(n.id.as_str()).or_insert((n.x, n.y));
            }
        }
    }

    let mut warm_started = 0usize;
    let mut positioned: Vec<PositionedNode> = Vec::with_capacity(nodes.len());
    for n in nodes {
        let width = usable_size(n.width).unwrap_or(config.default_node_width);
        let height = usable_size(n.height).unwrap_or(config.default_node_height);
        let (x, y) = match previous.get(n.id.as_str()) {
            Some(&pos) => {
                warm_started += 1;
                pos
            }
            None => (
                random_axis(rng, width, config.canvas_width),
                random_axis(rng, height, config.canvas_height),
            ),
        };
        positioned.push(PositionedNode::new(n.id.clone(), width, height, x, y));
    }

    let ids: FxHashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut kept: Vec<LayoutEdge> = Vec::with_capacity(edges.len());
    let mut dropped_edges = 0usize;
    for e in edges {
        if ids.contains(e.source.as_str()) && ids.contains(e.target.as_str()) {
            kept.push(LayoutEdge::from(e));
        } else {
            dropped_edges += 1;
            tracing::debug!(edge = %e.id, source = %e.source, target = %e.target, "dropping dangling edge");
        }
    }

    PreparedGraph {
        nodes: positioned,
        edges: kept,
        dropped_edges,
        warm_started,
    }
}

fn usable_size(v: Option<f64>) -> Option<f64> {
    v.filter(|v| v.is_finite() && *v > 0.0)
}

fn random_axis<R: Rng>(rng: &mut R, size: f64, extent: f64) -> f64 {
    let lo = size / 2.0;
    let hi = extent - size / 2.0;
    if lo < hi {
        rng.gen_range(lo..hi)
    } else {
        extent / 2.0
    }
}
