use super::{CancelToken, LayoutStrategy, finish};
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::graph::{DiagramLayout, LayoutEdge, LayoutResult, PositionedNode};
use std::time::Instant;

/// Deterministic row-major grid placement.
///
/// Every cell is as large as the biggest node plus the margin, so the result never overlaps.
/// The grid block is centered on the canvas.
#[derive(Debug, Clone, Default)]
pub struct GridSnapStrategy {
    /// Column count; `None` uses `ceil(sqrt(n))`.
    pub columns: Option<usize>,
}

impl GridSnapStrategy {
    /// Touching rectangles count as overlapping, so cells always keep a strictly positive gap.
    const MIN_MARGIN: f64 = 1.0;

    pub fn with_columns(columns: usize) -> Self {
        Self {
            columns: Some(columns),
        }
    }

    pub fn place(&self, nodes: &[PositionedNode], config: &LayoutConfig) -> Vec<PositionedNode> {
        if nodes.is_empty() {
            return Vec::new();
        }
        let n = nodes.len();
        let columns = self
            .columns
            .filter(|c| *c > 0)
            .unwrap_or_else(|| (n as f64).sqrt().ceil() as usize)
            .clamp(1, n);
        let rows = n.div_ceil(columns);

        let margin = config.margin.max(Self::MIN_MARGIN);
        let max_w = nodes.iter().map(|n| n.width).fold(0.0f64, f64::max);
        let max_h = nodes.iter().map(|n| n.height).fold(0.0f64, f64::max);
        let cell_w = max_w + margin;
        let cell_h = max_h + margin;

        let (cx, cy) = config.canvas_center();
        let origin_x = cx - (columns as f64 * cell_w) / 2.0;
        let origin_y = cy - (rows as f64 * cell_h) / 2.0;

        nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| {
                let col = idx % columns;
                let row = idx / columns;
                PositionedNode {
                    x: origin_x + (col as f64 + 0.5) * cell_w,
                    y: origin_y + (row as f64 + 0.5) * cell_h,
                    ..node.clone()
                }
            })
            .collect()
    }
}

impl LayoutStrategy for GridSnapStrategy {
    fn name(&self) -> &'static str {
        "grid-snap"
    }

    fn apply(
        &self,
        nodes: &[PositionedNode],
        edges: &[LayoutEdge],
        config: &LayoutConfig,
        _seed_layout: Option<&DiagramLayout>,
        cancel: &CancelToken,
    ) -> Result<LayoutResult> {
        let started = Instant::now();
        cancel.check()?;
        let placed = self.place(nodes, config);
        Ok(finish(placed, edges, config, started))
    }
}
