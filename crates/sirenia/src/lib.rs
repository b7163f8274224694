#![forbid(unsafe_code)]

//! Overlap-free diagram layout.
//!
//! `sirenia` takes sized nodes and edges and returns node positions with no two node boxes
//! intersecting. An [`OverlapResolver`] runs a chain of strategies (force simulation, simulated
//! annealing, grid placement) under per-strategy and global time budgets, compares their
//! results with one energy function, and falls back to a grid whenever every attempt overlapped.

pub mod config;
pub mod error;
pub mod geometry;
pub mod graph;
pub mod metrics;
pub mod resolver;
pub mod strategy;

pub use config::{LayoutConfig, ResolverOptions};
pub use error::{Error, Result};
pub use graph::{
    AttemptReport, Bounds, DiagramLayout, EdgeDatum, LayoutEdge, LayoutMetrics, LayoutResult,
    NodeDatum, Point, PositionedNode,
};
pub use metrics::compute_metrics;
pub use resolver::OverlapResolver;
pub use strategy::{
    AnnealingOptions, CancelToken, ForceOptions, GridSnapStrategy, LayoutStrategy,
    ProgressiveForceStrategy, SimulatedAnnealingStrategy,
};

/// Lays out a graph with the default strategy chain and time budgets.
pub fn resolve(
    nodes: &[NodeDatum],
    edges: &[EdgeDatum],
    config: &LayoutConfig,
    existing_layout: Option<&DiagramLayout>,
) -> LayoutResult {
    OverlapResolver::default().resolve(nodes, edges, config, existing_layout)
}
