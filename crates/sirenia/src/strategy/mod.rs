//! Layout strategies and the contract they share.

use crate::config::LayoutConfig;
use crate::error::{Error, Result};
use crate::geometry::bounds_of;
use crate::graph::{DiagramLayout, LayoutEdge, LayoutResult, PositionedNode};
use crate::metrics::compute_metrics;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

pub mod annealing;
pub mod force;
pub mod grid;

pub use annealing::{AnnealingOptions, SimulatedAnnealingStrategy};
pub use force::{ForceOptions, ProgressiveForceStrategy};
pub use grid::GridSnapStrategy;

/// A layout algorithm the resolver can race.
///
/// Implementations return fresh position vectors and must keep the node and edge identity set
/// unchanged. Long-running loops should poll `cancel` and bound their own iteration count.
pub trait LayoutStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        nodes: &[PositionedNode],
        edges: &[LayoutEdge],
        config: &LayoutConfig,
        seed_layout: Option<&DiagramLayout>,
        cancel: &CancelToken,
    ) -> Result<LayoutResult>;
}

/// Cancellation flag shared between the resolver and a running strategy, optionally bounded by
/// a deadline.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(deadline),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Wraps final positions into a [`LayoutResult`] with metrics and bounds.
pub fn finish(
    nodes: Vec<PositionedNode>,
    edges: &[LayoutEdge],
    config: &LayoutConfig,
    started: Instant,
) -> LayoutResult {
    let metrics = compute_metrics(&nodes, edges, config);
    LayoutResult {
        bounds: bounds_of(&nodes).unwrap_or_default(),
        layout: DiagramLayout {
            nodes,
            edges: edges.to_vec(),
        },
        processing_time: started.elapsed().as_secs_f64() * 1000.0,
        success: metrics.overlap_count == 0,
        error: None,
        metrics,
        attempts: Vec::new(),
    }
}

pub(crate) fn ensure_finite(strategy: &str, nodes: &[PositionedNode]) -> Result<()> {
    match nodes.iter().find(|n| !(n.x.is_finite() && n.y.is_finite())) {
        Some(n) => Err(Error::NonFinitePosition {
            strategy: strategy.to_string(),
            node_id: n.id.clone(),
        }),
        None => Ok(()),
    }
}

/// RNG for one consumer of a run: reproducible when the config carries a seed.
pub(crate) fn rng_for(config: &LayoutConfig, salt: u64) -> StdRng {
    match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ salt.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_entropy(),
    }
}

/// Seed positions by node index, for the nodes present in `seed_layout`.
pub(crate) fn seed_positions(
    nodes: &[PositionedNode],
    seed_layout: Option<&DiagramLayout>,
) -> Vec<Option<(f64, f64)>> {
    let Some(layout) = seed_layout else {
        return vec![None; nodes.len()];
    };
    let by_id: rustc_hash::FxHashMap<&str, (f64, f64)> = layout
        .nodes
        .iter()
        .filter(|n| n.x.is_finite() && n.y.is_finite())
        .map(|n| (n.id.as_str(), (n.x, n.y)))
        .collect();
    nodes
        .iter()
        .map(|n| by_id.get(n.id.as_str()).copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::CancelToken;
    use std::time::{Duration, Instant};

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
        assert!(clone.check().is_err());
    }

    #[test]
    fn elapsed_deadline_cancels() {
        let token = CancelToken::with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(token.is_cancelled());
        let later = CancelToken::with_deadline(Instant::now() + Duration::from_secs(60));
        assert!(!later.is_cancelled());
    }
}
