use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Canvas and spacing parameters shared by every strategy.
///
/// The resolver hands the same (sanitized) value to each strategy; strategies never modify it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Ideal border-to-border distance between connected nodes.
    pub node_spacing: f64,
    /// Grid cell margin; also the minimum gap the annealing neighbourhood tries to keep.
    pub margin: f64,
    /// Size used for input nodes without a usable `width`.
    pub default_node_width: f64,
    /// Size used for input nodes without a usable `height`.
    pub default_node_height: f64,
    /// Seed for every random draw of a `resolve()` call. `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl LayoutConfig {
    pub const DEFAULT_CANVAS_WIDTH: f64 = 1200.0;
    pub const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;
    pub const DEFAULT_NODE_SPACING: f64 = 50.0;
    pub const DEFAULT_MARGIN: f64 = 20.0;
    pub const DEFAULT_NODE_WIDTH: f64 = 100.0;
    pub const DEFAULT_NODE_HEIGHT: f64 = 50.0;

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_canvas(mut self, width: f64, height: f64) -> Self {
        self.canvas_width = width;
        self.canvas_height = height;
        self
    }

    /// Replaces non-finite or non-positive values with their defaults.
    pub fn sanitized(&self) -> Self {
        fn positive_or(v: f64, fallback: f64) -> f64 {
            if v.is_finite() && v > 0.0 { v } else { fallback }
        }
        Self {
            canvas_width: positive_or(self.canvas_width, Self::DEFAULT_CANVAS_WIDTH),
            canvas_height: positive_or(self.canvas_height, Self::DEFAULT_CANVAS_HEIGHT),
            node_spacing: positive_or(self.node_spacing, Self::DEFAULT_NODE_SPACING),
            margin: if self.margin.is_finite() && self.margin >= 0.0 {
                self.margin
            } else {
                Self::DEFAULT_MARGIN
            },
            default_node_width: positive_or(self.default_node_width, Self::DEFAULT_NODE_WIDTH),
            default_node_height: positive_or(self.default_node_height, Self::DEFAULT_NODE_HEIGHT),
            seed: self.seed,
        }
    }

    pub fn canvas_center(&self) -> (f64, f64) {
        (self.canvas_width / 2.0, self.canvas_height / 2.0)
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            canvas_width: Self::DEFAULT_CANVAS_WIDTH,
            canvas_height: Self::DEFAULT_CANVAS_HEIGHT,
            node_spacing: Self::DEFAULT_NODE_SPACING,
            margin: Self::DEFAULT_MARGIN,
            default_node_width: Self::DEFAULT_NODE_WIDTH,
            default_node_height: Self::DEFAULT_NODE_HEIGHT,
            seed: None,
        }
    }
}

/// Time budgets and acceptance thresholds of [`crate::OverlapResolver`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Global deadline, checked before every attempt.
    pub max_total_time: Duration,
    /// Per-attempt slice; the effective slice is `min(this, remaining global time)`.
    pub max_time_per_strategy: Duration,
    /// Relative energy drop required to replace the best result (`0.10` = 10%).
    pub improvement_threshold: f64,
    /// A strategy whose energy stays above `best * advance_ratio` hands over to the next one.
    pub advance_ratio: f64,
    /// Early exit once a best result has no overlaps and fewer crossings than
    /// `node_count * early_exit_crossing_ratio`.
    pub early_exit_crossing_ratio: f64,
    /// Upper bound on consecutive attempts of one strategy that did not advance.
    pub max_attempts_per_strategy: usize,
}

impl ResolverOptions {
    pub fn with_time_budget(mut self, total: Duration, per_strategy: Duration) -> Self {
        self.max_total_time = total;
        self.max_time_per_strategy = per_strategy;
        self
    }
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            max_total_time: Duration::from_secs(5),
            max_time_per_strategy: Duration::from_secs(2),
            improvement_threshold: 0.10,
            advance_ratio: 0.9,
            early_exit_crossing_ratio: 0.5,
            max_attempts_per_strategy: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::LayoutConfig;

    #[test]
    fn sanitized_replaces_unusable_values() {
        let cfg = LayoutConfig {
            canvas_width: f64::NAN,
            canvas_height: -5.0,
            node_spacing: 0.0,
            margin: f64::INFINITY,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.canvas_width, LayoutConfig::DEFAULT_CANVAS_WIDTH);
        assert_eq!(cfg.canvas_height, LayoutConfig::DEFAULT_CANVAS_HEIGHT);
        assert_eq!(cfg.node_spacing, LayoutConfig::DEFAULT_NODE_SPACING);
        assert_eq!(cfg.margin, LayoutConfig::DEFAULT_MARGIN);
    }

    #[test]
    fn zero_margin_is_kept() {
        let cfg = LayoutConfig {
            margin: 0.0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(cfg.margin, 0.0);
    }
}
