//! Strategy chain orchestration: race each strategy against its time slice, keep the best
//! energy, and never hand back an overlapping layout as a success.

use crate::config::{LayoutConfig, ResolverOptions};
use crate::error::{Error, Result};
use crate::geometry::bounds_of;
use crate::graph::{
    AttemptReport, Bounds, DiagramLayout, EdgeDatum, LayoutEdge, LayoutMetrics, LayoutResult,
    NodeDatum, PositionedNode, prepare,
};
use crate::metrics::compute_metrics;
use crate::strategy::{
    CancelToken, GridSnapStrategy, LayoutStrategy, ProgressiveForceStrategy,
    SimulatedAnnealingStrategy, rng_for,
};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};

const PREPARE_RNG_SALT: u64 = 0x5EED;

/// Runs the strategy chain (force, annealing, grid by default) over one graph.
#[derive(Clone)]
pub struct OverlapResolver {
    options: ResolverOptions,
    strategies: Vec<Arc<dyn LayoutStrategy>>,
}

impl Default for OverlapResolver {
    fn default() -> Self {
        Self::new(ResolverOptions::default())
    }
}

impl std::fmt::Debug for OverlapResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlapResolver")
            .field("options", &self.options)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// One successful attempt kept for the final selection.
#[derive(Debug, Clone)]
struct Candidate {
    nodes: Vec<PositionedNode>,
    metrics: LayoutMetrics,
    energy: f64,
}

impl OverlapResolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self::with_strategies(options, Self::default_strategies())
    }

    /// Uses `strategies` in order instead of the default chain. The overlap gate always uses
    /// [`GridSnapStrategy`], whatever the chain contains.
    pub fn with_strategies(
        options: ResolverOptions,
        strategies: Vec<Arc<dyn LayoutStrategy>>,
    ) -> Self {
        Self {
            options,
            strategies,
        }
    }

    pub fn default_strategies() -> Vec<Arc<dyn LayoutStrategy>> {
        vec![
            Arc::new(ProgressiveForceStrategy::default()),
            Arc::new(SimulatedAnnealingStrategy::default()),
            Arc::new(GridSnapStrategy::default()),
        ]
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Lays out `nodes`/`edges`. Never fails: strategy errors are recorded in
    /// [`LayoutResult::attempts`] and a complete failure is reported with `success: false`.
    pub fn resolve(
        &self,
        nodes: &[NodeDatum],
        edges: &[EdgeDatum],
        config: &LayoutConfig,
        existing_layout: Option<&DiagramLayout>,
    ) -> LayoutResult {
        let started = Instant::now();
        let config = config.sanitized();
        let span = tracing::debug_span!("resolve", nodes = nodes.len(), edges = edges.len());
        let _enter = span.enter();

        let mut rng = rng_for(&config, PREPARE_RNG_SALT);
        let prepared = prepare(nodes, edges, &config, existing_layout, &mut rng);
        tracing::debug!(
            warm_started = prepared.warm_started,
            dropped_edges = prepared.dropped_edges,
            "prepared input graph"
        );
        let edges = prepared.edges;
        let node_count = prepared.nodes.len();

        if node_count == 0 {
            return LayoutResult {
                layout: DiagramLayout {
                    nodes: Vec::new(),
                    edges,
                },
                bounds: Bounds::default(),
                processing_time: elapsed_ms(started),
                success: true,
                error: None,
                metrics: LayoutMetrics::default(),
                attempts: Vec::new(),
            };
        }

        let seed_layout = existing_layout.cloned().map(Arc::new);
        let mut current = prepared.nodes;
        let mut attempts: Vec<AttemptReport> = Vec::new();
        let mut best: Option<Candidate> = None;
        let mut best_clean: Option<Candidate> = None;
        let mut best_energy = f64::INFINITY;

        let mut index = 0usize;
        let mut runs_of_current = 0usize;
        while index < self.strategies.len() {
            let elapsed = started.elapsed();
            if elapsed >= self.options.max_total_time {
                tracing::debug!(?elapsed, "global deadline reached");
                break;
            }
            let budget = self
                .options
                .max_time_per_strategy
                .min(self.options.max_total_time - elapsed);
            let strategy = Arc::clone(&self.strategies[index]);
            let name = strategy.name();
            let attempt_started = Instant::now();

            let outcome = race(
                strategy,
                current.clone(),
                edges.clone(),
                config.clone(),
                seed_layout.clone(),
                budget,
            )
            .and_then(|result| check_contract(name, &current, &edges, result));

            let result = match outcome {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(strategy = name, error = %err, "layout attempt failed");
                    attempts.push(AttemptReport {
                        strategy: name.to_string(),
                        duration_ms: elapsed_ms(attempt_started),
                        energy: None,
                        metrics: None,
                        error: Some(err.to_string()),
                        improved: false,
                    });
                    index += 1;
                    runs_of_current = 0;
                    continue;
                }
            };

            let metrics = compute_metrics(&result.layout.nodes, &edges, &config);
            let energy = metrics.energy();
            if !energy.is_finite() {
                let err = Error::StrategyFailed {
                    strategy: name.to_string(),
                    message: "layout energy is not finite".to_string(),
                };
                tracing::warn!(strategy = name, error = %err, "layout attempt failed");
                attempts.push(AttemptReport {
                    strategy: name.to_string(),
                    duration_ms: elapsed_ms(attempt_started),
                    energy: None,
                    metrics: Some(metrics),
                    error: Some(err.to_string()),
                    improved: false,
                });
                index += 1;
                runs_of_current = 0;
                continue;
            }

            current = result.layout.nodes;
            let improved = improves(energy, best_energy, self.options.improvement_threshold);
            tracing::debug!(
                strategy = name,
                energy,
                overlaps = metrics.overlap_count,
                crossings = metrics.edge_crossings,
                improved,
                duration_ms = elapsed_ms(attempt_started),
                "layout attempt finished"
            );
            attempts.push(AttemptReport {
                strategy: name.to_string(),
                duration_ms: elapsed_ms(attempt_started),
                energy: Some(energy),
                metrics: Some(metrics),
                error: None,
                improved,
            });

            if metrics.overlap_count == 0 && best_clean.as_ref().is_none_or(|c| energy < c.energy)
            {
                best_clean = Some(Candidate {
                    nodes: current.clone(),
                    metrics,
                    energy,
                });
            }

            if improved {
                best_energy = energy;
                best = Some(Candidate {
                    nodes: current.clone(),
                    metrics,
                    energy,
                });
                let crossing_limit = node_count as f64 * self.options.early_exit_crossing_ratio;
                if metrics.overlap_count == 0 && (metrics.edge_crossings as f64) < crossing_limit {
                    tracing::debug!(strategy = name, "layout good enough, stopping early");
                    break;
                }
            }

            runs_of_current += 1;
            if stalls(energy, best_energy, self.options.advance_ratio)
                || runs_of_current >= self.options.max_attempts_per_strategy.max(1)
            {
                index += 1;
                runs_of_current = 0;
            }
        }

        let Some(best) = best else {
            let reasons = attempts
                .iter()
                .filter_map(|a| a.error.as_deref())
                .collect::<Vec<_>>()
                .join("; ");
            let err = Error::NoValidLayout {
                attempts: attempts.len(),
                reasons: if !reasons.is_empty() {
                    reasons
                } else if self.strategies.is_empty() {
                    "no strategies configured".to_string()
                } else {
                    "time budget exhausted before any attempt".to_string()
                },
            };
            tracing::warn!(error = %err, "returning best-effort positions");
            let metrics = compute_metrics(&current, &edges, &config);
            return LayoutResult {
                bounds: bounds_of(&current).unwrap_or_default(),
                layout: DiagramLayout {
                    nodes: current,
                    edges,
                },
                processing_time: elapsed_ms(started),
                success: false,
                error: Some(err.to_string()),
                metrics,
                attempts,
            };
        };

        let chosen = if best.metrics.overlap_count == 0 {
            best
        } else if let Some(clean) = best_clean {
            tracing::debug!(
                energy = clean.energy,
                "best layout overlaps, using the best overlap-free attempt"
            );
            clean
        } else {
            tracing::info!(
                overlaps = best.metrics.overlap_count,
                "every attempt overlapped, running grid fallback"
            );
            let gate_started = Instant::now();
            let nodes = GridSnapStrategy::default().place(&best.nodes, &config);
            let metrics = compute_metrics(&nodes, &edges, &config);
            let energy = metrics.energy();
            attempts.push(AttemptReport {
                strategy: "grid-snap (overlap gate)".to_string(),
                duration_ms: elapsed_ms(gate_started),
                energy: Some(energy),
                metrics: Some(metrics),
                error: None,
                improved: false,
            });
            Candidate {
                nodes,
                metrics,
                energy,
            }
        };

        let success = chosen.metrics.overlap_count == 0;
        LayoutResult {
            bounds: bounds_of(&chosen.nodes).unwrap_or_default(),
            layout: DiagramLayout {
                nodes: chosen.nodes,
                edges,
            },
            processing_time: elapsed_ms(started),
            success,
            error: (!success).then(|| {
                format!(
                    "layout still has {} overlapping node pair(s)",
                    chosen.metrics.overlap_count
                )
            }),
            metrics: chosen.metrics,
            attempts,
        }
    }
}

/// Runs `strategy` on a worker thread and waits at most `budget` for it.
///
/// On timeout the strategy's cancel token is tripped and its result, if it ever arrives, is
/// dropped with the channel.
fn race(
    strategy: Arc<dyn LayoutStrategy>,
    nodes: Vec<PositionedNode>,
    edges: Vec<LayoutEdge>,
    config: LayoutConfig,
    seed_layout: Option<Arc<DiagramLayout>>,
    budget: Duration,
) -> Result<LayoutResult> {
    let name = strategy.name();
    let cancel = CancelToken::with_deadline(Instant::now() + budget);
    let worker_cancel = cancel.clone();
    let (tx, rx) = mpsc::channel();

    std::thread::Builder::new()
        .name(format!("sirenia-{name}"))
        .spawn(move || {
            let out = strategy.apply(
                &nodes,
                &edges,
                &config,
                seed_layout.as_deref(),
                &worker_cancel,
            );
            let _ = tx.send(out);
        })
        .map_err(|e| Error::StrategyFailed {
            strategy: name.to_string(),
            message: format!("could not start worker thread: {e}"),
        })?;

    match rx.recv_timeout(budget) {
        Ok(Err(Error::Cancelled)) => Err(Error::StrategyTimeout {
            strategy: name.to_string(),
            budget,
        }),
        Ok(other) => other,
        Err(RecvTimeoutError::Timeout) => {
            cancel.cancel();
            Err(Error::StrategyTimeout {
                strategy: name.to_string(),
                budget,
            })
        }
        Err(RecvTimeoutError::Disconnected) => Err(Error::StrategyPanicked {
            strategy: name.to_string(),
        }),
    }
}

/// A strategy must return the same nodes (ids, sizes) and edges it was given.
fn check_contract(
    strategy: &str,
    input_nodes: &[PositionedNode],
    input_edges: &[LayoutEdge],
    result: LayoutResult,
) -> Result<LayoutResult> {
    let violation = |message: String| Error::ContractViolation {
        strategy: strategy.to_string(),
        message,
    };

    let out = &result.layout.nodes;
    if out.len() != input_nodes.len() {
        return Err(violation(format!(
            "expected {} nodes, got {}",
            input_nodes.len(),
            out.len()
        )));
    }
    let mut expected: FxHashMap<&str, Vec<(f64, f64)>> = FxHashMap::default();
    for n in input_nodes {
        expected
            .entry(n.id.as_str())
            .or_default()
            .push((n.width, n.height));
    }
    for n in out {
        let sizes = expected
            .get_mut(n.id.as_str())
            .ok_or_else(|| violation(format!("unexpected node {}", n.id)))?;
        let pos = sizes
            .iter()
            .position(|&(w, h)| w == n.width && h == n.height)
            .ok_or_else(|| violation(format!("node {} changed size", n.id)))?;
        sizes.swap_remove(pos);
    }
    for n in out {
        if !(n.x.is_finite() && n.y.is_finite()) {
            return Err(Error::NonFinitePosition {
                strategy: strategy.to_string(),
                node_id: n.id.clone(),
            });
        }
    }

    let mut edge_ids: Vec<&str> = result.layout.edges.iter().map(|e| e.id.as_str()).collect();
    let mut input_ids: Vec<&str> = input_edges.iter().map(|e| e.id.as_str()).collect();
    edge_ids.sort_unstable();
    input_ids.sort_unstable();
    if edge_ids != input_ids {
        return Err(violation("edge set changed".to_string()));
    }
    Ok(result)
}

/// `energy` beats `best` by at least `threshold` (relative to `|best|`).
fn improves(energy: f64, best: f64, threshold: f64) -> bool {
    if best.is_infinite() {
        return energy.is_finite();
    }
    energy < best - best.abs() * threshold
}

/// `energy` stayed above `best * ratio` (for positive `best`; mirrored for negative values).
fn stalls(energy: f64, best: f64, ratio: f64) -> bool {
    if best.is_infinite() {
        return true;
    }
    energy > best - best.abs() * (1.0 - ratio)
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}
