use nalgebra::DMatrix;
use std::collections::VecDeque;

/// Above this size the dense eigen-decomposition is skipped and nodes keep their start positions.
const MAX_SPECTRAL_NODES: usize = 300;
const SMALL: f64 = 1e-9;

/// Classical multidimensional scaling of hop distances.
///
/// Returns one `(x, y)` per node, centered on the origin, where one hop maps to `unit` length.
/// `None` when the graph is too small, too large, edgeless, or when the top of the spectrum is
/// degenerate (e.g. complete graphs), in which case no orientation is preferable.
pub(super) fn spectral_positions(
    node_count: usize,
    endpoints: &[(usize, usize)],
    unit: f64,
) -> Option<Vec<(f64, f64)>> {
    if node_count < 3 || node_count > MAX_SPECTRAL_NODES || endpoints.is_empty() {
        return None;
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for &(a, b) in endpoints {
        if a == b || a >= node_count || b >= node_count {
            continue;
        }
        adjacency[a].push(b);
        adjacency[b].push(a);
    }

    let hops = all_pairs_hops(&adjacency);
    let max_finite = hops
        .iter()
        .flatten()
        .filter_map(|h| *h)
        .max()
        .unwrap_or(0);
    // Disconnected components sit one hop beyond the graph diameter.
    let unreachable = (max_finite + 1) as f64;

    let mut d2 = DMatrix::<f64>::zeros(node_count, node_count);
    for (i, row) in hops.iter().enumerate() {
        for (j, h) in row.iter().enumerate() {
            let d = h.map(|v| v as f64).unwrap_or(unreachable);
            d2[(i, j)] = d * d;
        }
    }

    // Double centering: B = -1/2 * J * D^2 * J.
    let n = node_count as f64;
    let row_means: Vec<f64> = (0..node_count).map(|i| d2.row(i).sum() / n).collect();
    let grand_mean = row_means.iter().sum::<f64>() / n;
    let mut b = DMatrix::<f64>::zeros(node_count, node_count);
    for i in 0..node_count {
        for j in 0..node_count {
            b[(i, j)] = -0.5 * (d2[(i, j)] - row_means[i] - row_means[j] + grand_mean);
        }
    }

    let eigen = b.symmetric_eigen();
    let mut order: Vec<usize> = (0..node_count).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let l1 = eigen.eigenvalues[order[0]];
    if !(l1.is_finite() && l1 > SMALL) {
        return None;
    }
    // Round-off noise below this floor is treated as a zero eigenvalue.
    let floor = SMALL * l1;
    let l2 = Some(eigen.eigenvalues[order[1]]).filter(|v| *v > floor).unwrap_or(0.0);
    let l3 = Some(eigen.eigenvalues[order[2]]).filter(|v| *v > floor).unwrap_or(0.0);
    if l3 > 0.0 && (l2 - l3).abs() <= 1e-6 * l1 {
        return None;
    }

    let s1 = l1.sqrt() * unit;
    let s2 = l2.sqrt() * unit;
    let v1 = eigen.eigenvectors.column(order[0]);
    let v2 = eigen.eigenvectors.column(order[1]);
    let positions: Vec<(f64, f64)> = (0..node_count)
        .map(|i| (v1[i] * s1, v2[i] * s2))
        .collect();
    if positions.iter().any(|(x, y)| !(x.is_finite() && y.is_finite())) {
        return None;
    }
    Some(positions)
}

fn all_pairs_hops(adjacency: &[Vec<usize>]) -> Vec<Vec<Option<usize>>> {
    let n = adjacency.len();
    let mut out = vec![vec![None; n]; n];
    let mut queue: VecDeque<usize> = VecDeque::with_capacity(n);
    for (source, row) in out.iter_mut().enumerate() {
        row[source] = Some(0);
        queue.clear();
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            let Some(dv) = row[v] else {
                continue;
            };
            for &w in &adjacency[v] {
                if row[w].is_none() {
                    row[w] = Some(dv + 1);
                    queue.push_back(w);
                }
            }
        }
    }
    out
}
