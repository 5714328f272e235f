//! Eigenvector centrality by shifted power iteration.
//!
//! Scores come from the dominant eigenvector of `Aᵀ`, so a node is central
//! when central nodes point at it. Iterating on `Aᵀ + I` has the same
//! eigenvectors but keeps bipartite and periodic graphs from oscillating.

use parentheses_shared::{ParenthesesError, Result};

const MAX_ITERATIONS: usize = 1000;
const TOLERANCE: f64 = 1e-12;

/// Centrality for `n` nodes given directed `edges` as `(from, to)` index
/// pairs. The result sums to 1. A graph without edges scores uniformly.
pub fn eigenvector_centrality(n: usize, edges: &[(usize, usize)]) -> Result<Vec<f64>> {
    if n == 0 {
        return Ok(Vec::new());
    }

    // 0/1 adjacency, stored as incoming lists; duplicate edges collapse.
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(from, to) in edges {
        if from >= n || to >= n {
            return Err(ParenthesesError::Graph(format!(
                "edge ({from}, {to}) out of range for {n} nodes"
            )));
        }
        if !incoming[to].contains(&from) {
            incoming[to].push(from);
        }
    }

    let mut x = vec![1.0 / n as f64; n];
    let mut next = vec![0.0; n];

    for iteration in 0..MAX_ITERATIONS {
        for (j, sources) in incoming.iter().enumerate() {
            next[j] = x[j] + sources.iter().map(|&i| x[i]).sum::<f64>();
        }

        let norm: f64 = next.iter().sum();
        if !norm.is_finite() || norm <= 0.0 {
            return Err(ParenthesesError::Graph(format!(
                "centrality vector cannot be normalized (sum {norm})"
            )));
        }
        for v in next.iter_mut() {
            *v /= norm;
        }

        let delta: f64 = x.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
        std::mem::swap(&mut x, &mut next);
        if delta < TOLERANCE {
            tracing::trace!(iteration, "centrality converged");
            break;
        }
    }

    Ok(x)
}
