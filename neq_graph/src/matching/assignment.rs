//! Maximum-weight bipartite assignment (Hungarian method with potentials).

use nalgebra::DMatrix;

/// Maximum-weight one-to-one assignment over `weights`.
///
/// The matrix is zero-padded to square, so exactly `min(n1, n2)` rows are
/// assigned. Returns `(row, column)` pairs sorted by row.
pub(super) fn max_weight_assignment(weights: &DMatrix<f64>) -> Vec<(usize, usize)> {
    let (n1, n2) = weights.shape();
    let n = n1.max(n2);
    if n1 == 0 || n2 == 0 {
        return Vec::new();
    }

    // Minimisation over 1-based cost[i][j] = -weight, padding costs zero.
    let cost = |i: usize, j: usize| -> f64 {
        if i <= n1 && j <= n2 {
            -weights[(i - 1, j - 1)]
        } else {
            0.0
        }
    };

    let mut u = vec![0.0_f64; n + 1];
    let mut v = vec![0.0_f64; n + 1];
    // p[j]: row assigned to column j, 0 for none.
    let mut p = vec![0_usize; n + 1];
    let mut way = vec![0_usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let reduced = cost(i0, j) - u[i0] - v[j];
                if reduced < minv[j] {
                    minv[j] = reduced;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut pairs: Vec<(usize, usize)> = (1..=n)
        .filter(|&j| p[j] >= 1 && p[j] <= n1 && j <= n2)
        .map(|j| (p[j] - 1, j - 1))
        .collect();
    pairs.sort_unstable();
    pairs
}
