//! Reweighted random walk relaxation and Sinkhorn balancing.

use std::time::Instant;

use nalgebra::DMatrix;
use neq_common::MatchConfig;
use tracing::trace;

use super::MatchError;
use super::affinity::Affinity;

/// Soft correspondence produced by [`rrwm`].
#[derive(Clone, Debug)]
pub(super) struct Relaxation {
    /// `n1 × n2` walk distribution, entries sum to one.
    pub(super) soft: DMatrix<f64>,
    pub(super) iterations: usize,
    pub(super) converged: bool,
}

/// Runs the reweighted random walk on `affinity`.
///
/// Each step walks once through the affinity, then mixes the walk with a
/// Sinkhorn-balanced exponential reweighting of itself. Stops when two
/// successive iterates differ by less than `config.tolerance` in Frobenius
/// norm, or after `config.max_iterations` steps.
pub(super) fn rrwm(
    affinity: &Affinity,
    shape: (usize, usize),
    config: &MatchConfig,
    deadline: Option<Instant>,
) -> Result<Relaxation, MatchError> {
    let (n1, n2) = shape;
    let mut v = DMatrix::<f64>::from_element(n1, n2, 1.0 / (n1 * n2) as f64);
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iterations {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(MatchError::TimedOut { iterations });
        }
        iterations += 1;

        let walked = l1_normalize(affinity.apply(&v));
        let peak = walked.max();
        let reweighted = if peak > 0.0 {
            walked.map(|x| (config.beta * (x / peak - 1.0)).exp())
        } else {
            DMatrix::from_element(n1, n2, 1.0)
        };
        let jump = sinkhorn(reweighted, config.sinkhorn_iterations);
        let next = l1_normalize(jump.scale(config.alpha) + walked.scale(1.0 - config.alpha));

        let delta = (&next - &v).norm();
        trace!("RRWM iteration {} delta {:.3e}", iterations, delta);
        v = next;
        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    Ok(Relaxation {
        soft: v,
        iterations,
        converged,
    })
}

/// Divides by the entry sum; an all-zero matrix is returned unchanged.
pub(super) fn l1_normalize(m: DMatrix<f64>) -> DMatrix<f64> {
    let total = m.sum();
    if total > 0.0 { m.unscale(total) } else { m }
}

/// Alternating row and column balancing of a non-negative matrix.
///
/// Along the shorter side every non-zero line is scaled to sum to one; along
/// the longer side of a rectangular matrix a line is only scaled down when
/// its sum exceeds one. The result lies in `[0, 1]` and zero entries stay
/// zero.
pub(super) fn sinkhorn(mut m: DMatrix<f64>, iterations: usize) -> DMatrix<f64> {
    let rows_exact = m.nrows() <= m.ncols();
    let cap_only = m.nrows() != m.ncols();
    for _ in 0..iterations {
        if rows_exact {
            balance_columns(&mut m, cap_only);
            balance_rows(&mut m, false);
        } else {
            balance_rows(&mut m, cap_only);
            balance_columns(&mut m, false);
        }
    }
    m
}

fn balance_rows(m: &mut DMatrix<f64>, cap_only: bool) {
    for i in 0..m.nrows() {
        let sum: f64 = (0..m.ncols()).map(|j| m[(i, j)]).sum();
        if sum > 0.0 && (!cap_only || sum > 1.0) {
            for j in 0..m.ncols() {
                m[(i, j)] /= sum;
            }
        }
    }
}

fn balance_columns(m: &mut DMatrix<f64>, cap_only: bool) {
    for j in 0..m.ncols() {
        let sum: f64 = (0..m.nrows()).map(|i| m[(i, j)]).sum();
        if sum > 0.0 && (!cap_only || sum > 1.0) {
            for i in 0..m.nrows() {
                m[(i, j)] /= sum;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sinkhorn_square_is_doubly_stochastic() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let out = sinkhorn(m, 50);
        for i in 0..2 {
            assert!((out.row(i).sum() - 1.0).abs() < 1e-9);
            assert!((out.column(i).sum() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_sinkhorn_rectangular_bounds() {
        let m = DMatrix::from_row_slice(2, 3, &[5.0, 1.0, 0.0, 2.0, 2.0, 2.0]);
        let out = sinkhorn(m, 20);
        for i in 0..2 {
            assert!((out.row(i).sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(out[(0, 2)], 0.0);
        assert!(out.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }

    #[test]
    fn test_sinkhorn_permutation_pattern_gives_ones() {
        let m = DMatrix::from_row_slice(2, 2, &[0.0, 0.3, 0.02, 0.0]);
        let out = sinkhorn(m, 5);
        assert_eq!(out[(0, 1)], 1.0);
        assert_eq!(out[(1, 0)], 1.0);
    }

    #[test]
    fn test_l1_normalize_zero() {
        let z = DMatrix::<f64>::zeros(2, 2);
        assert_eq!(l1_normalize(z.clone()), z);
    }
}
