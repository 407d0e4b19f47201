use std::collections::{BTreeMap, BTreeSet};

use nalgebra::DMatrix;
use neq_common::NodeIdx;

use crate::graph_index::GraphIndex;

/// Pairwise affinity between two graphs, kept in factored form.
///
/// The full affinity over node pairs is `K = diag(vec(Kp)) + A2 ⊗ A1`; it is
/// never materialised. [`Affinity::apply`] evaluates `K · vec(X)` as
/// `Kp ∘ X + A1 · X · A2ᵀ`, scaled so that the largest row sum of `K` is one.
#[derive(Clone, Debug)]
pub(super) struct Affinity {
    a1: DMatrix<f64>,
    a2: DMatrix<f64>,
    a2t: DMatrix<f64>,
    kp: DMatrix<f64>,
    scale: f64,
}

impl Affinity {
    pub(super) fn build(g1: &GraphIndex<'_>, g2: &GraphIndex<'_>) -> Self {
        let a1 = Self::build_adjacency(g1);
        let a2 = Self::build_adjacency(g2);

        let vocabulary = Self::build_vocabulary(g1, g2);
        let f1 = Self::build_features(g1, &vocabulary);
        let f2 = Self::build_features(g2, &vocabulary);
        let kp = &f1 * f2.transpose();

        let scale = Self::max_row_sum(&kp, g1, g2);

        Affinity {
            a2t: a2.transpose(),
            a1,
            a2,
            kp,
            scale,
        }
    }

    fn build_adjacency(index: &GraphIndex<'_>) -> DMatrix<f64> {
        let n = index.len();
        let mut adjacency = DMatrix::<f64>::zeros(n, n);
        for i in NodeIdx::range(n) {
            for &j in index.fanout(i) {
                adjacency[(i.as_usize(), j.as_usize())] = 1.0;
            }
        }
        adjacency
    }

    /// Sorted union of non-empty type labels; the empty label maps to the
    /// trailing unknown bucket.
    fn build_vocabulary<'a>(g1: &GraphIndex<'a>, g2: &GraphIndex<'a>) -> BTreeMap<&'a str, usize> {
        let labels: BTreeSet<&'a str> = g1
            .types()
            .chain(g2.types())
            .filter(|ty| !ty.is_empty())
            .collect();
        labels
            .into_iter()
            .enumerate()
            .map(|(position, ty)| (ty, position))
            .collect()
    }

    /// One-hot type rows, filled bucket by bucket from the index's type map.
    fn build_features(index: &GraphIndex<'_>, vocabulary: &BTreeMap<&str, usize>) -> DMatrix<f64> {
        let unknown = vocabulary.len();
        let mut features = DMatrix::<f64>::zeros(index.len(), unknown + 1);
        let buckets = vocabulary
            .iter()
            .map(|(ty, &column)| (*ty, column))
            .chain(std::iter::once(("", unknown)));
        for (ty, column) in buckets {
            for idx in index.get_by_type(ty) {
                features[(idx.as_usize(), column)] = 1.0;
            }
        }
        features
    }

    /// Row sums of `K` are `Kp[i,a] + outdeg1(i) · outdeg2(a)`.
    fn max_row_sum(kp: &DMatrix<f64>, g1: &GraphIndex<'_>, g2: &GraphIndex<'_>) -> f64 {
        let mut max = 0.0_f64;
        for i in NodeIdx::range(g1.len()) {
            let out1 = g1.fanout(i).len() as f64;
            for a in NodeIdx::range(g2.len()) {
                let out2 = g2.fanout(a).len() as f64;
                max = max.max(kp[(i.as_usize(), a.as_usize())] + out1 * out2);
            }
        }
        if max > 0.0 { max } else { 1.0 }
    }

    /// Normalised `K · vec(x)`, reshaped to `n1 × n2`.
    pub(super) fn apply(&self, x: &DMatrix<f64>) -> DMatrix<f64> {
        let walked = self.kp.component_mul(x) + &self.a1 * x * &self.a2t;
        walked.unscale(self.scale)
    }

    /// One where the node types agree, zero elsewhere.
    pub(super) fn compatibility(&self) -> &DMatrix<f64> {
        &self.kp
    }

    pub(super) fn adjacency_a(&self) -> &DMatrix<f64> {
        &self.a1
    }

    pub(super) fn adjacency_b(&self) -> &DMatrix<f64> {
        &self.a2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAttrs, Graph, NodeCategory};

    #[test]
    fn test_compatibility_and_unknown_bucket() {
        let mut g1 = Graph::new();
        g1.add_node("a", NodeCategory::Instance, "AND");
        g1.add_node("b", NodeCategory::Instance, "");
        g1.add_edge("a", "b", EdgeAttrs::default()).unwrap();

        let mut g2 = Graph::new();
        g2.add_node("x", NodeCategory::Instance, "");
        g2.add_node("y", NodeCategory::Instance, "AND");
        g2.add_node("z", NodeCategory::Instance, "OR");

        let (i1, i2) = (GraphIndex::build(&g1), GraphIndex::build(&g2));
        let aff = Affinity::build(&i1, &i2);
        let kp = aff.compatibility();
        assert_eq!(kp.shape(), (2, 3));
        assert_eq!(kp[(0, 1)], 1.0);
        assert_eq!(kp[(1, 0)], 1.0);
        assert_eq!(kp[(0, 2)], 0.0);
        assert_eq!(aff.adjacency_a()[(0, 1)], 1.0);
        assert_eq!(aff.adjacency_b().sum(), 0.0);
    }

    #[test]
    fn test_apply_matches_dense_product() {
        let mut g = Graph::new();
        g.add_node("a", NodeCategory::Instance, "A");
        g.add_node("b", NodeCategory::Instance, "B");
        g.add_edge("a", "b", EdgeAttrs::default()).unwrap();
        let index = GraphIndex::build(&g);
        let aff = Affinity::build(&index, &index);

        // Largest row sum of K is Kp[a,a] + outdeg(a) * outdeg(a) = 2.
        let x = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let y = aff.apply(&x);
        assert!((y[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((y[(1, 1)] - 0.5).abs() < 1e-12);
        assert_eq!(y[(0, 1)], 0.0);
        assert_eq!(y[(1, 0)], 0.0);
    }
}
