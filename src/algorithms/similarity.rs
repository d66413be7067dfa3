use crate::models::UserId;
use crate::store::PreferenceStore;
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fewest co-rated items for which a similarity is defined.
pub const MIN_CO_RATED: usize = 2;

/// User-user similarity, selected once at construction.
///
/// `similarity` returns `None` when the score is undefined (too few co-rated
/// items, or a degenerate rating vector). Such users can never be neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    PearsonCorrelation,
    Cosine,
    Euclidean,
}

impl SimilarityMetric {
    pub fn similarity(&self, store: &PreferenceStore, a: UserId, b: UserId) -> Option<f64> {
        let (xs, ys) = co_rated(store.ratings_of(a), store.ratings_of(b));
        if xs.len() < MIN_CO_RATED {
            return None;
        }

        let x = DVector::from_vec(xs);
        let y = DVector::from_vec(ys);

        let score = match self {
            Self::PearsonCorrelation => pearson(&x, &y),
            Self::Cosine => cosine(&x, &y),
            Self::Euclidean => Some(1.0 / (1.0 + (&x - &y).norm())),
        };
        score.filter(|s| s.is_finite())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::PearsonCorrelation => "pearson_correlation",
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }
}

/// Ratings of the items both users rated, aligned by ascending item id.
fn co_rated(a: &BTreeMap<i64, f64>, b: &BTreeMap<i64, f64>) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::new();
    let mut ys = Vec::new();

    if a.len() <= b.len() {
        for (item, &x) in a {
            if let Some(&y) = b.get(item) {
                xs.push(x);
                ys.push(y);
            }
        }
    } else {
        for (item, &y) in b {
            if let Some(&x) = a.get(item) {
                xs.push(x);
                ys.push(y);
            }
        }
    }

    (xs, ys)
}

fn is_constant(v: &DVector<f64>) -> bool {
    v.iter().all(|&x| x == v[0])
}

/// `v` divided by its largest magnitude, so sums of squares cannot overflow.
/// Pearson and cosine are invariant under this scaling.
fn rescaled(v: &DVector<f64>) -> Option<DVector<f64>> {
    let scale = v.amax();
    if scale == 0.0 || !scale.is_finite() {
        return None;
    }
    Some(v / scale)
}

fn pearson(x: &DVector<f64>, y: &DVector<f64>) -> Option<f64> {
    if is_constant(x) || is_constant(y) {
        return None;
    }

    let x = rescaled(x)?;
    let y = rescaled(y)?;
    let xc = x.add_scalar(-x.mean());
    let yc = y.add_scalar(-y.mean());

    let denominator = xc.norm() * yc.norm();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    Some((xc.dot(&yc) / denominator).clamp(-1.0, 1.0))
}

fn cosine(x: &DVector<f64>, y: &DVector<f64>) -> Option<f64> {
    let x = rescaled(x)?;
    let y = rescaled(y)?;

    let denominator = x.norm() * y.norm();
    if denominator == 0.0 || !denominator.is_finite() {
        return None;
    }

    Some((x.dot(&y) / denominator).clamp(-1.0, 1.0))
}
