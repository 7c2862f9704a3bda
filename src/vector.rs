//! Pure vector-similarity arithmetic. No external linear-algebra crate —
//! the dimensions involved are small and the operations are a handful of
//! dot products, not worth a dependency.

use crate::types::{DistanceMetric, VectorSearchResult};
use crate::value::VectorIndex;

pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter().zip(b).map(|(&x, &y)| x as f64 * y as f64).sum()
}

pub fn l2_norm(a: &[f32]) -> f64 {
    dot(a, a).sqrt()
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom == 0.0 {
        0.0
    } else {
        dot(a, b) / denom
    }
}

pub fn l2_distance(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x as f64 - y as f64).powi(2))
        .sum::<f64>()
        .sqrt()
}

pub fn score(metric: DistanceMetric, query: &[f32], candidate: &[f32]) -> f64 {
    match metric {
        DistanceMetric::Cosine => cosine_similarity(query, candidate),
        DistanceMetric::Dot => dot(query, candidate),
        DistanceMetric::L2 => l2_distance(query, candidate),
    }
}

/// Rank every vector in `index` against `query` under `metric`, returning
/// the top `limit` results after skipping `offset`. Ties break on
/// lexicographic element name for deterministic output.
pub fn top_k(
    index: &VectorIndex,
    query: &[f32],
    metric: DistanceMetric,
    offset: usize,
    limit: usize,
) -> Vec<VectorSearchResult> {
    let mut scored: Vec<VectorSearchResult> = index
        .vectors
        .iter()
        .map(|(name, vec)| VectorSearchResult {
            element: name.clone(),
            score: score(metric, query, vec),
        })
        .collect();

    scored.sort_by(|a, b| {
        let ord = if metric.descending() {
            b.score.partial_cmp(&a.score)
        } else {
            a.score.partial_cmp(&b.score)
        };
        ord.unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.element.cmp(&b.element))
    });

    scored.into_iter().skip(offset).take(limit).collect()
}
