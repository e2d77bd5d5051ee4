use crate::types::{Embedding, FileIndexEntry, SimilarFile};
use std::cmp::Ordering;

/// Scores this close to the threshold still pass, so an identical vector
/// survives `min_similarity = 1.0` despite float rounding.
pub const SIMILARITY_EPSILON: f32 = 1e-6;

/// Cosine similarity; 0.0 on length mismatch or a zero vector.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Brute-force ranking of `entries` against `query` (O(n)).
///
/// Entries embedded by another model, and zero vectors from failed embeds,
/// never match.
pub(crate) fn rank<'a>(
    query: &Embedding,
    entries: impl Iterator<Item = &'a FileIndexEntry>,
    top_n: usize,
    min_similarity: f32,
) -> Vec<SimilarFile> {
    if top_n == 0 || query.is_zero() {
        return Vec::new();
    }

    let mut foreign = 0usize;
    let mut scores: Vec<SimilarFile> = entries
        .filter(|entry| {
            if entry.embedding.model_id != query.model_id {
                foreign += 1;
                return false;
            }
            !entry.embedding.is_zero()
        })
        .filter_map(|entry| {
            let score = cosine_similarity(&query.vector, &entry.embedding.vector);
            (score + SIMILARITY_EPSILON >= min_similarity).then(|| SimilarFile {
                path: entry.path.clone(),
                score,
                symbol: entry.symbols.first().cloned(),
            })
        })
        .collect();

    if foreign > 0 {
        log::debug!(
            "Skipped {foreign} entries embedded by a model other than '{}'",
            query.model_id
        );
    }

    // Sort by score descending; path keeps equal scores in a stable order
    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    scores.truncate(top_n);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
