//! Maximal Marginal Relevance selection.

use crate::vector_store::cosine_similarity;

/// Pick up to `k` candidate indices balancing relevance to the query against
/// similarity to what has already been picked.
///
/// `lambda_mult = 1.0` reduces to plain relevance ranking, `0.0` to maximal
/// diversity. Candidates are expected in similarity order; on equal scores the
/// earlier candidate wins.
pub fn mmr_select(
    query_embedding: &[f32],
    candidates: &[Vec<f32>],
    k: usize,
    lambda_mult: f32,
) -> Vec<usize> {
    if candidates.is_empty() || k == 0 {
        return Vec::new();
    }

    let relevance: Vec<f32> = candidates
        .iter()
        .map(|c| cosine_similarity(query_embedding, c))
        .collect();

    let mut selected: Vec<usize> = Vec::with_capacity(k.min(candidates.len()));
    // Highest similarity to any selected candidate, per candidate
    let mut redundancy: Vec<f32> = vec![f32::NEG_INFINITY; candidates.len()];

    while selected.len() < k.min(candidates.len()) {
        let mut best: Option<(usize, f32)> = None;

        for (i, rel) in relevance.iter().enumerate() {
            if selected.contains(&i) {
                continue;
            }
            let score = if selected.is_empty() {
                *rel
            } else {
                lambda_mult * rel - (1.0 - lambda_mult) * redundancy[i]
            };
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let Some((pick, _)) = best else { break };
        selected.push(pick);

        for (i, candidate) in candidates.iter().enumerate() {
            let sim = cosine_similarity(&candidates[pick], candidate);
            if sim > redundancy[i] {
                redundancy[i] = sim;
            }
        }
    }

    selected
}
