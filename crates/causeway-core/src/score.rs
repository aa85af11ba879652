//! Score normalization and multi-factor relevance scoring.
//!
//! Raw scores from the vector store (cosine similarities or distances)
//! are normalized into `[0, 1]` before they are shown to users or fed
//! into the rebalancing planner. The planner's relevance score blends
//! three factors:
//!
//! ```text
//! relevance = w_sim × similarity + w_urg × (urgency / 10) + w_conf × confidence
//! ```
//!
//! With the default weights all three inputs at their maxima produce a
//! relevance of exactly 1.0.

/// Weights for the three relevance factors. Should sum to 1.0 so the
/// blended score stays in `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceWeights {
    pub similarity: f64,
    pub urgency: f64,
    pub confidence: f64,
}

impl Default for RelevanceWeights {
    fn default() -> Self {
        Self {
            similarity: 0.5,
            urgency: 0.3,
            confidence: 0.2,
        }
    }
}

/// Blend charity similarity, article urgency (1–10), and the user's
/// category confidence into a single relevance score in `[0, 1]`.
///
/// Inputs are clamped to their expected ranges first, so an out-of-range
/// urgency from a misparsed LLM reply cannot push the score outside the
/// unit interval.
pub fn relevance_score(
    similarity: f64,
    urgency: f64,
    confidence: f64,
    weights: &RelevanceWeights,
) -> f64 {
    let sim = similarity.clamp(0.0, 1.0);
    let urg = urgency.clamp(0.0, 10.0) / 10.0;
    let conf = confidence.clamp(0.0, 1.0);

    weights.similarity * sim + weights.urgency * urg + weights.confidence * conf
}

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal, they normalize to `1.0`. Empty input yields
/// an empty output.
pub fn normalize_similarities(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    scores
        .iter()
        .map(|&s| {
            if (s_max - s_min).abs() < f64::EPSILON {
                1.0
            } else {
                (s - s_min) / (s_max - s_min)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_maxima() {
        let w = RelevanceWeights::default();
        let r = relevance_score(1.0, 10.0, 1.0, &w);
        assert!((r - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_relevance_minima() {
        let w = RelevanceWeights::default();
        assert_eq!(relevance_score(0.0, 0.0, 0.0, &w), 0.0);
    }

    #[test]
    fn test_relevance_clamps_out_of_range_urgency() {
        let w = RelevanceWeights::default();
        let r = relevance_score(0.5, 42.0, 0.5, &w);
        assert!(r <= 1.0);
        assert_eq!(r, relevance_score(0.5, 10.0, 0.5, &w));
    }

    #[test]
    fn test_relevance_monotone_in_similarity() {
        let w = RelevanceWeights::default();
        let low = relevance_score(0.2, 5.0, 0.5, &w);
        let high = relevance_score(0.9, 5.0, 0.5, &w);
        assert!(high > low);
    }

    #[test]
    fn test_normalize_empty() {
        assert!(normalize_similarities(&[]).is_empty());
    }

    #[test]
    fn test_normalize_range() {
        let out = normalize_similarities(&[10.0, 5.0, 0.0]);
        assert!((out[0] - 1.0).abs() < 1e-9);
        assert!((out[1] - 0.5).abs() < 1e-9);
        assert!((out[2] - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_all_equal() {
        for v in normalize_similarities(&[3.0, 3.0, 3.0]) {
            assert!((v - 1.0).abs() < 1e-9);
        }
    }
}
