use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{clamp_score, Comment, ScoredResult, StanceResult};

/// Engagement weighting: `weight = 1 + log10(likes + 1) * damping / divisor`.
///
/// Both historical formulas are instances of this one strategy:
/// `normalized()` (damping 1, divisor 7) and `damped()` (damping 0.2, divisor 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightingStrategy {
    pub damping: f64,
    pub divisor: f64,
}

impl Default for WeightingStrategy {
    fn default() -> Self {
        Self::damped()
    }
}

impl WeightingStrategy {
    pub fn normalized() -> Self {
        Self {
            damping: 1.0,
            divisor: 7.0,
        }
    }

    pub fn damped() -> Self {
        Self {
            damping: 0.2,
            divisor: 1.0,
        }
    }

    pub fn weight(&self, like_count: u64) -> f64 {
        1.0 + (like_count as f64 + 1.0).log10() * self.damping / self.divisor
    }

    pub fn weighted_score(&self, raw_score: f64, like_count: u64) -> f64 {
        let raw = clamp_score(raw_score);
        if like_count == 0 {
            return raw;
        }
        clamp_score(raw * self.weight(like_count))
    }

    pub fn score(&self, result: StanceResult, like_count: u64) -> ScoredResult {
        let weighted_score = self.weighted_score(result.raw_score, like_count);
        ScoredResult {
            result,
            weighted_score,
        }
    }
}

/// Score results against the like counts of their comments. Unknown ids weigh 1.
pub fn score_all(
    results: Vec<StanceResult>,
    comments: &[Comment],
    strategy: &WeightingStrategy,
) -> Vec<ScoredResult> {
    let likes: HashMap<&str, u64> = comments
        .iter()
        .map(|c| (c.id.as_str(), c.like_count))
        .collect();
    results
        .into_iter()
        .map(|r| {
            let like_count = likes.get(r.comment_id.as_str()).copied().unwrap_or(0);
            strategy.score(r, like_count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StanceDirection;
    use proptest::prelude::*;

    #[test]
    fn presets_match_historical_formulas() {
        let normalized = WeightingStrategy::normalized();
        let damped = WeightingStrategy::damped();
        // 999 likes => log10(1000) = 3
        assert!((normalized.weight(999) - (1.0 + 3.0 / 7.0)).abs() < 1e-12);
        assert!((damped.weight(999) - 1.6).abs() < 1e-12);
    }

    #[test]
    fn heavy_engagement_saturates_at_bounds() {
        let strategy = WeightingStrategy {
            damping: 1.0,
            divisor: 1.0,
        };
        assert_eq!(strategy.weighted_score(0.9, 1_000_000), 1.0);
        assert_eq!(strategy.weighted_score(-0.9, 1_000_000), -1.0);
    }

    #[test]
    fn score_all_matches_by_id() {
        let comments = vec![crate::models::Comment {
            id: "c1".into(),
            author_id: "a".into(),
            text: "t".into(),
            like_count: 9,
            published_at: chrono::Utc::now(),
            parent_id: None,
        }];
        let results = vec![
            StanceResult::from_direction("c1", StanceDirection::Support, 0.5),
            StanceResult::from_direction("zz", StanceDirection::Oppose, 0.5),
        ];
        let scored = score_all(results, &comments, &WeightingStrategy::damped());
        assert!((scored[0].weighted_score - 0.6).abs() < 1e-12);
        assert_eq!(scored[1].weighted_score, -0.5);
    }

    proptest! {
        #[test]
        fn zero_likes_is_identity(raw in -1.0f64..=1.0, damping in 0.0f64..5.0, divisor in 0.1f64..10.0) {
            let strategy = WeightingStrategy { damping, divisor };
            prop_assert_eq!(strategy.weighted_score(raw, 0), raw);
        }

        #[test]
        fn weighted_score_is_bounded(raw in -10.0f64..10.0, likes in 0u64..10_000_000, damping in 0.0f64..5.0) {
            let strategy = WeightingStrategy { damping, divisor: 1.0 };
            let w = strategy.weighted_score(raw, likes);
            prop_assert!((-1.0..=1.0).contains(&w));
        }

        #[test]
        fn weighting_never_flips_sign(raw in -1.0f64..=1.0, likes in 0u64..100_000) {
            let w = WeightingStrategy::normalized().weighted_score(raw, likes);
            prop_assert!(w * raw >= 0.0);
        }
    }
}
