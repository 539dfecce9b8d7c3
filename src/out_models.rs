use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AxisProfile, ScoredResult, StanceLabel};

/* Aggregate */
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StanceSummary {
    pub support_count: usize,
    pub oppose_count: usize,
    pub neutral_count: usize,
    pub unknown_count: usize,
    pub total_count: usize,
    pub is_partial: bool,
    pub mean_weighted_score: f64,
    pub tokens_used: u64,
    pub failed_batches: usize,
}

impl StanceSummary {
    pub fn from_results(
        results: &[ScoredResult],
        is_partial: bool,
        tokens_used: u64,
        failed_batches: usize,
    ) -> Self {
        let mut summary = StanceSummary {
            total_count: results.len(),
            is_partial,
            tokens_used,
            failed_batches,
            ..StanceSummary::default()
        };
        for r in results {
            match r.result.label {
                StanceLabel::Support => summary.support_count += 1,
                StanceLabel::Oppose => summary.oppose_count += 1,
                StanceLabel::Neutral => summary.neutral_count += 1,
                StanceLabel::Unknown => summary.unknown_count += 1,
            }
        }
        if !results.is_empty() {
            summary.mean_weighted_score =
                results.iter().map(|r| r.weighted_score).sum::<f64>() / results.len() as f64;
        }
        summary
    }
}

/* Full run output */
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub video_id: String,
    pub generated_at: DateTime<Utc>,
    pub axis_profile: AxisProfile,
    pub video_context: String,
    pub results: Vec<ScoredResult>,
    pub summary: StanceSummary,
}
