use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::budget::cap_text;
use crate::config::AnalysisConfig;
use crate::engine::{degraded_response, AnalysisEngine};
use crate::error::ClassifiedError;
use crate::models::{
    AxisProfile, BatchRequest, BatchResponse, Comment, ScoredResult, StanceResult, Tier,
    VideoMetadata,
};
use crate::out_models::{AnalysisReport, StanceSummary};
use crate::scoring::{score_all, WeightingStrategy};
use crate::synthesis::{synthesize, SynthesisStats};

const PARENT_EXCERPT_TOKENS: usize = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub rich_tier_threshold: usize,
    pub concurrency: usize,
    pub window_delay: Duration,
    /// Caller-level limit on one batch call.
    pub batch_timeout: Duration,
    pub weighting: WeightingStrategy,
}

impl From<&AnalysisConfig> for SchedulerConfig {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            rich_tier_threshold: config.rich_tier_threshold,
            concurrency: config.concurrency.max(1),
            window_delay: config.window_delay(),
            batch_timeout: config.request_timeout(),
            weighting: config.weighting,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub index: usize,
    pub tier: Tier,
    pub comments: Vec<Comment>,
}

/// Sort by likes (descending, stable), give the first `rich_tier_threshold`
/// comments the rich tier, and cut each tier into batches of `batch_size`.
/// A batch never mixes tiers.
pub fn plan_batches(comments: &[Comment], batch_size: usize, rich_tier_threshold: usize) -> Vec<BatchPlan> {
    let batch_size = batch_size.max(1);
    let mut ranked: Vec<&Comment> = comments.iter().collect();
    ranked.sort_by(|a, b| b.like_count.cmp(&a.like_count));

    let split = rich_tier_threshold.min(ranked.len());
    let (rich, lite) = ranked.split_at(split);

    let mut plans = Vec::new();
    for (tier, slice) in [(Tier::Rich, rich), (Tier::Lite, lite)] {
        for chunk in slice.chunks(batch_size) {
            plans.push(BatchPlan {
                index: plans.len(),
                tier,
                comments: chunk.iter().map(|c| (*c).clone()).collect(),
            });
        }
    }
    plans
}

/// Parent text for every reply in `batch` whose parent is in the full set.
pub fn parent_excerpts(batch: &[Comment], texts: &HashMap<&str, &str>) -> HashMap<String, String> {
    batch
        .iter()
        .filter_map(|c| c.parent_id.as_deref())
        .filter_map(|p| {
            texts
                .get(p)
                .map(|text| (p.to_string(), cap_text(text, PARENT_EXCERPT_TOKENS).replace('\n', " ")))
        })
        .collect()
}

/// Results of one scheduled run, in input order.
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub results: Vec<ScoredResult>,
    pub summary: StanceSummary,
    pub synthesis: SynthesisStats,
}

pub struct BatchScheduler {
    engine: AnalysisEngine,
    config: SchedulerConfig,
}

impl BatchScheduler {
    pub fn new(engine: AnalysisEngine, config: SchedulerConfig) -> Self {
        Self { engine, config }
    }

    pub async fn run(
        &self,
        comments: &[Comment],
        axis_profile: Arc<AxisProfile>,
        video_context: Arc<str>,
    ) -> ScheduledRun {
        let run_start = Instant::now();

        let mut seen = HashSet::new();
        let unique: Vec<Comment> = comments
            .iter()
            .filter(|c| seen.insert(c.id.as_str()))
            .cloned()
            .collect();
        if unique.len() < comments.len() {
            warn!(
                "Duplicate comment ids ignored - duplicates={}, retained={}",
                comments.len() - unique.len(),
                unique.len()
            );
        }

        let plans = plan_batches(&unique, self.config.batch_size, self.config.rich_tier_threshold);
        let rich_batches = plans.iter().filter(|p| p.tier == Tier::Rich).count();
        let total_batches = plans.len();
        info!(
            "Classification starting - comments={}, batches={}, rich_batches={}, lite_batches={}, concurrency={}",
            unique.len(),
            total_batches,
            rich_batches,
            total_batches - rich_batches,
            self.config.concurrency.max(1)
        );

        let texts: HashMap<&str, &str> = unique.iter().map(|c| (c.id.as_str(), c.text.as_str())).collect();
        let requests: Vec<BatchRequest> = plans
            .into_iter()
            .map(|plan| BatchRequest {
                parent_excerpts: parent_excerpts(&plan.comments, &texts),
                comments: plan.comments,
                tier: plan.tier,
                axis_profile: Arc::clone(&axis_profile),
                video_context: Arc::clone(&video_context),
            })
            .collect();

        let mut merged: HashMap<String, StanceResult> = HashMap::with_capacity(unique.len());
        let mut tokens_used = 0u64;
        let mut failed_batches = 0usize;
        let mut is_partial = false;
        let mut completed = 0usize;
        let mut total_window_time = 0.0f32;
        let concurrency = self.config.concurrency.max(1);
        let window_count = total_batches.div_ceil(concurrency);

        for (window_index, window) in requests.chunks(concurrency).enumerate() {
            if window_index > 0 && !self.config.window_delay.is_zero() {
                tokio::time::sleep(self.config.window_delay).await;
            }
            let window_start = Instant::now();

            let outcomes = join_all(window.iter().map(|req| self.run_batch(req))).await;

            for (response, failed) in outcomes {
                tokens_used += response.tokens_used;
                is_partial |= response.is_partial;
                if failed {
                    failed_batches += 1;
                }
                for result in response.results {
                    merged.insert(result.comment_id.clone(), result);
                }
            }

            let window_elapsed = window_start.elapsed().as_secs_f32();
            total_window_time += window_elapsed;
            completed += window.len();

            let pct = (completed as f32 / total_batches as f32 * 100.0) as u32;
            let avg_window = total_window_time / (window_index + 1) as f32;
            let remaining_windows = window_count - (window_index + 1);
            let eta_seconds = (avg_window + self.config.window_delay.as_secs_f32()) * remaining_windows as f32;
            info!(
                "Classification progress: {}/{} batches ({}%) | Window: {:.1}s | Avg window: {:.1}s | ETA: {}m {}s",
                completed,
                total_batches,
                pct,
                window_elapsed,
                avg_window,
                (eta_seconds / 60.0) as u32,
                (eta_seconds % 60.0) as u32
            );
        }

        let absent: Vec<&str> = unique
            .iter()
            .filter(|c| !merged.contains_key(&c.id))
            .map(|c| c.id.as_str())
            .collect();
        debug_assert!(absent.is_empty(), "comments without a result: {:?}", absent);
        if !absent.is_empty() {
            error!("Results missing after merge - count={}", absent.len());
            is_partial = true;
            for id in absent {
                merged.insert(id.to_string(), StanceResult::placeholder(id, "no response for this item"));
            }
        }

        let synthesis = synthesize(&unique, &mut merged);
        info!(
            "Thread synthesis completed - corrected={}, unresolved_parent={}, without_relation={}",
            synthesis.corrected, synthesis.unresolved_parent, synthesis.without_relation
        );

        let ordered: Vec<StanceResult> = unique.iter().filter_map(|c| merged.remove(&c.id)).collect();
        let results = score_all(ordered, &unique, &self.config.weighting);
        let summary = StanceSummary::from_results(&results, is_partial, tokens_used, failed_batches);

        info!(
            "Classification completed - duration={:.2}s, results={}, support={}, oppose={}, neutral={}, unknown={}, failed_batches={}, partial={}, tokens={}",
            run_start.elapsed().as_secs_f32(),
            summary.total_count,
            summary.support_count,
            summary.oppose_count,
            summary.neutral_count,
            summary.unknown_count,
            failed_batches,
            is_partial,
            tokens_used
        );

        ScheduledRun {
            results,
            summary,
            synthesis,
        }
    }

    /// One batch under the caller-level timeout. The flag is true when the
    /// whole batch degraded to placeholders.
    async fn run_batch(&self, request: &BatchRequest) -> (BatchResponse, bool) {
        let outcome = tokio::time::timeout(
            self.config.batch_timeout,
            self.engine.try_classify_batch(request),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ClassifiedError::timeout(format!(
                "batch exceeded {}s",
                self.config.batch_timeout.as_secs()
            )))
        });

        match outcome {
            Ok(response) => (response, false),
            Err(e) => (degraded_response(request, &e), true),
        }
    }

    /// Summarize, build the axis profile unless one is supplied, then classify.
    pub async fn analyze_video(
        &self,
        video: &VideoMetadata,
        comments: &[Comment],
        axis_profile: Option<AxisProfile>,
    ) -> Result<AnalysisReport, ClassifiedError> {
        let video_context = self.engine.summarize_context(video).await?;
        let axis_profile = match axis_profile {
            Some(profile) => {
                debug!("Using supplied axis profile - axis={}", profile.axis_statement);
                profile
            }
            None => self.engine.build_axis_profile(video, &video_context).await?,
        };

        let shared_axis = Arc::new(axis_profile);
        let shared_context: Arc<str> = Arc::from(video_context.as_str());
        let run = self
            .run(comments, Arc::clone(&shared_axis), shared_context)
            .await;

        Ok(AnalysisReport {
            video_id: video.video_id.clone(),
            generated_at: chrono::Utc::now(),
            axis_profile: Arc::unwrap_or_clone(shared_axis),
            video_context,
            results: run.results,
            summary: run.summary,
        })
    }
}
