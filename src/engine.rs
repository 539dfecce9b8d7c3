use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::api_types::RawResult;
use crate::budget::response_budget;
use crate::config::AnalysisConfig;
use crate::error::{ClassifiedError, ProviderErrorKind};
use crate::models::{
    AxisProfile, BatchRequest, BatchResponse, ReplyRelation, StanceDirection, StanceLabel,
    StanceResult, Tier, VideoMetadata,
};
use crate::prompts::{
    system_classification, user_axis_profile, user_classification, user_summary,
    SYSTEM_AXIS_PROFILE, SYSTEM_SUMMARY,
};
use crate::provider::{ClassifierProvider, CompletionOptions};
use crate::repair::{parse_lenient, parse_response};

pub const REASON_MISSING: &str = "no response for this item";
pub const REASON_INCOMPLETE: &str = "incomplete response for this item";

const RICH_TOKENS_PER_COMMENT: u32 = 160;
const LITE_TOKENS_PER_COMMENT: u32 = 48;
const RESPONSE_FLOOR: u32 = 256;
const TRANSCRIPT_TOKENS: usize = 3000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    pub temperature: f32,
    pub max_comment_tokens: usize,
    pub max_response_tokens: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        let config = AnalysisConfig::default();
        Self::from(&config)
    }
}

impl From<&AnalysisConfig> for EngineOptions {
    fn from(config: &AnalysisConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_comment_tokens: config.max_comment_tokens,
            max_response_tokens: config.max_response_tokens,
        }
    }
}

/// Provider-agnostic classification engine. Cheap to clone.
#[derive(Clone)]
pub struct AnalysisEngine {
    provider: Arc<dyn ClassifierProvider>,
    options: EngineOptions,
}

impl AnalysisEngine {
    pub fn new(provider: Arc<dyn ClassifierProvider>, options: EngineOptions) -> Self {
        Self { provider, options }
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, ClassifiedError> {
        let provider = crate::provider::from_config(config)?;
        Ok(Self::new(provider, EngineOptions::from(config)))
    }

    /// Classify one batch. Never fails: provider or parse failures turn every
    /// comment into a placeholder and mark the response partial.
    pub async fn classify_batch(&self, request: &BatchRequest) -> BatchResponse {
        match self.try_classify_batch(request).await {
            Ok(response) => response,
            Err(e) => degraded_response(request, &e),
        }
    }

    pub async fn try_classify_batch(
        &self,
        request: &BatchRequest,
    ) -> Result<BatchResponse, ClassifiedError> {
        if request.comments.is_empty() {
            return Ok(BatchResponse::default());
        }
        let start = Instant::now();
        let system = system_classification(
            request.tier,
            &request.axis_profile,
            &request.video_context,
        );
        let user = user_classification(
            &request.comments,
            &request.parent_excerpts,
            self.options.max_comment_tokens,
        );
        let per_comment = match request.tier {
            Tier::Rich => RICH_TOKENS_PER_COMMENT,
            Tier::Lite => LITE_TOKENS_PER_COMMENT,
        };
        let options = CompletionOptions {
            json_mode: true,
            max_tokens: response_budget(request.comments.len(), per_comment, RESPONSE_FLOOR)
                .min(self.options.max_response_tokens),
            temperature: self.options.temperature,
        };

        let completion = self.provider.complete(&system, &user, options).await?;
        let parsed = parse_response(&completion.text)
            .map_err(|e| ClassifiedError::Parse(e.to_string()))?;
        if !parsed.steps.is_empty() {
            debug!(
                "Response repaired - steps={}, shape={}",
                parsed.steps.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(","),
                parsed.shape
            );
        }

        let mut by_id: HashMap<String, RawResult> = HashMap::with_capacity(parsed.records.len());
        let mut duplicates = 0usize;
        for record in parsed.records {
            if by_id.contains_key(&record.comment_id) {
                duplicates += 1;
                continue;
            }
            by_id.insert(record.comment_id.clone(), record);
        }

        let mut results = Vec::with_capacity(request.comments.len());
        let mut missing = 0usize;
        for comment in &request.comments {
            match by_id.remove(&comment.id) {
                Some(raw) => results.push(reconcile(raw, request.tier)),
                None => {
                    missing += 1;
                    let mut placeholder = StanceResult::placeholder(&comment.id, REASON_MISSING);
                    placeholder.tier = Some(request.tier);
                    results.push(placeholder);
                }
            }
        }
        let foreign = by_id.len();
        if missing > 0 || foreign > 0 || duplicates > 0 || parsed.dropped > 0 {
            warn!(
                "Batch response mismatch - tier={}, requested={}, missing={}, unknown_ids={}, duplicates={}, dropped={}",
                request.tier.as_str(),
                request.comments.len(),
                missing,
                foreign,
                duplicates,
                parsed.dropped
            );
        }

        debug!(
            "Batch classified - tier={}, comments={}, tokens={}, duration={:.2}s",
            request.tier.as_str(),
            request.comments.len(),
            completion.tokens_used,
            start.elapsed().as_secs_f32()
        );

        Ok(BatchResponse {
            results,
            tokens_used: completion.tokens_used,
            is_partial: missing > 0,
        })
    }

    /// Short neutral summary of what the video argues.
    pub async fn summarize_context(&self, video: &VideoMetadata) -> Result<String, ClassifiedError> {
        let start = Instant::now();
        let user = user_summary(video, TRANSCRIPT_TOKENS);
        let options = CompletionOptions {
            json_mode: false,
            max_tokens: 512,
            temperature: self.options.temperature,
        };
        let completion = self.provider.complete(SYSTEM_SUMMARY, &user, options).await?;
        let summary = completion.text.trim().to_string();
        if summary.is_empty() {
            return Err(ClassifiedError::provider(
                ProviderErrorKind::EmptyResponse,
                "empty video summary",
            ));
        }
        info!(
            "Video context summarized - video_id={}, length={} chars, duration={:.2}s",
            video.video_id,
            summary.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(summary)
    }

    pub async fn build_axis_profile(
        &self,
        video: &VideoMetadata,
        video_context: &str,
    ) -> Result<AxisProfile, ClassifiedError> {
        let start = Instant::now();
        let user = user_axis_profile(video, video_context);
        let options = CompletionOptions {
            json_mode: true,
            max_tokens: 1024,
            temperature: self.options.temperature,
        };
        let completion = self
            .provider
            .complete(SYSTEM_AXIS_PROFILE, &user, options)
            .await?;
        let repaired =
            parse_lenient(&completion.text).map_err(|e| ClassifiedError::Parse(e.to_string()))?;
        let profile = axis_profile_from_value(repaired.value)?;
        info!(
            "Axis profile built - video_id={}, protagonists={}, antagonists={}, rules={}, duration={:.2}s",
            video.video_id,
            profile.protagonists.len(),
            profile.antagonists.len(),
            profile.stance_rules.len(),
            start.elapsed().as_secs_f32()
        );
        Ok(profile)
    }
}

fn axis_profile_from_value(value: Value) -> Result<AxisProfile, ClassifiedError> {
    let value = match value {
        Value::Object(mut map) => match map
            .remove("axisProfile")
            .or_else(|| map.remove("axis_profile"))
        {
            Some(inner) => inner,
            None => Value::Object(map),
        },
        other => other,
    };
    let profile: AxisProfile = serde_json::from_value(value)
        .map_err(|e| ClassifiedError::Parse(format!("axis profile: {}", e)))?;
    if profile.axis_statement.trim().is_empty() {
        return Err(ClassifiedError::Parse("axis profile has an empty axisStatement".into()));
    }
    Ok(profile)
}

/// Log a failed batch at the level its class deserves and degrade it to
/// placeholders.
pub fn degraded_response(request: &BatchRequest, error: &ClassifiedError) -> BatchResponse {
    match error {
        ClassifiedError::Provider {
            kind: ProviderErrorKind::Quota,
            ..
        } => warn!(
            "Batch rate limited - tier={}, comments={}, error={}",
            request.tier.as_str(),
            request.comments.len(),
            error
        ),
        ClassifiedError::Provider {
            kind: ProviderErrorKind::Auth,
            ..
        }
        | ClassifiedError::Config(_) => error!(
            "Batch rejected - tier={}, comments={}, error={}",
            request.tier.as_str(),
            request.comments.len(),
            error
        ),
        _ => warn!(
            "Batch failed - tier={}, comments={}, class={}, error={}",
            request.tier.as_str(),
            request.comments.len(),
            error.failure_class(),
            error
        ),
    }
    placeholder_response(request, error)
}

/// Every comment in the batch mapped to a placeholder naming the failure class.
pub fn placeholder_response(request: &BatchRequest, error: &ClassifiedError) -> BatchResponse {
    let reason = format!("provider failure ({}): {}", error.failure_class(), error);
    let results = request
        .comments
        .iter()
        .map(|c| {
            let mut r = StanceResult::placeholder(&c.id, reason.clone());
            r.tier = Some(request.tier);
            r
        })
        .collect();
    BatchResponse {
        results,
        tokens_used: 0,
        is_partial: true,
    }
}

/// Turn one loose record into a result.
///
/// A parsable `stance_direction` wins and its intensity comes from
/// `stance_intensity` (else `|score|`). Otherwise a nonzero score's sign
/// decides, then the label with zero intensity.
pub fn reconcile(raw: RawResult, tier: Tier) -> StanceResult {
    let relation = raw.reply_relation.as_deref().map(ReplyRelation::parse);

    let mut result = if !raw.has_stance() {
        StanceResult::placeholder(&raw.comment_id, REASON_INCOMPLETE)
    } else if let Some(direction) = raw.stance_direction.as_deref().and_then(StanceDirection::parse) {
        let intensity = raw
            .stance_intensity
            .or(raw.score.map(f64::abs))
            .unwrap_or(0.0);
        StanceResult::from_direction(&raw.comment_id, direction, intensity)
    } else {
        match raw.score.filter(|s| *s != 0.0 && s.is_finite()) {
            Some(score) => {
                StanceResult::from_direction(&raw.comment_id, StanceDirection::from_score(score), score.abs())
            }
            None => {
                let direction = raw
                    .label
                    .as_deref()
                    .and_then(StanceLabel::parse)
                    .map(|l| l.direction())
                    .unwrap_or(if raw.score.is_some() {
                        StanceDirection::Neutral
                    } else {
                        StanceDirection::Unknown
                    });
                StanceResult::from_direction(&raw.comment_id, direction, 0.0)
            }
        }
    };

    result.tier = Some(tier);
    result.reply_relation = relation;
    if raw.has_stance() {
        result.confidence_level = raw.confidence_level.map(crate::models::clamp_unit);
        result.reason = raw.reason;
    }
    result.emotion_polarity = raw.emotion_polarity;
    result.target = raw.target;
    result.evidence_text = raw.evidence_text;
    result.is_sarcasm = raw.is_sarcasm;
    result
}
