#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use comment_stance::{
    AnalysisEngine, BatchScheduler, ClassifiedError, ClassifierProvider, Comment, Completion,
    CompletionOptions, EngineOptions, SchedulerConfig, WeightingStrategy,
};

/// One request as the scripted provider saw it.
#[derive(Debug, Clone)]
pub struct Call {
    pub system: String,
    pub user: String,
    pub rich: bool,
    pub ids: Vec<String>,
    pub options: CompletionOptions,
}

type Handler = dyn Fn(&Call) -> Result<String, ClassifiedError> + Send + Sync;

pub struct ScriptedProvider {
    handler: Box<Handler>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<Call>>,
}

impl ScriptedProvider {
    pub fn new(
        handler: impl Fn(&Call) -> Result<String, ClassifiedError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

/// Ids listed in a classification prompt, in prompt order.
pub fn prompt_ids(user: &str) -> Vec<String> {
    user.lines()
        .filter_map(|l| l.strip_prefix("- id: "))
        .map(|rest| rest.split(" |").next().unwrap_or(rest).trim().to_string())
        .collect()
}

#[async_trait]
impl ClassifierProvider for ScriptedProvider {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<Completion, ClassifiedError> {
        let call = Call {
            system: system_prompt.to_string(),
            user: user_prompt.to_string(),
            rich: system_prompt.contains("\"analyses\""),
            ids: prompt_ids(user_prompt),
            options,
        };
        self.calls.lock().unwrap().push(call.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let text = (self.handler)(&call)?;
        Ok(Completion {
            text,
            tokens_used: 10 * call.ids.len() as u64,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }
}

pub fn comment(id: &str, likes: u64, parent: Option<&str>) -> Comment {
    Comment {
        id: id.to_string(),
        author_id: format!("author-{}", id),
        text: format!("text of {}", id),
        like_count: likes,
        published_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        parent_id: parent.map(String::from),
    }
}

/// Lite-shaped answer giving every id the same label and score.
pub fn lite_answer(ids: &[String], label: &str, score: f64) -> String {
    let items: Vec<_> = ids
        .iter()
        .map(|id| json!({"comment_id": id, "label": label, "score": score}))
        .collect();
    json!({ "results": items }).to_string()
}

/// Rich-shaped answer giving every id the same direction and intensity.
pub fn rich_answer(ids: &[String], direction: &str, intensity: f64) -> String {
    let items: Vec<_> = ids
        .iter()
        .map(|id| json!({"comment_id": id, "stance_direction": direction, "stance_intensity": intensity}))
        .collect();
    json!({ "analyses": items }).to_string()
}

/// Answers support in whichever shape the tier asked for.
pub fn supportive(call: &Call) -> Result<String, ClassifiedError> {
    if call.rich {
        Ok(rich_answer(&call.ids, "support", 0.5))
    } else {
        Ok(lite_answer(&call.ids, "Support", 0.5))
    }
}

pub fn scheduler_config(batch_size: usize, rich_tier_threshold: usize) -> SchedulerConfig {
    SchedulerConfig {
        batch_size,
        rich_tier_threshold,
        concurrency: 4,
        window_delay: Duration::ZERO,
        batch_timeout: Duration::from_secs(5),
        weighting: WeightingStrategy::damped(),
    }
}

pub fn scheduler(provider: Arc<ScriptedProvider>, config: SchedulerConfig) -> BatchScheduler {
    BatchScheduler::new(
        AnalysisEngine::new(provider, EngineOptions::default()),
        config,
    )
}
