//! Stance classification of video comments against a per-video axis.
//!
//! Comments are ranked by likes, batched into rich and lite tiers, classified
//! by an LLM through a [`provider::ClassifierProvider`], repaired and matched
//! by id, corrected along reply threads, then weighted by engagement.

pub mod api_types;
pub mod budget;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod models;
pub mod out_models;
pub mod prompts;
pub mod provider;
pub mod render;
pub mod repair;
pub mod scheduler;
pub mod scoring;
pub mod synthesis;

pub use config::AnalysisConfig;
pub use engine::{AnalysisEngine, EngineOptions};
pub use error::{ClassifiedError, ProviderErrorKind};
pub use models::{
    AxisProfile, BatchRequest, BatchResponse, Comment, ReplyRelation, ScoredResult,
    StanceDirection, StanceLabel, StanceResult, Tier, VideoMetadata,
};
pub use out_models::{AnalysisReport, StanceSummary};
pub use provider::{ClassifierProvider, Completion, CompletionOptions};
pub use scheduler::{BatchScheduler, SchedulerConfig};
pub use scoring::WeightingStrategy;
