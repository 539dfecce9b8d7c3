use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub author_id: String,
    pub text: String,
    #[serde(default)]
    pub like_count: u64,
    pub published_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>, // None => top-level
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Video metadata handed over by the comment/video source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

/// Classification rubric for one video. Read-only for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisProfile {
    #[serde(alias = "axis_statement", alias = "axis")]
    pub axis_statement: String,
    #[serde(default)]
    pub protagonists: BTreeSet<String>,
    #[serde(default)]
    pub antagonists: BTreeSet<String>,
    #[serde(default, alias = "core_values")]
    pub core_values: Vec<String>,
    #[serde(default, alias = "negative_values")]
    pub negative_values: Vec<String>,
    #[serde(default, alias = "stance_rules")]
    pub stance_rules: Vec<String>,
    #[serde(default, alias = "lexicon_hints")]
    pub lexicon_hints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StanceDirection {
    Support,
    Oppose,
    Neutral,
    Unknown,
}

impl StanceDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StanceDirection::Support => "support",
            StanceDirection::Oppose => "oppose",
            StanceDirection::Neutral => "neutral",
            StanceDirection::Unknown => "unknown",
        }
    }

    /// Lenient parse of whatever the model wrote for a direction.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "support" | "supports" | "supportive" | "pro" | "favor" | "for" | "agree" => {
                Some(StanceDirection::Support)
            }
            "oppose" | "opposes" | "opposed" | "against" | "anti" | "con" | "disagree" => {
                Some(StanceDirection::Oppose)
            }
            "neutral" | "none" | "mixed" => Some(StanceDirection::Neutral),
            "unknown" | "unclear" | "n/a" => Some(StanceDirection::Unknown),
            _ => None,
        }
    }

    /// Sign of a raw score; zero is neutral.
    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            StanceDirection::Support
        } else if score < 0.0 {
            StanceDirection::Oppose
        } else {
            StanceDirection::Neutral
        }
    }

    pub fn multiplier(&self) -> f64 {
        match self {
            StanceDirection::Support => 1.0,
            StanceDirection::Oppose => -1.0,
            StanceDirection::Neutral | StanceDirection::Unknown => 0.0,
        }
    }

    /// support <-> oppose; neutral and unknown map to themselves.
    pub fn inverse(&self) -> Self {
        match self {
            StanceDirection::Support => StanceDirection::Oppose,
            StanceDirection::Oppose => StanceDirection::Support,
            other => *other,
        }
    }
}

impl fmt::Display for StanceDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StanceLabel {
    Support,
    Oppose,
    Neutral,
    Unknown,
}

impl StanceLabel {
    pub fn from_direction(direction: StanceDirection) -> Self {
        match direction {
            StanceDirection::Support => StanceLabel::Support,
            StanceDirection::Oppose => StanceLabel::Oppose,
            StanceDirection::Neutral => StanceLabel::Neutral,
            StanceDirection::Unknown => StanceLabel::Unknown,
        }
    }

    pub fn direction(&self) -> StanceDirection {
        match self {
            StanceLabel::Support => StanceDirection::Support,
            StanceLabel::Oppose => StanceDirection::Oppose,
            StanceLabel::Neutral => StanceDirection::Neutral,
            StanceLabel::Unknown => StanceDirection::Unknown,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        StanceDirection::parse(s).map(Self::from_direction)
    }
}

/// A reply's rhetorical posture toward its parent comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyRelation {
    Agree,
    Disagree,
    Clarify,
    Question,
    Unrelated,
    #[serde(other)]
    Unrecognized,
}

impl ReplyRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyRelation::Agree => "agree",
            ReplyRelation::Disagree => "disagree",
            ReplyRelation::Clarify => "clarify",
            ReplyRelation::Question => "question",
            ReplyRelation::Unrelated => "unrelated",
            ReplyRelation::Unrecognized => "unrecognized",
        }
    }

    /// Never fails: anything outside the known set is `Unrecognized`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "agree" | "agrees" | "agreement" | "support" => ReplyRelation::Agree,
            "disagree" | "disagrees" | "disagreement" | "rebut" | "rebuttal" => {
                ReplyRelation::Disagree
            }
            "clarify" | "clarification" => ReplyRelation::Clarify,
            "question" | "ask" => ReplyRelation::Question,
            "unrelated" | "none" | "off_topic" | "off-topic" => ReplyRelation::Unrelated,
            _ => ReplyRelation::Unrecognized,
        }
    }
}

/// Sampling tier: rich gets the full schema, lite only label+score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Rich,
    Lite,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Rich => "rich",
            Tier::Lite => "lite",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StanceResult {
    pub comment_id: String,
    pub direction: StanceDirection,
    pub intensity: f64,  // [0, 1]
    pub raw_score: f64,  // [-1, 1]
    pub label: StanceLabel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_polarity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_relation: Option<ReplyRelation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_sarcasm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
    /// Direction before thread synthesis touched this result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_direction: Option<StanceDirection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis_note: Option<String>,
}

impl StanceResult {
    /// Build a result from direction and intensity, deriving score and label.
    pub fn from_direction(
        comment_id: impl Into<String>,
        direction: StanceDirection,
        intensity: f64,
    ) -> Self {
        let intensity = clamp_unit(intensity);
        Self {
            comment_id: comment_id.into(),
            direction,
            intensity,
            raw_score: clamp_score(intensity * direction.multiplier()),
            label: StanceLabel::from_direction(direction),
            emotion_polarity: None,
            target: None,
            confidence_level: None,
            evidence_text: None,
            reply_relation: None,
            is_sarcasm: None,
            reason: None,
            tier: None,
            initial_direction: None,
            synthesis_note: None,
        }
    }

    /// Unknown, zero-confidence stand-in for a comment the provider never classified.
    pub fn placeholder(comment_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut result = Self::from_direction(comment_id, StanceDirection::Unknown, 0.0);
        result.confidence_level = Some(0.0);
        result.reason = Some(reason.into());
        result
    }

    /// Re-derive label and score after direction or intensity changed.
    pub fn set_stance(&mut self, direction: StanceDirection, intensity: f64) {
        self.direction = direction;
        self.intensity = clamp_unit(intensity);
        self.raw_score = clamp_score(self.intensity * direction.multiplier());
        self.label = StanceLabel::from_direction(direction);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredResult {
    #[serde(flatten)]
    pub result: StanceResult,
    pub weighted_score: f64, // [-1, 1]
}

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub comments: Vec<Comment>,
    pub tier: Tier,
    pub axis_profile: Arc<AxisProfile>,
    pub video_context: Arc<str>,
    /// Text of parents referenced by replies in this batch, keyed by parent id.
    pub parent_excerpts: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchResponse {
    pub results: Vec<StanceResult>,
    pub tokens_used: u64,
    pub is_partial: bool,
}

pub fn clamp_score(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(-1.0, 1.0)
    }
}

pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_swaps_only_polar_directions() {
        assert_eq!(StanceDirection::Support.inverse(), StanceDirection::Oppose);
        assert_eq!(StanceDirection::Oppose.inverse(), StanceDirection::Support);
        assert_eq!(StanceDirection::Neutral.inverse(), StanceDirection::Neutral);
        assert_eq!(StanceDirection::Unknown.inverse(), StanceDirection::Unknown);
    }

    #[test]
    fn lenient_direction_parsing() {
        assert_eq!(StanceDirection::parse(" Against "), Some(StanceDirection::Oppose));
        assert_eq!(StanceDirection::parse("PRO"), Some(StanceDirection::Support));
        assert_eq!(StanceDirection::parse("sideways"), None);
        assert_eq!(StanceLabel::parse("Neutral"), Some(StanceLabel::Neutral));
    }

    #[test]
    fn unknown_relations_are_unrecognized() {
        assert_eq!(ReplyRelation::parse("Disagree"), ReplyRelation::Disagree);
        assert_eq!(ReplyRelation::parse("sarcastic"), ReplyRelation::Unrecognized);
        let parsed: ReplyRelation = serde_json::from_str("\"mocking\"").unwrap();
        assert_eq!(parsed, ReplyRelation::Unrecognized);
    }

    #[test]
    fn from_direction_derives_score_and_label() {
        let r = StanceResult::from_direction("c1", StanceDirection::Oppose, 1.7);
        assert_eq!(r.intensity, 1.0);
        assert_eq!(r.raw_score, -1.0);
        assert_eq!(r.label, StanceLabel::Oppose);

        let p = StanceResult::placeholder("c2", "no response for this item");
        assert_eq!(p.direction, StanceDirection::Unknown);
        assert_eq!(p.raw_score, 0.0);
        assert_eq!(p.confidence_level, Some(0.0));
    }

    #[test]
    fn comment_uses_camel_case_wire_names() {
        let c: Comment = serde_json::from_str(
            r#"{"id":"r1","authorId":"a","text":"hi","likeCount":4,
                "publishedAt":"2024-05-01T10:00:00Z","parentId":"c1"}"#,
        )
        .unwrap();
        assert!(c.is_reply());
        assert_eq!(c.like_count, 4);
    }
}
