use itertools::Itertools;
use std::collections::HashMap;

use crate::budget::cap_text;
use crate::models::{AxisProfile, Comment, Tier, VideoMetadata};

fn bullet_list<S: AsRef<str>>(items: impl IntoIterator<Item = S>) -> String {
    let joined = items
        .into_iter()
        .map(|s| format!("- {}", s.as_ref().trim()))
        .join("\n");
    if joined.is_empty() {
        "- (none)".to_string()
    } else {
        joined
    }
}

pub fn render_axis_profile(axis: &AxisProfile) -> String {
    format!(
        r#"AXIS: {axis}
PROTAGONISTS (supporting them = support): {pro}
ANTAGONISTS (supporting them = oppose): {anti}
CORE VALUES:
{core}
NEGATIVE VALUES:
{neg}
STANCE RULES:
{rules}
LEXICON HINTS:
{lexicon}"#,
        axis = axis.axis_statement.trim(),
        pro = axis.protagonists.iter().join(", "),
        anti = axis.antagonists.iter().join(", "),
        core = bullet_list(&axis.core_values),
        neg = bullet_list(&axis.negative_values),
        rules = bullet_list(&axis.stance_rules),
        lexicon = bullet_list(&axis.lexicon_hints),
    )
}

pub fn system_classification(tier: Tier, axis: &AxisProfile, video_context: &str) -> String {
    let schema = match tier {
        Tier::Rich => RICH_SCHEMA,
        Tier::Lite => LITE_SCHEMA,
    };
    format!(
        r#"You classify YouTube comments by their stance toward the video's axis, not by their surface sentiment.

VIDEO CONTEXT:
{context}

{axis}

For replies, judge how the reply relates to the comment it answers
(agree | disagree | clarify | question | unrelated). Sarcasm inverts literal meaning.

{schema}

Return ONLY valid JSON, no other text. Include every comment id exactly once."#,
        context = video_context.trim(),
        axis = render_axis_profile(axis),
        schema = schema,
    )
}

const RICH_SCHEMA: &str = r#"Output JSON:
{"analyses": [{
  "comment_id": "",
  "stance_direction": "support|oppose|neutral|unknown",
  "stance_intensity": 0.0-1.0,
  "emotion_polarity": "positive|negative|mixed|none",
  "target": "who or what the comment addresses",
  "confidence_level": 0.0-1.0,
  "evidence_text": "short quote that decided it",
  "reply_relation": "agree|disagree|clarify|question|unrelated (replies only)",
  "is_sarcasm": true|false,
  "reason": "one sentence"
}]}"#;

const LITE_SCHEMA: &str = r#"Output JSON:
{"results": [{
  "comment_id": "",
  "label": "Support|Oppose|Neutral|Unknown",
  "score": -1.0-1.0,
  "reply_relation": "agree|disagree|clarify|question|unrelated (replies only)"
}]}"#;

pub fn user_classification(
    comments: &[Comment],
    parent_excerpts: &HashMap<String, String>,
    max_comment_tokens: usize,
) -> String {
    let mut out = String::from("COMMENTS:\n");
    for c in comments {
        out.push_str(&format!("- id: {} | likes: {}", c.id, c.like_count));
        if let Some(parent) = &c.parent_id {
            out.push_str(&format!(" | reply_to: {}", parent));
        }
        out.push('\n');
        if let Some(excerpt) = c.parent_id.as_ref().and_then(|p| parent_excerpts.get(p)) {
            out.push_str(&format!("  replying to: \"{}\"\n", excerpt));
        }
        let text = cap_text(&c.text, max_comment_tokens).replace('\n', " ");
        out.push_str(&format!("  text: {}\n", text));
    }
    out
}

pub const SYSTEM_SUMMARY: &str = "You summarize videos for downstream comment analysis. \
Be neutral and factual. Plain text only.";

pub fn user_summary(video: &VideoMetadata, max_transcript_tokens: usize) -> String {
    let transcript = video
        .transcript
        .as_deref()
        .map(|t| cap_text(t, max_transcript_tokens))
        .unwrap_or_else(|| "(no transcript)".to_string());
    format!(
        r#"Summarize what this video argues in 3-5 sentences: the central claim, who it praises or criticizes, and the values it appeals to.

TITLE: {title}
CHANNEL: {channel}
TAGS: {tags}
DESCRIPTION:
<{description}>

TRANSCRIPT EXCERPT:
<{transcript}>"#,
        title = video.title.trim(),
        channel = video.channel_title.trim(),
        tags = video.tags.iter().join(", "),
        description = cap_text(&video.description, 400),
        transcript = transcript,
    )
}

pub const SYSTEM_AXIS_PROFILE: &str = "You design stance-classification rubrics. \
Return ONLY valid JSON, no other text.";

pub fn user_axis_profile(video: &VideoMetadata, video_context: &str) -> String {
    format!(
        r#"From the video below, derive the axis a commenter can support or oppose.

Output JSON with:
{{
  "axisStatement": "one-sentence claim the video argues for",
  "protagonists": ["people/groups the video sides with"],
  "antagonists": ["people/groups the video argues against"],
  "coreValues": ["values the video promotes, most important first"],
  "negativeValues": ["values the video condemns"],
  "stanceRules": ["short if-then rules for edge cases"],
  "lexiconHints": ["slang or phrases and what stance they signal"]
}}

TITLE: {title}
SUMMARY:
<{context}>"#,
        title = video.title.trim(),
        context = video_context.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn comment(id: &str, parent: Option<&str>, text: &str) -> Comment {
        Comment {
            id: id.into(),
            author_id: "a".into(),
            text: text.into(),
            like_count: 3,
            published_at: Utc::now(),
            parent_id: parent.map(String::from),
        }
    }

    #[test]
    fn tier_selects_schema() {
        let axis = AxisProfile {
            axis_statement: "Cities should ban cars downtown".into(),
            ..AxisProfile::default()
        };
        let rich = system_classification(Tier::Rich, &axis, "ctx");
        let lite = system_classification(Tier::Lite, &axis, "ctx");
        assert!(rich.contains("stance_intensity"));
        assert!(!lite.contains("stance_intensity"));
        assert!(lite.contains("\"results\""));
        assert!(rich.contains("Cities should ban cars downtown"));
    }

    #[test]
    fn user_prompt_lists_ids_and_parent_excerpts() {
        let comments = vec![
            comment("c1", None, "Great point"),
            comment("r1", Some("c1"), "No way\nthis is wrong"),
        ];
        let mut excerpts = HashMap::new();
        excerpts.insert("c1".to_string(), "Great point".to_string());
        let prompt = user_classification(&comments, &excerpts, 50);
        assert!(prompt.contains("- id: c1 | likes: 3\n"));
        assert!(prompt.contains("- id: r1 | likes: 3 | reply_to: c1"));
        assert!(prompt.contains("replying to: \"Great point\""));
        assert!(prompt.contains("text: No way this is wrong"));
    }

    #[test]
    fn empty_lists_render_placeholder() {
        assert_eq!(bullet_list(Vec::<String>::new()), "- (none)");
    }
}
