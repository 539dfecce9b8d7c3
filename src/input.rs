use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};
use unicode_normalization::UnicodeNormalization;

use crate::models::{AxisProfile, Comment, VideoMetadata};

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Reading {} from {}", what, path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Decoding {} JSON in {}", what, path.display()))
}

pub fn load_comments(path: &Path) -> Result<Vec<Comment>> {
    let start = std::time::Instant::now();
    let comments: Vec<Comment> = read_json(path, "comments")?;
    let loaded = comments.len();
    let comments = normalize_comments(comments);
    info!(
        "Comments loaded - file={}, loaded={}, retained={}, replies={}, duration={:.2}s",
        path.display(),
        loaded,
        comments.len(),
        comments.iter().filter(|c| c.is_reply()).count(),
        start.elapsed().as_secs_f32()
    );
    Ok(comments)
}

/// NFC + trim text, blank or self-referencing parent ids become top-level,
/// repeated ids keep the first occurrence.
pub fn normalize_comments(comments: Vec<Comment>) -> Vec<Comment> {
    let total = comments.len();
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(total);
    for mut c in comments {
        c.id = c.id.trim().to_string();
        if !seen.insert(c.id.clone()) {
            debug!("Dropping duplicate comment - id={}", c.id);
            continue;
        }
        c.text = c.text.nfc().collect::<String>().trim().to_string();
        c.parent_id = c
            .parent_id
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty() && *p != c.id);
        out.push(c);
    }
    if out.len() < total {
        warn!(
            "Duplicate comment ids removed - removed={}, retained={}",
            total - out.len(),
            out.len()
        );
    }
    out
}

pub fn load_video(path: &Path) -> Result<VideoMetadata> {
    let video: VideoMetadata = read_json(path, "video metadata")?;
    debug!("Video loaded - video_id={}, title={}", video.video_id, video.title);
    Ok(video)
}

pub fn load_axis_profile(path: &Path) -> Result<AxisProfile> {
    let profile: AxisProfile = read_json(path, "axis profile")?;
    debug!("Axis profile loaded - axis={}", profile.axis_statement);
    Ok(profile)
}
