//! Thread-aware correction of reply stances.
//!
//! A model judging a reply in isolation scores its surface sentiment. What
//! matters is whether the reply agrees or disagrees with its parent, so the
//! second pass derives a reply's direction from the parent's direction and the
//! reply relation. Runs once over the complete result set, after every batch
//! has finished.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::models::{Comment, ReplyRelation, StanceDirection, StanceResult};

/// Pure transition table over (parent direction, relation).
pub fn transition(
    parent: StanceDirection,
    parent_intensity: f64,
    relation: ReplyRelation,
) -> (StanceDirection, f64) {
    match relation {
        ReplyRelation::Unrelated | ReplyRelation::Clarify | ReplyRelation::Question => {
            (StanceDirection::Neutral, 0.0)
        }
        ReplyRelation::Agree => (parent, parent_intensity),
        ReplyRelation::Disagree => (parent.inverse(), parent_intensity),
        ReplyRelation::Unrecognized => (StanceDirection::Unknown, 0.0),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisStats {
    pub corrected: usize,
    pub unresolved_parent: usize,
    pub without_relation: usize,
}

/// Apply the transition table to every reply whose parent has a result.
///
/// Replies are visited parents-first, so chains deeper than one level read
/// their parent's corrected stance. Replies with a missing parent, a parent
/// cycle, or no relation guess keep their first-pass result.
pub fn synthesize(
    comments: &[Comment],
    results: &mut HashMap<String, StanceResult>,
) -> SynthesisStats {
    let parents: HashMap<&str, &str> = comments
        .iter()
        .filter_map(|c| c.parent_id.as_deref().map(|p| (c.id.as_str(), p)))
        .collect();

    let mut stats = SynthesisStats::default();
    let mut ordered: Vec<(usize, &str)> = Vec::new();
    for (&child, &parent) in parents.iter() {
        if !results.contains_key(parent) {
            stats.unresolved_parent += 1;
            continue;
        }
        match thread_depth(child, &parents, results) {
            Some(depth) => ordered.push((depth, child)),
            None => stats.unresolved_parent += 1,
        }
    }
    ordered.sort();

    for (_, child) in ordered {
        let parent_id = parents[child];
        let (parent_direction, parent_intensity) = match results.get(parent_id) {
            Some(p) => (p.direction, p.intensity),
            None => continue,
        };
        let Some(reply) = results.get_mut(child) else {
            continue;
        };
        let Some(relation) = reply.reply_relation else {
            stats.without_relation += 1;
            continue;
        };

        let (direction, intensity) = transition(parent_direction, parent_intensity, relation);
        if reply.initial_direction.is_none() {
            reply.initial_direction = Some(reply.direction);
        }
        reply.set_stance(direction, intensity);
        reply.synthesis_note = Some(format!(
            "parent {} {}@{:.2}, relation {} -> {}",
            parent_id,
            parent_direction,
            parent_intensity,
            relation.as_str(),
            direction
        ));
        stats.corrected += 1;
    }

    debug!(
        "Synthesis completed - corrected={}, unresolved_parent={}, without_relation={}",
        stats.corrected, stats.unresolved_parent, stats.without_relation
    );
    stats
}

/// Distance from `id` up to the first ancestor without a parent result, or
/// None if the parent links loop.
fn thread_depth(
    id: &str,
    parents: &HashMap<&str, &str>,
    results: &HashMap<String, StanceResult>,
) -> Option<usize> {
    let mut seen = HashSet::new();
    let mut current = id;
    let mut depth = 0;
    seen.insert(current);
    while let Some(&parent) = parents.get(current) {
        if !results.contains_key(parent) {
            break;
        }
        if !seen.insert(parent) {
            return None;
        }
        depth += 1;
        current = parent;
    }
    Some(depth)
}
