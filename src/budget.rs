pub fn approx_tokens(s: &str) -> usize {
    // heuristic ~4 chars/token
    (s.chars().count() + 3) / 4
}

/// Cap text to roughly `max_tokens`, marking the cut with an ellipsis.
pub fn cap_text(text: &str, max_tokens: usize) -> String {
    if approx_tokens(text) <= max_tokens {
        return text.to_string();
    }
    let keep = max_tokens.saturating_mul(4).saturating_sub(1);
    let mut capped: String = text.chars().take(keep).collect();
    capped.push('…');
    capped
}

/// Response budget for a batch: a fixed floor plus a per-comment allowance by tier.
pub fn response_budget(comment_count: usize, per_comment: u32, floor: u32) -> u32 {
    floor.saturating_add(per_comment.saturating_mul(comment_count as u32))
}
