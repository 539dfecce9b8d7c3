//! Lenient parsing of model output.
//!
//! Raw text goes through an ordered ladder of repair strategies. Each
//! strategy is a pure, idempotent `&str -> String` transform; the ladder
//! stops at the first candidate that parses as JSON. Nothing here performs
//! I/O, so the whole module is testable without a provider.

use serde_json::Value;
use tracing::{debug, warn};

use crate::api_types::{RawResult, ResponseContainer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairStep {
    StripFences,
    ExtractSpan,
    NormalizeLiterals,
    CloseTruncated,
}

impl RepairStep {
    /// Ladder order. Direct parsing is attempted after `StripFences`.
    pub const LADDER: [RepairStep; 4] = [
        RepairStep::StripFences,
        RepairStep::ExtractSpan,
        RepairStep::NormalizeLiterals,
        RepairStep::CloseTruncated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RepairStep::StripFences => "strip_fences",
            RepairStep::ExtractSpan => "extract_span",
            RepairStep::NormalizeLiterals => "normalize_literals",
            RepairStep::CloseTruncated => "close_truncated",
        }
    }

    pub fn apply(&self, input: &str) -> String {
        match self {
            RepairStep::StripFences => strip_fences(input),
            RepairStep::ExtractSpan => extract_span(input),
            RepairStep::NormalizeLiterals => normalize_literals(input),
            // a closed document may still carry a comma before the new closers
            RepairStep::CloseTruncated => normalize_literals(&close_truncated(input)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Value,
    /// Steps that changed the text on the way to a parseable candidate.
    pub steps: Vec<RepairStep>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RepairError {
    pub last_error: String,
    pub attempted: Vec<RepairStep>,
}

impl std::fmt::Display for RepairError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let steps: Vec<&str> = self.attempted.iter().map(|s| s.as_str()).collect();
        write!(f, "{} (after {})", self.last_error, steps.join(" -> "))
    }
}

/// Run the repair ladder until something parses.
pub fn parse_lenient(raw: &str) -> Result<Repaired, RepairError> {
    let mut candidate = raw.to_string();
    let mut steps = Vec::new();
    let mut last_error = String::from("empty input");

    for step in RepairStep::LADDER {
        let next = step.apply(&candidate);
        let changed = next != candidate;
        candidate = next;
        if changed {
            steps.push(step);
        } else if step != RepairStep::StripFences {
            // identical text already failed to parse
            continue;
        }
        match serde_json::from_str::<Value>(&candidate) {
            Ok(value) => {
                if !steps.is_empty() {
                    debug!("Repaired model output - steps={:?}", steps);
                }
                return Ok(Repaired { value, steps });
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(RepairError {
        last_error,
        attempted: steps,
    })
}

/// Records recovered from one response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub shape: &'static str,
    pub records: Vec<RawResult>,
    /// Items that were not objects or had no usable comment id.
    pub dropped: usize,
    pub steps: Vec<RepairStep>,
}

/// Parse a classification response into canonical records.
pub fn parse_response(raw: &str) -> Result<ParsedResponse, RepairError> {
    let repaired = parse_lenient(raw)?;
    let container = ResponseContainer::from_value(repaired.value);
    let shape = container.shape();
    if matches!(container, ResponseContainer::Empty) {
        return Err(RepairError {
            last_error: "response is a scalar, expected an array or object".into(),
            attempted: repaired.steps,
        });
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for item in container.into_items() {
        match serde_json::from_value::<RawResult>(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                dropped += 1;
                warn!("Dropping unusable result item - error={}", e);
            }
        }
    }

    Ok(ParsedResponse {
        shape,
        records,
        dropped,
        steps: repaired.steps,
    })
}

/// Remove Markdown code fences, keeping the body of the first fenced block.
pub fn strip_fences(input: &str) -> String {
    let trimmed = input.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed.to_string();
    };
    let after_open = &trimmed[open + 3..];
    // skip the info string ("json", "JSON", ...) up to the end of the line
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(after_open.len());
    let info = after_open[..body_start].trim();
    let body = if info.is_empty() || info.chars().all(|c| c.is_ascii_alphanumeric()) {
        &after_open[body_start..]
    } else {
        // fence and payload on one line: ```{"a":1}```
        after_open
    };
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim().to_string()
}

/// Cut surrounding prose. Each top-level `{`/`[` group is tried in order,
/// spanning to the last closer of its kind, and the first span that parses
/// wins. Without a parseable span the first group's span is kept for the
/// later steps. Repeats until the text is stable.
pub fn extract_span(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = extract_span_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn extract_span_once(input: &str) -> String {
    let openers = top_level_openers(input);
    let Some(&first) = openers.first() else {
        return input.to_string();
    };
    openers
        .iter()
        .map(|&start| span_from(input, start))
        .find(|span| serde_json::from_str::<Value>(span).is_ok())
        .unwrap_or_else(|| span_from(input, first))
        .to_string()
}

/// Byte offsets of `{`/`[` that open a group at nesting depth zero.
/// Quotes only delimit strings inside a group.
fn top_level_openers(input: &str) -> Vec<usize> {
    let mut openers = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in input.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '{' | '[' => {
                if depth == 0 {
                    openers.push(i);
                }
                depth += 1;
            }
            '}' | ']' => depth = depth.saturating_sub(1),
            '"' if depth > 0 => in_string = true,
            _ => {}
        }
    }
    openers
}

fn span_from(input: &str, start: usize) -> &str {
    let closer = if input[start..].starts_with('{') { '}' } else { ']' };
    match input.rfind(closer) {
        Some(end) if end > start => &input[start..=end],
        // no closer at all: keep the tail for truncation repair
        _ => &input[start..],
    }
}

/// Textual clean-ups outside string literals:
/// leading `+` on numbers, quoted booleans in value position,
/// missing `:` after an object key, trailing commas before a closer.
pub fn normalize_literals(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut stack: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let Some(end) = string_end(&chars, i) else {
                    // unterminated string: leave the rest alone
                    out.extend(&chars[i..]);
                    break;
                };
                let content: String = chars[i + 1..end].iter().collect();
                let prev = last_significant(&out);
                let next = next_significant(&chars, end + 1);
                let in_object = stack.last() == Some(&'{');
                let key_position = in_object && matches!(prev, Some('{') | Some(','));

                if key_position {
                    out.extend(&chars[i..=end]);
                    if next.is_some_and(starts_value) {
                        out.push(':');
                    }
                } else if prev == Some(':')
                    && (content.eq_ignore_ascii_case("true") || content.eq_ignore_ascii_case("false"))
                {
                    out.push_str(&content.to_ascii_lowercase());
                } else {
                    out.extend(&chars[i..=end]);
                }
                i = end + 1;
                continue;
            }
            '+' => {
                let prev = last_significant(&out);
                let number_follows = chars
                    .get(i + 1)
                    .is_some_and(|n| n.is_ascii_digit() || *n == '.');
                if number_follows && matches!(prev, None | Some(':') | Some(',') | Some('[')) {
                    i += 1;
                    continue;
                }
                out.push(c);
            }
            '{' | '[' => {
                stack.push(c);
                out.push(c);
            }
            '}' | ']' => {
                drop_trailing_commas(&mut out);
                stack.pop();
                out.push(c);
            }
            _ => out.push(c),
        }
        i += 1;
    }
    out
}

/// Close a document that was cut off mid-stream.
///
/// Tracks the bracket stack with string/escape awareness, drops a dangling
/// incomplete member of the innermost open container, then appends closers
/// in LIFO order. Text with no open brackets is returned unchanged.
pub fn close_truncated(input: &str) -> String {
    struct Frame {
        open: char,
        member_start: usize, // byte offset where the current member begins
    }

    let mut frames: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in input.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' | '[' => frames.push(Frame {
                open: c,
                member_start: idx + 1,
            }),
            '}' | ']' => {
                frames.pop();
            }
            ',' => {
                if let Some(top) = frames.last_mut() {
                    top.member_start = idx + 1;
                }
            }
            _ => {}
        }
    }

    let Some(innermost) = frames.last() else {
        return input.to_string();
    };

    let tail = input[innermost.member_start..].trim();
    let keep_tail = !in_string && !tail.is_empty() && member_is_complete(innermost.open, tail);
    let mut repaired = if keep_tail || tail.is_empty() {
        input.trim_end().to_string()
    } else {
        input[..innermost.member_start].to_string()
    };

    drop_trailing_commas(&mut repaired);
    let len = repaired.trim_end().len();
    repaired.truncate(len);

    for frame in frames.iter().rev() {
        repaired.push(if frame.open == '{' { '}' } else { ']' });
    }
    repaired
}

fn member_is_complete(open: char, member: &str) -> bool {
    let wrapped = if open == '{' {
        format!("{{{}}}", member)
    } else {
        format!("[{}]", member)
    };
    serde_json::from_str::<Value>(&wrapped).is_ok()
}

fn string_end(chars: &[char], open: usize) -> Option<usize> {
    let mut escaped = false;
    for (offset, &c) in chars[open + 1..].iter().enumerate() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == '"' {
            return Some(open + 1 + offset);
        }
    }
    None
}

fn drop_trailing_commas(out: &mut String) {
    loop {
        let trimmed = out.trim_end();
        if trimmed.ends_with(',') {
            let len = trimmed.len() - 1;
            out.truncate(len);
        } else {
            break;
        }
    }
}

fn last_significant(out: &str) -> Option<char> {
    out.chars().rev().find(|c| !c.is_whitespace())
}

fn next_significant(chars: &[char], from: usize) -> Option<char> {
    chars.get(from..)?.iter().copied().find(|c| !c.is_whitespace())
}

fn starts_value(c: char) -> bool {
    matches!(c, '"' | '{' | '[' | '-' | '+' | 't' | 'f' | 'n') || c.is_ascii_digit()
}
