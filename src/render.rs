// src/render.rs
use itertools::Itertools;

use crate::models::{ScoredResult, StanceLabel};
use crate::out_models::AnalysisReport;

const TOP_N: usize = 5;

fn excerpt(s: &str, max_chars: usize) -> String {
    let flat = s.split_whitespace().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}…", flat.chars().take(max_chars).collect::<String>())
    }
}

fn pct(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64 * 100.0
    }
}

fn push_ranked(md: &mut String, heading: &str, items: &[&ScoredResult]) {
    if items.is_empty() {
        return;
    }
    md.push_str(&format!("\n## {}\n", heading));
    for r in items {
        let mut line = format!(
            "- `{}` weighted {:+.2} (raw {:+.2})",
            r.result.comment_id, r.weighted_score, r.result.raw_score
        );
        if let Some(evidence) = r.result.evidence_text.as_deref().filter(|e| !e.trim().is_empty()) {
            line.push_str(&format!(" → \"{}\"", excerpt(evidence, 120)));
        } else if let Some(reason) = r.result.reason.as_deref().filter(|e| !e.trim().is_empty()) {
            line.push_str(&format!(" → {}", excerpt(reason, 120)));
        }
        if r.result.synthesis_note.is_some() {
            line.push_str(" (thread-corrected)");
        }
        md.push_str(&line);
        md.push('\n');
    }
}

pub fn render_report_markdown(report: &AnalysisReport) -> String {
    let s = &report.summary;
    let mut md = String::new();
    md.push_str(&format!("# Comment Stance Report: {}\n\n", report.video_id));
    md.push_str(&format!(
        "_Generated {}_\n\n",
        report.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));

    md.push_str("## Axis\n");
    md.push_str(&format!("{}\n", report.axis_profile.axis_statement.trim()));
    if !report.axis_profile.protagonists.is_empty() {
        md.push_str(&format!(
            "\nProtagonists: {}\n",
            report.axis_profile.protagonists.iter().join(", ")
        ));
    }
    if !report.axis_profile.antagonists.is_empty() {
        md.push_str(&format!(
            "Antagonists: {}\n",
            report.axis_profile.antagonists.iter().join(", ")
        ));
    }

    md.push_str("\n## Summary\n");
    md.push_str("| Stance | Count | Share |\n|---|---:|---:|\n");
    for (name, n) in [
        ("Support", s.support_count),
        ("Oppose", s.oppose_count),
        ("Neutral", s.neutral_count),
        ("Unknown", s.unknown_count),
    ] {
        md.push_str(&format!("| {} | {} | {:.1}% |\n", name, n, pct(n, s.total_count)));
    }
    md.push_str(&format!("| Total | {} | |\n", s.total_count));
    md.push_str(&format!(
        "\nMean weighted score: {:+.3} · tokens used: {}\n",
        s.mean_weighted_score, s.tokens_used
    ));
    if s.is_partial {
        md.push_str(&format!(
            "\n> Partial run: {} batch(es) failed or returned incomplete results. Affected comments are marked Unknown with a reason.\n",
            s.failed_batches
        ));
    }

    let supporting: Vec<&ScoredResult> = report
        .results
        .iter()
        .filter(|r| r.result.label == StanceLabel::Support)
        .sorted_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score))
        .take(TOP_N)
        .collect();
    let opposing: Vec<&ScoredResult> = report
        .results
        .iter()
        .filter(|r| r.result.label == StanceLabel::Oppose)
        .sorted_by(|a, b| a.weighted_score.total_cmp(&b.weighted_score))
        .take(TOP_N)
        .collect();
    push_ranked(&mut md, "Strongest support", &supporting);
    push_ranked(&mut md, "Strongest opposition", &opposing);

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AxisProfile, StanceDirection, StanceResult};
    use crate::out_models::StanceSummary;
    use chrono::Utc;

    fn scored(id: &str, dir: StanceDirection, w: f64) -> ScoredResult {
        ScoredResult {
            result: StanceResult::from_direction(id, dir, w.abs()),
            weighted_score: w,
        }
    }

    fn report(results: Vec<ScoredResult>, partial: bool) -> AnalysisReport {
        let summary = StanceSummary::from_results(&results, partial, 10, usize::from(partial));
        AnalysisReport {
            video_id: "vid42".into(),
            generated_at: Utc::now(),
            axis_profile: AxisProfile {
                axis_statement: "Nuclear power is safe".into(),
                ..AxisProfile::default()
            },
            video_context: "ctx".into(),
            results,
            summary,
        }
    }

    #[test]
    fn ranks_strongest_first() {
        let md = render_report_markdown(&report(
            vec![
                scored("weak", StanceDirection::Support, 0.2),
                scored("strong", StanceDirection::Support, 0.9),
                scored("against", StanceDirection::Oppose, -0.7),
            ],
            false,
        ));
        assert!(md.contains("# Comment Stance Report: vid42"));
        assert!(md.contains("Nuclear power is safe"));
        let strong = md.find("`strong`").unwrap();
        let weak = md.find("`weak`").unwrap();
        assert!(strong < weak);
        assert!(md.contains("## Strongest opposition"));
        assert!(!md.contains("Partial run"));
    }

    #[test]
    fn partial_runs_are_flagged() {
        let md = render_report_markdown(&report(vec![], true));
        assert!(md.contains("Partial run: 1 batch(es)"));
        assert!(!md.contains("## Strongest support"));
    }
}
