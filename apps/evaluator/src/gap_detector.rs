//! Gap Detector (§4.8) — turns a JD match trace into the list of gaps a
//! candidate should address, one per rule-chunk evidence whose severity
//! isn't NONE.

use serde::Serialize;
use uuid::Uuid;

use crate::jd_matching::RuleMatchTrace;
use crate::similarity::{gap_severity, Band, GapSeverity};

#[derive(Debug, Clone, Serialize)]
pub struct Gap {
    pub gap_id: String,
    pub rule_id: Uuid,
    pub rule_key: String,
    pub rule_chunk_id: Uuid,
    pub rule_chunk_content: String,
    pub best_cv_chunk_id: Option<Uuid>,
    pub best_cv_snippet: Option<String>,
    pub section: Option<crate::models::cv::SectionType>,
    pub similarity: Option<f64>,
    pub band: Band,
    pub severity: GapSeverity,
    pub reason: String,
}

fn snippet(content: &str) -> String {
    if content.chars().count() <= 100 {
        content.to_string()
    } else {
        content.chars().take(100).collect()
    }
}

/// Per rule-chunk evidence, computes severity via the similarity contract's
/// severity map. A gap is emitted iff severity ≠ NONE (§4.8).
pub fn detect(traces: &[RuleMatchTrace]) -> Vec<Gap> {
    let mut gaps = Vec::new();

    for trace in traces {
        for chunk in &trace.chunk_evidence {
            let severity = gap_severity(chunk.effective_band, trace.rule_type);
            if severity == GapSeverity::None {
                continue;
            }

            let similarity_pct = chunk
                .best_match
                .as_ref()
                .map(|m| (m.similarity * 100.0).round() as i64);

            let reason = match similarity_pct {
                Some(pct) => format!(
                    "best evidence matched at {pct}% similarity, below the bar for \"{}\"",
                    trace.rule_content
                ),
                None => format!("no supporting evidence found for \"{}\"", trace.rule_content),
            };

            gaps.push(Gap {
                gap_id: format!("GAP-{:04}", gaps.len() + 1),
                rule_id: trace.rule_id,
                rule_key: trace.rule_key.clone(),
                rule_chunk_id: chunk.rule_chunk_id,
                rule_chunk_content: trace.rule_content.clone(),
                best_cv_chunk_id: chunk.best_match.as_ref().map(|m| m.chunk_id),
                best_cv_snippet: chunk.best_match.as_ref().map(|m| snippet(&m.content)),
                section: chunk.best_match.as_ref().map(|m| m.section),
                similarity: chunk.best_match.as_ref().map(|m| m.similarity),
                band: chunk.effective_band,
                severity,
                reason,
            });
        }
    }

    gaps
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GapSummary {
    pub critical: usize,
    pub major: usize,
    pub advisory: usize,
}

/// Summary count by severity for decision-support scoring (§4.10 step 8
/// treats `CRITICAL_SKILL_GAP` as critical and `MINOR_GAP`/advisories as
/// major/minor counts respectively).
pub fn summarize(gaps: &[Gap]) -> GapSummary {
    let mut summary = GapSummary::default();
    for gap in gaps {
        match gap.severity {
            GapSeverity::CriticalSkillGap => summary.critical += 1,
            GapSeverity::MinorGap => summary.major += 1,
            GapSeverity::PartialMatchAdvisory | GapSeverity::Advisory => summary.advisory += 1,
            GapSeverity::None => {}
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jd_matching::ChunkMatchEvidence;
    use crate::models::jd::JdRuleType;
    use crate::similarity::MatchStatus;

    fn trace_with_band(rule_type: JdRuleType, band: Band) -> RuleMatchTrace {
        RuleMatchTrace {
            rule_id: Uuid::new_v4(),
            rule_key: "rule-1".into(),
            rule_type,
            rule_content: "Kubernetes experience".into(),
            match_status: MatchStatus::None,
            best_match: None,
            chunk_evidence: vec![ChunkMatchEvidence {
                rule_chunk_id: Uuid::new_v4(),
                effective_band: band,
                best_match: None,
            }],
            section_upgrade_applied: false,
            upgrade_from_section: None,
            judge_downgrade_applied: false,
            multi_mention_count: 0,
            multi_mention_boost: false,
            mention_details: Default::default(),
            score: 0.0,
            weighted_score: 0.0,
        }
    }

    #[test]
    fn high_band_emits_no_gap() {
        let traces = vec![trace_with_band(JdRuleType::MustHave, Band::High)];
        assert!(detect(&traces).is_empty());
    }

    #[test]
    fn low_band_must_have_is_critical() {
        let traces = vec![trace_with_band(JdRuleType::MustHave, Band::Low)];
        let gaps = detect(&traces);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].severity, GapSeverity::CriticalSkillGap);
        assert_eq!(gaps[0].gap_id, "GAP-0001");
    }

    #[test]
    fn gap_ids_are_sequential_and_zero_padded() {
        let traces = vec![
            trace_with_band(JdRuleType::MustHave, Band::Low),
            trace_with_band(JdRuleType::NiceToHave, Band::Low),
        ];
        let gaps = detect(&traces);
        assert_eq!(gaps[0].gap_id, "GAP-0001");
        assert_eq!(gaps[1].gap_id, "GAP-0002");
    }

    #[test]
    fn summary_counts_by_severity() {
        let traces = vec![
            trace_with_band(JdRuleType::MustHave, Band::Low),
            trace_with_band(JdRuleType::NiceToHave, Band::Low),
            trace_with_band(JdRuleType::MustHave, Band::Ambiguous),
        ];
        let gaps = detect(&traces);
        let summary = summarize(&gaps);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.major, 1);
        assert_eq!(summary.advisory, 1);
    }
}
