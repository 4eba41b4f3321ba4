//! Suggestion Generator (§4.9) — turns gaps and ambiguous-but-partial rule
//! evidence into actionable, deterministically-worded suggestions.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::gap_detector::Gap;
use crate::jd_matching::RuleMatchTrace;
use crate::similarity::{Band, MatchStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionType {
    Missing,
    Partial,
    ExpandBullet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    AddMetric,
    AddLink,
    AddBullet,
    ExpandBullet,
}

#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub suggestion_id: String,
    pub rule_id: Uuid,
    pub rule_key: String,
    pub rule_chunk_id: Uuid,
    pub target_chunk_id: Option<Uuid>,
    pub suggestion_type: SuggestionType,
    pub action: ActionType,
    pub concept_label: String,
    pub message: String,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "to", "in", "for", "with", "is", "are", "this", "that", "on",
    "at", "by", "or", "as", "be", "has", "have", "will", "can", "from", "it", "its", "was",
    "were", "your", "you", "our", "their",
];

const MISSING_TEMPLATES: &[&str] = &[
    "Add a line covering {label} — it wasn't found anywhere in the CV.",
    "No evidence of {label} was found. Consider adding a bullet that demonstrates it.",
    "{label} appears required but missing; add concrete evidence of it.",
];

const PARTIAL_TEMPLATES: &[&str] = &[
    "The CV touches on {label} but the evidence is thin — make it more explicit.",
    "Strengthen the existing mention of {label} with more specific detail.",
    "{label} is only loosely implied; spell it out more directly.",
];

const METRIC_TEMPLATES: &[&str] = &[
    "Add a number or metric to quantify {label}.",
    "Quantify the impact of {label} with a concrete figure.",
    "{label} would land better with a measurable result attached.",
];

/// The deterministic rolling hash that picks a message template (§4.9). Any
/// substitute changes wording and is a compatibility break.
fn simple_hash(s: &str) -> u32 {
    let mut h: i64 = 0;
    for c in s.encode_utf16() {
        h = ((h << 5) - h + c as i64) & 0xFFFF_FFFF;
    }
    h.unsigned_abs() as u32
}

fn strip_non_alphanumeric(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect()
}

/// ≤50 chars verbatim; else lowercase/strip/stopword-filter/top-3-by-frequency
/// (ties broken alphabetically), joined with ", " (§4.9).
fn concept_label(rule_content: &str) -> String {
    if rule_content.chars().count() <= 50 {
        return rule_content.to_string();
    }

    let lowered = rule_content.to_lowercase();
    let cleaned = strip_non_alphanumeric(&lowered);

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in cleaned.split_whitespace() {
        if token.is_empty() || STOPWORDS.contains(&token) {
            continue;
        }
        *counts.entry(token).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    ranked.into_iter().take(3).map(|(token, _)| token).collect::<Vec<_>>().join(", ")
}

fn action_type(rule_content: &str, has_target_chunk: bool) -> ActionType {
    let lowered = rule_content.to_lowercase();
    if lowered.contains("metric") || lowered.contains("number") || lowered.contains("quantif") {
        ActionType::AddMetric
    } else if lowered.contains("link")
        || lowered.contains("url")
        || lowered.contains("github")
        || lowered.contains("linkedin")
    {
        ActionType::AddLink
    } else if has_target_chunk {
        ActionType::ExpandBullet
    } else {
        ActionType::AddBullet
    }
}

fn render_message(suggestion_type: SuggestionType, action: ActionType, label: &str) -> String {
    let templates = if action == ActionType::AddMetric {
        METRIC_TEMPLATES
    } else if suggestion_type == SuggestionType::Missing {
        MISSING_TEMPLATES
    } else {
        PARTIAL_TEMPLATES
    };

    let idx = (simple_hash(label) as usize) % templates.len();
    templates[idx].replace("{label}", label)
}

/// Builds suggestions from gaps (MISSING/PARTIAL) and from PARTIAL rule
/// evidence whose best band is AMBIGUOUS (EXPAND_BULLET), deduplicated by
/// rule-chunk id with gap-first priority (§4.9).
pub fn generate(traces: &[RuleMatchTrace], gaps: &[Gap]) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();
    let mut seen_rule_chunks: HashSet<Uuid> = HashSet::new();

    for gap in gaps {
        if !seen_rule_chunks.insert(gap.rule_chunk_id) {
            continue;
        }

        let suggestion_type = match gap.band {
            Band::NoEvidence | Band::Low => SuggestionType::Missing,
            _ => SuggestionType::Partial,
        };

        let label = concept_label(&gap.rule_chunk_content);
        let action = action_type(&gap.rule_chunk_content, gap.best_cv_chunk_id.is_some());
        let message = render_message(suggestion_type, action, &label);

        suggestions.push(Suggestion {
            suggestion_id: format!("SUG-{:04}", suggestions.len() + 1),
            rule_id: gap.rule_id,
            rule_key: gap.rule_key.clone(),
            rule_chunk_id: gap.rule_chunk_id,
            target_chunk_id: gap.best_cv_chunk_id,
            suggestion_type,
            action,
            concept_label: label,
            message,
        });
    }

    for trace in traces {
        if trace.match_status != MatchStatus::Partial {
            continue;
        }

        let Some(best) = &trace.best_match else { continue };

        let best_chunk_evidence = trace
            .chunk_evidence
            .iter()
            .find(|c| c.best_match.as_ref().map(|m| m.chunk_id) == Some(best.chunk_id));

        let Some(chunk_evidence) = best_chunk_evidence else { continue };
        if chunk_evidence.effective_band != Band::Ambiguous {
            continue;
        }
        if !seen_rule_chunks.insert(chunk_evidence.rule_chunk_id) {
            continue;
        }

        let label = concept_label(&trace.rule_content);
        let action = action_type(&trace.rule_content, true);
        let message = render_message(SuggestionType::ExpandBullet, action, &label);

        suggestions.push(Suggestion {
            suggestion_id: format!("SUG-{:04}", suggestions.len() + 1),
            rule_id: trace.rule_id,
            rule_key: trace.rule_key.clone(),
            rule_chunk_id: chunk_evidence.rule_chunk_id,
            target_chunk_id: Some(best.chunk_id),
            suggestion_type: SuggestionType::ExpandBullet,
            action,
            concept_label: label,
            message,
        });
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_hash_matches_known_value() {
        // h=0; 'a'=97 -> h=97; 'b'=98 -> h=97*31+98=3105
        assert_eq!(simple_hash("ab"), 3105);
    }

    #[test]
    fn concept_label_short_content_is_verbatim() {
        assert_eq!(concept_label("Kubernetes"), "Kubernetes");
    }

    #[test]
    fn concept_label_long_content_extracts_top_tokens() {
        let content = "Deep production experience operating and scaling Kubernetes clusters \
            across multiple regions with Kubernetes-native tooling and Kubernetes operators";
        let label = concept_label(content);
        assert!(label.contains("kubernetes"));
    }

    #[test]
    fn action_type_detects_metric_keyword() {
        assert_eq!(action_type("Demonstrate measurable metric impact", true), ActionType::AddMetric);
    }

    #[test]
    fn action_type_detects_link_keyword() {
        assert_eq!(action_type("Include a GitHub link", false), ActionType::AddLink);
    }

    #[test]
    fn action_type_falls_back_to_bullet_variants() {
        assert_eq!(action_type("Led a team", false), ActionType::AddBullet);
        assert_eq!(action_type("Led a team", true), ActionType::ExpandBullet);
    }

    #[test]
    fn generate_dedups_by_rule_chunk_with_gap_priority() {
        let rule_chunk_id = Uuid::new_v4();
        let gap = Gap {
            gap_id: "GAP-0001".into(),
            rule_id: Uuid::new_v4(),
            rule_key: "rule-1".into(),
            rule_chunk_id,
            rule_chunk_content: "Kubernetes".into(),
            best_cv_chunk_id: None,
            best_cv_snippet: None,
            section: None,
            similarity: None,
            band: Band::Low,
            severity: crate::similarity::GapSeverity::CriticalSkillGap,
            reason: "no evidence".into(),
        };

        let suggestions = generate(&[], &[gap]);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].suggestion_type, SuggestionType::Missing);
        assert_eq!(suggestions[0].suggestion_id, "SUG-0001");
    }
}
