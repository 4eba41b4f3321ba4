//! Structural rule predicates for the CV Quality Engine (§4.6 step 1).
//! Pattern-only checks: section existence, regex for contact info, date
//! format, degree keywords, URL/metric/quantifier presence. No embeddings,
//! no LLM calls.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::cv::{CvWithContent, SectionType};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}").unwrap()
});

static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\+?\d{1,3}[\s.-]?)?\(?\d{3}\)?[\s.-]?\d{3}[\s.-]?\d{4}").unwrap());

static LINKEDIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)linkedin\.com/in/[a-z0-9_-]+").unwrap());

static GITHUB_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)github\.com/[a-z0-9_-]+").unwrap());

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://[^\s]+").unwrap());

static DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{4}|\b(19|20)\d{2}\b")
        .unwrap()
});

static DEGREE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(b\.?s\.?|b\.?a\.?|m\.?s\.?|m\.?a\.?|ph\.?d\.?|bachelor|master|doctorate)\b")
        .unwrap()
});

static METRIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(\.\d+)?\s*%|[$€£]\s?\d|\b\d+x\b").unwrap());

static QUANTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d+\b").unwrap());

/// Outcome of one structural rule, matching the §4.6 finding shape ahead of
/// the quality engine wrapping it with category/severity from the rule row.
#[derive(Debug, Clone)]
pub struct StructuralCheckOutcome {
    pub passed: bool,
    pub reason: String,
    pub evidence: Vec<String>,
}

fn full_text(cv: &CvWithContent) -> String {
    cv.all_chunks()
        .into_iter()
        .map(|(_, chunk)| chunk.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn section_present(cv: &CvWithContent, section: SectionType) -> bool {
    cv.sections
        .iter()
        .any(|s| s.section.section_type == section && !s.chunks.is_empty())
}

/// Registry of structural check ids understood by `run`. A `CvQualityRuleRow`
/// with `strategy = STRUCTURAL` or `HYBRID` names one of these via
/// `structural_check_id`.
pub fn run(check_id: &str, cv: &CvWithContent) -> StructuralCheckOutcome {
    match check_id {
        "has_summary_section" => section_check(cv, SectionType::Summary, "summary"),
        "has_experience_section" => section_check(cv, SectionType::Experience, "experience"),
        "has_education_section" => section_check(cv, SectionType::Education, "education"),
        "has_skills_section" => section_check(cv, SectionType::Skills, "skills"),
        "has_email" => regex_check(cv, &EMAIL_RE, "an email address"),
        "has_phone" => regex_check(cv, &PHONE_RE, "a phone number"),
        "has_linkedin" => regex_check(cv, &LINKEDIN_RE, "a LinkedIn profile URL"),
        "has_github" => regex_check(cv, &GITHUB_RE, "a GitHub profile URL"),
        "has_any_url" => regex_check(cv, &URL_RE, "a URL"),
        "has_dated_experience" => regex_check(cv, &DATE_RE, "dated experience entries"),
        "has_degree_keyword" => regex_check(cv, &DEGREE_RE, "a recognizable degree title"),
        "has_quantified_metric" => regex_check(cv, &METRIC_RE, "a quantified metric (%, currency, multiplier)"),
        "has_quantifier" => regex_check(cv, &QUANTIFIER_RE, "at least one number"),
        other => StructuralCheckOutcome {
            passed: false,
            reason: format!("unknown structural check id '{other}'"),
            evidence: Vec::new(),
        },
    }
}

fn section_check(cv: &CvWithContent, section: SectionType, label: &str) -> StructuralCheckOutcome {
    let present = section_present(cv, section);
    StructuralCheckOutcome {
        passed: present,
        reason: if present {
            format!("a {label} section is present")
        } else {
            format!("no {label} section found")
        },
        evidence: Vec::new(),
    }
}

fn regex_check(cv: &CvWithContent, re: &Regex, label: &str) -> StructuralCheckOutcome {
    let text = full_text(cv);
    match re.find(&text) {
        Some(m) => StructuralCheckOutcome {
            passed: true,
            reason: format!("found {label}"),
            evidence: vec![m.as_str().to_string()],
        },
        None => StructuralCheckOutcome {
            passed: false,
            reason: format!("missing {label}"),
            evidence: Vec::new(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cv::{CvChunkRow, CvRow, CvSectionRow, CvSectionWithChunks, CvStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn cv_with(sections: Vec<(SectionType, Vec<&str>)>) -> CvWithContent {
        CvWithContent {
            cv: CvRow {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                status: CvStatus::Parsed,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            sections: sections
                .into_iter()
                .enumerate()
                .map(|(i, (section_type, contents))| CvSectionWithChunks {
                    section: CvSectionRow {
                        id: Uuid::new_v4(),
                        cv_id: Uuid::new_v4(),
                        section_type,
                        section_order: i as i32,
                    },
                    chunks: contents
                        .into_iter()
                        .enumerate()
                        .map(|(j, content)| CvChunkRow {
                            id: Uuid::new_v4(),
                            section_id: Uuid::new_v4(),
                            chunk_order: j as i32,
                            content: content.to_string(),
                            embedding: None,
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    #[test]
    fn detects_email() {
        let cv = cv_with(vec![(SectionType::Summary, vec!["Reach me at jane.doe@example.com"])]);
        let outcome = run("has_email", &cv);
        assert!(outcome.passed);
        assert_eq!(outcome.evidence[0], "jane.doe@example.com");
    }

    #[test]
    fn missing_phone_fails() {
        let cv = cv_with(vec![(SectionType::Summary, vec!["No contact info here"])]);
        assert!(!run("has_phone", &cv).passed);
    }

    #[test]
    fn section_presence_requires_nonempty_chunks() {
        let cv = cv_with(vec![(SectionType::Education, vec![])]);
        assert!(!run("has_education_section", &cv).passed);
    }

    #[test]
    fn detects_quantified_metric() {
        let cv = cv_with(vec![(
            SectionType::Experience,
            vec!["Reduced latency by 40% across the API tier"],
        )]);
        assert!(run("has_quantified_metric", &cv).passed);
    }

    #[test]
    fn unknown_check_id_fails_closed() {
        let cv = cv_with(vec![]);
        assert!(!run("nonexistent", &cv).passed);
    }
}
