//! The Similarity Contract (§4.1) — pure, side-effect-free definitions reused
//! by the semantic evaluator, the CV quality engine, and the JD matching
//! engine. No other module may reimplement band classification, aggregation,
//! or the candidate tie-break; any divergence between engines is a
//! correctness bug (§9).

use serde::{Deserialize, Serialize};

use crate::models::cv::SectionType;
use crate::models::jd::JdRuleType;

/// `similarity = 1 - cosine_distance`. The store emits cosine distance in
/// `[0, 2]`; similarity therefore lies in `[-1, 1]` (§3 invariant).
pub fn distance_to_similarity(distance: f64) -> f64 {
    1.0 - distance
}

#[derive(Debug, Clone, Copy)]
pub struct Thresholds {
    pub floor: f64,
    pub low: f64,
    pub high: f64,
}

impl Thresholds {
    pub fn new(floor: f64, low: f64, high: f64) -> Self {
        debug_assert!(0.0 <= floor && floor < low && low < high && high <= 1.0);
        Self { floor, low, high }
    }
}

/// Discretization of similarity. Variant order is the monotonicity order
/// required by §8 property 1: `NoEvidence < Low < Ambiguous < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    NoEvidence,
    Low,
    Ambiguous,
    High,
}

/// `classifyBand(s, {floor, low, high})` (§4.1).
pub fn classify_band(similarity: f64, t: &Thresholds) -> Band {
    if similarity < t.floor {
        Band::NoEvidence
    } else if similarity >= t.high {
        Band::High
    } else if similarity >= t.low {
        Band::Ambiguous
    } else {
        Band::Low
    }
}

/// Rule-level aggregate. Variant order mirrors `Band`'s so the supremum
/// relationship in §8 property 2 (`FULL > PARTIAL > NONE > NO_EVIDENCE`)
/// holds under derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    NoEvidence,
    None,
    Partial,
    Full,
}

/// `aggregateRuleResult([bands])` (§4.1): empty ⇒ NO_EVIDENCE; any HIGH ⇒
/// FULL; else any AMBIGUOUS ⇒ PARTIAL; else any LOW ⇒ NONE; else NO_EVIDENCE.
pub fn aggregate_rule_result(bands: &[Band]) -> MatchStatus {
    if bands.is_empty() {
        return MatchStatus::NoEvidence;
    }
    if bands.iter().any(|b| *b == Band::High) {
        MatchStatus::Full
    } else if bands.iter().any(|b| *b == Band::Ambiguous) {
        MatchStatus::Partial
    } else if bands.iter().any(|b| *b == Band::Low) {
        MatchStatus::None
    } else {
        MatchStatus::NoEvidence
    }
}

/// Soft section weight (§4.1), with the optional +0.10 `appliesToSections`
/// boost applied by the caller.
pub fn base_section_weight(section: SectionType) -> f64 {
    match section {
        SectionType::Experience => 1.15,
        SectionType::Projects => 1.15,
        SectionType::Skills => 1.05,
        SectionType::Activities => 1.00,
        SectionType::Summary => 0.90,
        SectionType::Education => 0.90,
    }
}

pub const APPLIES_TO_SECTION_BOOST: f64 = 0.10;

pub fn section_weight(section: SectionType, applies_to_sections: &[SectionType]) -> f64 {
    let base = base_section_weight(section);
    if applies_to_sections.contains(&section) {
        base + APPLIES_TO_SECTION_BOOST
    } else {
        base
    }
}

/// Tie-break priority (§4.1); lower sorts first.
pub fn section_priority(section: SectionType) -> u8 {
    match section {
        SectionType::Experience => 1,
        SectionType::Projects => 2,
        SectionType::Skills => 3,
        SectionType::Activities => 4,
        SectionType::Education => 5,
        SectionType::Summary => 6,
    }
}

/// A scored candidate as produced by a vector-store query, annotated with
/// everything the total order (§4.1) needs.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk_id: uuid::Uuid,
    pub section: SectionType,
    pub chunk_order: i32,
    pub similarity: f64,
    pub band: Band,
}

impl Candidate {
    pub fn weight(&self, applies_to_sections: &[SectionType]) -> f64 {
        section_weight(self.section, applies_to_sections)
    }
}

/// The sole tie-break comparator used everywhere (§4.1): similarity desc,
/// then section weight desc, then section priority asc, then chunk order
/// asc, then chunk id asc. Deterministic and total — never returns `Equal`
/// for distinct chunk ids.
pub fn compare_candidates(
    a: &Candidate,
    b: &Candidate,
    applies_to_sections: &[SectionType],
) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.weight(applies_to_sections)
                .partial_cmp(&a.weight(applies_to_sections))
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| section_priority(a.section).cmp(&section_priority(b.section)))
        .then_with(|| a.chunk_order.cmp(&b.chunk_order))
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Sorts candidates in place by the total order above.
pub fn sort_candidates(candidates: &mut [Candidate], applies_to_sections: &[SectionType]) {
    candidates.sort_by(|a, b| compare_candidates(a, b, applies_to_sections));
}

pub const UPGRADE_MARGIN: f64 = 0.05;

/// Partial→Full upgrade predicate (§4.1). Eligible iff the best candidate's
/// section is EXPERIENCE or PROJECTS, `bestSimilarity >= high - 0.05`, and
/// the rule has at least 2 candidates at or above `low` in aggregate.
pub fn upgrade_eligible(
    best: &Candidate,
    thresholds: &Thresholds,
    candidates_at_or_above_low: usize,
) -> bool {
    matches!(best.section, SectionType::Experience | SectionType::Projects)
        && best.similarity >= thresholds.high - UPGRADE_MARGIN
        && candidates_at_or_above_low >= 2
}

/// Gap severity (§4.1 severity map): band × rule type → gap severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapSeverity {
    None,
    CriticalSkillGap,
    MinorGap,
    PartialMatchAdvisory,
    Advisory,
}

pub fn gap_severity(band: Band, rule_type: JdRuleType) -> GapSeverity {
    let is_must_have = rule_type == JdRuleType::MustHave;
    match band {
        Band::High => GapSeverity::None,
        Band::NoEvidence | Band::Low => {
            if is_must_have {
                GapSeverity::CriticalSkillGap
            } else {
                GapSeverity::MinorGap
            }
        }
        Band::Ambiguous => {
            if is_must_have {
                GapSeverity::PartialMatchAdvisory
            } else {
                GapSeverity::Advisory
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const T: Thresholds = Thresholds {
        floor: 0.15,
        low: 0.40,
        high: 0.75,
    };

    // §8 property 1: band monotonicity.
    #[test]
    fn band_monotone_non_decreasing_in_similarity() {
        let samples = [-1.0, 0.0, 0.1, 0.15, 0.3, 0.4, 0.6, 0.75, 0.9, 1.0];
        for pair in samples.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            assert!(classify_band(lo, &T) <= classify_band(hi, &T));
        }
    }

    #[test]
    fn classify_band_boundaries() {
        assert_eq!(classify_band(0.14, &T), Band::NoEvidence);
        assert_eq!(classify_band(0.15, &T), Band::Low);
        assert_eq!(classify_band(0.39, &T), Band::Low);
        assert_eq!(classify_band(0.40, &T), Band::Ambiguous);
        assert_eq!(classify_band(0.74, &T), Band::Ambiguous);
        assert_eq!(classify_band(0.75, &T), Band::High);
    }

    // §8 property 2: aggregator is the supremum under the stated mapping.
    #[test]
    fn aggregate_empty_is_no_evidence() {
        assert_eq!(aggregate_rule_result(&[]), MatchStatus::NoEvidence);
    }

    #[test]
    fn aggregate_any_high_is_full() {
        let bands = [Band::Low, Band::Ambiguous, Band::High, Band::NoEvidence];
        assert_eq!(aggregate_rule_result(&bands), MatchStatus::Full);
    }

    #[test]
    fn aggregate_any_ambiguous_without_high_is_partial() {
        let bands = [Band::Low, Band::Ambiguous, Band::NoEvidence];
        assert_eq!(aggregate_rule_result(&bands), MatchStatus::Partial);
    }

    #[test]
    fn aggregate_any_low_without_ambiguous_or_high_is_none() {
        let bands = [Band::Low, Band::NoEvidence];
        assert_eq!(aggregate_rule_result(&bands), MatchStatus::None);
    }

    #[test]
    fn aggregate_all_no_evidence() {
        let bands = [Band::NoEvidence, Band::NoEvidence];
        assert_eq!(aggregate_rule_result(&bands), MatchStatus::NoEvidence);
    }

    fn candidate(
        similarity: f64,
        section: SectionType,
        chunk_order: i32,
        chunk_id: Uuid,
    ) -> Candidate {
        Candidate {
            chunk_id,
            section,
            chunk_order,
            similarity,
            band: classify_band(similarity, &T),
        }
    }

    // §8 property 3: tie-break determinism under permutation.
    #[test]
    fn sort_candidates_is_permutation_invariant() {
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let mut ids_sorted = ids.clone();
        ids_sorted.sort();

        let base = vec![
            candidate(0.5, SectionType::Experience, 0, ids_sorted[0]),
            candidate(0.5, SectionType::Experience, 0, ids_sorted[1]),
            candidate(0.8, SectionType::Skills, 2, ids_sorted[2]),
            candidate(0.5, SectionType::Projects, 1, ids_sorted[3]),
            candidate(0.3, SectionType::Education, 0, ids_sorted[4]),
        ];

        let mut expected = base.clone();
        sort_candidates(&mut expected, &[]);
        let expected_ids: Vec<Uuid> = expected.iter().map(|c| c.chunk_id).collect();

        // A few permutations of the input; result must always match.
        let perms = [
            vec![0, 1, 2, 3, 4],
            vec![4, 3, 2, 1, 0],
            vec![2, 0, 4, 1, 3],
        ];
        for perm in perms {
            let mut shuffled: Vec<Candidate> = perm.iter().map(|&i| base[i].clone()).collect();
            sort_candidates(&mut shuffled, &[]);
            let got_ids: Vec<Uuid> = shuffled.iter().map(|c| c.chunk_id).collect();
            assert_eq!(got_ids, expected_ids);
        }
    }

    #[test]
    fn sort_candidates_prefers_higher_similarity() {
        let id1 = Uuid::new_v4();
        let id2 = Uuid::new_v4();
        let mut cands = vec![
            candidate(0.3, SectionType::Experience, 0, id1),
            candidate(0.9, SectionType::Education, 0, id2),
        ];
        sort_candidates(&mut cands, &[]);
        assert_eq!(cands[0].chunk_id, id2);
    }

    #[test]
    fn sort_candidates_breaks_similarity_tie_by_weight_then_priority_then_order_then_id() {
        let id_a = Uuid::new_v4();
        let id_b = Uuid::new_v4();
        // Equal similarity and section (hence equal weight/priority): lower
        // chunk order must win.
        let mut cands = vec![
            candidate(0.5, SectionType::Skills, 2, id_a),
            candidate(0.5, SectionType::Skills, 1, id_b),
        ];
        sort_candidates(&mut cands, &[]);
        assert_eq!(cands[0].chunk_id, id_b);
    }

    // §8 property 6: upgrade safety.
    #[test]
    fn upgrade_requires_experience_or_projects_section() {
        let id = Uuid::new_v4();
        let best = candidate(0.72, SectionType::Skills, 0, id);
        assert!(!upgrade_eligible(&best, &T, 2));
    }

    #[test]
    fn upgrade_requires_similarity_above_margin() {
        let id = Uuid::new_v4();
        let best = candidate(0.69, SectionType::Projects, 0, id);
        assert!(!upgrade_eligible(&best, &T, 2));
    }

    #[test]
    fn upgrade_requires_two_candidates_at_or_above_low() {
        let id = Uuid::new_v4();
        let best = candidate(0.72, SectionType::Projects, 0, id);
        assert!(!upgrade_eligible(&best, &T, 1));
    }

    #[test]
    fn upgrade_fires_when_all_conditions_met() {
        let id = Uuid::new_v4();
        let best = candidate(0.72, SectionType::Projects, 0, id);
        assert!(upgrade_eligible(&best, &T, 2));
    }

    #[test]
    fn severity_map_high_is_always_none() {
        assert_eq!(
            gap_severity(Band::High, JdRuleType::MustHave),
            GapSeverity::None
        );
        assert_eq!(
            gap_severity(Band::High, JdRuleType::NiceToHave),
            GapSeverity::None
        );
    }

    #[test]
    fn severity_map_must_have_escalates() {
        assert_eq!(
            gap_severity(Band::Low, JdRuleType::MustHave),
            GapSeverity::CriticalSkillGap
        );
        assert_eq!(
            gap_severity(Band::NoEvidence, JdRuleType::MustHave),
            GapSeverity::CriticalSkillGap
        );
        assert_eq!(
            gap_severity(Band::Ambiguous, JdRuleType::MustHave),
            GapSeverity::PartialMatchAdvisory
        );
    }

    #[test]
    fn severity_map_non_must_have_is_advisory() {
        assert_eq!(
            gap_severity(Band::Low, JdRuleType::NiceToHave),
            GapSeverity::MinorGap
        );
        assert_eq!(
            gap_severity(Band::Ambiguous, JdRuleType::BestPractice),
            GapSeverity::Advisory
        );
    }
}
