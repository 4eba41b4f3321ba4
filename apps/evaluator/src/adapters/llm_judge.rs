//! LLM Judge Adapter (§4.4) — semantic adjudication fallback for ambiguous
//! band matches.
//!
//! `AppState` carries an `Arc<dyn LlmJudge>`, the same pattern the fit scorer
//! uses for its pluggable backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::LlmClient;

/// Adjudicated status. Never escalates a band's `MatchStatus` beyond what
/// the similarity contract already allows (§8 property 7: judge
/// non-escalation) — callers must only ever use a judge verdict to move a
/// result *down* (e.g. High → Partial) or confirm it, never to manufacture
/// a Full out of a NoEvidence band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JudgeStatus {
    Full,
    Partial,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JudgeConfidence {
    High,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeVerdict {
    pub status: JudgeStatus,
    pub confidence: JudgeConfidence,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct JudgeOutcome {
    pub used: bool,
    pub skipped: bool,
    pub unavailable: bool,
    pub result: Option<JudgeVerdict>,
}

impl JudgeOutcome {
    fn skipped() -> Self {
        Self {
            used: false,
            skipped: true,
            unavailable: false,
            result: None,
        }
    }

    fn unavailable() -> Self {
        Self {
            used: false,
            skipped: false,
            unavailable: true,
            result: Some(JudgeVerdict {
                status: JudgeStatus::None,
                confidence: JudgeConfidence::Low,
                reason: "judge unavailable".to_string(),
            }),
        }
    }

    /// A malformed judge response is an affirmative NONE, not an
    /// `unavailable` abstention — the judge did reply, it just couldn't be
    /// understood, which is a distinct failure mode from a network or
    /// rate-limit failure (§9 design note (d)).
    fn parse_failure() -> Self {
        Self {
            used: true,
            skipped: false,
            unavailable: false,
            result: Some(JudgeVerdict {
                status: JudgeStatus::None,
                confidence: JudgeConfidence::Low,
                reason: "judge response could not be parsed".to_string(),
            }),
        }
    }

    fn used(result: JudgeVerdict) -> Self {
        Self {
            used: true,
            skipped: false,
            unavailable: false,
            result: Some(result),
        }
    }
}

/// A single candidate passage and the rule text it is being adjudicated
/// against.
#[derive(Debug, Clone)]
pub struct JudgeQuestion {
    pub rule_text: String,
    pub candidate_text: String,
}

#[async_trait]
pub trait LlmJudge: Send + Sync {
    /// Adjudicates a single ambiguous-band candidate. Must not be called
    /// for bands outside the ambiguous range — callers decide eligibility
    /// before invoking this (§4.4: judge only runs on `Ambiguous` band
    /// results).
    async fn judge(&self, question: &JudgeQuestion) -> JudgeOutcome;

    /// Batch form; default sequential since judge calls are rate-limited
    /// upstream by the shared LLM client's own retry/backoff, not by
    /// caller-side parallelism (§4.4 specifies no bounded-concurrency
    /// requirement for the judge, unlike the vector store's topK budget).
    async fn judge_batch(&self, questions: &[JudgeQuestion]) -> Vec<JudgeOutcome> {
        let mut out = Vec::with_capacity(questions.len());
        for q in questions {
            out.push(self.judge(q).await);
        }
        out
    }
}

/// Claude-backed judge. Calls are pinned to temperature 0 for reproducible
/// adjudication (§4.4).
pub struct ClaudeJudge {
    client: LlmClient,
}

impl ClaudeJudge {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl LlmJudge for ClaudeJudge {
    async fn judge(&self, question: &JudgeQuestion) -> JudgeOutcome {
        let prompt = build_prompt(question);

        match self
            .client
            .call_json_deterministic::<JudgeVerdict>(&prompt, JSON_ONLY_SYSTEM)
            .await
        {
            Ok(verdict) => JudgeOutcome::used(verdict),
            Err(e @ (crate::llm_client::LlmError::Parse(_) | crate::llm_client::LlmError::EmptyContent)) => {
                warn!("judge response malformed, treating as an affirmative NONE: {e}");
                JudgeOutcome::parse_failure()
            }
            Err(e) => {
                warn!("judge call failed, treating as unavailable: {e}");
                JudgeOutcome::unavailable()
            }
        }
    }
}

fn build_prompt(question: &JudgeQuestion) -> String {
    format!(
        "Requirement:\n{}\n\nCandidate resume passage:\n{}\n\n\
         Decide whether the candidate passage demonstrates the requirement. \
         Respond with JSON: {{\"status\": \"FULL\"|\"PARTIAL\"|\"NONE\", \
         \"confidence\": \"high\"|\"low\", \"reason\": \"<one sentence>\"}}.",
        question.rule_text, question.candidate_text
    )
}

/// Judge that is not configured (no API key present). Every call is a
/// no-op `skipped` outcome, matching the "judge disabled" path through the
/// semantic evaluator (§4.4: judge absence degrades gracefully rather than
/// failing the evaluation).
pub struct DisabledJudge;

#[async_trait]
impl LlmJudge for DisabledJudge {
    async fn judge(&self, _question: &JudgeQuestion) -> JudgeOutcome {
        JudgeOutcome::skipped()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub struct FixedJudge(pub JudgeVerdict);

    #[async_trait]
    impl LlmJudge for FixedJudge {
        async fn judge(&self, _question: &JudgeQuestion) -> JudgeOutcome {
            JudgeOutcome::used(self.0.clone())
        }
    }

    #[tokio::test]
    async fn disabled_judge_always_skips() {
        let judge = DisabledJudge;
        let outcome = judge
            .judge(&JudgeQuestion {
                rule_text: "Rust".into(),
                candidate_text: "Wrote Rust services".into(),
            })
            .await;
        assert!(outcome.skipped);
        assert!(!outcome.used);
        assert!(outcome.result.is_none());
    }

    #[tokio::test]
    async fn batch_judge_preserves_order() {
        let judge = FixedJudge(JudgeVerdict {
            status: JudgeStatus::Partial,
            confidence: JudgeConfidence::High,
            reason: "partial overlap".into(),
        });
        let questions = vec![
            JudgeQuestion {
                rule_text: "A".into(),
                candidate_text: "a".into(),
            },
            JudgeQuestion {
                rule_text: "B".into(),
                candidate_text: "b".into(),
            },
        ];
        let outcomes = judge.judge_batch(&questions).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.used));
    }

    #[test]
    fn parse_failure_is_used_and_distinct_from_unavailable() {
        let parse_failure = JudgeOutcome::parse_failure();
        assert!(parse_failure.used);
        assert!(!parse_failure.unavailable);
        assert_eq!(parse_failure.result.unwrap().status, JudgeStatus::None);

        let unavailable = JudgeOutcome::unavailable();
        assert!(!unavailable.used);
        assert!(unavailable.unavailable);
    }

    #[test]
    fn judge_status_serializes_uppercase() {
        let v = JudgeVerdict {
            status: JudgeStatus::Full,
            confidence: JudgeConfidence::High,
            reason: "match".into(),
        };
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("\"FULL\""));
        assert!(json.contains("\"high\""));
    }
}
