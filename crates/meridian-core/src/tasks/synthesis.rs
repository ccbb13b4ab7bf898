//! Risk synthesis: merge every finding into one verdict.
//!
//! The weighted sum of task risks is computed locally and handed to the
//! reasoning engine as a hint. The engine's score is the verdict; when the
//! two disagree by more than the configured threshold the verdict records a
//! [`ScoreDivergence`].

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::{names, prompts, render_message, Task, TaskContext, TaskEnv, TaskError};
use crate::config::RiskWeights;
use crate::domain::{
    clamp_score, round2, Finding, Recommendation, RiskLevel, ScoreDivergence, Verdict,
};
use crate::obs;
use crate::reasoning::parse_structured;

const SUMMARY_CHARS: usize = 500;

/// Σ weight × risk over `findings`, clamped to the risk range.
pub fn weighted_score(findings: &[Finding], weights: &RiskWeights) -> f64 {
    let sum: f64 = findings
        .iter()
        .map(|f| weights.weight_for(f.task_name()) * f.risk_contribution())
        .sum();
    clamp_score(sum)
}

/// Red flags across findings, de-duplicated in first-seen order.
fn unique_flags(findings: &[Finding]) -> Vec<String> {
    let mut seen = HashSet::new();
    findings
        .iter()
        .flat_map(|f| f.red_flags())
        .filter(|flag| seen.insert(flag.as_str()))
        .cloned()
        .collect()
}

fn condense(text: &str) -> String {
    text.chars().take(SUMMARY_CHARS).collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SynthesisReply {
    overall_risk_score: f64,
    #[serde(default)]
    risk_level: String,
    #[serde(default)]
    executive_summary: String,
    #[serde(default)]
    top_red_flags: Vec<String>,
    #[serde(default)]
    cross_agent_patterns: Vec<String>,
    #[serde(default)]
    recommended_actions: Vec<String>,
    #[serde(default)]
    proceed_recommendation: String,
}

/// Outcome of synthesis. `finding` is `error` when the engine could not be
/// used; `verdict` is always usable.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub finding: Finding,
    pub verdict: Verdict,
    /// Band label the engine stated, if it was recognisable.
    pub stated_level: Option<RiskLevel>,
}

pub struct SynthesisTask {
    env: TaskEnv,
    weights: RiskWeights,
    divergence_threshold: f64,
}

impl SynthesisTask {
    pub fn new(env: TaskEnv, weights: RiskWeights, divergence_threshold: f64) -> Self {
        Self {
            env,
            weights,
            divergence_threshold,
        }
    }

    fn input_summary(&self, target: &str, findings: &[Finding], hint: f64) -> Value {
        let flags = unique_flags(findings);
        let total_flags: usize = findings.iter().map(|f| f.red_flags().len()).sum();
        let per_task: serde_json::Map<String, Value> = findings
            .iter()
            .map(|f| {
                let weight = self.weights.weight_for(f.task_name());
                let summary = json!({
                    "risk_score": f.risk_contribution(),
                    "weight": weight,
                    "weighted_contribution": round2(weight * f.risk_contribution()),
                    "key_findings": condense(f.narrative()),
                    "red_flags": f.red_flags(),
                    "status": f.status(),
                });
                (f.task_name().to_string(), summary)
            })
            .collect();

        json!({
            "company": target,
            "preliminary_weighted_score": round2(hint),
            "total_red_flags": total_flags,
            "unique_red_flags": flags,
            "agent_findings_summary": per_task,
        })
    }

    /// Merge `findings` into a verdict for `target`.
    #[instrument(skip(self, findings), fields(task = names::RISK_SYNTHESIS, count = findings.len()))]
    pub async fn synthesize(&self, target: &str, findings: &[Finding]) -> Synthesis {
        let hint = weighted_score(findings, &self.weights);
        let input = self.input_summary(target, findings, hint);
        let message = render_message("Synthesize the intelligence findings", target, &input);

        let reply = match self
            .env
            .ask(names::RISK_SYNTHESIS, prompts::RISK_SYNTHESIS, &message)
            .await
        {
            Ok(text) => parse_structured::<SynthesisReply>(&text),
            Err(err) => Err(err),
        };

        match reply {
            Ok(reply) => self.accept(reply, hint, input),
            Err(err) => self.fall_back(findings, hint, input, err),
        }
    }

    fn accept(&self, reply: SynthesisReply, hint: f64, input: Value) -> Synthesis {
        let score = clamp_score(reply.overall_risk_score);
        let delta = (score - hint).abs();
        let score_divergence = if delta > self.divergence_threshold {
            obs::emit_score_divergence(score, hint, delta);
            Some(ScoreDivergence {
                engine_score: score,
                weighted_score: round2(hint),
                delta: round2(delta),
            })
        } else {
            None
        };

        let mut finding = Finding::running(names::RISK_SYNTHESIS);
        finding.set_raw_context(json!({
            "synthesis": &reply,
            "input_summary": input,
        }));
        if let Err(err) = finding.complete(
            reply.executive_summary.clone(),
            score,
            reply.top_red_flags.clone(),
        ) {
            tracing::warn!(error = %err, "finding transition rejected");
        }

        Synthesis {
            finding,
            stated_level: RiskLevel::parse(&reply.risk_level),
            verdict: Verdict {
                overall_risk_score: score,
                risk_level: RiskLevel::from_score(score),
                weighted_score: round2(hint),
                executive_summary: reply.executive_summary,
                top_red_flags: reply.top_red_flags,
                cross_agent_patterns: reply.cross_agent_patterns,
                recommended_actions: reply.recommended_actions,
                proceed_recommendation: Recommendation::from_label(&reply.proceed_recommendation),
                score_divergence,
            },
        }
    }

    /// Verdict from the weighted hint alone, for a synthesis that failed
    /// outside [`SynthesisTask::synthesize`].
    pub(crate) fn abandon(&self, target: &str, findings: &[Finding], err: TaskError) -> Synthesis {
        let hint = weighted_score(findings, &self.weights);
        let input = self.input_summary(target, findings, hint);
        self.fall_back(findings, hint, input, err)
    }

    fn fall_back(&self, findings: &[Finding], hint: f64, input: Value, err: TaskError) -> Synthesis {
        tracing::warn!(error = %err, weighted_score = hint, "synthesis failed; using weighted score");
        let mut finding = Finding::running(names::RISK_SYNTHESIS);
        finding.set_raw_context(json!({ "input_summary": input }));
        if let Err(transition) = finding.fail(&err) {
            tracing::warn!(error = %transition, "finding transition rejected");
        }

        let score = round2(hint);
        Synthesis {
            verdict: Verdict {
                overall_risk_score: score,
                // Rounding may cross a band edge.
                risk_level: RiskLevel::from_score(hint),
                weighted_score: score,
                executive_summary: finding.narrative().to_string(),
                top_red_flags: unique_flags(findings),
                cross_agent_patterns: Vec::new(),
                recommended_actions: Vec::new(),
                proceed_recommendation: Recommendation::InvestigateFurther,
                score_divergence: None,
            },
            finding,
            stated_level: None,
        }
    }
}

#[async_trait]
impl Task for SynthesisTask {
    fn name(&self) -> &str {
        names::RISK_SYNTHESIS
    }

    async fn execute(&self, target: &str, context: &TaskContext) -> Finding {
        self.synthesize(target, &context.findings).await.finding
    }
}
