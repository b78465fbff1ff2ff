// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Assessment subgraph: is this evidence enough to answer the query?
//!
//! Two nodes: prompt the LLM for a structured JSON verdict, then parse and
//! validate it. A verdict that fails to parse degrades to a neutral
//! "insufficient, confidence 0.5" rather than failing the caller.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::graph::{patch, State, Subgraph, SubgraphBuilder, END};
use crate::llm::{parse_json_block, LlmClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentInput {
    pub query: String,
    pub results: Vec<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment: String,
    pub sufficient: bool,
    pub confidence: f64,
    pub reasoning: String,
    pub missing_info: Vec<String>,
    pub has_relevant_info: bool,
}

impl Assessment {
    /// The safe default used whenever the verdict cannot be parsed.
    pub fn parse_failure() -> Self {
        Self {
            assessment: "Assessment parsing failed".to_string(),
            sufficient: false,
            confidence: 0.5,
            reasoning: "parse failed".to_string(),
            missing_info: Vec::new(),
            has_relevant_info: false,
        }
    }
}

fn verdict_prompt(input: &AssessmentInput) -> String {
    let results = if input.results.is_empty() {
        "(no results)".to_string()
    } else {
        input
            .results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[{}] {}", i + 1, r))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let domain = input
        .domain
        .as_deref()
        .map(|d| format!("Domain: {d}\n"))
        .unwrap_or_default();
    let context = input
        .context
        .as_deref()
        .map(|c| format!("Additional context: {c}\n"))
        .unwrap_or_default();

    format!(
        "Assess whether the following results are sufficient to answer the query.\n\
         Query: {query}\n{domain}{context}Results:\n{results}\n\n\
         Respond with JSON only:\n\
         {{\n  \"assessment\": \"summary\",\n  \"sufficient\": boolean,\n  \
         \"has_relevant_info\": boolean,\n  \"missing_info\": [\"specific gaps\"],\n  \
         \"confidence\": number between 0.0 and 1.0,\n  \"reasoning\": \"why\"\n}}",
        query = input.query,
    )
}

pub fn build_assessment_subgraph(llm: Arc<dyn LlmClient>) -> anyhow::Result<Subgraph> {
    let generate_llm = llm;

    let graph = SubgraphBuilder::new("assessment")
        .add_node("generate_verdict", move |state: State| {
            let llm = generate_llm.clone();
            Box::pin(async move {
                let input: AssessmentInput = serde_json::from_value(
                    state.get("input").cloned().unwrap_or(serde_json::Value::Null),
                )?;
                let raw = llm.complete(&verdict_prompt(&input)).await?;
                Ok(patch(&[("raw_verdict", json!(raw))]))
            })
        })
        .add_node("parse_and_validate", |state: State| {
            Box::pin(async move {
                let raw = state
                    .get("raw_verdict")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default();

                let assessment = parse_json_block(raw)
                    .and_then(|value| {
                        let sufficient = value.get("sufficient")?.as_bool()?;
                        Some(Assessment {
                            assessment: value
                                .get("assessment")
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            sufficient,
                            confidence: value
                                .get("confidence")
                                .and_then(|v| v.as_f64())
                                .unwrap_or(0.0)
                                .clamp(0.0, 1.0),
                            reasoning: value
                                .get("reasoning")
                                .and_then(|v| v.as_str())
                                .unwrap_or_default()
                                .to_string(),
                            missing_info: value
                                .get("missing_info")
                                .and_then(|v| v.as_array())
                                .map(|a| {
                                    a.iter()
                                        .filter_map(|v| v.as_str().map(|s| s.to_string()))
                                        .collect()
                                })
                                .unwrap_or_default(),
                            has_relevant_info: value
                                .get("has_relevant_info")
                                .and_then(|v| v.as_bool())
                                .unwrap_or(false),
                        })
                    })
                    .unwrap_or_else(Assessment::parse_failure);

                Ok(patch(&[("assessment", serde_json::to_value(&assessment)?)]))
            })
        })
        .add_edge("generate_verdict", "parse_and_validate")
        .add_edge("parse_and_validate", END)
        .set_entry("generate_verdict")
        .compile()?;

    Ok(graph)
}

/// Convenience wrapper: run the subgraph once and return the verdict.
pub async fn assess(llm: Arc<dyn LlmClient>, input: &AssessmentInput) -> anyhow::Result<Assessment> {
    let graph = build_assessment_subgraph(llm)?;
    let mut state = State::new();
    state.insert("input".to_string(), serde_json::to_value(input)?);
    let result = graph
        .invoke(state, &uuid::Uuid::new_v4().to_string())
        .await?;
    let assessment = result
        .get("assessment")
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("assessment subgraph produced no verdict"))?;
    Ok(serde_json::from_value(assessment)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    fn input() -> AssessmentInput {
        AssessmentInput {
            query: "What year did the treaty pass?".to_string(),
            results: vec!["The treaty passed in 1848.".to_string()],
            context: None,
            domain: None,
        }
    }

    #[tokio::test]
    async fn parses_well_formed_verdict() {
        let llm = Arc::new(ScriptedLlm::new([r#"{
            "assessment": "Direct answer present",
            "sufficient": true,
            "has_relevant_info": true,
            "missing_info": [],
            "confidence": 0.92,
            "reasoning": "The result states the year."
        }"#]));
        let verdict = assess(llm, &input()).await.unwrap();
        assert!(verdict.sufficient);
        assert!(verdict.has_relevant_info);
        assert!((verdict.confidence - 0.92).abs() < 1e-9);
    }

    #[tokio::test]
    async fn parse_failure_degrades_to_neutral_default() {
        let llm = Arc::new(ScriptedLlm::new(["I cannot answer in JSON, sorry."]));
        let verdict = assess(llm, &input()).await.unwrap();
        assert!(!verdict.sufficient);
        assert!((verdict.confidence - 0.5).abs() < 1e-9);
        assert!(!verdict.has_relevant_info);
    }

    #[tokio::test]
    async fn confidence_is_clamped() {
        let llm = Arc::new(ScriptedLlm::new([r#"{"sufficient": false, "confidence": 7.5}"#]));
        let verdict = assess(llm, &input()).await.unwrap();
        assert!(verdict.confidence <= 1.0);
    }
}
