// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Knowledge-document synthesis: organize findings hierarchically,
//! generate the four canonical sections, attach footnote citations, and
//! assemble the final markdown with YAML frontmatter.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::llm::LlmClient;
use crate::subgraphs::fact_verification::ClaimVerification;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub topic: String,
    pub statement: String,
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisInput {
    pub title: String,
    pub query: String,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub verifications: Vec<ClaimVerification>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizedDocument {
    pub frontmatter: String,
    pub markdown: String,
}

pub struct KnowledgeSynthesizer {
    llm: Arc<dyn LlmClient>,
}

impl KnowledgeSynthesizer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn synthesize(&self, input: &SynthesisInput) -> anyhow::Result<SynthesizedDocument> {
        let organized = organize_findings(&input.findings);
        let citations = collect_citations(&input.findings);

        let summary = self
            .section(
                "Executive Summary",
                &input.query,
                &organized,
                "Two or three paragraphs summarizing the answer for a busy reader.",
            )
            .await?;
        let core = self
            .section(
                "Core Findings",
                &input.query,
                &organized,
                "The main findings, one subsection per topic, most important first.",
            )
            .await?;
        let evidence = self
            .section(
                "Supporting Evidence",
                &input.query,
                &organized,
                "The evidence behind each core finding, with citation markers like [1].",
            )
            .await?;
        let contradictions = contradictions_section(&input.verifications);

        let frontmatter = build_frontmatter(input);
        let markdown = assemble_markdown(
            &frontmatter,
            &input.title,
            &summary,
            &core,
            &evidence,
            &contradictions,
            &citations,
        );

        Ok(SynthesizedDocument {
            frontmatter,
            markdown,
        })
    }

    async fn section(
        &self,
        heading: &str,
        query: &str,
        organized: &str,
        instruction: &str,
    ) -> anyhow::Result<String> {
        self.llm
            .complete(&format!(
                "Write the \"{heading}\" section of a research document answering: {query}\n\
                 {instruction}\n\nOrganized findings:\n{organized}\n\n\
                 Respond with the section body only, no heading."
            ))
            .await
    }
}

/// Group findings by topic, preserving first-seen topic order.
pub fn organize_findings(findings: &[Finding]) -> String {
    let mut topics: Vec<(String, Vec<&Finding>)> = Vec::new();
    for finding in findings {
        match topics.iter_mut().find(|(t, _)| *t == finding.topic) {
            Some((_, list)) => list.push(finding),
            None => topics.push((finding.topic.clone(), vec![finding])),
        }
    }
    topics
        .into_iter()
        .map(|(topic, list)| {
            let body = list
                .iter()
                .map(|f| format!("  - {}", f.statement))
                .collect::<Vec<_>>()
                .join("\n");
            format!("{topic}:\n{body}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Deduplicated source URLs in first-appearance order; the index is the
/// footnote number.
pub fn collect_citations(findings: &[Finding]) -> Vec<String> {
    let mut urls = Vec::new();
    for finding in findings {
        if let Some(url) = &finding.source_url {
            if !urls.contains(url) {
                urls.push(url.clone());
            }
        }
    }
    urls
}

fn contradictions_section(verifications: &[ClaimVerification]) -> String {
    use crate::subgraphs::fact_verification::Verdict;
    let contradicted: Vec<&ClaimVerification> = verifications
        .iter()
        .filter(|v| v.verdict == Verdict::Contradicted)
        .collect();
    if contradicted.is_empty() {
        return "No contradictions were found across the consulted sources.".to_string();
    }
    contradicted
        .iter()
        .map(|v| {
            format!(
                "- \"{}\" is contradicted by {} source(s) (confidence {:.2}).",
                v.claim.text,
                v.contradicting.len(),
                v.confidence
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_frontmatter(input: &SynthesisInput) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("title: {}", yaml_quote(&input.title)),
        format!("query: {}", yaml_quote(&input.query)),
        format!("generated: {}", Utc::now().to_rfc3339()),
        format!("findings: {}", input.findings.len()),
    ];
    if !input.tags.is_empty() {
        lines.push("tags:".to_string());
        for tag in &input.tags {
            lines.push(format!("  - {}", yaml_quote(tag)));
        }
    }
    lines.push("---".to_string());
    lines.join("\n")
}

fn yaml_quote(value: &str) -> String {
    if value.contains(':') || value.contains('#') || value.contains('"') {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

fn assemble_markdown(
    frontmatter: &str,
    title: &str,
    summary: &str,
    core: &str,
    evidence: &str,
    contradictions: &str,
    citations: &[String],
) -> String {
    let mut out = String::new();
    out.push_str(frontmatter);
    out.push_str(&format!("\n\n# {title}\n"));
    out.push_str(&format!("\n## Executive Summary\n\n{summary}\n"));
    out.push_str(&format!("\n## Core Findings\n\n{core}\n"));
    out.push_str(&format!("\n## Supporting Evidence\n\n{evidence}\n"));
    out.push_str(&format!("\n## Contradictions\n\n{contradictions}\n"));
    if !citations.is_empty() {
        out.push_str("\n## References\n\n");
        for (i, url) in citations.iter().enumerate() {
            out.push_str(&format!("[{}]: {url}\n", i + 1));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    fn findings() -> Vec<Finding> {
        vec![
            Finding {
                topic: "Origins".to_string(),
                statement: "Started in 1848".to_string(),
                source_url: Some("https://a.org/1".to_string()),
            },
            Finding {
                topic: "Impact".to_string(),
                statement: "Changed trade routes".to_string(),
                source_url: Some("https://b.org/2".to_string()),
            },
            Finding {
                topic: "Origins".to_string(),
                statement: "Signed by three parties".to_string(),
                source_url: Some("https://a.org/1".to_string()),
            },
        ]
    }

    #[test]
    fn organization_groups_by_topic_in_order() {
        let organized = organize_findings(&findings());
        let origins = organized.find("Origins:").unwrap();
        let impact = organized.find("Impact:").unwrap();
        assert!(origins < impact);
        assert!(organized.contains("Signed by three parties"));
    }

    #[test]
    fn citations_deduplicate_in_order() {
        let citations = collect_citations(&findings());
        assert_eq!(citations, vec!["https://a.org/1".to_string(), "https://b.org/2".to_string()]);
    }

    #[tokio::test]
    async fn full_document_has_all_sections() {
        let llm = Arc::new(ScriptedLlm::new(["summary body", "core body", "evidence body"]));
        let synthesizer = KnowledgeSynthesizer::new(llm);
        let doc = synthesizer
            .synthesize(&SynthesisInput {
                title: "Treaty Research".to_string(),
                query: "What happened in 1848?".to_string(),
                findings: findings(),
                verifications: Vec::new(),
                tags: vec!["history".to_string()],
            })
            .await
            .unwrap();

        assert!(doc.markdown.starts_with("---"));
        for heading in [
            "# Treaty Research",
            "## Executive Summary",
            "## Core Findings",
            "## Supporting Evidence",
            "## Contradictions",
            "## References",
        ] {
            assert!(doc.markdown.contains(heading), "missing {heading}");
        }
        assert!(doc.frontmatter.contains("tags:"));
        // The query contains a colon-free string; the title line is plain.
        assert!(doc.frontmatter.contains("title: Treaty Research"));
    }
}
