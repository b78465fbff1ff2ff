// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Fact verification: extract claims, cross-reference them against web
//! sources, weight sources by domain credibility, detect contradictions,
//! and build a consensus verdict per claim.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use url::Url;

use crate::llm::{parse_json_block, LlmClient};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEvidence {
    pub url: String,
    pub content: String,
    pub credibility: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Supported,
    Contradicted,
    Unverifiable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVerification {
    pub claim: Claim,
    pub verdict: Verdict,
    pub confidence: f64,
    pub supporting: Vec<String>,
    pub contradicting: Vec<String>,
}

/// External web search + fetch boundary; the platform's crawler implements
/// it, tests script it.
#[async_trait::async_trait]
pub trait WebSearcher: Send + Sync {
    /// Return (url, extracted content) pairs for a query.
    async fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<(String, String)>>;
}

/// Domain credibility weighting. Academic aggregators outrank generic
/// institutional domains, which outrank wikipedia, which outranks the
/// open web.
pub fn credibility_score(url: &str) -> f64 {
    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_else(|| url.to_lowercase());

    if host.contains("scholar")
        || host.contains("pubmed")
        || host.contains("arxiv")
        || host.ends_with(".ac.uk")
    {
        return 0.9;
    }
    if host.ends_with(".edu") || host.ends_with(".gov") || host.ends_with(".org") {
        return 0.8;
    }
    if host.contains("wikipedia") {
        return 0.7;
    }
    0.5
}

pub struct FactVerifier {
    llm: Arc<dyn LlmClient>,
    searcher: Arc<dyn WebSearcher>,
}

impl FactVerifier {
    pub fn new(llm: Arc<dyn LlmClient>, searcher: Arc<dyn WebSearcher>) -> Self {
        Self { llm, searcher }
    }

    /// Extract the checkable claims from a passage.
    pub async fn extract_claims(&self, text: &str) -> anyhow::Result<Vec<Claim>> {
        let prompt = format!(
            "Extract the factual, independently checkable claims from this text.\n\
             Respond with JSON: {{\"claims\": [\"claim\", ...]}}\n\nText:\n{text}"
        );
        let response = self.llm.complete(&prompt).await?;
        let claims: Vec<String> = parse_json_block(&response)
            .and_then(|v| v.get("claims").cloned())
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        Ok(claims.into_iter().map(|text| Claim { text }).collect())
    }

    /// Cross-reference one claim: search, score sources, ask the LLM for
    /// per-source agreement, and build the weighted consensus.
    pub async fn verify_claim(&self, claim: &Claim) -> anyhow::Result<ClaimVerification> {
        let sources = self.searcher.search(&claim.text, 5).await?;
        let evidence: Vec<SourceEvidence> = sources
            .into_iter()
            .map(|(url, content)| SourceEvidence {
                credibility: credibility_score(&url),
                url,
                content,
            })
            .collect();

        if evidence.is_empty() {
            return Ok(ClaimVerification {
                claim: claim.clone(),
                verdict: Verdict::Unverifiable,
                confidence: 0.0,
                supporting: Vec::new(),
                contradicting: Vec::new(),
            });
        }

        let listing = evidence
            .iter()
            .enumerate()
            .map(|(i, e)| format!("[{}] {} :: {}", i, e.url, truncate(&e.content, 500)))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Claim: {}\n\nSources:\n{listing}\n\nFor each source index, state whether it \
             supports or contradicts the claim. Respond with JSON: \
             {{\"supports\": [indices], \"contradicts\": [indices]}}",
            claim.text
        );
        let response = self.llm.complete(&prompt).await?;
        let parsed = parse_json_block(&response).unwrap_or_default();
        let indices = |key: &str| -> Vec<usize> {
            parsed
                .get(key)
                .and_then(|v| v.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_u64().map(|i| i as usize))
                        .filter(|i| *i < evidence.len())
                        .collect()
                })
                .unwrap_or_default()
        };
        let supports = indices("supports");
        let contradicts = indices("contradicts");

        Ok(build_consensus(claim, &evidence, &supports, &contradicts))
    }

    pub async fn verify_text(&self, text: &str) -> anyhow::Result<Vec<ClaimVerification>> {
        let claims = self.extract_claims(text).await?;
        let mut verifications = Vec::with_capacity(claims.len());
        for claim in &claims {
            match self.verify_claim(claim).await {
                Ok(v) => verifications.push(v),
                Err(e) => warn!(claim = %claim.text, error = %e, "claim verification failed"),
            }
        }
        Ok(verifications)
    }
}

/// Credibility-weighted consensus: the side with the heavier credibility
/// mass wins; confidence is its share of the total mass.
fn build_consensus(
    claim: &Claim,
    evidence: &[SourceEvidence],
    supports: &[usize],
    contradicts: &[usize],
) -> ClaimVerification {
    let weight_of = |indices: &[usize]| -> f64 {
        indices.iter().map(|&i| evidence[i].credibility).sum()
    };
    let support_weight = weight_of(supports);
    let contradict_weight = weight_of(contradicts);
    let total = support_weight + contradict_weight;

    let (verdict, confidence) = if total == 0.0 {
        (Verdict::Unverifiable, 0.0)
    } else if support_weight >= contradict_weight {
        (Verdict::Supported, support_weight / total)
    } else {
        (Verdict::Contradicted, contradict_weight / total)
    };

    ClaimVerification {
        claim: claim.clone(),
        verdict,
        confidence,
        supporting: supports.iter().map(|&i| evidence[i].url.clone()).collect(),
        contradicting: contradicts.iter().map(|&i| evidence[i].url.clone()).collect(),
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        text.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    #[test]
    fn credibility_tiers() {
        assert_eq!(credibility_score("https://scholar.google.com/x"), 0.9);
        assert_eq!(credibility_score("https://pubmed.ncbi.nlm.nih.gov/1"), 0.9);
        assert_eq!(credibility_score("https://arxiv.org/abs/1234"), 0.9);
        assert_eq!(credibility_score("https://phys.cam.ac.uk/paper"), 0.9);
        assert_eq!(credibility_score("https://www.mit.edu/page"), 0.8);
        assert_eq!(credibility_score("https://nasa.gov/x"), 0.8);
        assert_eq!(credibility_score("https://example.org/x"), 0.8);
        assert_eq!(credibility_score("https://en.wikipedia.org/wiki/X"), 0.7);
        assert_eq!(credibility_score("https://some-blog.com/post"), 0.5);
    }

    struct FixedSearcher(Vec<(String, String)>);

    #[async_trait::async_trait]
    impl WebSearcher for FixedSearcher {
        async fn search(&self, _q: &str, _limit: usize) -> anyhow::Result<Vec<(String, String)>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn consensus_weights_by_credibility() {
        // One 0.9 source supports; two 0.5 sources contradict. The
        // contradiction mass (1.0) outweighs the support mass (0.9).
        let searcher = FixedSearcher(vec![
            ("https://arxiv.org/abs/1".to_string(), "supports".to_string()),
            ("https://blog-a.com/1".to_string(), "contradicts".to_string()),
            ("https://blog-b.com/1".to_string(), "contradicts".to_string()),
        ]);
        let llm = ScriptedLlm::new([r#"{"supports": [0], "contradicts": [1, 2]}"#]);
        let verifier = FactVerifier::new(Arc::new(llm), Arc::new(searcher));

        let verification = verifier
            .verify_claim(&Claim {
                text: "The sky is green".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(verification.verdict, Verdict::Contradicted);
        assert!(verification.confidence > 0.5);
        assert_eq!(verification.supporting.len(), 1);
        assert_eq!(verification.contradicting.len(), 2);
    }

    #[tokio::test]
    async fn no_sources_is_unverifiable() {
        let verifier = FactVerifier::new(
            Arc::new(ScriptedLlm::default()),
            Arc::new(FixedSearcher(Vec::new())),
        );
        let verification = verifier
            .verify_claim(&Claim {
                text: "anything".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(verification.verdict, Verdict::Unverifiable);
    }

    #[tokio::test]
    async fn claim_extraction_parses_list() {
        let llm = ScriptedLlm::new([r#"{"claims": ["A was built in 1900", "B is taller than C"]}"#]);
        let verifier = FactVerifier::new(
            Arc::new(llm),
            Arc::new(FixedSearcher(Vec::new())),
        );
        let claims = verifier.extract_claims("some passage").await.unwrap();
        assert_eq!(claims.len(), 2);
    }
}
