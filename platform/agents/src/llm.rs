// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! LLM boundary. The platform never prescribes how text is produced; this
//! trait is the whole contract, plus the JSON-verdict parsing helpers the
//! subgraphs share.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Extract the first JSON object from a completion, tolerating markdown
/// fences and prose around it.
pub fn parse_json_block(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    // Fenced block first.
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = after.find("```") {
            if let Ok(value) = serde_json::from_str(after[..end].trim()) {
                return Some(value);
            }
        }
    }

    // Whole-string parse.
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    // First balanced object.
    let bytes = trimmed.as_bytes();
    let start = trimmed.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escaped {
            escaped = false;
            continue;
        }
        match b {
            b'\\' if in_string => escaped = true,
            b'"' => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_str(&trimmed[start..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Deterministic scripted client for tests: pops canned responses in
/// order, then echoes the prompt.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedLlm {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let mut responses = self
            .responses
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted llm poisoned"))?;
        Ok(responses
            .pop_front()
            .unwrap_or_else(|| format!("echo: {prompt}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_fenced_and_embedded_json() {
        assert_eq!(
            parse_json_block(r#"{"a": 1}"#),
            Some(json!({"a": 1}))
        );
        assert_eq!(
            parse_json_block("Here you go:\n```json\n{\"a\": 2}\n```\nHope that helps!"),
            Some(json!({"a": 2}))
        );
        assert_eq!(
            parse_json_block(r#"The verdict is {"ok": true, "note": "has {braces} inside"} overall."#),
            Some(json!({"ok": true, "note": "has {braces} inside"}))
        );
        assert_eq!(parse_json_block("no json here"), None);
    }

    #[tokio::test]
    async fn scripted_llm_pops_in_order() {
        let llm = ScriptedLlm::new(["one", "two"]);
        assert_eq!(llm.complete("x").await.unwrap(), "one");
        assert_eq!(llm.complete("x").await.unwrap(), "two");
        assert!(llm.complete("query").await.unwrap().starts_with("echo:"));
    }
}
