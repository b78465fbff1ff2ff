// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Streaming Agent Orchestrator Client
//!
//! gRPC client for the agent runtime's server-streaming query RPC.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Bidirectional plumbing to the agent orchestrator
//!
//! The client accumulates `content` chunks until the stream closes, tracks
//! the reported agent name, surfaces `status` chunks for progress
//! reporting, and treats an `error` chunk as terminal. Send/receive caps
//! are raised to accommodate long responses.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tonic::transport::Channel;
use tracing::{debug, info};

// Generated protobuf code
pub mod agent_proto {
    include!(concat!(env!("OUT_DIR"), "/citadel.agent.v1.rs"));
}

use agent_proto::agent_orchestrator_client::AgentOrchestratorClient;
use agent_proto::{ChunkType, QueryRequest};

/// Everything the caller supplies for one orchestrator query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorQuery {
    pub user_id: String,
    pub conversation_id: String,
    pub session_id: String,
    pub query: String,
    pub persona: Option<serde_json::Value>,
    pub agent_type: Option<String>,
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorResponse {
    pub success: bool,
    pub response: String,
    pub agent_type: Option<String>,
    pub status_messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct AgentStreamClient {
    client: AgentOrchestratorClient<Channel>,
}

impl AgentStreamClient {
    pub async fn connect(endpoint: &str, max_message_bytes: usize) -> Result<Self> {
        let addr = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}")
        };

        let channel = Channel::from_shared(addr)
            .context("invalid orchestrator endpoint")?
            .timeout(Duration::from_secs(600))
            .connect()
            .await
            .context("failed to connect to agent orchestrator")?;

        let client = AgentOrchestratorClient::new(channel)
            .max_decoding_message_size(max_message_bytes)
            .max_encoding_message_size(max_message_bytes);

        Ok(Self { client })
    }

    /// Run one query and drain the stream.
    ///
    /// A terminal `error` chunk short-circuits into a failed response; a
    /// normal EOF returns the accumulated content.
    pub async fn stream_query(&self, query: OrchestratorQuery) -> Result<OrchestratorResponse> {
        let request = QueryRequest {
            user_id: query.user_id,
            conversation_id: query.conversation_id,
            session_id: query.session_id,
            query: query.query,
            persona_json: query
                .persona
                .map(|p| p.to_string())
                .unwrap_or_default(),
            agent_type: query.agent_type.unwrap_or_default(),
            context_json: query
                .context
                .map(|c| c.to_string())
                .unwrap_or_default(),
        };

        let mut client = self.client.clone();
        let mut stream = client
            .stream_query(request)
            .await
            .context("orchestrator stream call failed")?
            .into_inner();

        let mut content = String::new();
        let mut status_messages = Vec::new();
        let mut agent_name: Option<String> = None;

        while let Some(chunk) = stream
            .message()
            .await
            .context("orchestrator stream read failed")?
        {
            if !chunk.agent_name.is_empty() {
                agent_name = Some(chunk.agent_name.clone());
            }
            match chunk.r#type() {
                ChunkType::Status => {
                    debug!(status = %chunk.message, "orchestrator status");
                    status_messages.push(chunk.message);
                }
                ChunkType::Content => content.push_str(&chunk.message),
                ChunkType::Error => {
                    return Ok(OrchestratorResponse {
                        success: false,
                        response: String::new(),
                        agent_type: agent_name,
                        status_messages,
                        error: Some(chunk.message),
                    });
                }
                ChunkType::Unspecified => {
                    debug!("ignoring unspecified chunk type");
                }
            }
        }

        info!(
            agent = agent_name.as_deref().unwrap_or("unknown"),
            content_len = content.len(),
            "orchestrator stream complete"
        );

        Ok(OrchestratorResponse {
            success: true,
            response: content,
            agent_type: agent_name,
            status_messages,
            error: None,
        })
    }
}
