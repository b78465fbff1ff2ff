// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Task Fabric
//!
//! Durable background work: non-blocking submission, authoritative status,
//! cooperative cancellation, per-task-name rate limits and retry policies,
//! and a soft time limit that tags timeouts distinctly from failures.
//!
//! State transitions are enforced by the store: pending → started →
//! (success | failure | cancelled), never backwards. Large results do not
//! travel through the status channel; the orchestrator-query handler
//! stashes its payload in redis and returns a marker (see
//! [`crate::infrastructure::kv_cache`]).

use chrono::Utc;
use dashmap::DashMap;
use futures::future::BoxFuture;
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::domain::task::{
    TaskFailure, TaskId, TaskProgress, TaskState, TaskStatus, SOFT_TIME_LIMIT_ERROR_TYPE,
};
use crate::infrastructure::agent_client::{AgentStreamClient, OrchestratorQuery};
use crate::infrastructure::kv_cache::ResultStash;

type DirectLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("unknown task name: {0}")]
    UnknownTask(String),

    #[error("task not found: {0}")]
    NotFound(TaskId),

    #[error("fabric is shut down")]
    ShutDown,
}

// ============================================================================
// State store
// ============================================================================

/// Authoritative task state. Every mutation goes through the transition
/// check; an illegal transition is dropped and logged, never applied.
#[derive(Default)]
pub struct TaskStateStore {
    tasks: DashMap<TaskId, TaskStatus>,
}

impl TaskStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, task_id: TaskId) -> TaskStatus {
        let status = TaskStatus {
            task_id: task_id.clone(),
            state: TaskState::Pending,
            progress: None,
            result: None,
            failure: None,
            updated_at: Utc::now(),
        };
        self.tasks.insert(task_id, status.clone());
        status
    }

    pub fn get(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.tasks.get(task_id).map(|s| s.clone())
    }

    fn transition(&self, task_id: &TaskId, next: TaskState) -> bool {
        let Some(mut entry) = self.tasks.get_mut(task_id) else {
            return false;
        };
        if !entry.state.can_transition_to(next) {
            warn!(
                task_id = %task_id,
                from = entry.state.as_str(),
                to = next.as_str(),
                "illegal task transition ignored"
            );
            return false;
        }
        entry.state = next;
        entry.updated_at = Utc::now();
        true
    }

    pub fn mark_started(&self, task_id: &TaskId) -> bool {
        self.transition(task_id, TaskState::Started)
    }

    pub fn set_progress(&self, task_id: &TaskId, progress: TaskProgress) {
        if let Some(mut entry) = self.tasks.get_mut(task_id) {
            // Progress is advisory; it never flips state.
            if !entry.state.is_terminal() {
                entry.progress = Some(progress);
                entry.updated_at = Utc::now();
            }
        }
    }

    pub fn complete(&self, task_id: &TaskId, result: serde_json::Value) -> bool {
        if self.transition(task_id, TaskState::Success) {
            if let Some(mut entry) = self.tasks.get_mut(task_id) {
                entry.result = Some(result);
            }
            true
        } else {
            false
        }
    }

    pub fn fail(&self, task_id: &TaskId, failure: TaskFailure) -> bool {
        if self.transition(task_id, TaskState::Failure) {
            if let Some(mut entry) = self.tasks.get_mut(task_id) {
                entry.failure = Some(failure);
            }
            true
        } else {
            false
        }
    }

    pub fn cancel(&self, task_id: &TaskId) -> bool {
        self.transition(task_id, TaskState::Cancelled)
    }
}

// ============================================================================
// Registration
// ============================================================================

/// Handle passed into task bodies for progress reporting and cooperative
/// cancellation.
#[derive(Clone)]
pub struct TaskContext {
    pub task_id: TaskId,
    pub payload: serde_json::Value,
    pub cancel: CancellationToken,
    store: Arc<TaskStateStore>,
}

impl TaskContext {
    pub fn progress(&self, current: u32, total: u32, message: impl Into<String>) {
        self.store.set_progress(
            &self.task_id,
            TaskProgress {
                current,
                total,
                message: message.into(),
            },
        );
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

pub type TaskHandler =
    Arc<dyn Fn(TaskContext) -> BoxFuture<'static, anyhow::Result<serde_json::Value>> + Send + Sync>;

#[derive(Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            base_delay: Duration::from_secs(60),
        }
    }
}

struct RegisteredTask {
    handler: TaskHandler,
    rate_limiter: Option<Arc<DirectLimiter>>,
    retry: RetryPolicy,
    soft_time_limit: Option<Duration>,
}

/// Builder-ish knobs for one task name.
pub struct TaskSpec {
    pub rate_per_minute: Option<u32>,
    pub retry: RetryPolicy,
    pub soft_time_limit: Option<Duration>,
}

impl Default for TaskSpec {
    fn default() -> Self {
        Self {
            rate_per_minute: None,
            retry: RetryPolicy::default(),
            soft_time_limit: None,
        }
    }
}

// ============================================================================
// The fabric
// ============================================================================

pub struct TaskFabric {
    registry: parking_lot::RwLock<HashMap<String, Arc<RegisteredTask>>>,
    store: Arc<TaskStateStore>,
    running: DashMap<TaskId, CancellationToken>,
    workers: Arc<Semaphore>,
    shutdown: CancellationToken,
    /// Self-handle so `submit` can detach the execution task.
    weak: std::sync::Weak<TaskFabric>,
}

impl TaskFabric {
    pub fn new(concurrency: usize) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            registry: parking_lot::RwLock::new(HashMap::new()),
            store: Arc::new(TaskStateStore::new()),
            running: DashMap::new(),
            workers: Arc::new(Semaphore::new(concurrency.max(1))),
            shutdown: CancellationToken::new(),
            weak: weak.clone(),
        })
    }

    pub fn store(&self) -> Arc<TaskStateStore> {
        self.store.clone()
    }

    pub fn register(&self, name: impl Into<String>, spec: TaskSpec, handler: TaskHandler) {
        let rate_limiter = spec.rate_per_minute.and_then(NonZeroU32::new).map(|per_min| {
            Arc::new(RateLimiter::direct(Quota::per_minute(per_min)))
        });
        self.registry.write().insert(
            name.into(),
            Arc::new(RegisteredTask {
                handler,
                rate_limiter,
                retry: spec.retry,
                soft_time_limit: spec.soft_time_limit,
            }),
        );
    }

    /// Non-blocking submit. The task id is immediately valid for `status`.
    pub fn submit(&self, name: &str, payload: serde_json::Value) -> Result<TaskId, TaskError> {
        if self.shutdown.is_cancelled() {
            return Err(TaskError::ShutDown);
        }
        let registered = self
            .registry
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;
        let fabric = self.weak.upgrade().ok_or(TaskError::ShutDown)?;

        let task_id = TaskId::new();
        self.store.create(task_id.clone());
        let cancel = CancellationToken::new();
        self.running.insert(task_id.clone(), cancel.clone());

        let name = name.to_string();
        let id = task_id.clone();
        tokio::spawn(async move {
            fabric.execute(id, name, registered, payload, cancel).await;
        });

        Ok(task_id)
    }

    /// Authoritative status. `None` for ids this fabric never issued.
    pub fn status(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.store.get(task_id)
    }

    /// Cancel: revokes the token; a pending task dies before starting, a
    /// running cooperative task winds down. Partial effects are accepted.
    pub fn cancel(&self, task_id: &TaskId) -> bool {
        if let Some(token) = self.running.get(task_id) {
            token.cancel();
        }
        self.store.cancel(task_id)
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
        for entry in self.running.iter() {
            entry.value().cancel();
        }
    }

    async fn execute(
        self: Arc<Self>,
        task_id: TaskId,
        name: String,
        registered: Arc<RegisteredTask>,
        payload: serde_json::Value,
        cancel: CancellationToken,
    ) {
        // Broker-side throttling: the permit bounds concurrency, the
        // limiter paces this task name.
        let Ok(_permit) = self.workers.clone().acquire_owned().await else {
            return;
        };
        if let Some(limiter) = &registered.rate_limiter {
            limiter.until_ready().await;
        }
        if cancel.is_cancelled() {
            self.store.cancel(&task_id);
            self.running.remove(&task_id);
            return;
        }

        if !self.store.mark_started(&task_id) {
            // Already cancelled while queued.
            self.running.remove(&task_id);
            return;
        }
        metrics::counter!("citadel_tasks_started_total").increment(1);

        let mut attempt = 0u32;
        let outcome = loop {
            let ctx = TaskContext {
                task_id: task_id.clone(),
                payload: payload.clone(),
                cancel: cancel.clone(),
                store: self.store.clone(),
            };

            let body = (registered.handler)(ctx);
            let result = match registered.soft_time_limit {
                Some(limit) => tokio::select! {
                    result = body => result,
                    _ = tokio::time::sleep(limit) => {
                        break Err(TaskFailure::soft_time_limit());
                    }
                    _ = cancel.cancelled() => break Err(TaskFailure::capture("Cancelled", "task cancelled")),
                },
                None => tokio::select! {
                    result = body => result,
                    _ = cancel.cancelled() => break Err(TaskFailure::capture("Cancelled", "task cancelled")),
                },
            };

            match result {
                Ok(value) => break Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt < registered.retry.attempts {
                        let wait = registered.retry.base_delay * 2u32.pow(attempt - 1);
                        warn!(
                            task = %name,
                            task_id = %task_id,
                            attempt,
                            wait_secs = wait.as_secs(),
                            error = %e,
                            "task attempt failed, retrying"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    break Err(TaskFailure::capture(error_type_of(&e), &e.to_string()));
                }
            }
        };

        match outcome {
            Ok(value) => {
                self.store.complete(&task_id, value);
                metrics::counter!("citadel_tasks_succeeded_total").increment(1);
                info!(task = %name, task_id = %task_id, "task complete");
            }
            Err(failure) if failure.error_type == "Cancelled" => {
                self.store.cancel(&task_id);
            }
            Err(failure) => {
                let soft = failure.error_type == SOFT_TIME_LIMIT_ERROR_TYPE;
                self.store.fail(&task_id, failure);
                metrics::counter!("citadel_tasks_failed_total").increment(1);
                error!(task = %name, task_id = %task_id, soft_time_limit = soft, "task failed");
            }
        }
        self.running.remove(&task_id);
    }
}

/// A coarse type tag for failure meta: the first line of the debug chain.
fn error_type_of(e: &anyhow::Error) -> String {
    e.root_cause()
        .to_string()
        .split(':')
        .next()
        .unwrap_or("Error")
        .chars()
        .take(64)
        .collect()
}

// ============================================================================
// Built-in handlers
// ============================================================================

/// Register the canonical orchestrator-query task: runs the streaming
/// query, stashes the full payload out-of-band, and returns only the
/// marker through the task result.
pub fn register_orchestrator_query(
    fabric: &Arc<TaskFabric>,
    client: AgentStreamClient,
    stash: ResultStash,
) {
    let handler: TaskHandler = Arc::new(move |ctx: TaskContext| {
        let client = client.clone();
        let stash = stash.clone();
        Box::pin(async move {
            let query: OrchestratorQuery = serde_json::from_value(ctx.payload.clone())?;
            ctx.progress(1, 3, "dispatching query to orchestrator");

            let response = client.stream_query(query).await?;
            ctx.progress(2, 3, "stashing result");

            let full = serde_json::to_value(&response)?;
            stash.put(&ctx.task_id, &full).await?;
            ctx.progress(3, 3, "done");

            Ok(serde_json::json!({
                "success": response.success,
                "task_id": ctx.task_id.to_string(),
                "stored_in_redis": true,
            }))
        })
    });

    fabric.register(
        "orchestrator.query",
        TaskSpec {
            soft_time_limit: Some(Duration::from_secs(570)),
            ..Default::default()
        },
        handler,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_handler() -> TaskHandler {
        Arc::new(|ctx: TaskContext| {
            Box::pin(async move {
                ctx.progress(1, 1, "echoing");
                Ok(ctx.payload)
            })
        })
    }

    #[tokio::test]
    async fn submit_runs_to_success() {
        let fabric = TaskFabric::new(2);
        fabric.register("echo", TaskSpec::default(), echo_handler());

        let id = fabric.submit("echo", serde_json::json!({"x": 1})).unwrap();
        // Poll until terminal.
        for _ in 0..100 {
            if fabric.status(&id).map(|s| s.ready()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let status = fabric.status(&id).unwrap();
        assert!(status.successful());
        assert_eq!(status.result, Some(serde_json::json!({"x": 1})));
        assert_eq!(status.progress.unwrap().message, "echoing");
    }

    #[tokio::test]
    async fn unknown_task_is_rejected() {
        let fabric = TaskFabric::new(1);
        assert!(matches!(
            fabric.submit("nope", serde_json::Value::Null),
            Err(TaskError::UnknownTask(_))
        ));
    }

    #[tokio::test]
    async fn failure_is_captured_and_truncated() {
        let fabric = TaskFabric::new(1);
        let handler: TaskHandler = Arc::new(|_ctx| {
            Box::pin(async move { Err(anyhow::anyhow!("boom {}", "x".repeat(5000))) })
        });
        fabric.register("explode", TaskSpec::default(), handler);

        let id = fabric.submit("explode", serde_json::Value::Null).unwrap();
        for _ in 0..100 {
            if fabric.status(&id).map(|s| s.ready()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let status = fabric.status(&id).unwrap();
        assert!(status.failed());
        let failure = status.failure.unwrap();
        assert!(failure.error.len() <= crate::domain::task::MAX_FAILURE_MESSAGE_LEN);
    }

    #[tokio::test]
    async fn soft_time_limit_is_tagged() {
        let fabric = TaskFabric::new(1);
        let handler: TaskHandler = Arc::new(|_ctx| {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(serde_json::Value::Null)
            })
        });
        fabric.register(
            "sleepy",
            TaskSpec {
                soft_time_limit: Some(Duration::from_millis(50)),
                ..Default::default()
            },
            handler,
        );

        let id = fabric.submit("sleepy", serde_json::Value::Null).unwrap();
        for _ in 0..100 {
            if fabric.status(&id).map(|s| s.ready()).unwrap_or(false) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let status = fabric.status(&id).unwrap();
        assert!(status.failed());
        assert_eq!(status.failure.unwrap().error_type, SOFT_TIME_LIMIT_ERROR_TYPE);
    }

    #[tokio::test]
    async fn cancellation_marks_cancelled() {
        let fabric = TaskFabric::new(1);
        let handler: TaskHandler = Arc::new(|ctx: TaskContext| {
            Box::pin(async move {
                ctx.cancel.cancelled().await;
                Ok(serde_json::Value::Null)
            })
        });
        fabric.register("wait", TaskSpec::default(), handler);

        let id = fabric.submit("wait", serde_json::Value::Null).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        fabric.cancel(&id);

        for _ in 0..100 {
            let state = fabric.status(&id).unwrap().state;
            if state.is_terminal() {
                assert_eq!(state, TaskState::Cancelled);
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task never reached a terminal state");
    }

    #[tokio::test]
    async fn states_never_regress() {
        let store = TaskStateStore::new();
        let id = TaskId::new();
        store.create(id.clone());
        assert!(store.mark_started(&id));
        assert!(store.complete(&id, serde_json::Value::Null));
        // Terminal state is sticky.
        assert!(!store.fail(&id, TaskFailure::capture("X", "nope")));
        assert!(!store.cancel(&id));
        assert!(!store.mark_started(&id));
        assert_eq!(store.get(&id).unwrap().state, TaskState::Success);
    }
}
