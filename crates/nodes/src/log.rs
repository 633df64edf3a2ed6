//! Run-log model — the append-only record of one node's execution.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::models::WorkflowNode;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One timestamped entry in a node's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunLogRecord {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything a node recorded during one run.
///
/// `error` mirrors the error string of the most recent record that carried
/// one, so "did this node fail" is answerable without scanning `records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunLog {
    pub node_id: String,
    pub node_name: String,
    pub records: Vec<WorkflowRunLogRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowRunLog {
    pub fn new(node_id: impl Into<String>, node_name: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            node_name: node_name.into(),
            records: Vec::new(),
            error: None,
        }
    }

    /// Append a record. A record without an error never clears `error`.
    pub fn push(&mut self, record: WorkflowRunLogRecord) {
        if let Some(err) = &record.error {
            self.error = Some(err.clone());
        }
        self.records.push(record);
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Shared, append-safe handle to one node's [`WorkflowRunLog`].
///
/// The owning processor is the only writer; observers (a progress stream,
/// the orchestrator) may take snapshots at any time. Every append is also
/// emitted as a `tracing` event.
#[derive(Debug, Clone)]
pub struct NodeLogger {
    log: Arc<RwLock<WorkflowRunLog>>,
}

impl NodeLogger {
    pub fn new(node: &WorkflowNode) -> Self {
        Self::for_node(&node.id, &node.name)
    }

    pub fn for_node(node_id: &str, node_name: &str) -> Self {
        Self {
            log: Arc::new(RwLock::new(WorkflowRunLog::new(node_id, node_name))),
        }
    }

    pub fn append(&self, level: LogLevel, content: impl Into<String>, err: Option<&str>) {
        let content = content.into();
        let node_id = {
            let mut log = self.log.write();
            log.push(WorkflowRunLogRecord {
                time: Utc::now(),
                level,
                content: content.clone(),
                error: err.map(str::to_owned),
            });
            log.node_id.clone()
        };

        // Emitted after the guard is released so subscribers never block readers.
        match level {
            LogLevel::Debug => debug!(node_id = %node_id, error = ?err, "{content}"),
            LogLevel::Info => info!(node_id = %node_id, error = ?err, "{content}"),
            LogLevel::Warn => warn!(node_id = %node_id, error = ?err, "{content}"),
            LogLevel::Error => error!(node_id = %node_id, error = ?err, "{content}"),
        }
    }

    pub fn info(&self, content: impl Into<String>) {
        self.append(LogLevel::Info, content, None);
    }

    pub fn warn(&self, content: impl Into<String>) {
        self.append(LogLevel::Warn, content, None);
    }

    /// Record a failure; sets the log's terminal `error`.
    pub fn error(&self, content: impl Into<String>, err: &impl ToString) {
        self.append(LogLevel::Error, content, Some(&err.to_string()));
    }

    /// Copy of the log as it stands now.
    pub fn snapshot(&self) -> WorkflowRunLog {
        self.log.read().clone()
    }

    pub fn is_failed(&self) -> bool {
        self.log.read().is_failed()
    }
}
