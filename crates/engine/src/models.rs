//! Workflow graph and run records.
//!
//! A workflow is a set of [`WorkflowNode`]s joined by typed edges. Both
//! serialise to the JSONB `graph` column of the `workflows` table; a run
//! keeps every node log it collected in the `logs` column of
//! `workflow_runs`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use nodes::WorkflowRunLog;

pub use nodes::models::WorkflowNode;

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Which outcome of the `from` node an edge follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Unconditional successor after the node succeeds.
    #[default]
    Next,
    /// Condition evaluated to true.
    OnTrue,
    /// Condition evaluated to false.
    OnFalse,
    /// Node succeeded; leads to an `execute_success` node.
    OnSuccess,
    /// Node failed; leads to an `execute_failure` node.
    OnFailure,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Next => "next",
            Self::OnTrue => "on_true",
            Self::OnFalse => "on_false",
            Self::OnSuccess => "on_success",
            Self::OnFailure => "on_failure",
        };
        f.write_str(s)
    }
}

/// Directed edge from one node to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(from: impl Into<String>, to: impl Into<String>, kind: EdgeKind) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            kind,
        }
    }

    pub fn next(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(from, to, EdgeKind::Next)
    }
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<Edge>,
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(name: impl Into<String>, nodes: Vec<WorkflowNode>, edges: Vec<Edge>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            nodes,
            edges,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// WorkflowRun
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// One execution of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    /// Node logs in execution order.
    pub logs: Vec<WorkflowRunLog>,
    /// First node failure, or the reason the run stopped.
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkflowRun {
    pub fn start(id: Uuid, workflow_id: Uuid) -> Self {
        Self {
            id,
            workflow_id,
            status: RunStatus::Running,
            logs: Vec::new(),
            error: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }

    /// Log of the given node, if it ran.
    pub fn log_of(&self, node_id: &str) -> Option<&WorkflowRunLog> {
        self.logs.iter().find(|l| l.node_id == node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edge_kind_defaults_to_next() {
        let edge: Edge = serde_json::from_value(json!({ "from": "a", "to": "b" })).unwrap();
        assert_eq!(edge.kind, EdgeKind::Next);

        let edge: Edge =
            serde_json::from_value(json!({ "from": "a", "to": "b", "kind": "on_failure" })).unwrap();
        assert_eq!(edge.kind, EdgeKind::OnFailure);
    }

    #[test]
    fn run_status_round_trips_through_text() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Succeeded,
            RunStatus::Failed,
            RunStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>(), Ok(status));
        }
        assert!(!RunStatus::Running.is_finished());
    }
}
