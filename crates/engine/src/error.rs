//! Engine-level error types.

use thiserror::Error;

use nodes::RepositoryError;

use crate::models::EdgeKind;

/// Errors produced by the workflow engine (graph validation + run store).
///
/// Node failures are not engine errors: they are recorded in the node log
/// and in the run, and steer the walk onto the failure branch.
#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors ------

    /// Two or more nodes share the same ID.
    #[error("duplicate node ID: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node ID that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference {
        node_id: String,
        side: &'static str,
    },

    #[error("workflow has no start node")]
    MissingStartNode,

    #[error("workflow has {0} start nodes, expected exactly one")]
    MultipleStartNodes(usize),

    /// A node has two outgoing edges of the same kind.
    #[error("node '{node_id}' has more than one '{kind}' edge")]
    DuplicateEdge { node_id: String, kind: EdgeKind },

    /// An edge kind that does not fit its endpoints.
    #[error("invalid '{kind}' edge {from} -> {to}: {reason}")]
    InvalidEdge {
        from: String,
        to: String,
        kind: EdgeKind,
        reason: &'static str,
    },

    /// Topological sort detected a cycle.
    #[error("workflow graph contains a cycle")]
    CycleDetected,

    // ------ Execution errors ------

    /// The run store rejected a create or update.
    #[error("run store operation '{operation}' failed: {source}")]
    RunStore {
        operation: &'static str,
        #[source]
        source: RepositoryError,
    },
}
