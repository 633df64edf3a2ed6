//! Graph validation — run this before persisting or executing a workflow.
//!
//! Rules enforced:
//! 1. Node IDs must be unique within the workflow.
//! 2. Every edge must reference valid node IDs (both `from` and `to`).
//! 3. Exactly one start node, with no inbound edge.
//! 4. At most one outgoing edge per (node, edge kind).
//! 5. Branch edges fit their endpoints: `on_true`/`on_false` leave condition
//!    nodes only, condition nodes leave through nothing else, `on_success`
//!    enters an `execute_success` node and `on_failure` an `execute_failure`
//!    node.
//! 6. The directed graph must be acyclic (topological sort must succeed).
//!
//! Returns a [`WorkflowGraph`] for successor lookups on success.

use std::collections::{HashMap, VecDeque};

use nodes::models::NodeType;

use crate::models::{EdgeKind, Workflow, WorkflowNode};
use crate::EngineError;

/// A validated workflow, indexed for the runner.
#[derive(Debug)]
pub struct WorkflowGraph<'a> {
    start: &'a WorkflowNode,
    nodes: HashMap<&'a str, &'a WorkflowNode>,
    successors: HashMap<&'a str, HashMap<EdgeKind, &'a str>>,
    order: Vec<&'a str>,
}

impl<'a> WorkflowGraph<'a> {
    pub fn start(&self) -> &'a WorkflowNode {
        self.start
    }

    pub fn node(&self, id: &str) -> Option<&'a WorkflowNode> {
        self.nodes.get(id).copied()
    }

    /// Target of the `kind` edge leaving `node_id`, if any.
    pub fn successor(&self, node_id: &str, kind: EdgeKind) -> Option<&'a WorkflowNode> {
        self.successors
            .get(node_id)
            .and_then(|out| out.get(&kind))
            .and_then(|to| self.node(to))
    }

    /// Node ids in a topological order.
    pub fn order(&self) -> &[&'a str] {
        &self.order
    }
}

/// Validate the workflow's graph.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::MissingStartNode`] / [`EngineError::MultipleStartNodes`].
/// - [`EngineError::DuplicateEdge`] / [`EngineError::InvalidEdge`] for edges
///   that do not fit their endpoints.
/// - [`EngineError::CycleDetected`] if the graph is not acyclic.
pub fn validate_graph(workflow: &Workflow) -> Result<WorkflowGraph<'_>, EngineError> {
    // -----------------------------------------------------------------------
    // 1. Ensure node IDs are unique
    // -----------------------------------------------------------------------
    let mut nodes: HashMap<&str, &WorkflowNode> = HashMap::with_capacity(workflow.nodes.len());
    for node in &workflow.nodes {
        if nodes.insert(node.id.as_str(), node).is_some() {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    // -----------------------------------------------------------------------
    // 2. Validate edge endpoints
    // -----------------------------------------------------------------------
    for edge in &workflow.edges {
        if !nodes.contains_key(edge.from.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.from.clone(),
                side: "from",
            });
        }
        if !nodes.contains_key(edge.to.as_str()) {
            return Err(EngineError::UnknownNodeReference {
                node_id: edge.to.clone(),
                side: "to",
            });
        }
    }

    // -----------------------------------------------------------------------
    // 3. Exactly one start node
    // -----------------------------------------------------------------------
    let starts: Vec<&WorkflowNode> = workflow
        .nodes
        .iter()
        .filter(|n| n.kind() == Some(NodeType::Start))
        .collect();
    let start = match starts.as_slice() {
        [] => return Err(EngineError::MissingStartNode),
        [only] => *only,
        many => return Err(EngineError::MultipleStartNodes(many.len())),
    };

    // -----------------------------------------------------------------------
    // 4 + 5. Edge kinds
    // -----------------------------------------------------------------------
    let mut successors: HashMap<&str, HashMap<EdgeKind, &str>> = HashMap::new();
    for edge in &workflow.edges {
        let invalid = |reason: &'static str| EngineError::InvalidEdge {
            from: edge.from.clone(),
            to: edge.to.clone(),
            kind: edge.kind,
            reason,
        };

        let from_kind = nodes[edge.from.as_str()].kind();
        let to_kind = nodes[edge.to.as_str()].kind();
        let from_condition = from_kind == Some(NodeType::Condition);

        if edge.to == start.id {
            return Err(invalid("the start node cannot have inbound edges"));
        }
        match edge.kind {
            EdgeKind::OnTrue | EdgeKind::OnFalse if !from_condition => {
                return Err(invalid("branch edges must leave a condition node"));
            }
            EdgeKind::Next | EdgeKind::OnSuccess | EdgeKind::OnFailure if from_condition => {
                return Err(invalid("condition nodes continue through on_true/on_false"));
            }
            EdgeKind::OnSuccess if to_kind != Some(NodeType::ExecuteSuccess) => {
                return Err(invalid("on_success must lead to an execute_success node"));
            }
            EdgeKind::OnFailure if to_kind != Some(NodeType::ExecuteFailure) => {
                return Err(invalid("on_failure must lead to an execute_failure node"));
            }
            _ => {}
        }

        if successors
            .entry(edge.from.as_str())
            .or_default()
            .insert(edge.kind, edge.to.as_str())
            .is_some()
        {
            return Err(EngineError::DuplicateEdge {
                node_id: edge.from.clone(),
                kind: edge.kind,
            });
        }
    }

    // -----------------------------------------------------------------------
    // 6. Topological sort (Kahn's algorithm)
    // -----------------------------------------------------------------------
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = HashMap::new();

    for node in &workflow.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }

    for edge in &workflow.edges {
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
        *in_degree.entry(edge.to.as_str()).or_insert(0) += 1;
    }

    // Declaration order keeps the sort deterministic.
    let mut queue: VecDeque<&str> = workflow
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| in_degree[id] == 0)
        .collect();

    let mut order: Vec<&str> = Vec::with_capacity(workflow.nodes.len());

    while let Some(node_id) = queue.pop_front() {
        order.push(node_id);

        if let Some(neighbours) = adjacency.get(node_id) {
            for &neighbour in neighbours {
                if let Some(deg) = in_degree.get_mut(neighbour) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(neighbour);
                    }
                }
            }
        }
    }

    // If we didn't visit every node the graph contains a cycle.
    if order.len() != workflow.nodes.len() {
        return Err(EngineError::CycleDetected);
    }

    Ok(WorkflowGraph {
        start,
        nodes,
        successors,
        order,
    })
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Edge;
    use serde_json::Value;

    fn node(id: &str, kind: NodeType) -> WorkflowNode {
        WorkflowNode::new(id, id, kind, Value::Null)
    }

    fn workflow(nodes: Vec<WorkflowNode>, edges: Vec<Edge>) -> Workflow {
        Workflow::new("test", nodes, edges)
    }

    #[test]
    fn linear_graph_is_sorted_from_start() {
        // start → apply → deploy
        let wf = workflow(
            vec![
                node("deploy", NodeType::Deploy),
                node("apply", NodeType::Apply),
                node("start", NodeType::Start),
            ],
            vec![Edge::next("start", "apply"), Edge::next("apply", "deploy")],
        );

        let graph = validate_graph(&wf).expect("should be valid");
        assert_eq!(graph.start().id, "start");
        assert_eq!(graph.order(), ["start", "apply", "deploy"]);
        assert_eq!(graph.successor("apply", EdgeKind::Next).map(|n| n.id.as_str()), Some("deploy"));
        assert!(graph.successor("deploy", EdgeKind::Next).is_none());
    }

    #[test]
    fn condition_branches_rejoin() {
        //        start
        //          |
        //        cond
        //       /    \
        //   notify  upload
        //       \    /
        //        ok
        let wf = workflow(
            vec![
                node("start", NodeType::Start),
                node("cond", NodeType::Condition),
                node("notify", NodeType::Notify),
                node("upload", NodeType::Upload),
                node("ok", NodeType::ExecuteSuccess),
            ],
            vec![
                Edge::next("start", "cond"),
                Edge::new("cond", "notify", EdgeKind::OnTrue),
                Edge::new("cond", "upload", EdgeKind::OnFalse),
                Edge::new("notify", "ok", EdgeKind::OnSuccess),
                Edge::new("upload", "ok", EdgeKind::OnSuccess),
            ],
        );

        let graph = validate_graph(&wf).expect("should be valid");
        assert_eq!(graph.order().first(), Some(&"start"));
        assert_eq!(graph.order().last(), Some(&"ok"));
        assert_eq!(
            graph.successor("cond", EdgeKind::OnFalse).map(|n| n.id.as_str()),
            Some("upload")
        );
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let wf = workflow(vec![node("start", NodeType::Start), node("start", NodeType::Notify)], vec![]);
        assert!(matches!(
            validate_graph(&wf),
            Err(EngineError::DuplicateNodeId(id)) if id == "start"
        ));
    }

    #[test]
    fn edge_referencing_missing_node_is_rejected() {
        let wf = workflow(vec![node("start", NodeType::Start)], vec![Edge::next("start", "ghost")]);
        assert!(matches!(
            validate_graph(&wf),
            Err(EngineError::UnknownNodeReference { node_id, side: "to" }) if node_id == "ghost"
        ));
    }

    #[test]
    fn start_node_count_is_checked() {
        let none = workflow(vec![node("a", NodeType::Apply)], vec![]);
        assert!(matches!(validate_graph(&none), Err(EngineError::MissingStartNode)));

        let two = workflow(vec![node("a", NodeType::Start), node("b", NodeType::Start)], vec![]);
        assert!(matches!(validate_graph(&two), Err(EngineError::MultipleStartNodes(2))));
    }

    #[test]
    fn branch_edges_must_fit_their_endpoints() {
        let from_apply = workflow(
            vec![node("start", NodeType::Start), node("apply", NodeType::Apply), node("n", NodeType::Notify)],
            vec![Edge::next("start", "apply"), Edge::new("apply", "n", EdgeKind::OnTrue)],
        );
        assert!(matches!(validate_graph(&from_apply), Err(EngineError::InvalidEdge { .. })));

        let failure_to_notify = workflow(
            vec![node("start", NodeType::Start), node("apply", NodeType::Apply), node("n", NodeType::Notify)],
            vec![Edge::next("start", "apply"), Edge::new("apply", "n", EdgeKind::OnFailure)],
        );
        assert!(matches!(
            validate_graph(&failure_to_notify),
            Err(EngineError::InvalidEdge { kind: EdgeKind::OnFailure, .. })
        ));

        let into_start = workflow(
            vec![node("start", NodeType::Start), node("apply", NodeType::Apply)],
            vec![Edge::next("start", "apply"), Edge::next("apply", "start")],
        );
        assert!(matches!(validate_graph(&into_start), Err(EngineError::InvalidEdge { .. })));
    }

    #[test]
    fn two_next_edges_from_one_node_are_rejected() {
        let wf = workflow(
            vec![node("start", NodeType::Start), node("a", NodeType::Apply), node("b", NodeType::Upload)],
            vec![Edge::next("start", "a"), Edge::next("start", "b")],
        );
        assert!(matches!(
            validate_graph(&wf),
            Err(EngineError::DuplicateEdge { node_id, kind: EdgeKind::Next }) if node_id == "start"
        ));
    }

    #[test]
    fn cycle_is_detected() {
        // start → a → b → a  (cycle!)
        let wf = workflow(
            vec![node("start", NodeType::Start), node("a", NodeType::Apply), node("b", NodeType::Deploy)],
            vec![
                Edge::next("start", "a"),
                Edge::next("a", "b"),
                Edge::new("b", "a", EdgeKind::Next), // back-edge
            ],
        );
        assert!(matches!(validate_graph(&wf), Err(EngineError::CycleDetected)));
    }

    #[test]
    fn lone_start_node_is_valid() {
        let wf = workflow(vec![node("solo", NodeType::Start)], vec![]);
        let graph = validate_graph(&wf).expect("single node should be valid");
        assert_eq!(graph.order(), ["solo"]);
    }
}
