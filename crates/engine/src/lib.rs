//! `engine` crate — workflow graph model, graph validation, and the runner
//! that walks a workflow node by node.

pub mod dag;
pub mod error;
pub mod executor;
pub mod models;
pub mod store;

pub use dag::{validate_graph, WorkflowGraph};
pub use error::EngineError;
pub use executor::WorkflowRunner;
pub use models::{Edge, EdgeKind, RunStatus, Workflow, WorkflowRun};
pub use store::{MemoryRunRepository, WorkflowRunRepository};
