//! `nodes` crate — the certificate workflow node processors.
//!
//! Every node kind implements [`NodeProcessor`]. The [`NodeDispatcher`] turns
//! a [`WorkflowNode`](models::WorkflowNode) into a fresh processor bound to
//! the shared [`Collaborators`]; the engine crate drives them along the
//! workflow graph.

pub mod certs;
pub mod collaborators;
pub mod context;
pub mod deployer;
pub mod dispatcher;
pub mod error;
pub mod log;
pub mod memory;
pub mod mock;
pub mod models;
pub mod polling;
pub mod processors;
pub mod registry;
pub mod traits;

pub use context::RunContext;
pub use dispatcher::{Collaborators, NodeDispatcher};
pub use error::{DispatchError, NodeError, ProviderError, RepositoryError};
pub use log::{LogLevel, NodeLogger, WorkflowRunLog, WorkflowRunLogRecord};
pub use traits::{NodeOutcome, NodeProcessor};
