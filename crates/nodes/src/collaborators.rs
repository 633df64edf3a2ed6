//! Contracts processors use to reach storage and the outside world.
//!
//! Implementations are shared across concurrent runs and must be safe for
//! concurrent use. Each node writes only the records keyed by its own node
//! id, so single-record atomicity is all that is required.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Access, Certificate, CertificateStatistics, Settings, WorkflowOutput};
use crate::{ProviderError, RepositoryError, RunContext};

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[async_trait]
pub trait CertificateRepository: Send + Sync {
    /// Latest certificate produced by the given workflow node.
    async fn get_by_workflow_node_id(&self, node_id: &str) -> Result<Certificate, RepositoryError>;
}

#[async_trait]
pub trait WorkflowOutputRepository: Send + Sync {
    /// Latest output recorded for the given workflow node.
    async fn get_by_node_id(&self, node_id: &str) -> Result<WorkflowOutput, RepositoryError>;

    async fn save(&self, output: WorkflowOutput) -> Result<WorkflowOutput, RepositoryError>;

    /// Persist a certificate and the output referencing it as one unit.
    /// The stored output carries a `certificate` entry pointing at the
    /// certificate, and the certificate carries the output id.
    async fn save_with_certificate(
        &self,
        output: WorkflowOutput,
        certificate: Certificate,
    ) -> Result<WorkflowOutput, RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn get_by_name(&self, name: &str) -> Result<Settings, RepositoryError>;
}

#[async_trait]
pub trait AccessRepository: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Access, RepositoryError>;
}

#[async_trait]
pub trait StatisticsRepository: Send + Sync {
    /// Count stored certificates as of `now`.
    async fn certificate_statistics(
        &self,
        now: DateTime<Utc>,
    ) -> Result<CertificateStatistics, RepositoryError>;
}

// ---------------------------------------------------------------------------
// ACME
// ---------------------------------------------------------------------------

/// A pending DNS-01 challenge for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsChallenge {
    pub domain: String,
    pub token: String,
    pub key_authorization: String,
}

/// Adapter-level tunables for TXT record propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagation {
    pub timeout: Duration,
    pub interval: Duration,
    pub ttl: u32,
}

impl Default for Propagation {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(2),
            ttl: 120,
        }
    }
}

/// Creates and removes the TXT record of a DNS-01 challenge.
/// One implementation per DNS registrar.
#[async_trait]
pub trait DnsChallengeProvider: Send + Sync {
    async fn present(&self, challenge: &DnsChallenge) -> Result<(), ProviderError>;

    async fn clean_up(&self, challenge: &DnsChallenge) -> Result<(), ProviderError>;

    fn propagation(&self) -> Propagation {
        Propagation::default()
    }
}

/// Parameters of one certificate order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateRequest {
    pub domains: Vec<String>,
    pub contact_email: String,
    pub key_algorithm: String,
    pub nameservers: Vec<String>,
}

/// Material returned by a finalized ACME order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObtainedCertificate {
    /// Leaf certificate, optionally followed by its chain.
    pub certificate_pem: String,
    pub private_key_pem: String,
    pub issuer_certificate_pem: String,
    pub cert_url: String,
    pub cert_stable_url: String,
}

/// ACME protocol client. Drives account registration, challenge creation
/// through the DNS provider, propagation wait, validation and finalization.
/// Implementations must honour `ctx` cancellation and return
/// [`ProviderError::Cancelled`] when it fires.
#[async_trait]
pub trait AcmeClient: Send + Sync {
    async fn obtain(
        &self,
        ctx: &RunContext,
        request: &CertificateRequest,
        dns: &dyn DnsChallengeProvider,
    ) -> Result<ObtainedCertificate, ProviderError>;
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Pushes certificate material to one kind of deploy target.
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(
        &self,
        ctx: &RunContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<DeployResult, ProviderError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub cert_id: String,
    #[serde(default)]
    pub cert_name: Option<String>,
}

/// Registers certificate material with a vendor certificate service and
/// returns a stable handle. Uploading identical material twice is safe.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        ctx: &RunContext,
        cert_pem: &str,
        key_pem: &str,
    ) -> Result<UploadResult, ProviderError>;
}

// ---------------------------------------------------------------------------
// Notification & conditions
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NotifyChannelSender: Send + Sync {
    async fn send(
        &self,
        subject: &str,
        message: &str,
        channel: &str,
        config: &Map<String, Value>,
    ) -> Result<(), ProviderError>;
}

/// Opaque predicate evaluator used by condition nodes.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(&self, expression: &str, input: &Value) -> Result<bool, String>;
}

/// Evaluates an expression as a JSON pointer into the run input and tests the
/// value for truthiness. A leading `!` negates. An empty expression is true.
///
/// Truthy: `true`, non-zero numbers, non-empty strings, arrays and objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerEvaluator;

impl ConditionEvaluator for PointerEvaluator {
    fn evaluate(&self, expression: &str, input: &Value) -> Result<bool, String> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Ok(true);
        }

        let (negate, pointer) = match expression.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, expression),
        };
        if !pointer.starts_with('/') {
            return Err(format!("expression '{expression}' is not a JSON pointer"));
        }

        let truthy = match input.pointer(pointer) {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(Value::Object(o)) => !o.is_empty(),
        };

        Ok(truthy != negate)
    }
}
