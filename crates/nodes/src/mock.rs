//! Test doubles for the external collaborators.
//!
//! Every mock records the calls it receives and returns a
//! programmer-specified result, so tests can assert both outcome and
//! interaction.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::collaborators::{
    AcmeClient, CertificateRequest, DeployResult, Deployer, DnsChallenge, DnsChallengeProvider,
    NotifyChannelSender, ObtainedCertificate, Propagation, UploadResult, Uploader,
};
use crate::certs::fixtures::{CERT_PEM, KEY_PEM};
use crate::deployer::{BindResult, CertificateBinder};
use crate::models::{Certificate, CertificateSource};
use crate::polling::{DeploymentProgress, DeploymentStatusSource};
use crate::{ProviderError, RunContext};

/// What a mock does when called.
#[derive(Debug, Clone)]
pub enum MockBehaviour<T> {
    /// Return a specific value.
    Return(T),
    /// Fail with a request error carrying this message.
    Fail(String),
    /// Block until the run is cancelled, then report cancellation.
    WaitForCancel,
}

impl<T: Clone> MockBehaviour<T> {
    async fn resolve(&self, ctx: &RunContext, call: &str) -> Result<T, ProviderError> {
        match self {
            Self::Return(v) => Ok(v.clone()),
            Self::Fail(msg) => Err(ProviderError::request(call, msg.clone())),
            Self::WaitForCancel => {
                ctx.cancelled().await;
                Err(ProviderError::Cancelled)
            }
        }
    }
}

/// A stored certificate as an apply node `workflow_node_id` would leave it,
/// carrying the bundled fixture material and a year of validity.
pub fn fixture_certificate(workflow_node_id: &str) -> Certificate {
    let now = Utc::now();
    Certificate {
        id: Uuid::new_v4(),
        source: CertificateSource::Workflow,
        san: "example.com;www.example.com".into(),
        certificate: CERT_PEM.to_owned(),
        private_key: KEY_PEM.to_owned(),
        issuer_certificate: String::new(),
        cert_url: String::new(),
        cert_stable_url: String::new(),
        workflow_id: Uuid::new_v4(),
        workflow_run_id: Uuid::new_v4(),
        workflow_node_id: workflow_node_id.to_owned(),
        workflow_output_id: None,
        expire_at: now + TimeDelta::days(365),
        created_at: now,
    }
}

// ---------------------------------------------------------------------------
// DNS / ACME
// ---------------------------------------------------------------------------

/// DNS provider that records presented and cleaned-up challenges.
#[derive(Debug, Default)]
pub struct MockDnsProvider {
    pub presented: Mutex<Vec<DnsChallenge>>,
    pub cleaned: Mutex<Vec<DnsChallenge>>,
    pub propagation: Propagation,
}

#[async_trait]
impl DnsChallengeProvider for MockDnsProvider {
    async fn present(&self, challenge: &DnsChallenge) -> Result<(), ProviderError> {
        self.presented.lock().push(challenge.clone());
        Ok(())
    }

    async fn clean_up(&self, challenge: &DnsChallenge) -> Result<(), ProviderError> {
        self.cleaned.lock().push(challenge.clone());
        Ok(())
    }

    fn propagation(&self) -> Propagation {
        self.propagation
    }
}

/// ACME client that walks the DNS provider through one challenge per domain
/// and then returns the configured result.
#[derive(Debug)]
pub struct MockAcmeClient {
    pub behaviour: MockBehaviour<ObtainedCertificate>,
    pub requests: Arc<Mutex<Vec<CertificateRequest>>>,
}

impl MockAcmeClient {
    pub fn issuing(certificate_pem: impl Into<String>, private_key_pem: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Return(ObtainedCertificate {
            certificate_pem: certificate_pem.into(),
            private_key_pem: private_key_pem.into(),
            issuer_certificate_pem: String::new(),
            cert_url: "https://acme.test/cert/1".into(),
            cert_stable_url: "https://acme.test/cert/1/stable".into(),
        }))
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Fail(msg.into()))
    }

    pub fn waiting_for_cancel() -> Self {
        Self::with(MockBehaviour::WaitForCancel)
    }

    fn with(behaviour: MockBehaviour<ObtainedCertificate>) -> Self {
        Self {
            behaviour,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl AcmeClient for MockAcmeClient {
    async fn obtain(
        &self,
        ctx: &RunContext,
        request: &CertificateRequest,
        dns: &dyn DnsChallengeProvider,
    ) -> Result<ObtainedCertificate, ProviderError> {
        self.requests.lock().push(request.clone());

        for domain in &request.domains {
            let challenge = DnsChallenge {
                domain: domain.clone(),
                token: format!("token-{domain}"),
                key_authorization: format!("keyauth-{domain}"),
            };
            dns.present(&challenge).await?;
            dns.clean_up(&challenge).await?;
        }

        self.behaviour.resolve(ctx, "acme order").await
    }
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MockDeployer {
    pub behaviour: MockBehaviour<DeployResult>,
    /// Certificate PEMs seen by this deployer (in call order).
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockDeployer {
    pub fn succeeding() -> Self {
        Self::with(MockBehaviour::Return(DeployResult::default()))
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self::with(MockBehaviour::Fail(msg.into()))
    }

    pub fn waiting_for_cancel() -> Self {
        Self::with(MockBehaviour::WaitForCancel)
    }

    fn with(behaviour: MockBehaviour<DeployResult>) -> Self {
        Self {
            behaviour,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl Deployer for MockDeployer {
    async fn deploy(
        &self,
        ctx: &RunContext,
        cert_pem: &str,
        _key_pem: &str,
    ) -> Result<DeployResult, ProviderError> {
        self.calls.lock().push(cert_pem.to_owned());
        self.behaviour.resolve(ctx, "deploy").await
    }
}

#[derive(Debug)]
pub struct MockUploader {
    pub behaviour: MockBehaviour<UploadResult>,
    pub calls: Arc<Mutex<usize>>,
}

impl MockUploader {
    pub fn returning(cert_id: impl Into<String>) -> Self {
        Self {
            behaviour: MockBehaviour::Return(UploadResult {
                cert_id: cert_id.into(),
                cert_name: None,
            }),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            behaviour: MockBehaviour::Fail(msg.into()),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Uploader for MockUploader {
    async fn upload(
        &self,
        ctx: &RunContext,
        _cert_pem: &str,
        _key_pem: &str,
    ) -> Result<UploadResult, ProviderError> {
        *self.calls.lock() += 1;
        self.behaviour.resolve(ctx, "upload certificate").await
    }
}

#[derive(Debug)]
pub struct MockBinder {
    pub record_id: Option<String>,
    pub bound: Arc<Mutex<Vec<String>>>,
}

impl MockBinder {
    /// Binds immediately; nothing to poll.
    pub fn synchronous() -> Self {
        Self {
            record_id: None,
            bound: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns a deployment record that must be polled.
    pub fn with_record(record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            bound: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn bound_ids(&self) -> Vec<String> {
        self.bound.lock().clone()
    }
}

#[async_trait]
impl CertificateBinder for MockBinder {
    async fn bind(&self, _ctx: &RunContext, cert_id: &str) -> Result<BindResult, ProviderError> {
        self.bound.lock().push(cert_id.to_owned());
        Ok(BindResult {
            record_id: self.record_id.clone(),
        })
    }
}

/// Replays a fixed sequence of progress reports; the last one repeats.
#[derive(Debug)]
pub struct MockStatusSource {
    sequence: Vec<DeploymentProgress>,
    calls: Mutex<usize>,
}

impl MockStatusSource {
    pub fn new(sequence: Vec<DeploymentProgress>) -> Self {
        Self {
            sequence,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl DeploymentStatusSource for MockStatusSource {
    async fn fetch(
        &self,
        _ctx: &RunContext,
        record_id: &str,
    ) -> Result<DeploymentProgress, ProviderError> {
        let mut calls = self.calls.lock();
        let index = (*calls).min(self.sequence.len().saturating_sub(1));
        *calls += 1;
        self.sequence.get(index).copied().ok_or_else(|| {
            ProviderError::request("describe deployment record", format!("no record {record_id}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub subject: String,
    pub message: String,
    pub channel: String,
    pub config: Map<String, Value>,
}

#[derive(Debug, Default)]
pub struct MockNotifier {
    pub fail_with: Option<String>,
    pub sent: Arc<Mutex<Vec<SentNotification>>>,
}

impl MockNotifier {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn failing(msg: impl Into<String>) -> Self {
        Self {
            fail_with: Some(msg.into()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotifyChannelSender for MockNotifier {
    async fn send(
        &self,
        subject: &str,
        message: &str,
        channel: &str,
        config: &Map<String, Value>,
    ) -> Result<(), ProviderError> {
        if let Some(msg) = &self.fail_with {
            return Err(ProviderError::request(format!("{channel}.send"), msg.clone()));
        }
        self.sent.lock().push(SentNotification {
            subject: subject.to_owned(),
            message: message.to_owned(),
            channel: channel.to_owned(),
            config: config.clone(),
        });
        Ok(())
    }
}
