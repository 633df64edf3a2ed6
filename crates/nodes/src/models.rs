//! Domain models read and written by node processors.
//!
//! Nodes are immutable for the duration of a run. Certificates are never
//! mutated once created; reissuance produces a new record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::NodeError;

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Start,
    Condition,
    Apply,
    Upload,
    Deploy,
    Notify,
    ExecuteSuccess,
    ExecuteFailure,
}

impl NodeType {
    pub const ALL: [NodeType; 8] = [
        Self::Start,
        Self::Condition,
        Self::Apply,
        Self::Upload,
        Self::Deploy,
        Self::Notify,
        Self::ExecuteSuccess,
        Self::ExecuteFailure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Condition => "condition",
            Self::Apply => "apply",
            Self::Upload => "upload",
            Self::Deploy => "deploy",
            Self::Notify => "notify",
            Self::ExecuteSuccess => "execute_success",
            Self::ExecuteFailure => "execute_failure",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown node type: {s}"))
    }
}

// ---------------------------------------------------------------------------
// WorkflowNode
// ---------------------------------------------------------------------------

/// One vertex of a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique identifier within the workflow (referenced by edges).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Type tag selecting the processor. Kept as the raw tag so that unknown
    /// kinds survive decoding and fail at dispatch.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Kind-specific configuration payload.
    #[serde(default)]
    pub config: Value,
}

impl WorkflowNode {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: NodeType,
        config: Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: node_type.as_str().to_owned(),
            config,
        }
    }

    pub fn kind(&self) -> Option<NodeType> {
        self.node_type.parse().ok()
    }

    /// Decode the configuration payload into the kind's config struct.
    pub fn config_as<T: DeserializeOwned>(&self) -> Result<T, NodeError> {
        let value = if self.config.is_null() {
            Value::Object(Map::new())
        } else {
            self.config.clone()
        };
        serde_json::from_value(value).map_err(|e| NodeError::InvalidConfig(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Kind-specific configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConditionNodeConfig {
    pub expression: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApplyNodeConfig {
    /// Semicolon-separated domain list.
    pub domains: String,
    pub contact_email: String,
    /// DNS provider name in the provider registry.
    pub provider: String,
    pub provider_access_id: String,
    /// Adapter tunables such as `dnsPropagationTimeout` and `dnsTTL`.
    pub provider_config: Value,
    pub key_algorithm: String,
    /// Semicolon-separated recursive nameservers used for propagation checks.
    pub nameservers: String,
    /// Renew when the current certificate expires within this many days.
    /// Zero means the default validity window.
    pub skip_before_expiry_days: i64,
}

impl ApplyNodeConfig {
    pub fn domain_list(&self) -> Vec<String> {
        split_list(&self.domains)
    }

    pub fn nameserver_list(&self) -> Vec<String> {
        split_list(&self.nameservers)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        if self.domain_list().is_empty() {
            return Err(NodeError::InvalidConfig("`domains` is required".into()));
        }
        if self.contact_email.trim().is_empty() {
            return Err(NodeError::InvalidConfig("`contactEmail` is required".into()));
        }
        if self.provider.trim().is_empty() {
            return Err(NodeError::InvalidConfig("`provider` is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UploadNodeConfig {
    pub certificate: String,
    pub private_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeployNodeConfig {
    /// Reference to an upstream output, `<nodeId>#certificate`.
    pub certificate: String,
    /// Deploy target name in the provider registry.
    pub provider: String,
    pub provider_access_id: String,
    pub provider_config: Value,
    /// Skip when the previous deploy of the same certificate succeeded.
    pub skip_on_last_succeeded: bool,
}

impl DeployNodeConfig {
    /// Node id of the upstream node that produced the certificate.
    pub fn source_node_id(&self) -> Result<&str, NodeError> {
        let source = self
            .certificate
            .split('#')
            .next()
            .map(str::trim)
            .unwrap_or_default();
        if source.is_empty() {
            return Err(NodeError::InvalidConfig("`certificate` is required".into()));
        }
        Ok(source)
    }

    pub fn validate(&self) -> Result<(), NodeError> {
        self.source_node_id()?;
        if self.provider.trim().is_empty() {
            return Err(NodeError::InvalidConfig("`provider` is required".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotifyNodeConfig {
    pub channel: String,
    pub subject: String,
    pub message: String,
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// Certificates expiring within this many days are "expiring soon".
pub const VALIDITY_WINDOW_DAYS: i64 = 10;

pub fn validity_window() -> TimeDelta {
    TimeDelta::days(VALIDITY_WINDOW_DAYS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateSource {
    /// Issued through an ACME order by an apply node.
    Workflow,
    /// Supplied directly by an upload node.
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateStatus {
    Valid,
    ExpiringSoon,
    Expired,
}

/// An issued or uploaded certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub source: CertificateSource,
    /// Semicolon-separated subject alternative names.
    pub san: String,
    pub certificate: String,
    pub private_key: String,
    pub issuer_certificate: String,
    pub cert_url: String,
    pub cert_stable_url: String,
    pub workflow_id: Uuid,
    pub workflow_run_id: Uuid,
    pub workflow_node_id: String,
    pub workflow_output_id: Option<Uuid>,
    pub expire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Certificate {
    pub fn status_at(&self, now: DateTime<Utc>) -> CertificateStatus {
        self.status_within(now, validity_window())
    }

    pub fn status_within(&self, now: DateTime<Utc>, window: TimeDelta) -> CertificateStatus {
        if self.expire_at <= now {
            CertificateStatus::Expired
        } else if self.expire_at - now < window {
            CertificateStatus::ExpiringSoon
        } else {
            CertificateStatus::Valid
        }
    }

    pub fn san_list(&self) -> Vec<String> {
        split_list(&self.san)
    }
}

/// Certificate counts by expiry status, classified with the validity window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatistics {
    pub total: u64,
    pub expiring_soon: u64,
    pub expired: u64,
}

impl CertificateStatistics {
    pub fn tally<'a>(
        certificates: impl IntoIterator<Item = &'a Certificate>,
        now: DateTime<Utc>,
    ) -> Self {
        certificates
            .into_iter()
            .fold(Self::default(), |mut stats, certificate| {
                stats.total += 1;
                match certificate.status_at(now) {
                    CertificateStatus::ExpiringSoon => stats.expiring_soon += 1,
                    CertificateStatus::Expired => stats.expired += 1,
                    CertificateStatus::Valid => {}
                }
                stats
            })
    }
}

// ---------------------------------------------------------------------------
// WorkflowOutput
// ---------------------------------------------------------------------------

pub const OUTPUT_CERTIFICATE: &str = "certificate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

/// Durable result a node leaves for downstream nodes and later runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutput {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub run_id: Uuid,
    pub node_id: String,
    /// Node configuration at the time the output was produced.
    pub node_config: Value,
    pub outputs: Vec<OutputEntry>,
    pub succeeded: bool,
    pub created_at: DateTime<Utc>,
}

impl WorkflowOutput {
    pub fn new(workflow_id: Uuid, run_id: Uuid, node: &WorkflowNode) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            run_id,
            node_id: node.id.clone(),
            node_config: node.config.clone(),
            outputs: Vec::new(),
            succeeded: true,
            created_at: Utc::now(),
        }
    }

    /// Mark the output as the record of a failed attempt.
    pub fn failed(mut self) -> Self {
        self.succeeded = false;
        self
    }

    pub fn with_certificate_ref(mut self, certificate_id: Uuid) -> Self {
        self.outputs.retain(|o| o.name != OUTPUT_CERTIFICATE);
        self.outputs.push(OutputEntry {
            name: OUTPUT_CERTIFICATE.to_owned(),
            kind: OUTPUT_CERTIFICATE.to_owned(),
            value: certificate_id.to_string(),
        });
        self
    }

    /// Certificate id this output points at, if any.
    pub fn certificate_ref(&self) -> Option<Uuid> {
        self.outputs
            .iter()
            .find(|o| o.name == OUTPUT_CERTIFICATE)
            .and_then(|o| o.value.parse().ok())
    }
}

// ---------------------------------------------------------------------------
// Settings & Access
// ---------------------------------------------------------------------------

pub const SETTINGS_NOTIFY_CHANNELS: &str = "notifyChannels";

/// A named configuration blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: Uuid,
    pub name: String,
    pub content: Value,
    pub updated_at: DateTime<Utc>,
}

impl Settings {
    pub fn new(name: impl Into<String>, content: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            content,
            updated_at: Utc::now(),
        }
    }

    /// Configuration of one notify channel in a `notifyChannels` blob.
    ///
    /// Fails when the channel is absent, is not an object, or carries
    /// `"enabled": false`.
    pub fn notify_channel_config(&self, channel: &str) -> Result<Map<String, Value>, String> {
        let config = self
            .content
            .get(channel)
            .ok_or_else(|| format!("channel '{channel}' not found in settings"))?
            .as_object()
            .ok_or_else(|| format!("channel '{channel}' config is not an object"))?;

        if config.get("enabled").and_then(Value::as_bool) == Some(false) {
            return Err(format!("channel '{channel}' is disabled"));
        }

        Ok(config.clone())
    }
}

/// Stored credentials for a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Access {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub config: Value,
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn certificate_expiring_at(expire_at: DateTime<Utc>) -> Certificate {
        Certificate {
            id: Uuid::new_v4(),
            source: CertificateSource::Workflow,
            san: "example.com".into(),
            certificate: String::new(),
            private_key: String::new(),
            issuer_certificate: String::new(),
            cert_url: String::new(),
            cert_stable_url: String::new(),
            workflow_id: Uuid::new_v4(),
            workflow_run_id: Uuid::new_v4(),
            workflow_node_id: "apply".into(),
            workflow_output_id: None,
            expire_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn node_type_tags_round_trip() {
        for kind in NodeType::ALL {
            assert_eq!(kind.as_str().parse::<NodeType>(), Ok(kind));
        }
        assert!("webhook".parse::<NodeType>().is_err());
    }

    #[test]
    fn certificate_validity_classification() {
        let now = Utc::now();

        let soon = certificate_expiring_at(now + TimeDelta::days(9));
        assert_eq!(soon.status_at(now), CertificateStatus::ExpiringSoon);

        let later = certificate_expiring_at(now + TimeDelta::days(11));
        assert_eq!(later.status_at(now), CertificateStatus::Valid);

        let past = certificate_expiring_at(now - TimeDelta::days(1));
        assert_eq!(past.status_at(now), CertificateStatus::Expired);
    }

    #[test]
    fn statistics_follow_the_validity_window() {
        let now = Utc::now();
        let certificates = vec![
            certificate_expiring_at(now + TimeDelta::days(90)),
            certificate_expiring_at(now + TimeDelta::days(3)),
            certificate_expiring_at(now + TimeDelta::days(9)),
            certificate_expiring_at(now - TimeDelta::days(2)),
            certificate_expiring_at(now),
        ];

        let stats = CertificateStatistics::tally(&certificates, now);

        assert_eq!(
            stats,
            CertificateStatistics {
                total: 5,
                expiring_soon: 2,
                expired: 2,
            }
        );
        assert_eq!(
            CertificateStatistics::tally(std::iter::empty(), now),
            CertificateStatistics::default()
        );
    }

    #[test]
    fn null_config_decodes_to_defaults() {
        let node = WorkflowNode::new("n", "Notify", NodeType::Notify, Value::Null);
        let config: NotifyNodeConfig = node.config_as().unwrap();
        assert_eq!(config, NotifyNodeConfig::default());
    }

    #[test]
    fn malformed_config_is_a_config_error() {
        let node = WorkflowNode::new("n", "Apply", NodeType::Apply, json!({ "domains": 42 }));
        let err = node.config_as::<ApplyNodeConfig>().unwrap_err();
        assert!(matches!(err, NodeError::InvalidConfig(_)));
    }

    #[test]
    fn apply_config_requires_domains_email_and_provider() {
        let mut config = ApplyNodeConfig {
            domains: " example.com ; ;www.example.com".into(),
            contact_email: "ops@example.com".into(),
            provider: "cloudflare".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.domain_list(), vec!["example.com", "www.example.com"]);

        config.provider.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn deploy_config_resolves_source_node() {
        let config = DeployNodeConfig {
            certificate: "apply-1#certificate".into(),
            provider: "local".into(),
            ..Default::default()
        };
        assert_eq!(config.source_node_id().unwrap(), "apply-1");

        let missing = DeployNodeConfig::default();
        assert!(missing.validate().is_err());
    }

    #[test]
    fn output_certificate_ref_is_replaced() {
        let node = WorkflowNode::new("a", "Apply", NodeType::Apply, json!({}));
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let output = WorkflowOutput::new(Uuid::new_v4(), Uuid::new_v4(), &node)
            .with_certificate_ref(first)
            .with_certificate_ref(second);

        assert_eq!(output.outputs.len(), 1);
        assert_eq!(output.certificate_ref(), Some(second));
    }

    #[test]
    fn notify_channel_lookup() {
        let settings = Settings::new(
            SETTINGS_NOTIFY_CHANNELS,
            json!({
                "webhook": { "enabled": true, "url": "https://hooks.example.com" },
                "email": { "enabled": false },
            }),
        );

        let webhook = settings.notify_channel_config("webhook").unwrap();
        assert_eq!(webhook["url"], "https://hooks.example.com");

        assert!(settings.notify_channel_config("email").unwrap_err().contains("disabled"));
        assert!(settings.notify_channel_config("telegram").unwrap_err().contains("not found"));
    }
}
