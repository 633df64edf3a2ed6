//! Provider registry — maps provider names to adapter factories.
//!
//! Adapters (DNS registrars, deploy targets) live outside the core and are
//! registered once at startup. The registry is read-only afterwards and is
//! shared across concurrent runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::collaborators::{Deployer, DnsChallengeProvider};
use crate::log::NodeLogger;
use crate::models::Access;
use crate::ProviderError;

/// Everything an adapter factory needs to build a provider instance.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Stored credentials, when the node references an access record.
    pub access: Option<Access>,
    /// Node-level provider options (tunables, target resource ids, ...).
    pub options: Value,
}

impl ProviderConfig {
    /// Look up a key in the node options first, then in the access config.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options
            .get(key)
            .or_else(|| self.access.as_ref().and_then(|a| a.config.get(key)))
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Like [`get_str`](Self::get_str) but fails with `InvalidConfig` when
    /// the key is missing or empty.
    pub fn require_str(&self, key: &str) -> Result<&str, ProviderError> {
        self.get_str(key)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProviderError::InvalidConfig(format!("config `{key}` is required")))
    }
}

pub type DnsProviderFactory = Arc<
    dyn Fn(&ProviderConfig) -> Result<Arc<dyn DnsChallengeProvider>, ProviderError> + Send + Sync,
>;

pub type DeployerFactory = Arc<
    dyn Fn(&ProviderConfig, NodeLogger) -> Result<Arc<dyn Deployer>, ProviderError> + Send + Sync,
>;

/// Name → factory maps for DNS challenge providers and deploy targets.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    dns: HashMap<String, DnsProviderFactory>,
    deployers: HashMap<String, DeployerFactory>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_dns_provider<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ProviderConfig) -> Result<Arc<dyn DnsChallengeProvider>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.dns.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn register_deployer<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&ProviderConfig, NodeLogger) -> Result<Arc<dyn Deployer>, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        self.deployers.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn build_dns_provider(
        &self,
        name: &str,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn DnsChallengeProvider>, ProviderError> {
        let factory = self
            .dns
            .get(name)
            .ok_or_else(|| ProviderError::InvalidConfig(format!("unsupported dns provider: {name}")))?;
        factory(config)
    }

    pub fn build_deployer(
        &self,
        name: &str,
        config: &ProviderConfig,
        logger: NodeLogger,
    ) -> Result<Arc<dyn Deployer>, ProviderError> {
        let factory = self.deployers.get(name).ok_or_else(|| {
            ProviderError::InvalidConfig(format!("unsupported deploy provider: {name}"))
        })?;
        factory(config, logger)
    }

    pub fn dns_provider_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.dns.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn deployer_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.deployers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("dns", &self.dns_provider_names())
            .field("deployers", &self.deployer_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDeployer, MockDnsProvider};
    use serde_json::json;

    #[test]
    fn unknown_names_are_config_errors() {
        let registry = ProviderRegistry::new();
        let config = ProviderConfig::default();

        assert!(matches!(
            registry.build_dns_provider("cloudflare", &config),
            Err(ProviderError::InvalidConfig(_))
        ));
        assert!(matches!(
            registry.build_deployer("ssh", &config, NodeLogger::for_node("d", "Deploy")),
            Err(ProviderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn factories_receive_config() {
        let mut registry = ProviderRegistry::new();
        registry
            .register_dns_provider("cloudflare", |config| {
                config.require_str("dnsApiToken")?;
                Ok(Arc::new(MockDnsProvider::default()) as Arc<dyn DnsChallengeProvider>)
            })
            .register_deployer("local", |_, _| {
                Ok(Arc::new(MockDeployer::succeeding()) as Arc<dyn Deployer>)
            });

        assert_eq!(registry.dns_provider_names(), vec!["cloudflare"]);
        assert_eq!(registry.deployer_names(), vec!["local"]);

        let missing = ProviderConfig::default();
        assert!(registry.build_dns_provider("cloudflare", &missing).is_err());

        let config = ProviderConfig {
            access: Some(Access {
                id: "acc-1".into(),
                name: "cf".into(),
                provider: "cloudflare".into(),
                config: json!({ "dnsApiToken": "secret" }),
            }),
            options: json!({}),
        };
        assert!(registry.build_dns_provider("cloudflare", &config).is_ok());
    }

    #[test]
    fn node_options_shadow_access_config() {
        let config = ProviderConfig {
            access: Some(Access {
                id: "acc-1".into(),
                name: "aliyun".into(),
                provider: "aliyun".into(),
                config: json!({ "region": "cn-hangzhou", "accessKeyId": "ak" }),
            }),
            options: json!({ "region": "ap-southeast-1" }),
        };

        assert_eq!(config.get_str("region"), Some("ap-southeast-1"));
        assert_eq!(config.get_str("accessKeyId"), Some("ak"));
        assert!(config.require_str("siteId").is_err());
    }
}
