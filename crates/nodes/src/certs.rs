//! PEM certificate inspection.

use chrono::{DateTime, Utc};
use x509_parser::extensions::GeneralName;

use crate::NodeError;

/// Facts extracted from a PEM certificate chain.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateInfo {
    /// DNS names from the SAN extension, falling back to the subject CN.
    pub san: Vec<String>,
    pub not_after: DateTime<Utc>,
    /// Remaining certificates of the chain, PEM encoded.
    pub issuer_chain: String,
}

impl CertificateInfo {
    pub fn san_joined(&self) -> String {
        self.san.join(";")
    }
}

/// Parse the leaf (first block) of a PEM chain.
pub fn inspect_pem(chain_pem: &str) -> Result<CertificateInfo, NodeError> {
    let blocks = pem::parse_many(chain_pem)
        .map_err(|e| NodeError::InvalidCertificate(format!("failed to parse PEM: {e}")))?;

    let mut certs = blocks.iter().filter(|b| b.tag() == "CERTIFICATE");
    let leaf = certs
        .next()
        .ok_or_else(|| NodeError::InvalidCertificate("no CERTIFICATE block found".into()))?;
    let issuer_chain = certs.map(pem::encode).collect::<Vec<_>>().join("");

    let (_, cert) = x509_parser::parse_x509_certificate(leaf.contents())
        .map_err(|e| NodeError::InvalidCertificate(format!("invalid X509 certificate: {e}")))?;

    let not_after_ts = cert.validity().not_after.to_datetime().unix_timestamp();
    let not_after = DateTime::<Utc>::from_timestamp(not_after_ts, 0).ok_or_else(|| {
        NodeError::InvalidCertificate(format!("expiry out of range: {not_after_ts}"))
    })?;

    let mut san = Vec::new();
    if let Ok(Some(ext)) = cert.subject_alternative_name() {
        for name in &ext.value.general_names {
            if let GeneralName::DNSName(dns) = name {
                san.push((*dns).to_owned());
            }
        }
    }
    if san.is_empty() {
        if let Some(cn) = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
        {
            san.push(cn.to_owned());
        }
    }

    Ok(CertificateInfo {
        san,
        not_after,
        issuer_chain,
    })
}

/// Check that a private key PEM is present and well-formed.
pub fn ensure_private_key_pem(key_pem: &str) -> Result<(), NodeError> {
    let block = pem::parse(key_pem)
        .map_err(|e| NodeError::InvalidCertificate(format!("failed to parse private key: {e}")))?;
    if !block.tag().ends_with("PRIVATE KEY") {
        return Err(NodeError::InvalidCertificate(format!(
            "expected a PRIVATE KEY block, found '{}'",
            block.tag()
        )));
    }
    Ok(())
}

/// Self-signed `example.com` / `www.example.com` pair used by tests and
/// demos. Expires 2036-10-13.
pub mod fixtures {
    pub const CERT_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/example.com.crt"
    ));
    pub const KEY_PEM: &str = include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/example.com.key"
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reads_san_and_expiry_from_fixture() {
        let info = inspect_pem(fixtures::CERT_PEM).expect("fixture should parse");

        assert_eq!(info.san, vec!["example.com", "www.example.com"]);
        assert_eq!(info.san_joined(), "example.com;www.example.com");
        assert_eq!(
            info.not_after,
            Utc.with_ymd_and_hms(2036, 10, 13, 23, 45, 8).unwrap()
        );
        assert!(info.issuer_chain.is_empty());
    }

    #[test]
    fn rest_of_chain_becomes_issuer_chain() {
        let chain = format!("{}{}", fixtures::CERT_PEM, fixtures::CERT_PEM);
        let info = inspect_pem(&chain).unwrap();
        assert!(info.issuer_chain.contains("BEGIN CERTIFICATE"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            inspect_pem("not a certificate"),
            Err(NodeError::InvalidCertificate(_))
        ));
        assert!(inspect_pem(fixtures::KEY_PEM).is_err());
    }

    #[test]
    fn private_key_check() {
        assert!(ensure_private_key_pem(fixtures::KEY_PEM).is_ok());
        assert!(ensure_private_key_pem(fixtures::CERT_PEM).is_err());
    }
}
