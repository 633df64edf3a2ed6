//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour. Each row
//! converts to and from its domain type in `nodes` or `engine`; JSONB columns
//! carry the nested parts (run logs, output entries).

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use engine::models::{RunStatus, WorkflowRun};
use nodes::models::{
    Access, Certificate, CertificateSource, CertificateStatistics, OutputEntry, Settings,
    WorkflowOutput,
};

use crate::DbError;

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct WorkflowRunRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: String,
    pub logs: Value,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl WorkflowRunRow {
    pub fn from_run(run: &WorkflowRun) -> Result<Self, DbError> {
        Ok(Self {
            id: run.id,
            workflow_id: run.workflow_id,
            status: run.status.as_str().to_owned(),
            logs: serde_json::to_value(&run.logs).map_err(|e| DbError::decode("workflow_runs", e))?,
            error: run.error.clone(),
            started_at: run.started_at,
            ended_at: run.ended_at,
        })
    }

    pub fn into_run(self) -> Result<WorkflowRun, DbError> {
        let status: RunStatus = self
            .status
            .parse()
            .map_err(|e: String| DbError::decode("workflow_runs", e))?;
        let logs =
            serde_json::from_value(self.logs).map_err(|e| DbError::decode("workflow_runs", e))?;
        Ok(WorkflowRun {
            id: self.id,
            workflow_id: self.workflow_id,
            status,
            logs,
            error: self.error,
            started_at: self.started_at,
            ended_at: self.ended_at,
        })
    }
}

// ---------------------------------------------------------------------------
// certificates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct CertificateRow {
    pub id: Uuid,
    pub source: String,
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

fn source_str(source: CertificateSource) -> &'static str {
    match source {
        CertificateSource::Workflow => "workflow",
        CertificateSource::Upload => "upload",
    }
}

fn parse_source(raw: &str) -> Result<CertificateSource, DbError> {
    match raw {
        "workflow" => Ok(CertificateSource::Workflow),
        "upload" => Ok(CertificateSource::Upload),
        other => Err(DbError::decode("certificates", format!("unknown source '{other}'"))),
    }
}

impl From<&Certificate> for CertificateRow {
    fn from(c: &Certificate) -> Self {
        Self {
            id: c.id,
            source: source_str(c.source).to_owned(),
            san: c.san.clone(),
            certificate: c.certificate.clone(),
            private_key: c.private_key.clone(),
            issuer_certificate: c.issuer_certificate.clone(),
            cert_url: c.cert_url.clone(),
            cert_stable_url: c.cert_stable_url.clone(),
            workflow_id: c.workflow_id,
            workflow_run_id: c.workflow_run_id,
            workflow_node_id: c.workflow_node_id.clone(),
            workflow_output_id: c.workflow_output_id,
            expire_at: c.expire_at,
            created_at: c.created_at,
        }
    }
}

impl TryFrom<CertificateRow> for Certificate {
    type Error = DbError;

    fn try_from(row: CertificateRow) -> Result<Self, Self::Error> {
        Ok(Certificate {
            id: row.id,
            source: parse_source(&row.source)?,
            san: row.san,
            certificate: row.certificate,
            private_key: row.private_key,
            issuer_certificate: row.issuer_certificate,
            cert_url: row.cert_url,
            cert_stable_url: row.cert_stable_url,
            workflow_id: row.workflow_id,
            workflow_run_id: row.workflow_run_id,
            workflow_node_id: row.workflow_node_id,
            workflow_output_id: row.workflow_output_id,
            expire_at: row.expire_at,
            created_at: row.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// workflow_outputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct WorkflowOutputRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub run_id: Uuid,
    pub node_id: String,
    pub node_config: Value,
    pub outputs: Value,
    pub succeeded: bool,
    pub created_at: DateTime<Utc>,
}

impl WorkflowOutputRow {
    pub fn from_output(output: &WorkflowOutput) -> Result<Self, DbError> {
        Ok(Self {
            id: output.id,
            workflow_id: output.workflow_id,
            run_id: output.run_id,
            node_id: output.node_id.clone(),
            node_config: output.node_config.clone(),
            outputs: serde_json::to_value(&output.outputs)
                .map_err(|e| DbError::decode("workflow_outputs", e))?,
            succeeded: output.succeeded,
            created_at: output.created_at,
        })
    }

    pub fn into_output(self) -> Result<WorkflowOutput, DbError> {
        let outputs: Vec<OutputEntry> = serde_json::from_value(self.outputs)
            .map_err(|e| DbError::decode("workflow_outputs", e))?;
        Ok(WorkflowOutput {
            id: self.id,
            workflow_id: self.workflow_id,
            run_id: self.run_id,
            node_id: self.node_id,
            node_config: self.node_config,
            outputs,
            succeeded: self.succeeded,
            created_at: self.created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// settings / accesses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, FromRow)]
pub struct SettingsRow {
    pub id: Uuid,
    pub name: String,
    pub content: Value,
    pub updated_at: DateTime<Utc>,
}

impl From<SettingsRow> for Settings {
    fn from(row: SettingsRow) -> Self {
        Settings {
            id: row.id,
            name: row.name,
            content: row.content,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AccessRow {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub config: Value,
}

impl From<AccessRow> for Access {
    fn from(row: AccessRow) -> Self {
        Access {
            id: row.id,
            name: row.name,
            provider: row.provider,
            config: row.config,
        }
    }
}

// ---------------------------------------------------------------------------
// statistics
// ---------------------------------------------------------------------------

/// `COUNT(*)` columns come back as BIGINT.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct CertificateStatisticsRow {
    pub total: i64,
    pub expiring_soon: i64,
    pub expired: i64,
}

impl TryFrom<CertificateStatisticsRow> for CertificateStatistics {
    type Error = DbError;

    fn try_from(row: CertificateStatisticsRow) -> Result<Self, Self::Error> {
        let count = |n: i64| u64::try_from(n).map_err(|e| DbError::decode("certificates", e));
        Ok(CertificateStatistics {
            total: count(row.total)?,
            expiring_soon: count(row.expiring_soon)?,
            expired: count(row.expired)?,
        })
    }
}

// ============================================================
// Unit tests
// ============================================================
#[cfg(test)]
mod tests {
    use super::*;
    use nodes::mock::fixture_certificate;
    use nodes::models::{NodeType, WorkflowNode};
    use nodes::NodeLogger;
    use serde_json::json;

    #[test]
    fn run_logs_and_status_are_restored() {
        let logger = NodeLogger::for_node("apply", "Issue");
        logger.info("entering apply node");
        logger.error("failed to obtain certificate", &"rate limited");

        let mut run = WorkflowRun::start(Uuid::new_v4(), Uuid::new_v4());
        run.logs.push(logger.snapshot());
        run.error = Some("node 'apply' failed".into());
        run.finish(RunStatus::Failed);

        let row = WorkflowRunRow::from_run(&run).unwrap();
        assert_eq!(row.status, "failed");
        assert_eq!(row.into_run().unwrap(), run);
    }

    #[test]
    fn unknown_run_status_is_a_decode_error() {
        let mut row = WorkflowRunRow::from_run(&WorkflowRun::start(Uuid::new_v4(), Uuid::new_v4())).unwrap();
        row.status = "paused".into();
        assert!(matches!(row.into_run(), Err(DbError::Decode { table: "workflow_runs", .. })));
    }

    #[test]
    fn certificate_source_is_stored_as_text() {
        let mut cert = fixture_certificate("upload-1");
        cert.source = CertificateSource::Upload;

        let row = CertificateRow::from(&cert);
        assert_eq!(row.source, "upload");
        assert_eq!(Certificate::try_from(row).unwrap(), cert);

        let mut bad = CertificateRow::from(&cert);
        bad.source = "imported".into();
        assert!(Certificate::try_from(bad).is_err());
    }

    #[test]
    fn statistics_counts_convert_from_bigint() {
        let row = CertificateStatisticsRow {
            total: 7,
            expiring_soon: 2,
            expired: 1,
        };
        assert_eq!(
            CertificateStatistics::try_from(row).unwrap(),
            CertificateStatistics {
                total: 7,
                expiring_soon: 2,
                expired: 1,
            }
        );

        let negative = CertificateStatisticsRow {
            total: -1,
            expiring_soon: 0,
            expired: 0,
        };
        assert!(matches!(
            CertificateStatistics::try_from(negative),
            Err(DbError::Decode { table: "certificates", .. })
        ));
    }

    #[test]
    fn output_entries_round_trip() {
        let node = WorkflowNode::new("apply", "Issue", NodeType::Apply, json!({ "domains": "a.com" }));
        let output = WorkflowOutput::new(Uuid::new_v4(), Uuid::new_v4(), &node)
            .with_certificate_ref(Uuid::new_v4());

        let row = WorkflowOutputRow::from_output(&output).unwrap();
        assert_eq!(row.outputs[0]["name"], "certificate");
        assert_eq!(row.into_output().unwrap(), output);
    }
}
