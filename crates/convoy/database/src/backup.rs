//! Environment backup service.
//!
//! A backup is a directory of per-database SQL exports plus a JSON
//! manifest. One failing export never aborts the rest; the failure is
//! recorded in the manifest and the caller decides what it means.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use convoy_platform::CommandRunner;
use convoy_types::{BackupRecord, DatabaseBackup, Domain, Environment, ExportStatus};
use tracing::{info, instrument, warn};

use crate::command::CommandBuilder;
use crate::error::Result;
use crate::retry::RetryPolicy;

const MANIFEST_FILE: &str = "backup-manifest.json";

/// Exports databases and writes backup manifests.
pub struct BackupService {
    runner: Arc<dyn CommandRunner>,
    commands: CommandBuilder,
    retry: RetryPolicy,
    backup_dir: PathBuf,
    timeout: Duration,
    dry_run: bool,
}

impl BackupService {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        commands: CommandBuilder,
        retry: RetryPolicy,
        backup_dir: impl Into<PathBuf>,
        timeout: Duration,
        dry_run: bool,
    ) -> Self {
        Self {
            runner,
            commands,
            retry,
            backup_dir: backup_dir.into(),
            timeout,
            dry_run,
        }
    }

    /// Back up every database the given domains configure for the
    /// environment.
    ///
    /// The returned record always covers every database, including the
    /// ones whose export failed. In dry-run mode nothing touches disk.
    #[instrument(skip(self, domains), fields(%environment, domains = domains.len()))]
    pub async fn create_environment_backup(
        &self,
        environment: Environment,
        domains: &[Domain],
    ) -> Result<BackupRecord> {
        let backup_id = format!(
            "backup-{}-{}",
            environment,
            Utc::now().format("%Y%m%dT%H%M%SZ")
        );
        let dir = self
            .backup_dir
            .join(environment.to_string())
            .join(&backup_id);

        let mut record = BackupRecord {
            backup_id: backup_id.clone(),
            environment,
            databases: Vec::new(),
            created_at: Utc::now(),
        };

        if self.dry_run {
            for domain in domains {
                if let Some(descriptor) = domain.databases.get(&environment) {
                    record.databases.push(DatabaseBackup {
                        database: descriptor.name.clone(),
                        domain: domain.name.clone(),
                        path: dir.join(export_file_name(&descriptor.name, environment)),
                        size_bytes: None,
                        status: ExportStatus::Skipped,
                        error: None,
                    });
                }
            }
            info!(backup_id, "dry run, no exports taken");
            return Ok(record);
        }

        tokio::fs::create_dir_all(&dir).await?;

        for domain in domains {
            let Some(descriptor) = domain.databases.get(&environment) else {
                continue;
            };
            let backup = self
                .export_database(&descriptor.name, &domain.name, environment, &dir)
                .await;
            record.databases.push(backup);
        }

        self.write_manifest(&dir, &record).await?;
        info!(
            backup_id,
            completed = record.all_completed(),
            databases = record.databases.len(),
            "environment backup written"
        );
        Ok(record)
    }

    /// Export one database to `<dir>/<db>-<env>.sql`.
    async fn export_database(
        &self,
        database: &str,
        domain: &str,
        environment: Environment,
        dir: &Path,
    ) -> DatabaseBackup {
        let path = dir.join(export_file_name(database, environment));
        let spec = self.commands.export(database, environment, &path, self.timeout);

        match self.retry.execute(self.runner.as_ref(), &spec).await {
            Ok(_) => {
                let size_bytes = tokio::fs::metadata(&path).await.map(|m| m.len()).ok();
                DatabaseBackup {
                    database: database.to_string(),
                    domain: domain.to_string(),
                    path,
                    size_bytes,
                    status: ExportStatus::Completed,
                    error: None,
                }
            }
            Err(err) => {
                warn!(database, %environment, error = %err, "database export failed");
                DatabaseBackup {
                    database: database.to_string(),
                    domain: domain.to_string(),
                    path,
                    size_bytes: None,
                    status: ExportStatus::Failed,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    async fn write_manifest(&self, dir: &Path, record: &BackupRecord) -> Result<()> {
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(dir.join(MANIFEST_FILE), body).await?;
        Ok(())
    }
}

fn export_file_name(database: &str, environment: Environment) -> String {
    format!("{database}-{environment}.sql")
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_platform::ScriptedRunner;
    use convoy_types::DatabaseDescriptor;
    use std::collections::HashMap;

    fn domain(name: &str, db: &str, environment: Environment) -> Domain {
        let mut databases = HashMap::new();
        databases.insert(
            environment,
            DatabaseDescriptor {
                name: db.to_string(),
                binding: "DB".to_string(),
            },
        );
        Domain {
            name: name.to_string(),
            account_id: "a".repeat(32),
            zone_id: "b".repeat(32),
            databases,
            services: vec![name.to_string()],
            features: Default::default(),
        }
    }

    fn service(runner: Arc<ScriptedRunner>, dir: &Path, dry_run: bool) -> BackupService {
        BackupService::new(
            runner,
            CommandBuilder::new("wrangler", "d1", "/tmp/project"),
            RetryPolicy {
                max_attempts: 1,
                delay: Duration::from_millis(1),
            },
            dir,
            Duration::from_secs(300),
            dry_run,
        )
    }

    #[tokio::test]
    async fn test_backup_id_shape_and_manifest() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("exported");
        let svc = service(runner, tmp.path(), false);

        let record = svc
            .create_environment_backup(
                Environment::Staging,
                &[domain("shop.example.com", "shop-db", Environment::Staging)],
            )
            .await
            .unwrap();

        assert!(record.backup_id.starts_with("backup-staging-"));
        assert!(record.all_completed());

        let manifest = tmp
            .path()
            .join("staging")
            .join(&record.backup_id)
            .join(MANIFEST_FILE);
        let body = std::fs::read_to_string(manifest).unwrap();
        let parsed: BackupRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.backup_id, record.backup_id);
        assert_eq!(parsed.databases.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_export_recorded_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_failed("authentication expired");
        runner.push_ok("exported");
        let svc = service(runner, tmp.path(), false);

        let record = svc
            .create_environment_backup(
                Environment::Production,
                &[
                    domain("a.example.com", "a-db", Environment::Production),
                    domain("b.example.com", "b-db", Environment::Production),
                ],
            )
            .await
            .unwrap();

        assert!(!record.all_completed());
        assert_eq!(record.databases[0].status, ExportStatus::Failed);
        assert!(record.databases[0]
            .error
            .as_deref()
            .unwrap()
            .contains("authentication expired"));
        assert_eq!(record.databases[1].status, ExportStatus::Completed);
    }

    #[tokio::test]
    async fn test_middle_export_failure_leaves_neighbors_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        runner.push_ok("exported");
        runner.push_failed("disk full");
        runner.push_ok("exported");
        let svc = service(runner.clone(), tmp.path(), false);

        let record = svc
            .create_environment_backup(
                Environment::Production,
                &[
                    domain("a.example.com", "a-db", Environment::Production),
                    domain("b.example.com", "b-db", Environment::Production),
                    domain("c.example.com", "c-db", Environment::Production),
                ],
            )
            .await
            .unwrap();

        // The database before and the database after the failure both
        // exported; all three were attempted.
        assert_eq!(record.databases.len(), 3);
        assert_eq!(record.databases[0].status, ExportStatus::Completed);
        assert_eq!(record.databases[1].status, ExportStatus::Failed);
        assert!(record.databases[1].error.as_deref().unwrap().contains("disk full"));
        assert_eq!(record.databases[2].status, ExportStatus::Completed);
        assert_eq!(runner.invocation_count(), 3);
        assert!(!record.all_completed());
    }

    #[tokio::test]
    async fn test_domains_without_database_are_not_exported() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let svc = service(runner.clone(), tmp.path(), false);

        // Database configured for staging only, backup runs in production.
        let record = svc
            .create_environment_backup(
                Environment::Production,
                &[domain("a.example.com", "a-db", Environment::Staging)],
            )
            .await
            .unwrap();

        assert!(record.databases.is_empty());
        assert_eq!(runner.invocation_count(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new());
        let svc = service(runner.clone(), tmp.path(), true);

        let record = svc
            .create_environment_backup(
                Environment::Staging,
                &[domain("a.example.com", "a-db", Environment::Staging)],
            )
            .await
            .unwrap();

        assert_eq!(record.databases[0].status, ExportStatus::Skipped);
        assert_eq!(runner.invocation_count(), 0);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
