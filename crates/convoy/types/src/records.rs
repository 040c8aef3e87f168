//! Backup and migration result records
//!
//! These are the structured results every mutating database operation
//! produces, whether it succeeded or not. The BackupRecord doubles as the
//! manifest persisted alongside exported data files.

use crate::Environment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Manifest of one environment backup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Backup identifier: `backup-<environment>-<timestamp>`
    pub backup_id: String,

    /// Environment the backup was taken in
    pub environment: Environment,

    /// Per-database outcomes
    pub databases: Vec<DatabaseBackup>,

    /// When the backup was taken
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl BackupRecord {
    /// True if every database export completed.
    pub fn all_completed(&self) -> bool {
        self.databases
            .iter()
            .all(|db| db.status == ExportStatus::Completed)
    }
}

/// Outcome of exporting one database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseBackup {
    /// Database name
    pub database: String,

    /// Domain the database belongs to
    pub domain: String,

    /// Path of the exported file
    pub path: PathBuf,

    /// Exported file size in bytes, when the export completed
    pub size_bytes: Option<u64>,

    /// Export status
    pub status: ExportStatus,

    /// Captured error message when the export failed
    pub error: Option<String>,
}

/// Status of a single database export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    /// Export finished and the file is on disk
    Completed,

    /// Export failed; `error` carries the captured message
    Failed,

    /// Export skipped (dry run)
    Skipped,
}

/// Result of applying migrations to one database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Database name the command ran against
    pub database: String,

    /// Worker-facing binding name, for reporting only
    pub binding: String,

    /// Environment the migrations ran in
    pub environment: Environment,

    /// Number of migrations the command reported applying
    pub migrations_applied: u32,

    /// Outcome
    pub status: MigrationStatus,

    /// Truncated command output
    pub output: String,
}

/// Outcome of a migration attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MigrationStatus {
    /// Migrations applied (possibly zero pending)
    Applied,

    /// Dry run; no command was executed
    DryRun,

    /// Migration command failed
    Failed,

    /// Skipped (migrations disabled for the domain)
    Skipped,
}
