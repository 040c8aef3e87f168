//! Platform CLI command construction.
//!
//! Every database command targets the database by its *name*, never the
//! worker-facing binding, and carries an explicit `--local`/`--remote`
//! flag derived from the environment's policy table. Working directory is
//! always the resolved project root.

use std::path::{Path, PathBuf};
use std::time::Duration;

use convoy_platform::CommandSpec;
use convoy_types::Environment;

/// Builds the CLI invocations the engine shells out to.
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    /// CLI executable, e.g. "wrangler"
    cli: String,

    /// Resource namespace, e.g. "d1"
    resource: String,

    /// Project root every command runs in
    project_root: PathBuf,
}

impl CommandBuilder {
    pub fn new(
        cli: impl Into<String>,
        resource: impl Into<String>,
        project_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            cli: cli.into(),
            resource: resource.into(),
            project_root: project_root.into(),
        }
    }

    /// `<cli> <resource> migrations apply <db> --local|--remote`
    pub fn migrations_apply(
        &self,
        database: &str,
        environment: Environment,
        timeout: Duration,
    ) -> CommandSpec {
        CommandSpec::new(&self.cli)
            .args([self.resource.as_str(), "migrations", "apply", database])
            .arg(locality_flag(environment))
            .cwd(&self.project_root)
            .timeout(timeout)
    }

    /// `<cli> <resource> export <db> --env <env> --local|--remote --output <file>`
    pub fn export(
        &self,
        database: &str,
        environment: Environment,
        output: &Path,
        timeout: Duration,
    ) -> CommandSpec {
        CommandSpec::new(&self.cli)
            .args([self.resource.as_str(), "export", database])
            .args(["--env", &environment.to_string()])
            .arg(locality_flag(environment))
            .args(["--output", &output.display().to_string()])
            .cwd(&self.project_root)
            .timeout(timeout)
    }

    /// `<cli> <resource> execute <db> --env <env> --local|--remote --command "<sql>"`
    pub fn execute(
        &self,
        database: &str,
        environment: Environment,
        sql: &str,
        timeout: Duration,
    ) -> CommandSpec {
        CommandSpec::new(&self.cli)
            .args([self.resource.as_str(), "execute", database])
            .args(["--env", &environment.to_string()])
            .arg(locality_flag(environment))
            .args(["--command", sql])
            .cwd(&self.project_root)
            .timeout(timeout)
    }
}

/// The execution-target flag, keyed off the environment's policy table.
///
/// Deriving this from a naming convention instead is the
/// production-destructive bug class this module exists to prevent.
fn locality_flag(environment: Environment) -> &'static str {
    if environment.is_remote() {
        "--remote"
    } else {
        "--local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> CommandBuilder {
        CommandBuilder::new("wrangler", "d1", "/tmp/project")
    }

    #[test]
    fn test_local_iff_development() {
        for env in Environment::all() {
            let spec = builder().migrations_apply("orders-db", env, Duration::from_secs(120));
            let line = spec.display_line();
            if env == Environment::Development {
                assert!(line.contains("--local"), "{}: {}", env, line);
                assert!(!line.contains("--remote"), "{}: {}", env, line);
            } else {
                assert!(line.contains("--remote"), "{}: {}", env, line);
                assert!(!line.contains("--local"), "{}: {}", env, line);
            }
        }
    }

    #[test]
    fn test_commands_use_database_name() {
        let spec = builder().migrations_apply("orders-db", Environment::Production, Duration::from_secs(120));
        assert_eq!(
            spec.display_line(),
            "wrangler d1 migrations apply orders-db --remote"
        );
        assert_eq!(spec.cwd.as_deref(), Some(Path::new("/tmp/project")));
    }

    #[test]
    fn test_export_command_shape() {
        let spec = builder().export(
            "orders-db",
            Environment::Staging,
            Path::new("/backups/orders-db-staging.sql"),
            Duration::from_secs(300),
        );
        let line = spec.display_line();
        assert!(line.starts_with("wrangler d1 export orders-db --env staging --remote"));
        assert!(line.ends_with("--output /backups/orders-db-staging.sql"));
    }
}
