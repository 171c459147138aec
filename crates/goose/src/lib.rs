//! Thin async wrapper around the `goose` migration CLI.

use anyhow::{bail, Context, Result};
use std::fmt;
use tokio::process::Command;
use tracing::{debug, info};

/// goose sub-commands used by the services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GooseCommand {
    Up,
    Down,
    Status,
}

impl fmt::Display for GooseCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GooseCommand::Up => f.write_str("up"),
            GooseCommand::Down => f.write_str("down"),
            GooseCommand::Status => f.write_str("status"),
        }
    }
}

/// Runs goose migrations by spawning the goose binary.
///
/// Any driver goose understands can be used; the DSN format depends on it.
#[derive(Debug, Clone)]
pub struct MigrationRunner {
    goose_binary_path: String,
    migrations_dir: String,
    driver: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(
        goose_binary_path: String,
        migrations_dir: String,
        driver: String,
        dsn: String,
    ) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            driver,
            dsn,
        }
    }

    /// Runner for the `postgres` driver
    pub fn postgres(goose_binary_path: String, migrations_dir: String, dsn: String) -> Self {
        Self::new(goose_binary_path, migrations_dir, "postgres".to_string(), dsn)
    }

    /// Apply all pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!(migrations_dir = %self.migrations_dir, "running migrations");
        let stdout = self.run(GooseCommand::Up).await?;
        debug!("migrations completed:\n{}", stdout);
        Ok(())
    }

    /// Roll back the most recent migration
    pub async fn rollback_migration(&self) -> Result<()> {
        let stdout = self.run(GooseCommand::Down).await?;
        debug!("rollback completed:\n{}", stdout);
        Ok(())
    }

    pub async fn migration_status(&self) -> Result<String> {
        self.run(GooseCommand::Status).await
    }

    fn args(&self, command: GooseCommand) -> Vec<String> {
        vec![
            "-dir".to_string(),
            self.migrations_dir.clone(),
            self.driver.clone(),
            self.dsn.clone(),
            command.to_string(),
        ]
    }

    async fn run(&self, command: GooseCommand) -> Result<String> {
        let output = Command::new(&self.goose_binary_path)
            .args(self.args(command))
            .output()
            .await
            .with_context(|| format!("failed to spawn {}", self.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("goose {} failed.\nstdout: {}\nstderr: {}", command, stdout, stderr);
        }

        Ok(stdout)
    }
}
