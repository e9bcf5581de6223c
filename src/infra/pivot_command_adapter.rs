use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context};
use tracing::{debug, info};

use crate::app::ports::{PivotBuilder, PivotLayout};
use crate::config::PivotConfig;

/// Delegates native pivot creation to an external automation command.
///
/// Invoked as `<command> <args..> <artifact> <layout-json>`; a non-zero exit
/// status is a pivot failure.
#[derive(Debug, Clone)]
pub struct CommandPivotBuilder {
    command: String,
    args: Vec<String>,
}

impl CommandPivotBuilder {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// `None` when no pivot command is configured
    pub fn from_config(config: &PivotConfig) -> Option<Self> {
        config
            .command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .map(|c| Self::new(c, config.args.clone()))
    }
}

impl PivotBuilder for CommandPivotBuilder {
    fn build(&self, artifact: &Path, layout: &PivotLayout) -> anyhow::Result<()> {
        let layout_json = serde_json::to_string(layout)?;
        debug!("Running pivot command {} {:?}", self.command, self.args);

        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(artifact)
            .arg(&layout_json)
            .output()
            .with_context(|| format!("Failed to start pivot command '{}'", self.command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Pivot command '{}' exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            );
        }

        info!("Pivot command finished for {}", artifact.display());
        Ok(())
    }
}
