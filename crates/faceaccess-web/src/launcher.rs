//! Starts the live recognition program as a separate process.

use faceaccess_core::Settings;
use std::path::PathBuf;
use thiserror::Error;
use tokio::process::Command;

const CLI_BINARY: &str = "faceaccess";

#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("recognizer program not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, Clone)]
pub struct Launcher {
    program: Option<PathBuf>,
    args: Vec<String>,
}

impl Launcher {
    pub fn new(program: Option<PathBuf>, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// The configured program, or `faceaccess recognize` next to this binary.
    pub fn from_settings(settings: &Settings) -> Self {
        if let Some(program) = &settings.recognizer_program {
            return Self::new(Some(program.clone()), Vec::new());
        }
        let sibling = std::env::current_exe()
            .ok()
            .map(|exe| exe.with_file_name(CLI_BINARY));
        Self::new(sibling, vec!["recognize".to_string()])
    }

    /// Spawn the program and reap it in the background. Returns its pid.
    pub fn launch(&self) -> Result<Option<u32>, LaunchError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| LaunchError::NotFound(CLI_BINARY.to_string()))?;

        let mut child = Command::new(program)
            .args(&self.args)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => LaunchError::NotFound(program.display().to_string()),
                _ => LaunchError::Spawn(e),
            })?;

        let pid = child.id();
        tracing::info!(program = %program.display(), ?pid, "recognizer started");
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => tracing::info!(?pid, %status, "recognizer exited"),
                Err(e) => tracing::warn!(?pid, error = %e, "waiting for recognizer failed"),
            }
        });
        Ok(pid)
    }
}
