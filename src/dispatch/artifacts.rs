//! Diagnostic JSON artifacts of completed tasks.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::PersistenceConfig;

/// Writes raw result payloads to `<output_dir>/<label>_<parameter>.json`
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Writer for the configured directory, if persistence is enabled
    pub fn from_config(config: &PersistenceConfig) -> Option<Self> {
        config
            .enabled
            .then(|| Self::new(config.output_dir.clone()))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// File name for a task label and parameter, with path separators and
    /// other unsafe characters replaced
    pub fn file_name(label: &str, parameter: &str) -> String {
        let sanitized: String = format!("{label}_{parameter}")
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{sanitized}.json")
    }

    pub async fn write(&self, label: &str, parameter: &str, payload: &Value) -> io::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(Self::file_name(label, parameter));
        tokio::fs::write(&path, render(payload)?).await?;
        Ok(path)
    }

    /// Write the artifact, logging instead of failing
    pub async fn persist(&self, label: &str, parameter: &str, payload: &Value) -> Option<PathBuf> {
        match self.write(label, parameter, payload).await {
            Ok(path) => {
                debug!(path = %path.display(), "Persisted result artifact");
                Some(path)
            }
            Err(e) => {
                warn!(
                    label = %label,
                    output_dir = %self.output_dir.display(),
                    error = %e,
                    "Failed to persist result artifact"
                );
                None
            }
        }
    }
}

/// JSON with four-space indentation
fn render(payload: &Value) -> io::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buffer, PrettyFormatter::with_indent(b"    "));
    payload
        .serialize(&mut serializer)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(buffer)
}
