//! Run configuration (spec.md §6, expanded in SPEC_FULL.md §4.8): the
//! settings a batch or streaming run needs, loaded from a JSON file with
//! builder methods for overriding fields programmatically.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::ensure_dir;

fn default_max_uncompressed() -> u64 {
    8 * 1024 * 1024
}

fn default_memory_constraint() -> u32 {
    512
}

fn default_compression_preset() -> i32 {
    6
}

/// On-disk run configuration (spec.md §6).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    pub input_directory: PathBuf,
    pub telemetry_schema: PathBuf,
    pub histogram_server: String,
    pub storage_path: PathBuf,
    pub log_path: PathBuf,
    pub upload_path: PathBuf,
    #[serde(default = "default_max_uncompressed")]
    pub max_uncompressed: u64,
    #[serde(default = "default_memory_constraint")]
    pub memory_constraint: u32,
    #[serde(default = "default_compression_preset")]
    pub compression_preset: i32,
}

impl IngestConfig {
    /// Load and validate a config file, creating `storage_path`,
    /// `log_path`, and `upload_path` if they don't already exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).with_context(|| format!("read config {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes).with_context(|| format!("parse config {}", path.display()))?;

        ensure_dir(&config.storage_path)?;
        ensure_dir(&config.log_path)?;
        ensure_dir(&config.upload_path)?;

        Ok(config)
    }

    /// Split `histogram_server` into `(host, port)`, defaulting to port 80
    /// when no `:port` suffix is present.
    pub fn schema_server_addr(&self) -> (String, u16) {
        match self.histogram_server.rsplit_once(':') {
            Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty() => {
                (host.to_string(), port.parse().unwrap_or(80))
            }
            _ => (self.histogram_server.clone(), 80),
        }
    }

    pub fn with_input_directory(mut self, dir: impl AsRef<Path>) -> Self {
        self.input_directory = dir.as_ref().to_path_buf();
        self
    }

    pub fn with_telemetry_schema(mut self, path: impl AsRef<Path>) -> Self {
        self.telemetry_schema = path.as_ref().to_path_buf();
        self
    }

    pub fn with_histogram_server(mut self, server: impl Into<String>) -> Self {
        self.histogram_server = server.into();
        self
    }

    pub fn with_storage_path(mut self, path: impl AsRef<Path>) -> Self {
        self.storage_path = path.as_ref().to_path_buf();
        self
    }

    pub fn with_max_uncompressed(mut self, bytes: u64) -> Self {
        self.max_uncompressed = bytes;
        self
    }

    pub fn with_memory_constraint(mut self, mb: u32) -> Self {
        self.memory_constraint = mb;
        self
    }

    pub fn with_compression_preset(mut self, preset: i32) -> Self {
        self.compression_preset = preset;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_config_and_creates_output_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let storage = dir.path().join("storage");
        let log = dir.path().join("log");
        let upload = dir.path().join("upload");

        let config_path = dir.path().join("config.json");
        let mut f = std::fs::File::create(&config_path).unwrap();
        write!(
            f,
            r#"{{
                "input_directory": "{input}",
                "telemetry_schema": "{schema}",
                "histogram_server": "schema.example:8080",
                "storage_path": "{storage}",
                "log_path": "{log}",
                "upload_path": "{upload}"
            }}"#,
            input = dir.path().join("in").display(),
            schema = dir.path().join("schema.json").display(),
            storage = storage.display(),
            log = log.display(),
            upload = upload.display(),
        )
        .unwrap();

        let config = IngestConfig::load(&config_path).unwrap();
        assert!(storage.is_dir());
        assert!(log.is_dir());
        assert!(upload.is_dir());
        assert_eq!(config.max_uncompressed, default_max_uncompressed());
        assert_eq!(config.schema_server_addr(), ("schema.example".to_string(), 8080));
    }

    #[test]
    fn default_port_is_80_without_explicit_port() {
        let config = IngestConfig {
            input_directory: PathBuf::new(),
            telemetry_schema: PathBuf::new(),
            histogram_server: "schema.example".to_string(),
            storage_path: PathBuf::new(),
            log_path: PathBuf::new(),
            upload_path: PathBuf::new(),
            max_uncompressed: default_max_uncompressed(),
            memory_constraint: default_memory_constraint(),
            compression_preset: default_compression_preset(),
        };
        assert_eq!(config.schema_server_addr(), ("schema.example".to_string(), 80));
    }
}
