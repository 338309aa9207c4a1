//! Device configuration loading.
//!
//! Every value has a built-in default matching the firmware constants, so a
//! device with no configuration file at all runs against the production
//! Master.  The expected YAML structure is:
//!
//! ```yaml
//! master_host: "devices.c1moore.codes"
//! master_port: 80
//! max_response_body: 4096
//! connect_warn_every: 10
//! did_address: 0
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Runtime settings for the device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Hostname of the Master node.
    pub master_host: String,

    /// TCP port of the Master node.
    pub master_port: u16,

    /// Cap on DCP response body allocation, in bytes.  Responses declaring
    /// more are rejected as invalid.
    pub max_response_body: usize,

    /// Log a warning every this many failed connect attempts while the
    /// reconnect loop spins.
    pub connect_warn_every: u32,

    /// Byte address of the persistent device-ID record in the non-volatile
    /// store.
    pub did_address: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            master_host: String::from("devices.c1moore.codes"),
            master_port: 80,
            max_response_body: 4096,
            connect_warn_every: 10,
            did_address: 0,
        }
    }
}

impl DeviceConfig {
    /// Parses `path` as YAML.  Absent fields keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid YAML.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot open configuration file: {}", path.display()))?;

        let config: DeviceConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse YAML file: {}", path.display()))?;

        info!(
            master = %config.master_host,
            port = config.master_port,
            "loaded device configuration"
        );

        Ok(config)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_tempfile(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_point_at_the_production_master() {
        let config = DeviceConfig::default();
        assert_eq!(config.master_host, "devices.c1moore.codes");
        assert_eq!(config.master_port, 80);
        assert_eq!(config.max_response_body, 4096);
        assert_eq!(config.did_address, 0);
    }

    #[test]
    fn full_yaml_overrides_every_field() {
        let file = yaml_tempfile(
            r#"
master_host: "master.lab.local"
master_port: 8080
max_response_body: 1024
connect_warn_every: 3
did_address: 32
"#,
        );
        let config = DeviceConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.master_host, "master.lab.local");
        assert_eq!(config.master_port, 8080);
        assert_eq!(config.max_response_body, 1024);
        assert_eq!(config.connect_warn_every, 3);
        assert_eq!(config.did_address, 32);
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_the_rest() {
        let file = yaml_tempfile("master_host: \"staging.local\"\n");
        let config = DeviceConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.master_host, "staging.local");
        assert_eq!(config.master_port, 80);
        assert_eq!(config.max_response_body, 4096);
    }

    #[test]
    fn missing_file_returns_an_error() {
        let result = DeviceConfig::load_from_file(Path::new("/nonexistent/device.yaml"));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_yaml_returns_an_error() {
        let file = yaml_tempfile("master_port: [not, a, port]\n");
        assert!(DeviceConfig::load_from_file(file.path()).is_err());
    }
}
