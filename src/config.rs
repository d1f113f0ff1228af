//! Client configuration.
//!
//! Values come from a JSON file shaped like
//! `{"ServerAddress": "127.0.0.1", "ServerPort": 3000}` with optional tuning
//! keys, and may be overridden field by field (the binary layers CLI flags and
//! environment variables on top). [`Config`] is the validated result handed to
//! the session for one run.
use crate::error::{ClientError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Recovery passes attempted when nothing else is configured.
pub const DEFAULT_MAX_RECOVERY_PASSES: u32 = 3;

/// Raw, unvalidated configuration as read from disk or assembled from flags.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigFile {
    #[serde(default, alias = "serverAddress")]
    pub server_address: Option<String>,
    #[serde(default, alias = "serverPort")]
    pub server_port: Option<i64>,
    #[serde(default, alias = "maxRecoveryPasses")]
    pub max_recovery_passes: Option<u32>,
    #[serde(default, alias = "readTimeoutMs")]
    pub read_timeout_ms: Option<u64>,
    #[serde(default, alias = "connectTimeoutMs")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(default, alias = "firstSequence")]
    pub first_sequence: Option<i32>,
}

impl ConfigFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&text)
            .map_err(|e| ClientError::Configuration(format!("{}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Layer `overrides` on top of `self`; every `Some` in `overrides` wins.
    pub fn merge(self, overrides: ConfigFile) -> ConfigFile {
        ConfigFile {
            server_address: overrides.server_address.or(self.server_address),
            server_port: overrides.server_port.or(self.server_port),
            max_recovery_passes: overrides.max_recovery_passes.or(self.max_recovery_passes),
            read_timeout_ms: overrides.read_timeout_ms.or(self.read_timeout_ms),
            connect_timeout_ms: overrides.connect_timeout_ms.or(self.connect_timeout_ms),
            first_sequence: overrides.first_sequence.or(self.first_sequence),
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub server_address: String,
    pub server_port: u16,
    pub max_recovery_passes: u32,
    /// Socket read timeout applied by the TCP connector, if any.
    pub read_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// First sequence number the feed is known to start at.
    pub first_sequence: Option<i32>,
}

impl Config {
    pub fn new(server_address: impl Into<String>, server_port: u16) -> Self {
        Self {
            server_address: server_address.into(),
            server_port,
            max_recovery_passes: DEFAULT_MAX_RECOVERY_PASSES,
            read_timeout: None,
            connect_timeout: None,
            first_sequence: None,
        }
    }

    pub fn with_max_recovery_passes(mut self, passes: u32) -> Self {
        self.max_recovery_passes = passes;
        self
    }

    /// `host:port` form used for connecting and logging.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }
}

impl TryFrom<ConfigFile> for Config {
    type Error = ClientError;

    fn try_from(raw: ConfigFile) -> Result<Self> {
        let server_address = raw
            .server_address
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ClientError::Configuration("ServerAddress is missing".into()))?;
        let port = raw
            .server_port
            .ok_or_else(|| ClientError::Configuration("ServerPort is missing".into()))?;
        let server_port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                ClientError::Configuration(format!("ServerPort {port} outside 1..=65535"))
            })?;

        Ok(Config {
            server_address,
            server_port,
            max_recovery_passes: raw.max_recovery_passes.unwrap_or(DEFAULT_MAX_RECOVERY_PASSES),
            read_timeout: raw.read_timeout_ms.map(Duration::from_millis),
            connect_timeout: raw.connect_timeout_ms.map(Duration::from_millis),
            first_sequence: raw.first_sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_original_config_shape() {
        let raw = ConfigFile::parse(r#"{"ServerAddress": "127.0.0.1", "ServerPort": 3000}"#).unwrap();
        let cfg = Config::try_from(raw).unwrap();
        assert_eq!(cfg, Config::new("127.0.0.1", 3000));
        assert_eq!(cfg.endpoint(), "127.0.0.1:3000");
    }

    #[test]
    fn accepts_camel_case_and_tuning_keys() {
        let raw = ConfigFile::parse(
            r#"{"serverAddress": "localhost", "serverPort": 1, "maxRecoveryPasses": 5,
                "readTimeoutMs": 250, "FirstSequence": 1}"#,
        )
        .unwrap();
        let cfg = Config::try_from(raw).unwrap();
        assert_eq!(cfg.server_port, 1);
        assert_eq!(cfg.max_recovery_passes, 5);
        assert_eq!(cfg.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(cfg.connect_timeout, None);
        assert_eq!(cfg.first_sequence, Some(1));
    }

    #[test]
    fn rejects_out_of_range_ports() {
        for port in [0i64, 65536, -3] {
            let raw = ConfigFile {
                server_address: Some("h".into()),
                server_port: Some(port),
                ..ConfigFile::default()
            };
            assert!(matches!(Config::try_from(raw), Err(ClientError::Configuration(_))), "{port}");
        }
        let raw = ConfigFile {
            server_address: Some("h".into()),
            server_port: Some(65535),
            ..ConfigFile::default()
        };
        assert_eq!(Config::try_from(raw).unwrap().server_port, 65535);
    }

    #[test]
    fn rejects_missing_or_blank_address() {
        let raw = ConfigFile {
            server_port: Some(3000),
            ..ConfigFile::default()
        };
        assert!(Config::try_from(raw).is_err());
        let raw = ConfigFile {
            server_address: Some("   ".into()),
            server_port: Some(3000),
            ..ConfigFile::default()
        };
        assert!(Config::try_from(raw).is_err());
    }

    #[test]
    fn overrides_win_over_file() {
        let file = ConfigFile {
            server_address: Some("file-host".into()),
            server_port: Some(3000),
            max_recovery_passes: Some(7),
            ..ConfigFile::default()
        };
        let flags = ConfigFile {
            server_port: Some(4000),
            ..ConfigFile::default()
        };
        let cfg = Config::try_from(file.merge(flags)).unwrap();
        assert_eq!(cfg.server_address, "file-host");
        assert_eq!(cfg.server_port, 4000);
        assert_eq!(cfg.max_recovery_passes, 7);
    }

    #[test]
    fn load_reports_missing_and_garbled_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(ConfigFile::load(&missing), Err(ClientError::Configuration(_))));

        let bad = dir.path().join("bad.json");
        std::fs::File::create(&bad).unwrap().write_all(b"{ not json").unwrap();
        assert!(matches!(ConfigFile::load(&bad), Err(ClientError::Configuration(_))));

        let good = dir.path().join("config.json");
        std::fs::write(&good, r#"{"ServerAddress":"10.0.0.1","ServerPort":3000}"#).unwrap();
        let cfg = Config::try_from(ConfigFile::load(&good).unwrap()).unwrap();
        assert_eq!(cfg.server_address, "10.0.0.1");
    }
}
