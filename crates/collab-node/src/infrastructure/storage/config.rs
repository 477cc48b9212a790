//! TOML-based configuration persistence for a LAN-Collab node.
//!
//! Reads `NodeConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\LanCollab\config.toml`
//! - Linux:    `$XDG_CONFIG_HOME/lancollab/config.toml` or `~/.config/lancollab/config.toml`
//! - macOS:    `~/Library/Application Support/LanCollab/config.toml`
//!
//! An explicit path (the `--config` flag) overrides the platform location.
//!
//! # What is TOML? (for beginners)
//!
//! TOML (Tom's Obvious Minimal Language) is a configuration file format designed
//! to be easy to read and write.  It looks similar to INI files but with more
//! data types.  Example:
//!
//! ```toml
//! [node]
//! name = "design-workstation"
//! log_level = "info"
//!
//! [network]
//! subnet = "192.168.1.0/24"
//! broadcast_port = 24810
//! unicast_port = 24811
//! call_timeout_ms = 5000
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` use the return value
//! of `some_fn()` when the field is absent from the TOML file.  A node with no
//! config file at all therefore starts with the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use collab_core::{AddressError, NetworkAddress};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// `network.subnet` is not valid CIDR notation.
    #[error("invalid network.subnet: {0}")]
    InvalidNetwork(#[from] AddressError),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level node configuration stored on disk.
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct NodeConfig {
    #[serde(default)]
    pub node: NodeSection,
    #[serde(default)]
    pub network: NetworkSection,
}

/// Identity and logging of this node.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NodeSection {
    /// Display name sent to peers.
    #[serde(default = "default_node_name")]
    pub name: String,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Subnet and port settings.  Every node on the subnet must agree on the ports.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// CIDR range whose broadcast address receives announcements.
    #[serde(default = "default_subnet")]
    pub subnet: String,
    /// UDP port for announcements.
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,
    /// TCP port for subscribe and stop calls.
    #[serde(default = "default_unicast_port")]
    pub unicast_port: u16,
    /// Upper bound on one point-to-point call (connect, write, wait for ack).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_node_name() -> String {
    ["HOSTNAME", "COMPUTERNAME"]
        .iter()
        .filter_map(std::env::var_os)
        .filter_map(|v| v.into_string().ok())
        .find(|v| !v.trim().is_empty())
        .unwrap_or_else(|| "collab-node".to_string())
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_subnet() -> String {
    "192.168.1.0/24".to_string()
}
fn default_broadcast_port() -> u16 {
    24810
}
fn default_unicast_port() -> u16 {
    24811
}
fn default_call_timeout_ms() -> u64 {
    5000
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            name: default_node_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            subnet: default_subnet(),
            broadcast_port: default_broadcast_port(),
            unicast_port: default_unicast_port(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl NodeConfig {
    /// Parses `network.subnet`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidNetwork`] if the subnet is malformed.
    pub fn network_address(&self) -> Result<NetworkAddress, ConfigError> {
        Ok(NetworkAddress::parse(&self.network.subnet)?)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.network.call_timeout_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads `NodeConfig` from `explicit` or the platform location, returning
/// `NodeConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(explicit: Option<&Path>) -> Result<NodeConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => config_file_path()?,
    };
    load_config_from(&path)
}

fn load_config_from(path: &Path) -> Result<NodeConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!("loading config from {}", path.display());
            Ok(toml::from_str(&content)?)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!("no config at {}, using defaults", path.display());
            Ok(NodeConfig::default())
        }
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Resolves the platform config directory including the `LanCollab` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LanCollab"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lancollab"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LanCollab")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("lancollab_test_{}", Uuid::new_v4()))
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_has_expected_network() {
        // Arrange / Act
        let cfg = NodeConfig::default();

        // Assert
        assert_eq!(cfg.network.subnet, "192.168.1.0/24");
        assert_eq!(cfg.network.broadcast_port, 24810);
        assert_eq!(cfg.network.unicast_port, 24811);
        assert_eq!(cfg.call_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_default_node_name_is_never_empty() {
        let cfg = NodeConfig::default();
        assert!(!cfg.node.name.trim().is_empty());
        assert_eq!(cfg.node.log_level, "info");
    }

    // ── Parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: NodeConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg.network, NetworkSection::default());
        assert_eq!(cfg.node.log_level, "info");
    }

    #[test]
    fn test_deserialize_partial_network_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[network]
subnet = "10.1.0.0/16"
unicast_port = 9999
"#;

        // Act
        let cfg: NodeConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.network.subnet, "10.1.0.0/16");
        assert_eq!(cfg.network.unicast_port, 9999);
        assert_eq!(cfg.network.broadcast_port, 24810);
    }

    #[test]
    fn test_network_address_parses_configured_subnet() {
        let mut cfg = NodeConfig::default();
        cfg.network.subnet = "192.168.191.128/19".to_string();

        let network = cfg.network_address().unwrap();

        assert_eq!(network.to_string(), "192.168.160.0/19");
    }

    #[test]
    fn test_network_address_rejects_bad_subnet() {
        let mut cfg = NodeConfig::default();
        cfg.network.subnet = "192.168.1.0".to_string();

        assert!(matches!(
            cfg.network_address(),
            Err(ConfigError::InvalidNetwork(AddressError::InvalidFormat { .. }))
        ));
    }

    // ── load ──────────────────────────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = temp_dir().join("config.toml");

        let cfg = load_config(Some(&path)).unwrap();

        assert_eq!(cfg.network, NetworkSection::default());
    }

    #[test]
    fn test_load_config_reports_malformed_toml() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config(Some(&path));

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_reads_file_at_explicit_path() {
        // Arrange
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            "[node]\nname = \"bench-07\"\n\n[network]\ncall_timeout_ms = 750\n",
        )
        .unwrap();

        // Act
        let loaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded.node.name, "bench-07");
        assert_eq!(loaded.call_timeout(), Duration::from_millis(750));
        assert_eq!(loaded.network.subnet, "192.168.1.0/24");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"), "got {path:?}");
        }
        // NoPlatformConfigDir in a stripped environment is also acceptable.
    }
}
