//! Bridge configuration.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! service_name = "servo-bridge"
//! log_level = "info"
//!
//! [redis]
//! dsn = "redis://localhost:6379/0"
//!
//! [serial]
//! port_name = "/dev/ttyACM0"
//!
//! [mapping]
//! label_file = "mapping_label.json"
//! ```

use bridge_common::config::{ConfigError, ConfigLoader, SharedConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Redis connection attempts before giving up.
pub const DEFAULT_MAX_RETRY: u32 = 3;
/// Default channel carrying detection labels.
pub const DEFAULT_CHANNEL: &str = "object-detection";
/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;
/// Default size of a single serial read.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1000;
/// Default serial read timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
/// Category used when a label or category is unknown.
pub const DEFAULT_FALLBACK_CATEGORY: &str = "fiveFinger";

/// Top-level configuration of the bridge binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Logging and instance identity.
    pub shared: SharedConfig,
    /// Redis connection.
    pub redis: RedisConfig,
    /// Serial port.
    pub serial: SerialConfig,
    /// Mapping files.
    #[serde(default)]
    pub mapping: MappingConfig,
}

/// Redis connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://:password@host:6379/0`.
    pub dsn: String,
    /// Connection attempts before giving up.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,
    /// Channel to subscribe to.
    #[serde(default = "default_channel")]
    pub channel: String,
}

/// Serial port settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyACM0`.
    pub port_name: String,
    /// Baud rate.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Bytes requested per read.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
    /// Read timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl SerialConfig {
    /// Read timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Label and servo mapping files.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    /// JSON object mapping detection label → category.
    #[serde(default = "default_label_file")]
    pub label_file: PathBuf,
    /// JSON object mapping category → servo values.
    #[serde(default = "default_servo_file")]
    pub servo_file: PathBuf,
    /// Category used for unknown labels and categories.
    #[serde(default = "default_fallback_category")]
    pub fallback_category: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            label_file: default_label_file(),
            servo_file: default_servo_file(),
            fallback_category: default_fallback_category(),
        }
    }
}

fn default_max_retry() -> u32 {
    DEFAULT_MAX_RETRY
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_label_file() -> PathBuf {
    PathBuf::from("mapping_label.json")
}

fn default_servo_file() -> PathBuf {
    PathBuf::from("mapping_servo.json")
}

fn default_fallback_category() -> String {
    DEFAULT_FALLBACK_CATEGORY.to_string()
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file is missing, malformed or invalid.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));
        if self.redis.dsn.trim().is_empty() {
            return invalid("redis.dsn cannot be empty");
        }
        if self.redis.max_retry == 0 {
            return invalid("redis.max_retry must be at least 1");
        }
        if self.redis.channel.is_empty() {
            return invalid("redis.channel cannot be empty");
        }
        if self.serial.port_name.trim().is_empty() {
            return invalid("serial.port_name cannot be empty");
        }
        if self.serial.baud_rate == 0 {
            return invalid("serial.baud_rate must be positive");
        }
        if self.serial.read_buffer_size == 0 {
            return invalid("serial.read_buffer_size must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_common::config::LogLevel;

    const MINIMAL: &str = r#"
[shared]
service_name = "servo-bridge"

[redis]
dsn = "redis://localhost:6379/0"

[serial]
port_name = "/dev/ttyACM0"
"#;

    #[test]
    fn test_defaults_applied() {
        let config = BridgeConfig::from_toml(MINIMAL).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.shared.log_level, LogLevel::Info);
        assert_eq!(config.redis.max_retry, DEFAULT_MAX_RETRY);
        assert_eq!(config.redis.channel, "object-detection");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.serial.read_buffer_size, 1000);
        assert_eq!(config.serial.timeout(), Duration::from_secs(1));
        assert_eq!(config.mapping.label_file, PathBuf::from("mapping_label.json"));
        assert_eq!(config.mapping.servo_file, PathBuf::from("mapping_servo.json"));
        assert_eq!(config.mapping.fallback_category, "fiveFinger");
    }

    #[test]
    fn test_overrides() {
        let text = r#"
[shared]
service_name = "servo-bridge"
log_level = "debug"

[redis]
dsn = "redis://cache:6380/1"
max_retry = 5
channel = "detections"

[serial]
port_name = "/dev/ttyUSB1"
baud_rate = 115200
timeout_ms = 250

[mapping]
fallback_category = "fist"
"#;
        let config = BridgeConfig::from_toml(text).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.redis.max_retry, 5);
        assert_eq!(config.redis.channel, "detections");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.serial.timeout(), Duration::from_millis(250));
        assert_eq!(config.mapping.fallback_category, "fist");
        assert_eq!(config.mapping.label_file, PathBuf::from("mapping_label.json"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let text = MINIMAL.replace("[serial]", "[serial]\nparity = \"none\"");
        assert!(matches!(
            BridgeConfig::from_toml(&text),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validation_failures() {
        let base = BridgeConfig::from_toml(MINIMAL).unwrap();

        let mut config = base.clone();
        config.redis.dsn = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = base.clone();
        config.redis.max_retry = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = base.clone();
        config.serial.port_name = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = base.clone();
        config.serial.baud_rate = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = base;
        config.shared.service_name = String::new();
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }
}
