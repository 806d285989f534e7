//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{KissError, Result};
use crate::kiss::link::LinkOptions;
use crate::kiss::protocol::{MAX_PADDING, MIN_FRAME_LEN};

/// Baud rates accepted for the serial link
pub const SUPPORTED_BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// KISS link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default)]
    pub crc32: bool,

    #[serde(default)]
    pub padding: usize,

    /// Advisory TX delay in units of 10 ms
    #[serde(default = "default_tx_delay")]
    pub tx_delay: u8,

    /// Transport reads per receive before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Also write a daily rolling log file here
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_buffer_size() -> usize { 256 }
fn default_tx_delay() -> u8 { 1 }
fn default_max_attempts() -> u32 { 10 }

fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_timeout_ms() -> u64 { 100 }

fn default_log_level() -> String { "info".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            crc32: false,
            padding: 0,
            tx_delay: default_tx_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> KissError {
    KissError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kiss_link::config::Config;
    ///
    /// let config = Config::load("kiss-link.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Link
        if self.link.buffer_size < MIN_FRAME_LEN || self.link.buffer_size > 65535 {
            return Err(invalid("buffer_size must be between 3 and 65535"));
        }

        if self.link.padding > MAX_PADDING {
            return Err(invalid(format!("padding must be between 0 and {}", MAX_PADDING)));
        }

        if self.link.max_attempts == 0 || self.link.max_attempts > 10000 {
            return Err(invalid("max_attempts must be between 1 and 10000"));
        }

        // Serial
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!("unsupported baud_rate {}", self.serial.baud_rate)));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 10000 {
            return Err(invalid("timeout_ms must be between 1 and 10000"));
        }

        // Logging
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(invalid(format!(
                "log level must be one of {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }

    /// Link settings for `Link::new`
    pub fn link_options(&self) -> LinkOptions {
        LinkOptions {
            tx_delay: self.link.tx_delay,
            padding: self.link.padding,
            crc32: self.link.crc32,
        }
    }

    pub fn serial_timeout(&self) -> Duration {
        Duration::from_millis(self.serial.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.link.buffer_size, 256);
        assert!(!config.link.crc32);
        assert_eq!(config.link.padding, 0);
        assert_eq!(config.link.tx_delay, 1);
        assert_eq!(config.link.max_attempts, 10);
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[link]
buffer_size = 512
crc32 = true
padding = 4

[serial]
port = "/dev/ttyACM1"
baud_rate = 57600

[logging]
level = "debug"
dir = "./logs"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.link.buffer_size, 512);
        assert!(config.link.crc32);
        assert_eq!(config.link.padding, 4);
        assert_eq!(config.link.tx_delay, 1);
        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 57600);
        assert_eq!(config.serial.timeout_ms, 100);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.dir, Some(PathBuf::from("./logs")));
    }

    #[test]
    fn test_shipped_default_config_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.link.buffer_size, 256);
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert!(config.logging.dir.is_none());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.link.buffer_size, 256);
        assert_eq!(config.serial.timeout_ms, 100);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load(dir.path().join("missing.toml"));
        assert!(matches!(result, Err(KissError::Io(_))));
    }

    #[test]
    fn test_malformed_toml() {
        let result = Config::parse("[link\nbuffer_size = 1");
        assert!(matches!(result, Err(KissError::Config(_))));
    }

    #[test]
    fn test_wrong_type() {
        let result = Config::parse("[link]\ncrc32 = \"yes\"");
        assert!(matches!(result, Err(KissError::Config(_))));
    }

    #[test]
    fn test_link_options() {
        let config = Config::parse("[link]\ncrc32 = true\npadding = 2\ntx_delay = 30").unwrap();
        assert_eq!(
            config.link_options(),
            LinkOptions {
                tx_delay: 30,
                padding: 2,
                crc32: true
            }
        );
    }

    #[test]
    fn test_serial_timeout() {
        let config = Config::parse("[serial]\ntimeout_ms = 250").unwrap();
        assert_eq!(config.serial_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_buffer_size_too_small() {
        let mut config = Config::default();
        config.link.buffer_size = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_size_too_large() {
        let mut config = Config::default();
        config.link.buffer_size = 65536;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_buffer_size_bounds_accepted() {
        let mut config = Config::default();
        config.link.buffer_size = 3;
        assert!(config.validate().is_ok());
        config.link.buffer_size = 65535;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_padding_too_high() {
        let mut config = Config::default();
        config.link.padding = 33;
        assert!(config.validate().is_err());
        config.link.padding = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_attempts_zero() {
        let mut config = Config::default();
        config.link.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_attempts_too_high() {
        let mut config = Config::default();
        config.link.max_attempts = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_all_supported_baud_rates() {
        let mut config = Config::default();
        for &baud in SUPPORTED_BAUD_RATES {
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "baud {} rejected", baud);
        }
    }

    #[test]
    fn test_timeout_ms_zero() {
        let mut config = Config::default();
        config.serial.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ms_too_high() {
        let mut config = Config::default();
        config.serial.timeout_ms = 10001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
