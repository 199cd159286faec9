use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    /// Frame source selector. "pattern" is the built-in synthetic source;
    /// deployments with real hardware register their own source under a
    /// different name.
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StreamConfig {
    /// Minimum delay between captures. Zero disables pacing and the camera's
    /// native rate applies.
    #[serde(default = "default_capture_interval")]
    pub capture_interval_secs: f64,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    #[serde(default = "default_buffer_dir")]
    pub buffer_dir: String,
    /// Recording window, inclusive on both ends: record while
    /// start_hour <= local hour <= end_hour.
    #[serde(default = "default_start_hour")]
    pub start_hour: u32,
    #[serde(default = "default_end_hour")]
    pub end_hour: u32,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_disk_threshold")]
    pub disk_threshold_percent: f64,
    #[serde(default = "default_record_command")]
    pub command: String,
    #[serde(default = "default_segment_ms")]
    pub segment_ms: u64,
    #[serde(default = "default_record_width")]
    pub width: u32,
    #[serde(default = "default_record_height")]
    pub height: u32,
    #[serde(default = "default_framerate")]
    pub framerate: u32,
    #[serde(default = "default_bitrate")]
    pub bitrate: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Forces level to "debug" regardless of `level`.
    #[serde(default)]
    pub debug: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capture_interval_secs: default_capture_interval(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            buffer_dir: default_buffer_dir(),
            start_hour: default_start_hour(),
            end_hour: default_end_hour(),
            poll_interval_secs: default_poll_interval(),
            disk_threshold_percent: default_disk_threshold(),
            command: default_record_command(),
            segment_ms: default_segment_ms(),
            width: default_record_width(),
            height: default_record_height(),
            framerate: default_framerate(),
            bitrate: default_bitrate(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            debug: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise use built-in defaults. A present
    /// but malformed file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::info!(path = %path.display(), "config file not found, using defaults");
            Ok(Config::default())
        }
    }

    /// Effective log filter string for the tracing subscriber.
    pub fn log_filter(&self) -> &str {
        if self.logging.debug {
            "debug"
        } else {
            &self.logging.level
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
}

// Default value functions
fn default_source() -> String {
    "pattern".into()
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_capture_interval() -> f64 {
    0.03
}
fn default_jpeg_quality() -> u8 {
    80
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_buffer_dir() -> String {
    "/var/lib/camserve/buffer".into()
}
fn default_start_hour() -> u32 {
    6
}
fn default_end_hour() -> u32 {
    17
}
fn default_poll_interval() -> u64 {
    10
}
fn default_disk_threshold() -> f64 {
    90.0
}
fn default_record_command() -> String {
    "rpicam-vid".into()
}
fn default_segment_ms() -> u64 {
    120_000
}
fn default_record_width() -> u32 {
    1640
}
fn default_record_height() -> u32 {
    1232
}
fn default_framerate() -> u32 {
    24
}
fn default_bitrate() -> u64 {
    4_000_000
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.camera.source, "pattern");
        assert_eq!(config.stream.jpeg_quality, 80);
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.recorder.start_hour, 6);
        assert_eq!(config.recorder.end_hour, 17);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn sections_override_defaults() {
        let toml = r#"
            [stream]
            capture_interval_secs = 0.5
            jpeg_quality = 60

            [server]
            host = "127.0.0.1"
            port = 9000

            [recorder]
            buffer_dir = "/tmp/buf"
            disk_threshold_percent = 75.0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.stream.capture_interval_secs, 0.5);
        assert_eq!(config.stream.jpeg_quality, 60);
        assert_eq!(config.server.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.recorder.buffer_dir, "/tmp/buf");
        assert_eq!(config.recorder.disk_threshold_percent, 75.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.camera.width, 1280);
    }

    #[test]
    fn debug_flag_forces_debug_filter() {
        let config: Config = toml::from_str("[logging]\nlevel = \"warn\"\ndebug = true").unwrap();
        assert_eq!(config.log_filter(), "debug");
        let config: Config = toml::from_str("[logging]\nlevel = \"warn\"").unwrap();
        assert_eq!(config.log_filter(), "warn");
    }
}
