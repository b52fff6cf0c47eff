//! Daemon configuration.
//!
//! Layered the usual way: built-in defaults, then an optional TOML config
//! file (path from `FRAMEFEED_CONFIG`), then environment overrides, then
//! validation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::probe::ProbeConfig;
use crate::source::{DeviceConfig, PipeConfig};

const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FRAME_RATE: f64 = 30.0;
const DEFAULT_DECODER_BIN: &str = "ffmpeg";
const DEFAULT_PROBE_BIN: &str = "ffprobe";
const DEFAULT_PROBE_RETRY_SECS: u64 = 5;
const DEFAULT_PROBE_MAX_ATTEMPTS: u32 = 12;

#[derive(Debug, Deserialize, Default)]
struct FeedConfigFile {
    source: Option<SourceConfigFile>,
    probe: Option<ProbeConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    frame_rate: Option<f64>,
    decoder: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ProbeConfigFile {
    command: Option<String>,
    retry_secs: Option<u64>,
    max_attempts: Option<u32>,
}

/// Which source kind a URL selects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    /// Local capture device (device node, index, or `stub://`).
    Device,
    /// Remotely transcoded stream, decoded by an external process.
    Stream,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub source_url: String,
    pub width: u32,
    pub height: u32,
    pub frame_rate: f64,
    pub decoder: String,
    pub probe: ProbeConfig,
}

impl FeedConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FRAMEFEED_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Which source kind the configured URL selects. Network schemes go
    /// through the external decoder; everything else is a local device.
    pub fn kind(&self) -> SourceKind {
        let streaming_schemes = ["http://", "https://", "rtsp://", "rtmp://", "udp://"];
        if streaming_schemes
            .iter()
            .any(|scheme| self.source_url.starts_with(scheme))
        {
            SourceKind::Stream
        } else {
            SourceKind::Device
        }
    }

    pub fn device_config(&self) -> DeviceConfig {
        DeviceConfig {
            uri: self.source_url.clone(),
            width: self.width,
            height: self.height,
            frame_rate: self.frame_rate,
        }
    }

    pub fn pipe_config(&self) -> PipeConfig {
        PipeConfig {
            url: self.source_url.clone(),
            decoder: self.decoder.clone(),
            probe: self.probe.clone(),
        }
    }

    fn from_file(file: FeedConfigFile) -> Self {
        let source = file.source.unwrap_or_default();
        let probe = file.probe.unwrap_or_default();
        Self {
            source_url: source.url.unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string()),
            width: source.width.unwrap_or(DEFAULT_WIDTH),
            height: source.height.unwrap_or(DEFAULT_HEIGHT),
            frame_rate: source.frame_rate.unwrap_or(DEFAULT_FRAME_RATE),
            decoder: source
                .decoder
                .unwrap_or_else(|| DEFAULT_DECODER_BIN.to_string()),
            probe: ProbeConfig {
                command: probe
                    .command
                    .unwrap_or_else(|| DEFAULT_PROBE_BIN.to_string()),
                retry_delay: Duration::from_secs(
                    probe.retry_secs.unwrap_or(DEFAULT_PROBE_RETRY_SECS),
                ),
                max_attempts: probe.max_attempts.unwrap_or(DEFAULT_PROBE_MAX_ATTEMPTS),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("FRAMEFEED_SOURCE_URL") {
            if !url.trim().is_empty() {
                self.source_url = url;
            }
        }
        if let Ok(decoder) = std::env::var("FRAMEFEED_DECODER_BIN") {
            if !decoder.trim().is_empty() {
                self.decoder = decoder;
            }
        }
        if let Ok(command) = std::env::var("FRAMEFEED_PROBE_BIN") {
            if !command.trim().is_empty() {
                self.probe.command = command;
            }
        }
        if let Ok(retry) = std::env::var("FRAMEFEED_PROBE_RETRY_SECS") {
            let seconds: u64 = retry.parse().map_err(|_| {
                anyhow!("FRAMEFEED_PROBE_RETRY_SECS must be an integer number of seconds")
            })?;
            self.probe.retry_delay = Duration::from_secs(seconds);
        }
        if let Ok(attempts) = std::env::var("FRAMEFEED_PROBE_MAX_ATTEMPTS") {
            self.probe.max_attempts = attempts
                .parse()
                .map_err(|_| anyhow!("FRAMEFEED_PROBE_MAX_ATTEMPTS must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.source_url.trim().is_empty() {
            return Err(anyhow!("source url must not be empty"));
        }
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("frame geometry must be non-zero"));
        }
        if self.frame_rate <= 0.0 {
            return Err(anyhow!("frame rate must be positive"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<FeedConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
