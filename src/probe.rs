//! Stream metadata discovery.
//!
//! Before a transcoded pipe can be read, the stream's geometry must be known:
//! the raw pipe protocol has no framing, so the chunk size `width*height*3`
//! is the only thing partitioning the byte sequence into frames. This module
//! invokes an external inspector (ffprobe by default) requesting a JSON
//! stream description, and retries on a fixed delay until stream info is
//! present.
//!
//! The retry policy is explicit configuration: a bounded probe surfaces a
//! terminal error once the bound is exceeded, while `max_attempts = 0`
//! retries indefinitely for long-lived streams that are expected to
//! eventually come up.

use std::process::Command;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

const DEFAULT_PROBE_COMMAND: &str = "ffprobe";
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_ATTEMPTS: u32 = 12;

/// Geometry of the first video stream, discovered once per source and
/// immutable thereafter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamMetadata {
    pub width: u32,
    pub height: u32,
}

/// Configuration for metadata probing.
#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// Inspector executable.
    pub command: String,
    /// Fixed delay between attempts.
    pub retry_delay: Duration,
    /// Attempt bound; 0 retries indefinitely.
    pub max_attempts: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_PROBE_COMMAND.to_string(),
            retry_delay: DEFAULT_RETRY_DELAY,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    streams: Vec<StreamEntry>,
}

#[derive(Debug, Deserialize)]
struct StreamEntry {
    width: Option<u32>,
    height: Option<u32>,
}

/// Discover the geometry of `uri`, blocking until stream info is present or
/// the attempt bound is exceeded. Success on attempt N costs exactly N
/// inspector invocations and N-1 retry delays.
pub fn probe(uri: &str, config: &ProbeConfig) -> Result<StreamMetadata> {
    let mut invoke = || run_inspector(&config.command, uri);
    probe_with(uri, config, &mut invoke)
}

/// Probe driver over an injectable inspector invocation. Separated from
/// `probe` so the retry policy is testable without spawning processes.
fn probe_with(
    uri: &str,
    config: &ProbeConfig,
    invoke: &mut dyn FnMut() -> Result<Vec<u8>>,
) -> Result<StreamMetadata> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match invoke().and_then(|output| extract_metadata(&output)) {
            Ok(metadata) => {
                log::info!(
                    "MetadataProbe: {} is {}x{} (attempt {})",
                    uri,
                    metadata.width,
                    metadata.height,
                    attempt
                );
                return Ok(metadata);
            }
            Err(err) => {
                if config.max_attempts != 0 && attempt >= config.max_attempts {
                    return Err(err).with_context(|| {
                        format!("no stream info for {} after {} attempts", uri, attempt)
                    });
                }
                log::warn!(
                    "MetadataProbe: could not access stream {} (attempt {}): {:#}",
                    uri,
                    attempt,
                    err
                );
                std::thread::sleep(config.retry_delay);
            }
        }
    }
}

fn run_inspector(command: &str, uri: &str) -> Result<Vec<u8>> {
    let output = Command::new(command)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            uri,
        ])
        .output()
        .with_context(|| format!("invoke inspector '{}'", command))?;
    Ok(output.stdout)
}

fn extract_metadata(output: &[u8]) -> Result<StreamMetadata> {
    let report: ProbeReport =
        serde_json::from_slice(output).context("parse inspector output as JSON")?;
    // The first stream carries the video geometry; a stream without
    // dimensions means the inspector has not seen the video track yet.
    let Some(first) = report.streams.first() else {
        bail!("inspector reported no streams");
    };
    match (first.width, first.height) {
        (Some(width), Some(height)) => Ok(StreamMetadata { width, height }),
        _ => bail!("first stream has no dimensions"),
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(max_attempts: u32) -> ProbeConfig {
        ProbeConfig {
            command: "unused".to_string(),
            retry_delay: Duration::ZERO,
            max_attempts,
        }
    }

    const VALID: &[u8] = br#"{"streams":[{"width":432,"height":240,"codec_type":"video"}]}"#;

    #[test]
    fn extracts_first_stream_geometry() -> Result<()> {
        let meta = extract_metadata(VALID)?;
        assert_eq!(
            meta,
            StreamMetadata {
                width: 432,
                height: 240
            }
        );
        Ok(())
    }

    #[test]
    fn report_without_streams_is_not_ready() {
        assert!(extract_metadata(br#"{"format":{}}"#).is_err());
        assert!(extract_metadata(br#"{"streams":[]}"#).is_err());
        assert!(extract_metadata(br#"{"streams":[{"codec_type":"audio"}]}"#).is_err());
        assert!(extract_metadata(b"").is_err());
    }

    #[test]
    fn succeeds_after_exactly_n_attempts() -> Result<()> {
        let mut attempts = 0u32;
        let mut invoke = || -> Result<Vec<u8>> {
            attempts += 1;
            if attempts < 3 {
                Ok(b"{}".to_vec())
            } else {
                Ok(VALID.to_vec())
            }
        };
        let meta = probe_with("rtsp://example/live", &fast_config(0), &mut invoke)?;
        assert_eq!(attempts, 3);
        assert_eq!(meta.width, 432);
        Ok(())
    }

    #[test]
    fn bounded_probe_fails_terminally() {
        let mut attempts = 0u32;
        let mut invoke = || -> Result<Vec<u8>> {
            attempts += 1;
            Ok(b"{}".to_vec())
        };
        let err = probe_with("rtsp://example/dead", &fast_config(4), &mut invoke).unwrap_err();
        assert_eq!(attempts, 4);
        assert!(err.to_string().contains("after 4 attempts"));
    }

    #[test]
    fn inspector_failure_counts_as_attempt() {
        let mut attempts = 0u32;
        let mut invoke = || -> Result<Vec<u8>> {
            attempts += 1;
            bail!("no such binary")
        };
        let err = probe_with("rtsp://example/live", &fast_config(2), &mut invoke).unwrap_err();
        assert_eq!(attempts, 2);
        assert!(err.to_string().contains("after 2 attempts"));
    }
}
