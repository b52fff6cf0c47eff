use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use framefeed::{FeedConfig, SourceKind};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "FRAMEFEED_CONFIG",
        "FRAMEFEED_SOURCE_URL",
        "FRAMEFEED_DECODER_BIN",
        "FRAMEFEED_PROBE_BIN",
        "FRAMEFEED_PROBE_RETRY_SECS",
        "FRAMEFEED_PROBE_MAX_ATTEMPTS",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let toml = r#"
        [source]
        url = "https://cdn.example.com/hls/live.m3u8"
        width = 800
        height = 600
        frame_rate = 24.0
        decoder = "/opt/ffmpeg/bin/ffmpeg"

        [probe]
        command = "/opt/ffmpeg/bin/ffprobe"
        retry_secs = 2
        max_attempts = 30
    "#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    std::env::set_var("FRAMEFEED_CONFIG", file.path());
    std::env::set_var("FRAMEFEED_PROBE_RETRY_SECS", "1");

    let cfg = FeedConfig::load().expect("load config");
    assert_eq!(cfg.source_url, "https://cdn.example.com/hls/live.m3u8");
    assert_eq!(cfg.kind(), SourceKind::Stream);
    assert_eq!(cfg.width, 800);
    assert_eq!(cfg.height, 600);
    assert_eq!(cfg.decoder, "/opt/ffmpeg/bin/ffmpeg");
    assert_eq!(cfg.probe.command, "/opt/ffmpeg/bin/ffprobe");
    // Env override beats the file.
    assert_eq!(cfg.probe.retry_delay, Duration::from_secs(1));
    assert_eq!(cfg.probe.max_attempts, 30);

    clear_env();
}

#[test]
fn defaults_select_a_stub_device() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = FeedConfig::load().expect("load config");
    assert_eq!(cfg.source_url, "stub://camera");
    assert_eq!(cfg.kind(), SourceKind::Device);
    assert_eq!(cfg.width, 640);
    assert_eq!(cfg.height, 480);
    assert_eq!(cfg.probe.retry_delay, Duration::from_secs(5));
}

#[test]
fn url_scheme_selects_source_kind() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    for (url, kind) in [
        ("rtsp://camera-1/stream", SourceKind::Stream),
        ("http://host/live.m3u8", SourceKind::Stream),
        ("/dev/video0", SourceKind::Device),
        ("0", SourceKind::Device),
        ("stub://camera", SourceKind::Device),
    ] {
        std::env::set_var("FRAMEFEED_SOURCE_URL", url);
        let cfg = FeedConfig::load().expect("load config");
        assert_eq!(cfg.kind(), kind, "{}", url);
    }

    clear_env();
}

#[test]
fn rejects_malformed_env_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("FRAMEFEED_PROBE_RETRY_SECS", "soon");
    assert!(FeedConfig::load().is_err());

    clear_env();
}
