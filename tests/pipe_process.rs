//! Process-level pipe source tests using fake inspector/decoder executables.

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use framefeed::{PipeConfig, PipeSource, ProbeConfig, SourceState};

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("create script");
    file.write_all(body.as_bytes()).expect("write script");
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("mark script executable");
    path
}

fn fake_inspector(dir: &Path, json: &str) -> PathBuf {
    write_script(
        dir,
        "fake-ffprobe",
        &format!("#!/bin/sh\nprintf '%s' '{}'\n", json),
    )
}

/// Decoder emitting exactly `frames` full 8x4 RGB24 frames, then closing.
fn fake_decoder(dir: &Path, frames: usize) -> PathBuf {
    write_script(
        dir,
        "fake-ffmpeg",
        &format!("#!/bin/sh\nexec head -c {} /dev/zero\n", frames * 8 * 4 * 3),
    )
}

fn pipe_config(inspector: &Path, decoder: &Path) -> PipeConfig {
    PipeConfig {
        url: "https://cdn.example.test/hls/live.m3u8".to_string(),
        decoder: decoder.display().to_string(),
        probe: ProbeConfig {
            command: inspector.display().to_string(),
            retry_delay: Duration::ZERO,
            max_attempts: 3,
        },
    }
}

#[test]
fn pipe_source_reads_k_frames_then_stops_producing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inspector = fake_inspector(dir.path(), r#"{"streams":[{"width":8,"height":4}]}"#);
    let decoder = fake_decoder(dir.path(), 3);

    let mut source = PipeSource::open(pipe_config(&inspector, &decoder)).expect("open source");
    assert_eq!(source.width(), 8);
    assert_eq!(source.height(), 4);

    // Construction performed the first synchronous read.
    let first = source.read().expect("first frame before start");
    assert_eq!(first.byte_len(), 8 * 4 * 3);
    assert_eq!(source.stats().frames_pumped, 0);

    source.start().expect("start pump");

    // The remaining 2 frames arrive, then the short read ends the pump.
    let deadline = Instant::now() + Duration::from_secs(5);
    while source.stats().frames_pumped < 2 {
        assert!(Instant::now() < deadline, "pump made no progress");
        std::thread::sleep(Duration::from_millis(5));
    }
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(source.stats().frames_pumped, 2);
    assert!(source.read().is_some());

    source.stop_wait();
    assert_eq!(source.state(), SourceState::Stopped);

    // A second stop has no observable effect.
    source.stop();
    assert_eq!(source.stats().frames_pumped, 2);
}

#[test]
fn bounded_probe_failure_is_fatal_at_construction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inspector = fake_inspector(dir.path(), "{}");
    let decoder = fake_decoder(dir.path(), 1);

    let err = match PipeSource::open(pipe_config(&inspector, &decoder)) {
        Ok(_) => panic!("probe against a stream with no info must fail"),
        Err(err) => err,
    };
    assert!(
        err.to_string().contains("after 3 attempts"),
        "unexpected error: {:#}",
        err
    );
}

#[test]
fn drop_terminates_the_decoder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let inspector = fake_inspector(dir.path(), r#"{"streams":[{"width":8,"height":4}]}"#);
    // Decoder that would stream forever.
    let decoder = write_script(
        dir.path(),
        "fake-ffmpeg",
        "#!/bin/sh\nexec cat /dev/zero\n",
    );

    let mut source = PipeSource::open(pipe_config(&inspector, &decoder)).expect("open source");
    source.start().expect("start pump");
    // Dropping kills the child and joins the pump; the test hangs here if
    // the blocking read is never unblocked.
    drop(source);
}
