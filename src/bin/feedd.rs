//! feedd - latest-frame feed daemon
//!
//! This daemon:
//! 1. Loads the layered config (file + environment)
//! 2. Opens the configured source (capture device or transcoded stream)
//! 3. Starts the background pump
//! 4. Samples the latest-frame slot at a fixed interval
//! 5. Logs the measured consumption rate periodically
//! 6. Stops the source cleanly on ctrl-c (or after --seconds)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use framefeed::{DeviceSource, FeedConfig, Frame, PipeSource, RateMeter, SourceKind};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Run duration in seconds; 0 runs until ctrl-c.
    #[arg(long, default_value_t = 0)]
    seconds: u64,
    /// Slot sampling interval in milliseconds.
    #[arg(long, default_value_t = 10)]
    sample_ms: u64,
    /// Seconds between rate log lines.
    #[arg(long, default_value_t = 5)]
    report_secs: u64,
}

enum Source {
    Device(DeviceSource),
    Pipe(PipeSource),
}

impl Source {
    fn latest(&self) -> Option<Arc<Frame>> {
        match self {
            Source::Device(source) => source.read().1,
            Source::Pipe(source) => source.read(),
        }
    }

    fn stop_wait(&mut self) {
        match self {
            Source::Device(source) => source.stop_wait(),
            Source::Pipe(source) => source.stop_wait(),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = FeedConfig::load()?;
    log::info!("feedd starting on {}", cfg.source_url);

    let mut source = match cfg.kind() {
        SourceKind::Device => {
            let mut source = DeviceSource::open(cfg.device_config())?;
            source.start()?;
            log::info!(
                "device source running ({}x{} @ {:.1} fps)",
                source.width(),
                source.height(),
                source.frame_rate()
            );
            Source::Device(source)
        }
        SourceKind::Stream => {
            let mut source = PipeSource::open(cfg.pipe_config())?;
            source.start()?;
            log::info!(
                "stream source running ({}x{})",
                source.width(),
                source.height()
            );
            Source::Pipe(source)
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_running = Arc::clone(&running);
    ctrlc::set_handler(move || {
        ctrlc_running.store(false, Ordering::Release);
    })?;

    let started = Instant::now();
    let sample_interval = Duration::from_millis(args.sample_ms.max(1));
    let report_interval = Duration::from_secs(args.report_secs.max(1));

    let mut meter = RateMeter::new();
    meter.start();
    let mut last_report = Instant::now();
    let mut last_frame: Option<Arc<Frame>> = None;

    while running.load(Ordering::Acquire) {
        if args.seconds > 0 && started.elapsed() >= Duration::from_secs(args.seconds) {
            break;
        }

        if let Some(frame) = source.latest() {
            let fresh = match &last_frame {
                Some(previous) => !Arc::ptr_eq(previous, &frame),
                None => true,
            };
            if fresh {
                meter.update();
                last_frame = Some(frame);
            }
        }

        if last_report.elapsed() >= report_interval {
            meter.stop();
            log::info!(
                "consuming {:.1} fps ({} frames / {:.1}s)",
                meter.fps(),
                meter.frames(),
                meter.elapsed().as_secs_f64()
            );
            meter.start();
            last_report = Instant::now();
        }

        std::thread::sleep(sample_interval);
    }

    log::info!("feedd stopping");
    source.stop_wait();
    Ok(())
}
