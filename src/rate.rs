//! Frame-rate measurement.
//!
//! A stateless stopwatch counting frames over a wall-clock interval. Callers
//! drive it explicitly: `start()`, one `update()` per consumed frame, then
//! `stop()` and `fps()`.

use std::time::{Duration, Instant};

/// Stopwatch-style frames-per-second meter.
#[derive(Debug, Default)]
pub struct RateMeter {
    started_at: Option<Instant>,
    stopped_at: Option<Instant>,
    frames: u64,
}

impl RateMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the measurement window. Resets the frame counter.
    pub fn start(&mut self) {
        self.started_at = Some(Instant::now());
        self.stopped_at = None;
        self.frames = 0;
    }

    /// Record one consumed frame.
    pub fn update(&mut self) {
        self.frames += 1;
    }

    /// Close the measurement window.
    pub fn stop(&mut self) {
        self.stopped_at = Some(Instant::now());
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Length of the measurement window. While the meter is still running
    /// this is the time since `start()`; before `start()` it is zero.
    pub fn elapsed(&self) -> Duration {
        let Some(started_at) = self.started_at else {
            return Duration::ZERO;
        };
        match self.stopped_at {
            Some(stopped_at) => stopped_at.duration_since(started_at),
            None => started_at.elapsed(),
        }
    }

    /// Frames per second over the measurement window, 0.0 if the window is
    /// empty.
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.frames as f64 / secs
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_is_frames_over_elapsed() {
        let mut meter = RateMeter::new();
        meter.start();
        for _ in 0..30 {
            meter.update();
        }
        std::thread::sleep(Duration::from_millis(50));
        meter.stop();

        assert_eq!(meter.frames(), 30);
        let elapsed = meter.elapsed().as_secs_f64();
        assert!(elapsed >= 0.05);
        assert_eq!(meter.fps(), 30.0 / elapsed);
    }

    #[test]
    fn unstarted_meter_reports_zero() {
        let meter = RateMeter::new();
        assert_eq!(meter.elapsed(), Duration::ZERO);
        assert_eq!(meter.fps(), 0.0);
    }

    #[test]
    fn restart_resets_counter() {
        let mut meter = RateMeter::new();
        meter.start();
        meter.update();
        meter.update();
        meter.stop();
        meter.start();
        assert_eq!(meter.frames(), 0);
    }
}
