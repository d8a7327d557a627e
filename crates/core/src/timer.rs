//! Frame timing.

use std::time::{Duration, Instant};

/// Length of the window over which [`FrameTimer`] averages frame times.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Per-frame timing sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTime {
    /// Seconds since the timer started.
    pub total: f32,
    /// Seconds since the previous tick.
    pub delta: f32,
}

/// Averaged frame statistics over one report interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    pub fps: f32,
    pub frame_ms: f32,
}

/// Frame clock used by the main loop.
///
/// `tick` returns total and delta time and, roughly once per second,
/// an averaged [`FrameReport`].
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    window_start: Instant,
    window_frames: u32,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            window_start: now,
            window_frames: 0,
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    /// Advance the clock by one frame.
    pub fn tick(&mut self) -> (FrameTime, Option<FrameReport>) {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> (FrameTime, Option<FrameReport>) {
        let delta = if self.paused_at.is_some() {
            Duration::ZERO
        } else {
            now.saturating_duration_since(self.last_tick)
        };
        self.last_tick = now;
        self.window_frames += 1;

        let mut report = None;
        let window = now.saturating_duration_since(self.window_start);
        if window >= REPORT_INTERVAL {
            let fps = self.window_frames as f32 / window.as_secs_f32();
            report = Some(FrameReport {
                fps,
                frame_ms: 1000.0 / fps,
            });
            self.window_frames = 0;
            self.window_start = now;
        }

        (
            FrameTime {
                total: self.total_at(now).as_secs_f32(),
                delta: delta.as_secs_f32(),
            },
            report,
        )
    }

    fn total_at(&self, now: Instant) -> Duration {
        let paused = match self.paused_at {
            Some(at) => self.paused_total + now.saturating_duration_since(at),
            None => self.paused_total,
        };
        now.saturating_duration_since(self.start)
            .saturating_sub(paused)
    }

    /// Stop advancing total time, e.g. while the window is minimized.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(Instant::now());
        }
    }

    pub fn resume(&mut self) {
        if let Some(at) = self.paused_at.take() {
            let now = Instant::now();
            self.paused_total += now.saturating_duration_since(at);
            self.last_tick = now;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_is_time_between_ticks() {
        let mut timer = FrameTimer::new();
        let t0 = timer.start;
        let (first, _) = timer.tick_at(t0 + Duration::from_millis(16));
        let (second, _) = timer.tick_at(t0 + Duration::from_millis(48));
        assert!((first.delta - 0.016).abs() < 1e-4);
        assert!((second.delta - 0.032).abs() < 1e-4);
        assert!((second.total - 0.048).abs() < 1e-4);
    }

    #[test]
    fn test_report_after_one_second() {
        let mut timer = FrameTimer::new();
        let t0 = timer.start;
        let mut last = None;
        for i in 1..=50 {
            let (_, report) = timer.tick_at(t0 + Duration::from_millis(i * 20));
            if report.is_some() {
                last = report;
            }
        }
        let report = last.expect("a report within one second");
        assert!((report.fps - 50.0).abs() < 0.5);
        assert!((report.frame_ms - 20.0).abs() < 0.5);
    }

    #[test]
    fn test_paused_timer_reports_zero_delta() {
        let mut timer = FrameTimer::new();
        timer.pause();
        assert!(timer.is_paused());
        let (time, _) = timer.tick();
        assert_eq!(time.delta, 0.0);
        timer.resume();
        assert!(!timer.is_paused());
    }
}
