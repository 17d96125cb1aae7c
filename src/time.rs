//! Frame timing for the host loop.
//!
//! The controller only ever sees a `dt` in seconds. [`FrameClock`] produces
//! it from the wall clock, clamps it so a stalled window (dragging, a
//! debugger break) does not hand scenes a multi-second step, and applies the
//! pause and time-scale switches.
//!
//! # Example
//!
//! ```ignore
//! use stardrift::time::FrameClock;
//!
//! let mut clock = FrameClock::new(&config.clock);
//!
//! // In the redraw handler:
//! let dt = clock.tick();
//! controller.update(dt)?;
//! ```

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Clock settings from the app config.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Longest step handed to the controller, in seconds.
    pub max_delta: f32,
    pub time_scale: f32,
    /// Step used instead of the wall clock, for deterministic runs.
    pub fixed_delta: Option<f32>,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            max_delta: 0.1,
            time_scale: 1.0,
            fixed_delta: None,
        }
    }
}

/// Per-frame delta, elapsed time and FPS.
#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    elapsed_secs: f32,
    delta_secs: f32,
    frame_count: u64,
    fps: f32,
    fps_frame_count: u64,
    fps_window: f32,
    fps_update_interval: f32,
    paused: bool,
    max_delta: f32,
    fixed_delta: Option<f32>,
    time_scale: f32,
}

impl FrameClock {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            last_frame: Instant::now(),
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_window: 0.0,
            fps_update_interval: 0.5,
            paused: false,
            max_delta: config.max_delta.max(0.0),
            fixed_delta: config.fixed_delta,
            time_scale: config.time_scale.max(0.0),
        }
    }

    /// Advance by the wall-clock time since the last call. Call once per
    /// frame. Returns the scaled, clamped delta.
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let raw = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.advance(raw)
    }

    /// Advance by an explicit raw duration.
    pub fn advance(&mut self, raw: Duration) -> f32 {
        let raw_secs = self.fixed_delta.unwrap_or(raw.as_secs_f32());
        self.frame_count += 1;

        self.fps_window += raw_secs;
        if self.fps_window >= self.fps_update_interval {
            self.fps = (self.frame_count - self.fps_frame_count) as f32 / self.fps_window;
            self.fps_frame_count = self.frame_count;
            self.fps_window = 0.0;
        }

        if self.paused {
            self.delta_secs = 0.0;
            return 0.0;
        }

        self.delta_secs = raw_secs.min(self.max_delta) * self.time_scale;
        self.elapsed_secs += self.delta_secs;
        self.delta_secs
    }

    /// Scaled seconds advanced so far, excluding paused time.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[inline]
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// While paused, `tick` returns 0 and `elapsed` stops increasing.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if self.paused {
            self.last_frame = Instant::now();
            self.paused = false;
        }
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// Negative scales clamp to 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(&ClockConfig::default())
    }
}
