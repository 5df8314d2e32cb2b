use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Largest delta accepted for a single frame, in seconds.
    pub max_delta: f32,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self { max_delta: 0.1 }
    }
}

/// Time snapshot shared by every subsystem during one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FrameTime {
    pub delta: f32,
    pub elapsed: f32,
    pub frame: u64,
}

impl FrameTime {
    /// Elapsed time in milliseconds, the unit transition and timer deadlines use.
    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed as f64 * 1000.0
    }
}

/// Monotonic frame clock fed by the host loop.
pub struct FrameClock {
    elapsed: f32,
    frame: u64,
    pub config: ClockConfig,
}

impl FrameClock {
    pub fn new(config: ClockConfig) -> Self {
        Self {
            elapsed: 0.0,
            frame: 0,
            config,
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
        self.frame = 0;
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn now(&self) -> FrameTime {
        FrameTime {
            delta: 0.0,
            elapsed: self.elapsed,
            frame: self.frame,
        }
    }

    /// Advance by one host frame.
    ///
    /// Negative or non-finite deltas count as zero, and deltas from a
    /// backgrounded tab are clamped to `max_delta`.
    pub fn tick(&mut self, delta: f32) -> FrameTime {
        let delta = self.sanitize(delta);
        self.elapsed += delta;
        self.frame += 1;
        FrameTime {
            delta,
            elapsed: self.elapsed,
            frame: self.frame,
        }
    }

    fn sanitize(&self, delta: f32) -> f32 {
        if !delta.is_finite() || delta <= 0.0 {
            return 0.0;
        }
        delta.min(self.config.max_delta.max(0.0))
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(ClockConfig::default())
    }
}
