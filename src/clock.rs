use log::trace;

/// Gate pulse length after each step advance.
pub const GATE_DURATION_MS: u32 = 50;
/// Full-scale value of the 12-bit DAC.
pub const CV_FULL_SCALE: u16 = 4095;

/// Step clock and gate timer driven from one free-running millisecond
/// counter.
///
/// Elapsed time is always `now.wrapping_sub(then)`, so the counter rolling
/// over from `u32::MAX` to 0 does not stall or double-fire either timer.
#[derive(Debug, Clone)]
pub struct ClockEngine {
    current_step: usize,
    last_step_ms: u32,
    gate_high: bool,
    gate_start_ms: u32,
    cv_sample: u16,
}

impl ClockEngine {
    pub fn new(start_ms: u32) -> Self {
        Self {
            current_step: 0,
            last_step_ms: start_ms,
            gate_high: false,
            gate_start_ms: start_ms,
            cv_sample: 0,
        }
    }

    /// Evaluate the step clock, then the gate timer, against one `now`.
    ///
    /// `step_count` must be at least 1. Returns the new CV sample on ticks
    /// where the step advanced.
    pub fn tick(
        &mut self,
        now_ms: u32,
        step_interval_ms: u32,
        step_count: usize,
        step_values: &[f32],
    ) -> Option<u16> {
        debug_assert!(step_count >= 1, "step count must be clamped upstream");
        let step_count = step_count.max(1);

        // The step count may have shrunk since the last tick.
        self.current_step %= step_count;

        let mut cv = None;
        if now_ms.wrapping_sub(self.last_step_ms) >= step_interval_ms {
            self.last_step_ms = now_ms;
            self.current_step = (self.current_step + 1) % step_count;
            self.gate_high = true;
            self.gate_start_ms = now_ms;

            let value = step_values.get(self.current_step).copied().unwrap_or(0.0);
            self.cv_sample = quantize_cv(value);
            trace!(
                "Clock: step {} at {}ms, cv={}",
                self.current_step, now_ms, self.cv_sample
            );
            cv = Some(self.cv_sample);
        }

        if self.gate_high && now_ms.wrapping_sub(self.gate_start_ms) >= GATE_DURATION_MS {
            self.gate_high = false;
        }

        cv
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub fn gate_high(&self) -> bool {
        self.gate_high
    }

    pub fn cv_sample(&self) -> u16 {
        self.cv_sample
    }

    /// Counter value at the most recent step advance (or at start).
    pub fn last_step_ms(&self) -> u32 {
        self.last_step_ms
    }
}

/// Map a 0.0–1.0 step value onto the 12-bit DAC range, rounding to nearest.
pub fn quantize_cv(value: f32) -> u16 {
    let v = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    (v * CV_FULL_SCALE as f32).round() as u16
}
