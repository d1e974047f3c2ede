use crate::types::MAX_STEPS;
use serde::{Deserialize, Serialize};

/// One of the two gate-flag tracks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Row {
    A,
    B,
}

impl Row {
    pub fn index(self) -> usize {
        match self {
            Row::A => 0,
            Row::B => 1,
        }
    }
}

/// Per-step CV values and per-row gate flags, stored in fixed capacity.
///
/// Storage always spans `MAX_STEPS`; callers pass the active step count and
/// every mutation checks it, so entries past the active length are kept but
/// never written through a stale index.
#[derive(Debug, Clone)]
pub struct StepGateMatrix {
    values: [f32; MAX_STEPS],
    gates: [[bool; MAX_STEPS]; 2],
}

impl StepGateMatrix {
    pub fn new(step_count: usize) -> Self {
        let mut m = Self {
            values: [0.0; MAX_STEPS],
            gates: [[false; MAX_STEPS]; 2],
        };
        m.reset(step_count);
        m
    }

    /// Evenly spaced ramp i / (n - 1) over the active steps. Gate flags are
    /// left alone. A single step sits at 0.0.
    pub fn reset(&mut self, step_count: usize) {
        let n = step_count.clamp(1, MAX_STEPS);
        for (i, v) in self.values.iter_mut().take(n).enumerate() {
            *v = if n == 1 { 0.0 } else { i as f32 / (n - 1) as f32 };
        }
    }

    /// Direct write from a knob. Ignored outside the active length.
    pub fn set_step_value(&mut self, index: usize, value: f32, step_count: usize) {
        if index < step_count.min(MAX_STEPS) {
            self.values[index] = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
        }
    }

    /// Flip one gate flag if `fired`. Channels `[0, n)` address row A,
    /// `[n, 2n)` row B, regardless of sequencer mode.
    pub fn toggle_on_edge(&mut self, channel: usize, fired: bool, step_count: usize) {
        if !fired {
            return;
        }
        if let Some((row, step)) = channel_to_cell(channel, step_count) {
            let cell = &mut self.gates[row.index()][step];
            *cell = !*cell;
        }
    }

    pub fn step_value(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    pub fn gate(&self, row: Row, index: usize) -> bool {
        self.gates[row.index()].get(index).copied().unwrap_or(false)
    }

    pub fn values(&self) -> &[f32; MAX_STEPS] {
        &self.values
    }

    pub fn gates(&self) -> &[[bool; MAX_STEPS]; 2] {
        &self.gates
    }
}

/// Map a trigger channel to (row, step) for the given step count.
pub fn channel_to_cell(channel: usize, step_count: usize) -> Option<(Row, usize)> {
    let n = step_count.clamp(1, MAX_STEPS);
    if channel >= n * 2 {
        return None;
    }
    let row = if channel >= n { Row::B } else { Row::A };
    Some((row, channel % n))
}
