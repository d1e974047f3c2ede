//! Sequence-level controls: step count and tempo, plus the values derived
//! from them (sequencer mode, step interval).

use crate::types::{SequencerMode, DUAL_ROW_WIDTH, MAX_STEPS};
use log::debug;

pub const MIN_TEMPO: f32 = 50.0;
pub const MAX_TEMPO: f32 = 350.0;
const TEMPO_SPAN: f32 = MAX_TEMPO - MIN_TEMPO;

pub const DEFAULT_STEP_COUNT: usize = 8;
pub const DEFAULT_TEMPO: f32 = 120.0;

#[derive(Debug, Clone)]
pub struct ParameterStore {
    /// Always within [1, MAX_STEPS]
    step_count: usize,
    /// Always within [MIN_TEMPO, MAX_TEMPO], whole BPM
    tempo: f32,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self {
            step_count: DEFAULT_STEP_COUNT,
            tempo: DEFAULT_TEMPO,
        }
    }

    /// Re-map the two control knobs onto step count and tempo.
    ///
    /// `knob0` selects round(16 × knob0) steps, `knob1` selects
    /// round(50 + 300 × knob1) BPM. Both results are clamped so a zero step
    /// count can never reach the modulo in the clock.
    pub fn set_from_controls(&mut self, knob0: f32, knob1: f32) {
        let steps = (MAX_STEPS as f32 * normalize(knob0)).round() as usize;
        let tempo = (MIN_TEMPO + TEMPO_SPAN * normalize(knob1)).round();

        let step_count = steps.clamp(1, MAX_STEPS);
        let tempo = tempo.clamp(MIN_TEMPO, MAX_TEMPO);

        if step_count != self.step_count || tempo != self.tempo {
            debug!(
                "Parameters: steps {} → {}, tempo {:.0} → {:.0}",
                self.step_count, step_count, self.tempo, tempo
            );
        }
        self.step_count = step_count;
        self.tempo = tempo;
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn tempo(&self) -> f32 {
        self.tempo
    }

    /// Single once the sequence no longer fits two rows of eight keys.
    pub fn mode(&self) -> SequencerMode {
        if self.step_count > DUAL_ROW_WIDTH {
            SequencerMode::Single
        } else {
            SequencerMode::Dual
        }
    }

    /// Milliseconds per step, floor(60000 / tempo). Recomputed on every call.
    pub fn step_interval_ms(&self) -> u32 {
        (60_000.0 / self.tempo) as u32
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Knob readings outside [0, 1] (or NaN from a glitching ADC) pin to the rails.
fn normalize(v: f32) -> f32 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
