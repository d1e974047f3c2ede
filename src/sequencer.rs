//! The per-tick update that ties the knob router, parameters, step matrix
//! and clock together.
//!
//! `SequencerCore` owns all sequencer state. Nothing else mutates it; callers
//! hand in one `TickInput` per control-loop pass and get back a `RenderModel`
//! snapshot for the display, LEDs and DAC.

use crate::clock::ClockEngine;
use crate::knob_router::KnobRouter;
use crate::parameters::ParameterStore;
use crate::step_matrix::StepGateMatrix;
use crate::types::*;

/// Inputs for one tick, already reduced to normalized readings and edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInput {
    pub now_ms: u32,
    pub knobs: [f32; NUM_KNOBS],
    /// Rising edges on the mode switches: [0] step edit, [1] control edit
    pub mode_edges: [bool; NUM_SWITCHES],
    /// Rising edges per trigger channel; only `[0, 2 × step count)` is read
    pub trigger_edges: [bool; NUM_KEYS],
}

impl TickInput {
    /// No edges, knobs at rest.
    pub fn idle(now_ms: u32) -> Self {
        Self {
            now_ms,
            knobs: [0.0; NUM_KNOBS],
            mode_edges: [false; NUM_SWITCHES],
            trigger_edges: [false; NUM_KEYS],
        }
    }
}

#[derive(Debug, Clone)]
pub struct SequencerCore {
    params: ParameterStore,
    matrix: StepGateMatrix,
    clock: ClockEngine,
    router: KnobRouter,
}

impl SequencerCore {
    /// Power-on state: 8 steps at 120 BPM, ramp step values, all gates off,
    /// step-edit knob mode. The step clock starts counting from `start_ms`.
    pub fn new(start_ms: u32) -> Self {
        let params = ParameterStore::new();
        let matrix = StepGateMatrix::new(params.step_count());
        Self {
            params,
            matrix,
            clock: ClockEngine::new(start_ms),
            router: KnobRouter::new(),
        }
    }

    pub fn tick(&mut self, input: &TickInput) -> RenderModel {
        self.router
            .apply_mode_edges(input.mode_edges[0], input.mode_edges[1]);
        self.router
            .route(&input.knobs, &mut self.params, &mut self.matrix);

        let step_count = self.params.step_count();
        for (channel, &fired) in input.trigger_edges.iter().enumerate().take(step_count * 2) {
            self.matrix.toggle_on_edge(channel, fired, step_count);
        }

        let cv = self.clock.tick(
            input.now_ms,
            self.params.step_interval_ms(),
            step_count,
            self.matrix.values(),
        );

        RenderModel {
            timestamp_ms: input.now_ms,
            current_step: self.clock.current_step(),
            gate_high: self.clock.gate_high(),
            step_values: *self.matrix.values(),
            gate_flags: *self.matrix.gates(),
            step_count,
            mode: self.params.mode(),
            knob_mode: self.router.mode(),
            tempo: self.params.tempo(),
            cv_sample: self.clock.cv_sample(),
            cv_updated: cv.is_some(),
        }
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.params
    }

    pub fn matrix(&self) -> &StepGateMatrix {
        &self.matrix
    }

    pub fn clock(&self) -> &ClockEngine {
        &self.clock
    }

    pub fn knob_mode(&self) -> KnobMode {
        self.router.mode()
    }
}
