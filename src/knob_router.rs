use crate::parameters::ParameterStore;
use crate::step_matrix::StepGateMatrix;
use crate::types::{KnobMode, NUM_KNOBS};
use log::debug;

/// Decides whether the knob bank edits step values or sequence controls.
#[derive(Debug, Clone, Default)]
pub struct KnobRouter {
    mode: KnobMode,
}

impl KnobRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> KnobMode {
        self.mode
    }

    /// Apply this tick's mode-select edges. Step edit wins when both fire.
    pub fn apply_mode_edges(&mut self, step_edit: bool, control_edit: bool) {
        let next = if step_edit {
            KnobMode::StepEdit
        } else if control_edit {
            KnobMode::ControlEdit
        } else {
            return;
        };
        if next != self.mode {
            debug!("Knob mode: {:?} → {:?}", self.mode, next);
        }
        self.mode = next;
    }

    /// Feed this tick's knob samples to whichever target the mode selects.
    pub fn route(
        &self,
        samples: &[f32; NUM_KNOBS],
        params: &mut ParameterStore,
        matrix: &mut StepGateMatrix,
    ) {
        match self.mode {
            KnobMode::StepEdit => {
                let step_count = params.step_count();
                for (i, &sample) in samples.iter().enumerate().take(step_count) {
                    matrix.set_step_value(i, sample, step_count);
                }
            }
            KnobMode::ControlEdit => {
                params.set_from_controls(samples[0], samples[1]);
            }
        }
    }
}
