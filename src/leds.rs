//! LED and text-display model derived from a `RenderModel`.
//!
//! The panel has one LED per knob (8) and one per key (16, A1–A8 then
//! B1–B8). Knob LEDs follow the playhead; key LEDs add the gate flags.

use crate::types::*;

pub const NUM_KNOB_LEDS: usize = NUM_KNOBS;
pub const NUM_KEY_LEDS: usize = DUAL_ROW_WIDTH * 2;

/// Dim level for a step that is not playing, relative to its value.
const IDLE_SCALE: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedFrame {
    pub knobs: [f32; NUM_KNOB_LEDS],
    pub keys: [f32; NUM_KEY_LEDS],
}

/// Brightness of one step: full on the playing step with gate high, half on
/// the playing step otherwise, else a dim reflection of the step value.
pub fn step_brightness(frame: &RenderModel, step: usize) -> f32 {
    if step == frame.current_step && frame.gate_high {
        1.0
    } else if step == frame.current_step {
        0.5
    } else {
        frame.step_values[step] * IDLE_SCALE
    }
}

pub fn led_frame(frame: &RenderModel) -> LedFrame {
    let mut leds = LedFrame {
        knobs: [0.0; NUM_KNOB_LEDS],
        keys: [0.0; NUM_KEY_LEDS],
    };
    let flag = |row: usize, step: usize| if frame.gate_flags[row][step] { 1.0 } else { 0.0 };

    for step in 0..frame.step_count.min(NUM_KNOB_LEDS) {
        leds.knobs[step] = step_brightness(frame, step);
    }

    match frame.mode {
        SequencerMode::Dual => {
            for step in 0..frame.step_count.min(DUAL_ROW_WIDTH) {
                let b = step_brightness(frame, step);
                leds.keys[step] = (b + flag(0, step)).min(1.0);
                leds.keys[DUAL_ROW_WIDTH + step] = (b + flag(1, step)).min(1.0);
            }
        }
        SequencerMode::Single => {
            // Row B is still stored but never shown here.
            for step in 0..frame.step_count.min(NUM_KEY_LEDS) {
                let b = step_brightness(frame, step);
                leds.keys[step] = (b + flag(0, step)).min(1.0);
            }
        }
    }
    leds
}

/// The three lines shown on the OLED.
pub fn display_lines(frame: &RenderModel) -> [String; 3] {
    let mode = match frame.knob_mode {
        KnobMode::StepEdit => "Step Mode",
        KnobMode::ControlEdit => "Control Mode",
    };
    [
        mode.to_string(),
        format!("BPM: {}", frame.tempo as i32),
        format!("Steps: {}", frame.step_count),
    ]
}
