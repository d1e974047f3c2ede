use crate::types::*;
use crossbeam_channel::Sender;
use log::info;
use std::thread;
use std::time::Duration;

/// Plays a scripted operator at the panel: turning knobs, pressing mode
/// switches and trigger keys. Exercises the full pipeline without hardware.
pub struct Simulator {
    clock: PanelClock,
    tx: Sender<InputEvent>,
    tick_ms: u32,
}

/// Held panel state that gestures mutate.
#[derive(Clone)]
struct SimState {
    knobs: [f32; NUM_KNOBS],
    switches: [bool; NUM_SWITCHES],
    keys: [bool; NUM_KEYS],
}

impl Default for SimState {
    fn default() -> Self {
        // Knobs parked on the power-on ramp so entering step edit is seamless.
        let mut knobs = [0.0; NUM_KNOBS];
        for (i, k) in knobs.iter_mut().enumerate() {
            *k = i as f32 / (NUM_KNOBS - 1) as f32;
        }
        Self {
            knobs,
            switches: [false; NUM_SWITCHES],
            keys: [false; NUM_KEYS],
        }
    }
}

/// How long a switch or key is held down by a press gesture.
const PRESS_MS: u32 = 40;

impl Simulator {
    pub fn new(clock: PanelClock, tx: Sender<InputEvent>, tick_ms: u32) -> Self {
        Self {
            clock,
            tx,
            tick_ms: tick_ms.max(1),
        }
    }

    /// Run the demo script, then hold the final panel state indefinitely.
    /// Blocks the calling thread.
    pub fn run(&mut self) {
        info!("Simulator starting demo sequence...");
        let mut state = SimState::default();

        for gesture in &demo_sequence() {
            if !self.execute(gesture, &mut state) {
                return;
            }
        }

        info!("Demo sequence complete. Holding final state...");
        while self.emit_tick(&state) {}
    }

    /// Returns false once the coordinator has gone away.
    fn execute(&mut self, gesture: &Gesture, state: &mut SimState) -> bool {
        match gesture {
            Gesture::Hold { ms } => {
                info!("  hold {}ms", ms);
                self.hold(state, *ms)
            }

            Gesture::TurnKnob { index, to, ms } => {
                let from = state.knobs[*index];
                info!("  knob {} {:.2} → {:.2} over {}ms", index + 1, from, to, ms);
                let ticks = (ms / self.tick_ms).max(1);
                for i in 1..=ticks {
                    let t = i as f32 / ticks as f32;
                    state.knobs[*index] = lerp(from, *to, smoothstep(t));
                    if !self.emit_tick(state) {
                        return false;
                    }
                }
                true
            }

            Gesture::PressSwitch { index } => {
                info!("  press SW{}", index + 1);
                state.switches[*index] = true;
                let alive = self.hold(state, PRESS_MS);
                state.switches[*index] = false;
                alive
            }

            Gesture::PressKey { channel } => {
                info!("  press key channel {}", channel);
                state.keys[*channel] = true;
                let alive = self.hold(state, PRESS_MS);
                state.keys[*channel] = false;
                alive
            }
        }
    }

    fn hold(&mut self, state: &SimState, ms: u32) -> bool {
        for _ in 0..(ms / self.tick_ms).max(1) {
            if !self.emit_tick(state) {
                return false;
            }
        }
        true
    }

    /// Emit one panel scan, then sleep one tick period.
    fn emit_tick(&mut self, state: &SimState) -> bool {
        let frame = PanelFrame {
            timestamp_ms: self.clock.now_ms(),
            knobs: state.knobs,
            switches: state.switches,
            keys: state.keys,
        };
        if self.tx.send(InputEvent::Panel(frame)).is_err() {
            return false;
        }
        thread::sleep(Duration::from_millis(self.tick_ms as u64));
        true
    }
}

// ─── Gesture types ──────────────────────────────────────────────────────────

enum Gesture {
    Hold { ms: u32 },
    TurnKnob { index: usize, to: f32, ms: u32 },
    /// 0 = step edit, 1 = control edit
    PressSwitch { index: usize },
    /// Trigger channel: [0, n) row A, [n, 2n) row B for n active steps
    PressKey { channel: usize },
}

/// Roughly 20 seconds of panel play: shape a melody, program gates on both
/// rows, stretch to 12 steps (single row), speed up, then fold back to 6.
fn demo_sequence() -> Vec<Gesture> {
    vec![
        Gesture::Hold { ms: 2000 },

        // Shape a melody on the 8 default steps
        Gesture::TurnKnob { index: 1, to: 0.8, ms: 300 },
        Gesture::TurnKnob { index: 3, to: 0.1, ms: 300 },
        Gesture::TurnKnob { index: 6, to: 0.35, ms: 300 },
        Gesture::Hold { ms: 1000 },

        // Row A gates on 1, 3, 5; row B on step 2
        Gesture::PressKey { channel: 0 },
        Gesture::PressKey { channel: 2 },
        Gesture::PressKey { channel: 4 },
        Gesture::PressKey { channel: 9 },
        Gesture::Hold { ms: 2000 },

        // Control edit: knob 1 ≈ 0.52 keeps 8 steps, knob 2 → 200 BPM
        Gesture::PressSwitch { index: 1 },
        Gesture::TurnKnob { index: 0, to: 0.52, ms: 200 },
        Gesture::TurnKnob { index: 1, to: 0.5, ms: 400 },
        Gesture::Hold { ms: 2000 },

        // Stretch to 12 steps: single-row mode
        Gesture::TurnKnob { index: 0, to: 0.75, ms: 400 },
        Gesture::Hold { ms: 2000 },
        Gesture::PressKey { channel: 10 },
        Gesture::Hold { ms: 2000 },

        // Back to 6 steps (dual again) and a slower tempo
        Gesture::TurnKnob { index: 0, to: 0.375, ms: 400 },
        Gesture::TurnKnob { index: 1, to: 0.25, ms: 400 },
        Gesture::Hold { ms: 2000 },

        // Return to step edit and sweep the first knob
        Gesture::PressSwitch { index: 0 },
        Gesture::TurnKnob { index: 0, to: 1.0, ms: 1500 },
        Gesture::TurnKnob { index: 0, to: 0.0, ms: 1500 },
        Gesture::Hold { ms: 1000 },
    ]
}

// ─── Math helpers ───────────────────────────────────────────────────────────

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Smooth interpolation (ease in/out)
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
