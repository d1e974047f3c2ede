use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── Capacities ─────────────────────────────────────────────────────────────

/// Step storage capacity. The active step count never exceeds this.
pub const MAX_STEPS: usize = 16;
/// Continuous controls on the panel.
pub const NUM_KNOBS: usize = 8;
/// Mode-select switches: [0] = step edit, [1] = control edit.
pub const NUM_SWITCHES: usize = 2;
/// Trigger channels: two rows of up to `MAX_STEPS` each.
pub const NUM_KEYS: usize = MAX_STEPS * 2;
/// Steps per physical key row in dual mode (A1–A8 / B1–B8).
pub const DUAL_ROW_WIDTH: usize = 8;

// ─── Modes ──────────────────────────────────────────────────────────────────

/// Which logical targets the knobs currently drive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum KnobMode {
    /// Knob i writes the value of step i.
    #[default]
    StepEdit,
    /// Knob 0 sets the step count, knob 1 the tempo.
    ControlEdit,
}

/// Number of gate rows exposed per step. Derived from the step count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SequencerMode {
    Single,
    Dual,
}

// ─── Panel input ────────────────────────────────────────────────────────────

/// Raw control-surface state for one scan: knob positions and held levels.
/// Edge detection happens downstream in the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelFrame {
    /// Milliseconds from a free-running u32 counter (wraps after ~49.7 days)
    pub timestamp_ms: u32,
    /// Knob positions, normalized 0.0–1.0
    pub knobs: [f32; NUM_KNOBS],
    /// Mode-select switches currently held
    pub switches: [bool; NUM_SWITCHES],
    /// Trigger keys currently held, indexed by trigger channel
    pub keys: [bool; NUM_KEYS],
}

impl PanelFrame {
    pub fn at_rest(timestamp_ms: u32) -> Self {
        Self {
            timestamp_ms,
            knobs: [0.0; NUM_KNOBS],
            switches: [false; NUM_SWITCHES],
            keys: [false; NUM_KEYS],
        }
    }
}

impl fmt::Display for PanelFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let held: Vec<String> = self
            .keys
            .iter()
            .enumerate()
            .filter(|(_, &k)| k)
            .map(|(i, _)| i.to_string())
            .collect();
        write!(
            f,
            "t={:>10}ms  K[{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2} {:.2}]  SW[{} {}]  keys[{}]",
            self.timestamp_ms,
            self.knobs[0], self.knobs[1], self.knobs[2], self.knobs[3],
            self.knobs[4], self.knobs[5], self.knobs[6], self.knobs[7],
            self.switches[0] as u8,
            self.switches[1] as u8,
            held.join(","),
        )
    }
}

/// Short-key representation used for the recorded `panel.jsonl` stream.
/// Field mapping: t=timestamp_ms, k=knobs, sw=switches bitmask, ky=keys bitmask
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactPanelFrame {
    pub t: u32,
    pub k: [f32; NUM_KNOBS],
    pub sw: u16,
    pub ky: u32,
}

impl From<&PanelFrame> for CompactPanelFrame {
    fn from(p: &PanelFrame) -> Self {
        Self {
            t: p.timestamp_ms,
            k: p.knobs,
            sw: pack_bits(&p.switches) as u16,
            ky: pack_bits(&p.keys),
        }
    }
}

impl From<CompactPanelFrame> for PanelFrame {
    fn from(c: CompactPanelFrame) -> Self {
        Self {
            timestamp_ms: c.t,
            knobs: c.k,
            switches: unpack_bits(c.sw as u32),
            keys: unpack_bits(c.ky),
        }
    }
}

/// Pack up to 32 booleans into a bitmask, bit i = levels[i].
pub fn pack_bits(levels: &[bool]) -> u32 {
    levels
        .iter()
        .take(32)
        .enumerate()
        .fold(0u32, |acc, (i, &on)| if on { acc | (1 << i) } else { acc })
}

/// Expand a bitmask into N booleans.
pub fn unpack_bits<const N: usize>(mask: u32) -> [bool; N] {
    let mut out = [false; N];
    for (i, level) in out.iter_mut().enumerate().take(32) {
        *level = mask & (1 << i) != 0;
    }
    out
}

// ─── Render / output model ──────────────────────────────────────────────────

/// Snapshot of everything the display, LEDs and DAC need after one tick.
/// Owns its data; holds no reference back into the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderModel {
    pub timestamp_ms: u32,
    pub current_step: usize,
    pub gate_high: bool,
    /// Step values; entries at or beyond `step_count` are stale storage
    pub step_values: [f32; MAX_STEPS],
    /// Gate flags per row: [0] = row A, [1] = row B
    pub gate_flags: [[bool; MAX_STEPS]; 2],
    pub step_count: usize,
    pub mode: SequencerMode,
    pub knob_mode: KnobMode,
    pub tempo: f32,
    /// 12-bit CV sample, held between step advances. After the step count
    /// shrinks it may belong to a step past the folded `current_step` until
    /// the next advance.
    pub cv_sample: u16,
    /// True only on the tick where the CV sample was rewritten
    pub cv_updated: bool,
}

impl fmt::Display for RenderModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.mode {
            SequencerMode::Single => "single",
            SequencerMode::Dual => "dual",
        };
        write!(
            f,
            "t={:>10}ms  step={:>2}/{:<2} gate={} cv={:>4} bpm={:.0} {}",
            self.timestamp_ms,
            self.current_step,
            self.step_count,
            if self.gate_high { "HI" } else { "lo" },
            self.cv_sample,
            self.tempo,
            mode,
        )
    }
}

// ─── Inter-thread messages ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum InputEvent {
    Panel(PanelFrame),
    /// Input source finished; the coordinator drains and exits.
    Shutdown,
}

// ─── Panel clock ────────────────────────────────────────────────────────────

/// Free-running millisecond counter with u32 wraparound, like an MCU tick.
#[derive(Clone)]
pub struct PanelClock {
    start: Instant,
    offset_ms: u32,
}

impl PanelClock {
    pub fn new() -> Self {
        Self::with_offset(0)
    }

    /// Start the counter at `offset_ms` instead of zero.
    pub fn with_offset(offset_ms: u32) -> Self {
        Self {
            start: Instant::now(),
            offset_ms,
        }
    }

    pub fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        (self.start.elapsed().as_millis() as u32).wrapping_add(self.offset_ms)
    }
}

impl Default for PanelClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack_bits() {
        let mut keys = [false; NUM_KEYS];
        keys[0] = true;
        keys[9] = true;
        keys[31] = true;
        let mask = pack_bits(&keys);
        assert_eq!(mask, 1 | (1 << 9) | (1 << 31));
        assert_eq!(unpack_bits::<NUM_KEYS>(mask), keys);
    }

    #[test]
    fn test_compact_panel_frame_preserves_levels() {
        let mut frame = PanelFrame::at_rest(42);
        frame.knobs[3] = 0.25;
        frame.switches[1] = true;
        frame.keys[17] = true;
        let json = serde_json::to_string(&CompactPanelFrame::from(&frame)).unwrap();
        let back: CompactPanelFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(PanelFrame::from(back), frame);
    }

    #[test]
    fn test_clock_offset_wraps() {
        let clock = PanelClock::with_offset(u32::MAX);
        // elapsed is ~0ms, so the counter sits at or just past the wrap point
        let now = clock.now_ms();
        assert!(now == u32::MAX || now < 1000, "got {}", now);
    }
}
