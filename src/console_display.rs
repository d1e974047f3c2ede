use crate::leds::{display_lines, led_frame};
use crate::types::*;
use crossbeam_channel::Receiver;
use std::io::{self, Write};

/// Renders a live ASCII panel: the OLED text, knob LEDs, key LEDs and outputs.
pub struct ConsoleDisplay {
    rx: Receiver<RenderModel>,
    update_hz: u32,
    tick_ms: u32,
}

impl ConsoleDisplay {
    pub fn new(rx: Receiver<RenderModel>, update_hz: u32, tick_ms: u32) -> Self {
        Self { rx, update_hz, tick_ms }
    }

    pub fn run(&self) {
        let ticks_per_sec = 1000 / self.tick_ms.max(1);
        let skip = if self.update_hz == 0 {
            50
        } else {
            (ticks_per_sec / self.update_hz).max(1) as u64
        };
        let mut count: u64 = 0;
        let mut stdout = io::stdout();

        for frame in self.rx.iter() {
            count += 1;
            if count % skip != 0 {
                continue;
            }
            print!("\x1b[2J\x1b[H{}", render(&frame));
            let _ = stdout.flush();
        }
    }
}

/// Full dashboard text for one frame.
pub fn render(frame: &RenderModel) -> String {
    let leds = led_frame(frame);
    let mut out = String::new();
    out.push_str("╔════════════════════════════════════════════════════════╗\n");
    out.push_str("║  GATE SEQ — Live Panel                                 ║\n");
    out.push_str("╠════════════════════════════════════════════════════════╣\n");

    let mut line = |s: String| {
        out.push_str(&format!("║  {:<54}║\n", s));
    };
    for text in display_lines(frame) {
        line(text);
    }
    line(String::new());
    line(format!("Knobs: {}", led_row(&leds.knobs)));
    let (upper, lower) = key_row_labels(frame.mode);
    line(format!("{} {}", upper, led_row(&leds.keys[..DUAL_ROW_WIDTH])));
    line(format!("{} {}", lower, led_row(&leds.keys[DUAL_ROW_WIDTH..])));
    line(String::new());
    line(format!(
        "Step {:>2}/{:<2}  Gate {}  CV {:>4} {}",
        frame.current_step + 1,
        frame.step_count,
        if frame.gate_high { "■" } else { "□" },
        frame.cv_sample,
        make_bar(frame.cv_sample as f32 / 4095.0, 16),
    ));
    out.push_str("╚════════════════════════════════════════════════════════╝\n");
    out
}

/// Labels for the two physical key LED rows. In single mode both rows carry
/// row A, steps 1–8 then 9–16.
fn key_row_labels(mode: SequencerMode) -> (&'static str, &'static str) {
    match mode {
        SequencerMode::Dual => ("Row A:    ", "Row B:    "),
        SequencerMode::Single => ("A  1–8:   ", "A  9–16:  "),
    }
}

/// One glyph per LED, brighter glyph for higher brightness.
fn led_row(levels: &[f32]) -> String {
    levels
        .iter()
        .map(|&b| match b {
            b if b >= 0.99 => '█',
            b if b >= 0.45 => '▓',
            b if b > 0.1 => '▒',
            b if b > 0.0 => '░',
            _ => '·',
        })
        .flat_map(|c| [c, ' '])
        .collect()
}

fn make_bar(val: f32, width: usize) -> String {
    let filled = (val.clamp(0.0, 1.0) * width as f32).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}
