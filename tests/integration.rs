//! End-to-end integration tests for the sequencer pipeline.
//!
//! These tests exercise the full data flow:
//!   PanelFrames → InputEvent channel → Coordinator → RenderModel channel → assertions
//!
//! Panel frames carry held levels; the coordinator turns them into edges and
//! runs one sequencer tick per frame, exactly as with live hardware.

use crossbeam_channel::bounded;
use std::io::Cursor;
use std::thread;
use std::time::Duration;

use gate_seq::coordinator::Coordinator;
use gate_seq::jsonl_reader::SessionReader;
use gate_seq::leds::{display_lines, led_frame};
use gate_seq::panel_protocol::{encode_frame, parse_frame, KnobCalibration};
use gate_seq::types::*;

// ─── Helpers ───────────────────────────────────────────────────────────────

/// Knob positions matching the power-on ramp, so step edit changes nothing.
fn ramp_knobs() -> [f32; NUM_KNOBS] {
    let mut k = [0.0; NUM_KNOBS];
    for (i, v) in k.iter_mut().enumerate() {
        *v = i as f32 / 7.0;
    }
    k
}

/// Builds a timeline of panel scans at a fixed tick, with scripted presses.
struct Script {
    frames: Vec<PanelFrame>,
    state: PanelFrame,
    tick_ms: u32,
}

impl Script {
    fn new(start_ms: u32, tick_ms: u32) -> Self {
        let mut state = PanelFrame::at_rest(start_ms);
        state.knobs = ramp_knobs();
        Self {
            frames: Vec::new(),
            state,
            tick_ms,
        }
    }

    fn hold(&mut self, ms: u32) -> &mut Self {
        for _ in 0..ms / self.tick_ms {
            self.frames.push(self.state);
            self.state.timestamp_ms = self.state.timestamp_ms.wrapping_add(self.tick_ms);
        }
        self
    }

    fn knob(&mut self, index: usize, value: f32) -> &mut Self {
        self.state.knobs[index] = value;
        self
    }

    fn press_switch(&mut self, index: usize) -> &mut Self {
        self.state.switches[index] = true;
        self.hold(self.tick_ms * 3);
        self.state.switches[index] = false;
        self
    }

    fn press_key(&mut self, channel: usize) -> &mut Self {
        self.state.keys[channel] = true;
        self.hold(self.tick_ms * 3);
        self.state.keys[channel] = false;
        self
    }

    fn events(&self) -> Vec<InputEvent> {
        self.frames.iter().copied().map(InputEvent::Panel).collect()
    }
}

/// Run a coordinator in a background thread, feeding it a sequence of events.
/// Collects output RenderModels until the input channel closes.
fn run_pipeline(events: Vec<InputEvent>) -> Vec<RenderModel> {
    let (input_tx, input_rx) = bounded::<InputEvent>(4096);
    let (frame_tx, frame_rx) = bounded::<RenderModel>(65536);

    let coord_handle = thread::Builder::new()
        .name("test-coordinator".into())
        .spawn(move || {
            Coordinator::new(input_rx, vec![frame_tx], None).run();
        })
        .unwrap();

    for event in events {
        // The coordinator may already have stopped on a Shutdown event.
        let _ = input_tx.send(event);
    }
    drop(input_tx);

    let mut frames = Vec::new();
    while let Ok(f) = frame_rx.recv_timeout(Duration::from_millis(500)) {
        frames.push(f);
    }

    let _ = coord_handle.join();
    frames
}

fn at(frames: &[RenderModel], timestamp_ms: u32) -> RenderModel {
    *frames
        .iter()
        .find(|f| f.timestamp_ms == timestamp_ms)
        .unwrap_or_else(|| panic!("no frame at {}ms", timestamp_ms))
}

// ─── Integration Tests ─────────────────────────────────────────────────────

#[test]
fn test_pipeline_step_and_gate_timing() {
    // 8 steps at 120 BPM: one step every 500ms, gate high for 50ms
    let mut script = Script::new(0, 1);
    script.hold(1100);
    let frames = run_pipeline(script.events());
    assert_eq!(frames.len(), 1100);

    assert_eq!(at(&frames, 499).current_step, 0);
    assert!(!at(&frames, 499).gate_high);

    let f = at(&frames, 500);
    assert_eq!(f.current_step, 1);
    assert!(f.gate_high);
    assert!(f.cv_updated);

    assert!(at(&frames, 549).gate_high);
    assert!(!at(&frames, 550).gate_high);

    assert_eq!(at(&frames, 1000).current_step, 2);

    let gate_ticks = frames.iter().filter(|f| f.gate_high).count();
    assert_eq!(gate_ticks, 100, "two 50ms gates");
    let advances = frames.iter().filter(|f| f.cv_updated).count();
    assert_eq!(advances, 2);
}

#[test]
fn test_pipeline_control_edit_half_knobs() {
    let mut script = Script::new(0, 1);
    script
        .knob(0, 0.5)
        .knob(1, 0.5)
        .press_switch(1)
        .hold(10);
    let last = *run_pipeline(script.events()).last().unwrap();
    assert_eq!(last.knob_mode, KnobMode::ControlEdit);
    assert_eq!(last.step_count, 8);
    assert_eq!(last.mode, SequencerMode::Dual);
    assert_eq!(last.tempo, 200.0);
    assert_eq!(display_lines(&last), ["Control Mode", "BPM: 200", "Steps: 8"]);
}

#[test]
fn test_pipeline_sixteen_steps_forces_single() {
    let mut script = Script::new(0, 1);
    script.knob(0, 1.0).press_switch(1).hold(10);
    let last = *run_pipeline(script.events()).last().unwrap();
    assert_eq!(last.step_count, 16);
    assert_eq!(last.mode, SequencerMode::Single);
}

#[test]
fn test_pipeline_mode_returns_to_dual() {
    let mut script = Script::new(0, 1);
    script
        .knob(0, 0.75)
        .press_switch(1)
        .hold(10)
        .knob(0, 0.25)
        .hold(10);
    let frames = run_pipeline(script.events());
    assert!(frames.iter().any(|f| f.mode == SequencerMode::Single && f.step_count == 12));
    let last = frames.last().unwrap();
    assert_eq!(last.step_count, 4);
    assert_eq!(last.mode, SequencerMode::Dual);
}

#[test]
fn test_pipeline_row_b_key_toggles_only_row_b() {
    let mut script = Script::new(0, 1);
    script.press_key(8).hold(10);
    let last = *run_pipeline(script.events()).last().unwrap();
    assert!(last.gate_flags[1][0], "row B step 0 set");
    assert!(!last.gate_flags[0][0], "row A step 0 untouched");

    let leds = led_frame(&last);
    assert_eq!(leds.keys[DUAL_ROW_WIDTH], 1.0);
}

#[test]
fn test_pipeline_double_press_restores_flag() {
    let mut script = Script::new(0, 1);
    script.press_key(3).hold(5).press_key(3).hold(5);
    let frames = run_pipeline(script.events());
    assert!(frames.iter().any(|f| f.gate_flags[0][3]));
    assert!(!frames.last().unwrap().gate_flags[0][3]);
}

#[test]
fn test_pipeline_cv_at_step_three() {
    // Step values keep their ramp; step 3 holds 3/7 → 1755 on the DAC
    let mut script = Script::new(0, 1);
    script.hold(1600);
    let frames = run_pipeline(script.events());
    let f = at(&frames, 1500);
    assert_eq!(f.current_step, 3);
    assert!((f.step_values[3] - 3.0 / 7.0).abs() < 1e-6);
    assert_eq!(f.cv_sample, 1755);
    assert_eq!(at(&frames, 1599).cv_sample, 1755, "held between steps");
}

#[test]
fn test_pipeline_zero_step_knob_runs_one_step() {
    let mut script = Script::new(0, 10);
    script.knob(0, 0.0).knob(1, 1.0).press_switch(1).hold(3000);
    let frames = run_pipeline(script.events());
    let last = frames.last().unwrap();
    assert_eq!(last.step_count, 1);
    assert_eq!(last.tempo, 350.0);
    assert!(frames.iter().all(|f| f.current_step < f.step_count));
    assert!(frames.iter().filter(|f| f.cv_updated).count() > 10);
}

#[test]
fn test_pipeline_current_step_stays_in_range_while_shrinking() {
    let mut script = Script::new(0, 5);
    script.knob(0, 1.0).knob(1, 1.0).press_switch(1).hold(3000);
    for &k in &[0.5, 0.25, 0.1, 0.9, 0.0, 0.6] {
        script.knob(0, k).hold(700);
    }
    let frames = run_pipeline(script.events());
    for f in &frames {
        assert!(f.current_step < f.step_count, "{}", f);
    }
}

#[test]
fn test_pipeline_clock_wraparound() {
    // Start 300ms before the u32 millisecond counter rolls over
    let start = u32::MAX - 299;
    let mut script = Script::new(start, 1);
    script.hold(1100);
    let frames = run_pipeline(script.events());
    let advances: Vec<&RenderModel> = frames.iter().filter(|f| f.cv_updated).collect();
    assert_eq!(advances.len(), 2);
    assert_eq!(advances[0].timestamp_ms, start.wrapping_add(500));
    assert_eq!(advances[1].timestamp_ms, start.wrapping_add(1000));
    assert_eq!(frames.last().unwrap().current_step, 2);
}

#[test]
fn test_pipeline_step_edit_knobs_drive_cv() {
    let mut script = Script::new(0, 1);
    script.knob(1, 1.0).hold(600);
    let frames = run_pipeline(script.events());
    let f = at(&frames, 500);
    assert_eq!(f.current_step, 1);
    assert_eq!(f.cv_sample, 4095);
}

#[test]
fn test_pipeline_parameters_hold_in_step_edit() {
    let mut script = Script::new(0, 1);
    script
        .knob(0, 0.25)
        .knob(1, 1.0)
        .press_switch(1)
        .hold(10)
        .press_switch(0)
        .knob(0, 0.9)
        .hold(10);
    let last = *run_pipeline(script.events()).last().unwrap();
    assert_eq!(last.knob_mode, KnobMode::StepEdit);
    assert_eq!(last.step_count, 4);
    assert_eq!(last.tempo, 350.0);
    assert!((last.step_values[0] - 0.9).abs() < 1e-6);
}

#[test]
fn test_pipeline_shutdown_event_stops_coordinator() {
    let mut script = Script::new(0, 1);
    script.hold(10);
    let mut events = script.events();
    events.push(InputEvent::Shutdown);
    events.extend(script.events());
    let frames = run_pipeline(events);
    assert_eq!(frames.len(), 10);
}

#[test]
fn test_pipeline_from_wire_frames() {
    // Raw panel bytes → parse → coordinator, as the serial reader does
    let cal = KnobCalibration::default();
    let mut events = Vec::new();
    for t in 0..20u32 {
        let mut switches = [false; NUM_SWITCHES];
        switches[1] = (2..5).contains(&t);
        let mut raw = [0u16; NUM_KNOBS];
        raw[0] = 4095;
        raw[1] = 2048;
        let bytes = encode_frame(t, &raw, &switches, &[false; NUM_KEYS]);
        events.push(InputEvent::Panel(parse_frame(&bytes, &cal).unwrap()));
    }
    let last = *run_pipeline(events).last().unwrap();
    assert_eq!(last.step_count, 16);
    assert_eq!(last.tempo, 200.0);
}

#[test]
fn test_pipeline_recorded_session_replays_identically() {
    let mut script = Script::new(0, 2);
    script
        .press_key(1)
        .knob(0, 0.75)
        .press_switch(1)
        .hold(800)
        .press_key(11)
        .hold(400);

    let mut session = String::from(r#"{"format":"gate-seq","tick_ms":2}"#);
    session.push('\n');
    for f in &script.frames {
        session.push_str(&serde_json::to_string(&CompactPanelFrame::from(f)).unwrap());
        session.push('\n');
    }

    let replayed = SessionReader::open(Cursor::new(session)).unwrap().read_all();
    assert_eq!(replayed.len(), script.frames.len());

    let live = run_pipeline(script.events());
    let again = run_pipeline(replayed.into_iter().map(InputEvent::Panel).collect());
    assert_eq!(live, again);
    assert!(live.last().unwrap().gate_flags[0][11]);
}
