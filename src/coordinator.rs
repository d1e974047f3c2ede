use crate::edges::EdgeDetector;
use crate::sequencer::{SequencerCore, TickInput};
use crate::types::*;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, trace};

/// The coordinator receives InputEvents (raw panel scans), derives rising
/// edges for the mode switches and trigger keys, runs one sequencer tick per
/// scan, and fans the resulting RenderModel out to downstream consumers.
///
/// It is the only thread that touches `SequencerCore`. The core is created
/// on the first panel frame so the step clock starts at that frame's
/// timestamp rather than at zero.
pub struct Coordinator {
    input_rx: Receiver<InputEvent>,
    frame_txs: Vec<Sender<RenderModel>>,
    /// Raw panel frames for the session recorder, if recording
    panel_log_tx: Option<Sender<PanelFrame>>,
    core: Option<SequencerCore>,
    switch_edges: EdgeDetector<NUM_SWITCHES>,
    key_edges: EdgeDetector<NUM_KEYS>,
}

impl Coordinator {
    pub fn new(
        input_rx: Receiver<InputEvent>,
        frame_txs: Vec<Sender<RenderModel>>,
        panel_log_tx: Option<Sender<PanelFrame>>,
    ) -> Self {
        Self {
            input_rx,
            frame_txs,
            panel_log_tx,
            core: None,
            switch_edges: EdgeDetector::new(),
            key_edges: EdgeDetector::new(),
        }
    }

    /// Process one panel scan and return the render model it produced.
    pub fn process(&mut self, panel: &PanelFrame) -> RenderModel {
        let input = TickInput {
            now_ms: panel.timestamp_ms,
            knobs: panel.knobs,
            mode_edges: self.switch_edges.update(&panel.switches),
            trigger_edges: self.key_edges.update(&panel.keys),
        };
        let core = self
            .core
            .get_or_insert_with(|| SequencerCore::new(panel.timestamp_ms));
        core.tick(&input)
    }

    pub fn run(&mut self) {
        info!("Coordinator running ({} consumers)", self.frame_txs.len());

        let mut tick_count: u64 = 0;
        let mut last_mode: Option<(KnobMode, SequencerMode, usize)> = None;

        while let Ok(event) = self.input_rx.recv() {
            let panel = match event {
                InputEvent::Panel(panel) => panel,
                InputEvent::Shutdown => {
                    debug!("Coordinator: shutdown requested");
                    break;
                }
            };

            if let Some(ref tx) = self.panel_log_tx {
                let _ = tx.send(panel);
            }

            let frame = self.process(&panel);

            if frame.cv_updated {
                debug!(
                    "Step {} → CV {} ({:.3})",
                    frame.current_step,
                    frame.cv_sample,
                    frame.step_values[frame.current_step]
                );
            }

            let mode = (frame.knob_mode, frame.mode, frame.step_count);
            if last_mode != Some(mode) {
                info!(
                    "Knobs: {:?}, {} steps ({:?}), {:.0} BPM",
                    frame.knob_mode, frame.step_count, frame.mode, frame.tempo
                );
                last_mode = Some(mode);
            }

            for tx in &self.frame_txs {
                let _ = tx.send(frame);
            }

            tick_count += 1;
            if tick_count % 1000 == 0 {
                debug!("Coordinator: {} ticks processed", tick_count);
                trace!("Latest: {}", frame);
            }
        }

        info!("Coordinator shutting down after {} ticks", tick_count);
    }
}
