use crate::clock::GATE_DURATION_MS;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{error, info};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Header format tag shared with `jsonl_reader`.
pub const SESSION_FORMAT: &str = "gate-seq";

/// Records a run: raw panel input (replayable) and the render stream.
pub struct DataLogger {
    rx: Receiver<RenderModel>,
    panel_rx: Receiver<PanelFrame>,
    session_dir: PathBuf,
    tick_ms: u32,
}

impl DataLogger {
    pub fn new(
        rx: Receiver<RenderModel>,
        panel_rx: Receiver<PanelFrame>,
        output_dir: &Path,
        tick_ms: u32,
    ) -> io::Result<Self> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let session_dir = output_dir.join(format!("session_{}", timestamp));
        fs::create_dir_all(&session_dir)?;

        Ok(Self {
            rx,
            panel_rx,
            session_dir,
            tick_ms,
        })
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Run the logger. Blocks the calling thread until the render channel closes.
    pub fn run(&self) {
        info!("Data logger → {:?}", self.session_dir);
        if let Err(e) = self.record() {
            error!("Data logger stopped: {}", e);
        }
    }

    fn record(&self) -> io::Result<()> {
        self.write_manifest()?;

        let mut frames_writer =
            BufWriter::new(File::create(self.session_dir.join("frames.jsonl"))?);
        let mut panel_writer =
            BufWriter::new(File::create(self.session_dir.join("panel.jsonl"))?);
        writeln!(panel_writer, "{}", self.panel_header())?;

        let mut frame_count: u64 = 0;
        let mut panel_count: u64 = 0;
        let mut step_count: u64 = 0;

        loop {
            // Non-blocking drain of panel input
            while let Ok(panel) = self.panel_rx.try_recv() {
                let line = serde_json::to_string(&CompactPanelFrame::from(&panel))
                    .map_err(io::Error::other)?;
                writeln!(panel_writer, "{}", line)?;
                panel_count += 1;
            }

            // Blocking receive of render frames
            match self.rx.recv() {
                Ok(frame) => {
                    let line = serde_json::to_string(&frame).map_err(io::Error::other)?;
                    writeln!(frames_writer, "{}", line)?;
                    frame_count += 1;
                    if frame.cv_updated {
                        step_count += 1;
                    }

                    if frame_count % 1000 == 0 {
                        frames_writer.flush()?;
                        panel_writer.flush()?;
                        info!("Logged {} frames, {} panel scans", frame_count, panel_count);
                    }
                }
                Err(_) => break,
            }
        }

        // The coordinator forwards panel input before each render frame.
        while let Ok(panel) = self.panel_rx.try_recv() {
            let line = serde_json::to_string(&CompactPanelFrame::from(&panel))
                .map_err(io::Error::other)?;
            writeln!(panel_writer, "{}", line)?;
            panel_count += 1;
        }

        frames_writer.flush()?;
        panel_writer.flush()?;

        let stats = json!({
            "total_frames": frame_count,
            "total_panel_frames": panel_count,
            "total_steps": step_count,
        });
        fs::write(
            self.session_dir.join("stats.json"),
            serde_json::to_string_pretty(&stats).map_err(io::Error::other)?,
        )?;

        info!(
            "Session saved: {} frames, {} panel scans, {} steps → {:?}",
            frame_count, panel_count, step_count, self.session_dir
        );
        Ok(())
    }

    fn panel_header(&self) -> serde_json::Value {
        json!({
            "format": SESSION_FORMAT,
            "tick_ms": self.tick_ms,
            "channels": {
                "knobs": NUM_KNOBS,
                "switches": NUM_SWITCHES,
                "keys": NUM_KEYS,
            },
        })
    }

    fn write_manifest(&self) -> io::Result<()> {
        let manifest = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "system": SESSION_FORMAT,
            "panel": {
                "knobs": NUM_KNOBS,
                "switches": ["step_edit", "control_edit"],
                "keys": NUM_KEYS,
                "tick_ms": self.tick_ms,
            },
            "sequencer": {
                "max_steps": MAX_STEPS,
                "gate_ms": GATE_DURATION_MS,
                "cv_bits": 12,
            },
            "files": {
                "panel": "panel.jsonl",
                "frames": "frames.jsonl",
            },
        });

        let json = serde_json::to_string_pretty(&manifest).map_err(io::Error::other)?;
        fs::write(self.session_dir.join("manifest.json"), json)
    }
}
