//! Recorded panel sessions: reads `panel.jsonl` back into PanelFrames and
//! replays them into the coordinator with their original timing.
//!
//! Reads the header line (format, tick period, channels) then yields frames
//! one at a time. Works with any `BufRead`: files, in-memory buffers, stdin.

use crate::data_logger::SESSION_FORMAT;
use crate::types::{CompactPanelFrame, InputEvent, PanelFrame};
use crossbeam_channel::Sender;
use log::{info, warn};
use std::io::BufRead;
use std::thread;
use std::time::Duration;

/// Parsed JSONL header (first line of a session file).
#[derive(Debug)]
pub struct SessionHeader {
    pub format: String,
    pub tick_ms: u32,
    pub raw: serde_json::Value,
}

/// Line-by-line JSONL session reader.
pub struct SessionReader<R: BufRead> {
    reader: R,
    pub header: SessionHeader,
    line_buf: String,
}

impl<R: BufRead> SessionReader<R> {
    /// Read and validate the header line. Returns an error if the header
    /// is missing, unparseable, or lacks a `"format": "gate-seq"` field.
    pub fn open(mut reader: R) -> Result<Self, String> {
        let mut first_line = String::new();
        reader
            .read_line(&mut first_line)
            .map_err(|e| format!("read header: {}", e))?;

        let first_line = first_line.trim();
        if first_line.is_empty() {
            return Err("empty file".into());
        }

        let raw: serde_json::Value =
            serde_json::from_str(first_line).map_err(|e| format!("parse header: {}", e))?;

        let format = raw["format"]
            .as_str()
            .ok_or("missing \"format\" field")?
            .to_string();
        if format != SESSION_FORMAT {
            return Err(format!("unknown format: {}", format));
        }

        let tick_ms = raw["tick_ms"].as_u64().unwrap_or(1) as u32;

        Ok(Self {
            reader,
            header: SessionHeader {
                format,
                tick_ms,
                raw,
            },
            line_buf: String::new(),
        })
    }

    /// Read the next frame. Returns `None` at EOF, `Err` for unparseable lines.
    pub fn next_frame(&mut self) -> Option<Result<PanelFrame, String>> {
        loop {
            self.line_buf.clear();
            match self.reader.read_line(&mut self.line_buf) {
                Ok(0) => return None,
                Ok(_) => {
                    let trimmed = self.line_buf.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    return Some(
                        serde_json::from_str::<CompactPanelFrame>(trimmed)
                            .map(PanelFrame::from)
                            .map_err(|e| format!("parse frame: {}", e)),
                    );
                }
                Err(e) => return Some(Err(format!("read line: {}", e))),
            }
        }
    }

    /// Read all remaining frames, skipping malformed lines.
    pub fn read_all(mut self) -> Vec<PanelFrame> {
        let mut frames = Vec::new();
        while let Some(result) = self.next_frame() {
            if let Ok(frame) = result {
                frames.push(frame);
            }
        }
        frames
    }
}

/// Feeds a recorded session into the coordinator, sleeping between frames
/// for the recorded timestamp gaps (scaled by `speed`).
pub struct Replayer<R: BufRead> {
    reader: SessionReader<R>,
    tx: Sender<InputEvent>,
    speed: f32,
}

impl<R: BufRead> Replayer<R> {
    pub fn new(reader: SessionReader<R>, tx: Sender<InputEvent>, speed: f32) -> Self {
        Self { reader, tx, speed }
    }

    /// Blocks until the session is exhausted, then asks the coordinator to stop.
    pub fn run(&mut self) {
        info!("Replaying session (tick {}ms, speed ×{})", self.reader.header.tick_ms, self.speed);
        let mut prev_ts: Option<u32> = None;
        let mut sent: u64 = 0;

        while let Some(result) = self.reader.next_frame() {
            let frame = match result {
                Ok(f) => f,
                Err(e) => {
                    warn!("Skipping frame: {}", e);
                    continue;
                }
            };
            if let Some(prev) = prev_ts {
                let gap = pacing(prev, frame.timestamp_ms, self.speed);
                if !gap.is_zero() {
                    thread::sleep(gap);
                }
            }
            prev_ts = Some(frame.timestamp_ms);
            if self.tx.send(InputEvent::Panel(frame)).is_err() {
                break;
            }
            sent += 1;
        }

        info!("Replay finished after {} frames", sent);
        let _ = self.tx.send(InputEvent::Shutdown);
    }
}

/// Wall-clock gap between two recorded timestamps. The recorded counter may
/// have wrapped between them.
pub fn pacing(prev_ms: u32, next_ms: u32, speed: f32) -> Duration {
    if speed <= 0.0 || !speed.is_finite() {
        return Duration::ZERO;
    }
    let gap_ms = next_ms.wrapping_sub(prev_ms) as f64;
    Duration::from_micros((gap_ms * 1000.0 / speed as f64).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn minimal_header() -> String {
        r#"{"format":"gate-seq","tick_ms":1,"channels":{}}"#.to_string()
    }

    fn minimal_frame(ts: u32) -> String {
        serde_json::to_string(&CompactPanelFrame::from(&PanelFrame::at_rest(ts))).unwrap()
    }

    #[test]
    fn test_open_valid_header() {
        let data = minimal_header() + "\n";
        let reader = SessionReader::open(Cursor::new(data)).unwrap();
        assert_eq!(reader.header.format, "gate-seq");
        assert_eq!(reader.header.tick_ms, 1);
    }

    #[test]
    fn test_open_missing_format() {
        let data = r#"{"tick_ms":1}"#.to_string() + "\n";
        let err = SessionReader::open(Cursor::new(data)).err().unwrap();
        assert!(err.contains("format"), "got: {}", err);
    }

    #[test]
    fn test_open_wrong_format() {
        let data = r#"{"format":"other-format"}"#.to_string() + "\n";
        let err = SessionReader::open(Cursor::new(data)).err().unwrap();
        assert!(err.contains("unknown format"), "got: {}", err);
    }

    #[test]
    fn test_open_empty_file() {
        assert!(SessionReader::open(Cursor::new("")).is_err());
    }

    #[test]
    fn test_read_frames_skipping_blank_lines() {
        let data = format!(
            "{}\n{}\n\n{}\n",
            minimal_header(),
            minimal_frame(1000),
            minimal_frame(2000)
        );
        let frames = SessionReader::open(Cursor::new(data)).unwrap().read_all();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].timestamp_ms, 1000);
        assert_eq!(frames[1].timestamp_ms, 2000);
    }

    #[test]
    fn test_read_all_skips_malformed() {
        let data = format!(
            "{}\n{}\nthis is not json\n{}\n",
            minimal_header(),
            minimal_frame(1000),
            minimal_frame(3000)
        );
        let frames = SessionReader::open(Cursor::new(data)).unwrap().read_all();
        assert_eq!(frames.len(), 2, "should skip garbled line");
        assert_eq!(frames[1].timestamp_ms, 3000);
    }

    #[test]
    fn test_next_frame_reports_error() {
        let data = minimal_header() + "\ngarbage\n";
        let mut reader = SessionReader::open(Cursor::new(data)).unwrap();
        assert!(reader.next_frame().unwrap().is_err());
    }

    #[test]
    fn test_pacing_across_wrap() {
        assert_eq!(pacing(u32::MAX - 4, 5, 1.0), Duration::from_millis(10));
        assert_eq!(pacing(0, 100, 2.0), Duration::from_millis(50));
        assert_eq!(pacing(0, 100, 0.0), Duration::ZERO);
    }

    #[test]
    fn test_replayer_sends_frames_then_shutdown() {
        let data = format!(
            "{}\n{}\n{}\n",
            minimal_header(),
            minimal_frame(0),
            minimal_frame(1)
        );
        let reader = SessionReader::open(Cursor::new(data)).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        Replayer::new(reader, tx, 1000.0).run();
        let events: Vec<InputEvent> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], InputEvent::Panel(p) if p.timestamp_ms == 0));
        assert!(matches!(events[2], InputEvent::Shutdown));
    }
}
