use crate::panel_protocol::{find_sync, parse_frame, KnobCalibration, FRAME_SIZE};
use crate::types::*;
use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use std::io::{self, Read};
use std::time::Duration;

/// Reads panel frames from the control-surface MCU over USB serial.
pub struct SerialReader {
    port_name: String,
    baud_rate: u32,
    tx: Sender<InputEvent>,
    calibration: KnobCalibration,
}

impl SerialReader {
    pub fn new(port_name: String, baud_rate: u32, tx: Sender<InputEvent>) -> Self {
        Self {
            port_name,
            baud_rate,
            tx,
            calibration: KnobCalibration::default(),
        }
    }

    pub fn with_calibration(mut self, cal: KnobCalibration) -> Self {
        self.calibration = cal;
        self
    }

    /// Run the serial reader loop. Blocks the calling thread.
    pub fn run(&self) {
        info!(
            "Opening serial port: {} @ {}",
            self.port_name, self.baud_rate
        );

        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open();

        let mut port = match port {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to open serial port {}: {}", self.port_name, e);
                error!("Is the panel connected? Run with --simulate for dev mode.");
                let _ = self.tx.send(InputEvent::Shutdown);
                return;
            }
        };

        info!("Serial port opened. Reading panel frames...");
        let mut buf = [0u8; 256];
        let mut frame_buf = Vec::with_capacity(FRAME_SIZE * 4);
        let mut frame_count: u64 = 0;
        let mut error_count: u64 = 0;

        loop {
            match port.read(&mut buf) {
                Ok(n) => {
                    frame_buf.extend_from_slice(&buf[..n]);

                    while frame_buf.len() >= FRAME_SIZE {
                        let Some(sync_pos) = find_sync(&frame_buf) else {
                            // Keep a trailing byte: it may be the first half of a sync word.
                            let keep = frame_buf.len().saturating_sub(1);
                            frame_buf.drain(..keep);
                            break;
                        };
                        if sync_pos > 0 {
                            debug!("Skipping {} bytes to sync", sync_pos);
                            frame_buf.drain(..sync_pos);
                        }
                        if frame_buf.len() < FRAME_SIZE {
                            break;
                        }

                        let frame_bytes: Vec<u8> = frame_buf.drain(..FRAME_SIZE).collect();
                        match parse_frame(&frame_bytes, &self.calibration) {
                            Ok(panel) => {
                                if self.tx.send(InputEvent::Panel(panel)).is_err() {
                                    info!("Coordinator gone, serial reader stopping");
                                    return;
                                }
                                frame_count += 1;
                                if frame_count % 5000 == 0 {
                                    info!(
                                        "Serial: {} frames, {} errors",
                                        frame_count, error_count
                                    );
                                }
                            }
                            Err(e) => {
                                error_count += 1;
                                debug!("Frame parse error: {}", e);
                            }
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => {
                    warn!("Serial read error: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }
}
