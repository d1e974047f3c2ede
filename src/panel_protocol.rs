//! Binary frame format sent by the panel microcontroller.
//!
//! | Offset | Size | Field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 2    | sync (0xBEEF)                          |
//! | 2      | 4    | timestamp_ms (u32, wrapping)           |
//! | 6      | 2×8  | knob ADC values (u16 × 8)              |
//! | 22     | 2    | switch bitmask (bit0 = SW1, bit1 = SW2)|
//! | 24     | 4    | key bitmask (bit i = trigger channel i)|
//! | 28     | 2    | CRC16                                  |
//! | Total: 30 bytes                                        |
//!
//! All fields little-endian. The knob ADC is 12-bit; `KnobCalibration` maps
//! raw readings onto 0.0–1.0.

use crate::types::*;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io::{self, Cursor};
use std::path::Path;

pub const FRAME_SIZE: usize = 30;
pub const SYNC_WORD: u16 = 0xBEEF;
const ADC_MAX: u16 = 4095;

/// Per-knob (min_raw, max_raw) ADC range. Readings are mapped linearly and
/// clamped to 0.0–1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnobCalibration {
    pub ranges: [(u16, u16); NUM_KNOBS],
}

impl Default for KnobCalibration {
    fn default() -> Self {
        Self {
            ranges: [(0, ADC_MAX); NUM_KNOBS],
        }
    }
}

impl KnobCalibration {
    /// Load from a JSON file. Returns None if file is absent or malformed.
    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str(&data) {
            Ok(c) => {
                info!("Loaded knob calibration from {:?}", path);
                Some(c)
            }
            Err(e) => {
                warn!("Failed to parse knob calibration {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)?;
        info!("Knob calibration saved to {:?}", path);
        Ok(())
    }

    pub fn normalize(&self, knob: usize, raw: u16) -> f32 {
        let (lo, hi) = self.ranges[knob];
        let range = (hi as f32 - lo as f32).max(1.0);
        ((raw as f32 - lo as f32) / range).clamp(0.0, 1.0)
    }
}

/// Position of the first sync word (little-endian 0xEF 0xBE) in `buf`.
pub fn find_sync(buf: &[u8]) -> Option<usize> {
    (0..buf.len().saturating_sub(1)).find(|&i| buf[i] == 0xEF && buf[i + 1] == 0xBE)
}

pub fn parse_frame(data: &[u8], cal: &KnobCalibration) -> Result<PanelFrame, String> {
    if data.len() != FRAME_SIZE {
        return Err(format!("wrong size: {}", data.len()));
    }

    let mut cursor = Cursor::new(data);
    let sync = cursor
        .read_u16::<LittleEndian>()
        .map_err(|e| e.to_string())?;
    if sync != SYNC_WORD {
        return Err(format!("bad sync: 0x{:04X}", sync));
    }

    let timestamp_ms = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| e.to_string())?;

    let mut raw = [0u16; NUM_KNOBS];
    for ch in raw.iter_mut() {
        *ch = cursor
            .read_u16::<LittleEndian>()
            .map_err(|e| e.to_string())?;
    }

    let switches = cursor
        .read_u16::<LittleEndian>()
        .map_err(|e| e.to_string())?;
    let keys = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| e.to_string())?;

    let received_crc = cursor
        .read_u16::<LittleEndian>()
        .map_err(|e| e.to_string())?;
    let computed_crc = crc16(&data[..FRAME_SIZE - 2]);
    if received_crc != computed_crc {
        return Err(format!(
            "CRC mismatch: received 0x{:04X}, computed 0x{:04X}",
            received_crc, computed_crc
        ));
    }

    let mut knobs = [0.0f32; NUM_KNOBS];
    for (i, k) in knobs.iter_mut().enumerate() {
        *k = cal.normalize(i, raw[i]);
    }

    Ok(PanelFrame {
        timestamp_ms,
        knobs,
        switches: unpack_bits(switches as u32),
        keys: unpack_bits(keys),
    })
}

/// Build a wire frame. Used by tests and by tools that emulate the panel.
pub fn encode_frame(
    timestamp_ms: u32,
    raw_knobs: &[u16; NUM_KNOBS],
    switches: &[bool; NUM_SWITCHES],
    keys: &[bool; NUM_KEYS],
) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_SIZE);
    // Writes into a Vec cannot fail.
    let _ = buf.write_u16::<LittleEndian>(SYNC_WORD);
    let _ = buf.write_u32::<LittleEndian>(timestamp_ms);
    for &k in raw_knobs {
        let _ = buf.write_u16::<LittleEndian>(k);
    }
    let _ = buf.write_u16::<LittleEndian>(pack_bits(switches) as u16);
    let _ = buf.write_u32::<LittleEndian>(pack_bits(keys));
    let crc = crc16(&buf);
    let _ = buf.write_u16::<LittleEndian>(crc);
    buf
}

/// CRC-16/CCITT-FALSE
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}
