use crate::clock::CV_FULL_SCALE;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::UdpSocket;

/// Mirrors the sequencer outputs (step, gate, CV, tempo) as OSC messages, so
/// a software modular or DAW can follow along without the analog jacks.
pub struct OscSender {
    rx: Receiver<RenderModel>,
    target: String,
}

impl OscSender {
    pub fn new(rx: Receiver<RenderModel>, target: String) -> Self {
        Self { rx, target }
    }

    /// Run the OSC sender loop. Blocks the calling thread.
    pub fn run(&self) {
        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to bind UDP socket: {}", e);
                return;
            }
        };
        info!("OSC sender → {}", self.target);

        let mut last_sent: Option<RenderModel> = None;
        for frame in self.rx.iter() {
            if !needs_send(last_sent.as_ref(), &frame) {
                continue;
            }
            if let Err(e) = self.send_frame(&socket, &frame) {
                debug!("OSC send error: {}", e);
            }
            last_sent = Some(frame);
        }
        info!("OSC sender shutting down");
    }

    fn send_frame(
        &self,
        socket: &UdpSocket,
        frame: &RenderModel,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for msg in messages(frame) {
            let buf = rosc::encoder::encode(&OscPacket::Message(msg))?;
            socket.send_to(&buf, &self.target)?;
        }
        Ok(())
    }
}

/// Only outputs matter on the wire; timestamps and stored step values alone
/// don't warrant a resend.
fn needs_send(last: Option<&RenderModel>, frame: &RenderModel) -> bool {
    match last {
        None => true,
        Some(l) => {
            l.current_step != frame.current_step
                || l.gate_high != frame.gate_high
                || l.cv_sample != frame.cv_sample
                || l.tempo != frame.tempo
                || l.step_count != frame.step_count
                || l.mode != frame.mode
        }
    }
}

pub fn messages(frame: &RenderModel) -> Vec<OscMessage> {
    let mode = match frame.mode {
        SequencerMode::Dual => 0,
        SequencerMode::Single => 1,
    };
    vec![
        message("/seq/step", OscType::Int(frame.current_step as i32)),
        message("/seq/gate", OscType::Int(frame.gate_high as i32)),
        message(
            "/seq/cv",
            OscType::Float(frame.cv_sample as f32 / CV_FULL_SCALE as f32),
        ),
        message("/seq/cv_raw", OscType::Int(frame.cv_sample as i32)),
        message("/seq/tempo", OscType::Float(frame.tempo)),
        message("/seq/steps", OscType::Int(frame.step_count as i32)),
        message("/seq/mode", OscType::Int(mode)),
    ]
}

fn message(addr: &str, arg: OscType) -> OscMessage {
    OscMessage {
        addr: addr.to_string(),
        args: vec![arg],
    }
}
