use gate_seq::console_display;
use gate_seq::coordinator;
use gate_seq::data_logger;
use gate_seq::jsonl_reader::{Replayer, SessionReader};
use gate_seq::osc_sender;
#[cfg(feature = "hardware")]
use gate_seq::panel_protocol::KnobCalibration;
#[cfg(feature = "hardware")]
use gate_seq::serial_reader;
use gate_seq::simulator;
use gate_seq::types::*;

use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::thread;

#[derive(Parser)]
#[command(name = "gate-seq")]
#[command(about = "16-step CV/gate sequencer for a knob-and-keyboard control surface")]
struct Cli {
    /// Run in simulator mode (no hardware required); `--simulate false` reads the panel
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    simulate: bool,

    /// Serial port for the panel MCU (e.g., /dev/ttyACM0)
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Serial baud rate
    #[arg(long, default_value_t = 115200)]
    baud: u32,

    /// Knob calibration JSON (per-knob raw ADC min/max)
    #[arg(long)]
    calibration: Option<PathBuf>,

    /// Replay a recorded panel.jsonl instead of live input
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Replay speed multiplier
    #[arg(long, default_value_t = 1.0)]
    replay_speed: f32,

    /// Record panel input and render frames to a session directory
    #[arg(long)]
    record: bool,

    /// Output directory for recorded sessions
    #[arg(long, default_value = "./sessions")]
    output_dir: PathBuf,

    /// Enable console display (terminal panel view)
    #[arg(long)]
    console: bool,

    /// Console display refresh rate (Hz)
    #[arg(long, default_value_t = 20)]
    display_hz: u32,

    /// Enable OSC output of step/gate/CV
    #[arg(long)]
    osc: bool,

    /// OSC target address
    #[arg(long, default_value = "127.0.0.1:9000")]
    osc_target: String,

    /// Control loop delay between panel scans (ms)
    #[arg(long, default_value_t = 1)]
    tick_ms: u32,

    /// Start the simulated panel clock at this value, e.g. near u32::MAX to
    /// exercise counter wraparound
    #[arg(long, default_value_t = 0)]
    clock_offset_ms: u32,
}

fn main() -> io::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();
    let tick_ms = cli.tick_ms.max(1);

    let source = if cli.replay.is_some() {
        "REPLAY"
    } else if cli.simulate {
        "SIMULATOR"
    } else {
        "HARDWARE"
    };
    info!("═══════════════════════════════════════════════");
    info!("  GATE SEQ v{}", env!("CARGO_PKG_VERSION"));
    info!("  Input: {}", source);
    if source == "HARDWARE" { info!("  Port: {} @ {} baud", cli.port, cli.baud); }
    if let Some(ref cal) = cli.calibration { info!("  Calibration: {:?}", cal); }
    info!("  Tick: {}ms", tick_ms);
    if cli.console { info!("  UI: Console panel"); }
    if cli.osc { info!("  OSC: {}", cli.osc_target); }
    if cli.record { info!("  Recording to {:?}", cli.output_dir); }
    info!("═══════════════════════════════════════════════");

    // Channel: inputs → coordinator
    let (input_tx, input_rx) = bounded::<InputEvent>(4096);

    // Channels: coordinator → consumers
    let mut frame_txs: Vec<crossbeam_channel::Sender<RenderModel>> = Vec::new();

    // Raw panel input for the recorder
    let (panel_log_tx, panel_log_rx) = unbounded::<PanelFrame>();

    let mut handles = Vec::new();

    // ─── Console display ────────────────────────────────────────────
    if cli.console {
        let (tx, rx) = bounded::<RenderModel>(256);
        frame_txs.push(tx);
        let hz = cli.display_hz;
        handles.push(thread::Builder::new().name("display".into()).spawn(move || {
            console_display::ConsoleDisplay::new(rx, hz, tick_ms).run();
        })?);
    }

    // ─── OSC sender ─────────────────────────────────────────────────
    if cli.osc {
        let (tx, rx) = bounded::<RenderModel>(1024);
        frame_txs.push(tx);
        let target = cli.osc_target.clone();
        handles.push(thread::Builder::new().name("osc".into()).spawn(move || {
            osc_sender::OscSender::new(rx, target).run();
        })?);
    }

    // ─── Session recorder ───────────────────────────────────────────
    let panel_log = if cli.record {
        let (tx, rx) = bounded::<RenderModel>(4096);
        frame_txs.push(tx);
        let logger = data_logger::DataLogger::new(rx, panel_log_rx, &cli.output_dir, tick_ms)?;
        handles.push(thread::Builder::new().name("logger".into()).spawn(move || {
            logger.run();
        })?);
        Some(panel_log_tx)
    } else {
        None
    };

    // ─── Coordinator ────────────────────────────────────────────────
    handles.push(thread::Builder::new().name("coordinator".into()).spawn(move || {
        coordinator::Coordinator::new(input_rx, frame_txs, panel_log).run();
    })?);

    // ─── Input source ───────────────────────────────────────────────
    if let Some(path) = cli.replay.clone() {
        info!("Replaying {:?}...", path);
        let reader = SessionReader::open(BufReader::new(File::open(&path)?))
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let speed = cli.replay_speed;
        let tx = input_tx.clone();
        handles.push(thread::Builder::new().name("replay".into()).spawn(move || {
            Replayer::new(reader, tx, speed).run();
        })?);
    } else if cli.simulate {
        spawn_simulator(&cli, input_tx.clone(), tick_ms, &mut handles)?;
    } else {
        #[cfg(feature = "hardware")]
        {
            info!("Starting serial reader on {}...", cli.port);
            let cal = cli
                .calibration
                .as_deref()
                .and_then(KnobCalibration::load)
                .unwrap_or_default();
            let tx = input_tx.clone();
            let port = cli.port.clone();
            let baud = cli.baud;
            handles.push(thread::Builder::new().name("serial".into()).spawn(move || {
                serial_reader::SerialReader::new(port, baud, tx)
                    .with_calibration(cal)
                    .run();
            })?);
        }
        #[cfg(not(feature = "hardware"))]
        {
            error!("Hardware mode requires 'hardware' feature. Falling back to simulator.");
            spawn_simulator(&cli, input_tx.clone(), tick_ms, &mut handles)?;
        }
    }
    drop(input_tx);

    info!("Running. Press Ctrl+C to stop.");
    for h in handles {
        let _ = h.join();
    }
    Ok(())
}

fn spawn_simulator(
    cli: &Cli,
    tx: crossbeam_channel::Sender<InputEvent>,
    tick_ms: u32,
    handles: &mut Vec<thread::JoinHandle<()>>,
) -> io::Result<()> {
    info!("Starting simulator...");
    let clock = PanelClock::with_offset(cli.clock_offset_ms);
    handles.push(thread::Builder::new().name("simulator".into()).spawn(move || {
        simulator::Simulator::new(clock, tx, tick_ms).run();
    })?);
    Ok(())
}
