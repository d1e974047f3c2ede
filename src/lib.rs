pub mod clock;
pub mod console_display;
pub mod coordinator;
pub mod data_logger;
pub mod edges;
pub mod jsonl_reader;
pub mod knob_router;
pub mod leds;
pub mod osc_sender;
pub mod panel_protocol;
pub mod parameters;
pub mod sequencer;
pub mod simulator;
pub mod step_matrix;
pub mod types;

#[cfg(feature = "hardware")]
pub mod serial_reader;
