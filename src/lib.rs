/// Motor PID Control library
///
/// Serial console for tuning a motor controller's PID loop and plotting the
/// telemetry it reports back.

pub mod config_loader;
pub mod console;
pub mod error;
pub mod gui;
pub mod poll_timer;
pub mod protocol;
pub mod rolling_window;
pub mod serial_connection;
