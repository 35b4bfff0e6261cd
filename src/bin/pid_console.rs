/// Motor PID Control console
///
/// Run with: cargo run --bin pid_console -- [--config console.yaml] [--port /dev/ttyACM0 --connect]

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use eframe::egui;

use motor_pid_console::config_loader::load_console_settings;
use motor_pid_console::console::PidConsole;
use motor_pid_console::gui::pid_console_gui::{PidConsoleGUI, WINDOW_TITLE};
use motor_pid_console::serial_connection::SerialPortOpener;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML file overriding serial and chart settings
    #[arg(long)]
    config: Option<PathBuf>,
    /// Port to preselect
    #[arg(long)]
    port: Option<String>,
    /// Connect to the selected port on startup
    #[arg(long)]
    connect: bool,
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = Args::parse();
    let default_filter = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let settings = match load_console_settings(args.config.as_deref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load console settings: {:#}", e);
            std::process::exit(1);
        }
    };

    let mut console = PidConsole::new(settings, Box::new(SerialPortOpener));
    if let Some(port) = args.port {
        console.selected_port = port;
    }
    if args.connect {
        if let Err(e) = console.connect(Instant::now()) {
            log::warn!("Startup connect failed, continuing disconnected: {}", e);
        }
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([1200.0, 800.0])
            .with_position(egui::pos2(100.0, 100.0)),
        ..Default::default()
    };

    let gui = PidConsoleGUI::new(console);
    if let Err(e) = eframe::run_native(WINDOW_TITLE, options, Box::new(|_cc| Box::new(gui))) {
        eprintln!("GUI error: {}", e);
        std::process::exit(1);
    }
}
