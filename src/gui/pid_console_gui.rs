/// Motor PID Control window
///
/// Tuning fields and Send on top, serial connection row below, then the live
/// RPM / Setpoint / Error chart and the message log.

use std::time::Instant;

use eframe::egui;
use egui::Color32;
use egui_plot::{Corner, Legend, Line, Plot, PlotPoints};

use crate::console::PidConsole;

pub const WINDOW_TITLE: &str = "Motor PID Control";

pub struct PidConsoleGUI {
    console: PidConsole,
}

impl PidConsoleGUI {
    pub fn new(console: PidConsole) -> Self {
        Self { console }
    }

    fn tuning_panel(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("PID Tuning:").strong());
        egui::Grid::new("pid_tuning_grid")
            .num_columns(2)
            .spacing([12.0, 6.0])
            .show(ui, |ui| {
                ui.label("Kp:");
                ui.text_edit_singleline(&mut self.console.kp_text);
                ui.end_row();

                ui.label("Ki:");
                ui.text_edit_singleline(&mut self.console.ki_text);
                ui.end_row();

                ui.label("Kd:");
                ui.text_edit_singleline(&mut self.console.kd_text);
                ui.end_row();

                ui.label("Setpoint (RPM):");
                ui.text_edit_singleline(&mut self.console.setpoint_text);
                ui.end_row();
            });

        let connected = self.console.is_connected();
        if ui.add_enabled(connected, egui::Button::new("Send PID and Setpoint")).clicked() {
            // Reported to the message log by the console
            let _ = self.console.send();
        }
    }

    fn connection_panel(&mut self, ui: &mut egui::Ui) {
        ui.label(egui::RichText::new("Serial Connection:").strong());
        let connected = self.console.is_connected();
        ui.horizontal(|ui| {
            ui.label("Port:");
            ui.add_enabled_ui(!connected, |ui| {
                let shown = if self.console.selected_port.is_empty() {
                    "(no ports)".to_string()
                } else {
                    self.console.selected_port.clone()
                };
                egui::ComboBox::from_id_source("serial_port_combo")
                    .selected_text(shown)
                    .show_ui(ui, |ui| {
                        for port in &self.console.ports {
                            ui.selectable_value(&mut self.console.selected_port, port.clone(), port.as_str());
                        }
                    });
                if ui.button("Refresh").clicked() {
                    self.console.refresh_ports();
                }
            });

            if ui.add_enabled(!connected, egui::Button::new("Connect")).clicked() {
                let _ = self.console.connect(Instant::now());
            }
            if ui.add_enabled(connected, egui::Button::new("Disconnect")).clicked() {
                self.console.disconnect();
            }

            if self.console.is_connected() {
                ui.colored_label(Color32::GREEN, "CONNECTED");
            } else {
                ui.colored_label(Color32::GRAY, "DISCONNECTED");
            }
        });
    }

    fn telemetry_plot(&self, ui: &mut egui::Ui) {
        let window = self.console.window();
        let origin = self.console.plot_origin();
        let rpm = PlotPoints::from(window.series(origin, |s| s.measured));
        let setpoint = PlotPoints::from(window.series(origin, |s| s.setpoint));
        let error = PlotPoints::from(window.series(origin, |s| s.error));

        Plot::new("telemetry_plot")
            .height((ui.available_height() - 140.0).max(200.0))
            .legend(Legend::default().position(Corner::LeftTop))
            .x_axis_label("Time")
            .y_axis_label("Values")
            .show(ui, |plot_ui| {
                plot_ui.line(Line::new(rpm).name("RPM"));
                plot_ui.line(Line::new(setpoint).name("Setpoint"));
                plot_ui.line(Line::new(error).name("Error"));
            });
    }

    fn message_panel(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Messages:");
            if ui.small_button("Clear").clicked() {
                self.console.clear_messages();
            }
        });
        egui::ScrollArea::vertical()
            .max_height(100.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                ui.label(self.console.messages());
            });
    }
}

impl eframe::App for PidConsoleGUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.console.poll(now);

        egui::CentralPanel::default().show(ctx, |ui| {
            self.tuning_panel(ui);
            ui.separator();
            self.connection_panel(ui);
            ui.separator();
            self.telemetry_plot(ui);
            ui.separator();
            self.message_panel(ui);
        });

        // Keep the poll timer ticking while no input events arrive
        if let Some(wait) = self.console.until_next_tick(Instant::now()) {
            ctx.request_repaint_after(wait);
        }
    }
}
