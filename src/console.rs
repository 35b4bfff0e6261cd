/// Operator console state, independent of the widget toolkit.
///
/// Owns the serial link, the poll timer and the chart data; the GUI only renders
/// this state and forwards button presses to `connect`, `disconnect`, `send`
/// and `poll`.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::config_loader::ConsoleSettings;
use crate::error::{ConsoleError, ConsoleResult};
use crate::poll_timer::PollTimer;
use crate::protocol::{TelemetryReading, TuningRequest};
use crate::rolling_window::RollingWindow;
use crate::serial_connection::{LineTransport, PortOpener};

const MESSAGE_LIMIT: usize = 10000;
const MESSAGE_KEEP: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

pub struct PidConsole {
    settings: ConsoleSettings,
    opener: Box<dyn PortOpener>,
    transport: Option<Box<dyn LineTransport>>,
    state: ConnectionState,
    timer: PollTimer,
    window: RollingWindow,
    started_at: DateTime<Utc>,
    message: String,
    pub ports: Vec<String>,
    pub selected_port: String,
    pub kp_text: String,
    pub ki_text: String,
    pub kd_text: String,
    pub setpoint_text: String,
}

impl PidConsole {
    pub fn new(settings: ConsoleSettings, opener: Box<dyn PortOpener>) -> Self {
        let mut console = Self {
            opener,
            transport: None,
            state: ConnectionState::Disconnected,
            timer: PollTimer::new(settings.poll_interval()),
            window: RollingWindow::new(settings.window_capacity),
            started_at: Utc::now(),
            message: String::new(),
            ports: Vec::new(),
            selected_port: String::new(),
            kp_text: settings.default_kp.clone(),
            ki_text: settings.default_ki.clone(),
            kd_text: settings.default_kd.clone(),
            setpoint_text: settings.default_setpoint.clone(),
            settings,
        };
        console.refresh_ports();
        console
    }

    /// Re-enumerate ports. Keeps the current selection if it still exists,
    /// otherwise selects the first port (or nothing).
    pub fn refresh_ports(&mut self) {
        self.ports = self.opener.list_ports();
        if !self.ports.contains(&self.selected_port) {
            self.selected_port = self.ports.first().cloned().unwrap_or_default();
        }
        debug!("Available ports: {:?}", self.ports);
    }

    pub fn connect(&mut self, now: Instant) -> ConsoleResult<()> {
        if self.state == ConnectionState::Connected {
            return Ok(());
        }
        if self.selected_port.is_empty() {
            self.append_message("No serial port selected");
            return Ok(());
        }

        let port = self.selected_port.clone();
        match self.opener.open(&port, &self.settings) {
            Ok(transport) => {
                self.transport = Some(transport);
                self.state = ConnectionState::Connected;
                self.timer.start(now);
                info!("Connected to {} @{}", port, self.settings.baud_rate);
                self.append_message(&format!("Connected to {}", port));
                Ok(())
            }
            Err(e) => {
                error!("{}", e);
                self.append_message(&e.to_string());
                Err(e)
            }
        }
    }

    /// Close the port and stop polling. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        self.timer.stop();
        self.state = ConnectionState::Disconnected;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            info!("Disconnected from {}", self.selected_port);
            self.append_message("Disconnected");
        }
    }

    /// Parse the four tuning fields and transmit them. Nothing is written unless
    /// every field parses.
    pub fn send(&mut self) -> ConsoleResult<TuningRequest> {
        let result = self.try_send();
        if let Err(e) = &result {
            warn!("Send aborted: {}", e);
            self.append_message(&e.to_string());
        }
        result
    }

    fn try_send(&mut self) -> ConsoleResult<TuningRequest> {
        let transport = self.transport.as_mut().ok_or(ConsoleError::NotConnected)?;
        let request = TuningRequest::parse(&self.kp_text, &self.ki_text, &self.kd_text, &self.setpoint_text)?;
        for command in request.commands() {
            transport.write(command.as_bytes())?;
        }

        let summary = format!(
            "Sent PID: Kp={}, Ki={}, Kd={}, Setpoint={}",
            request.pid.kp, request.pid.ki, request.pid.kd, request.setpoint
        );
        info!("{}", summary);
        self.append_message(&summary);
        self.window.set_target_line(request.setpoint as f64);
        Ok(request)
    }

    /// Run one poll tick if the timer is due
    pub fn poll(&mut self, now: Instant) {
        if self.timer.poll(now) {
            // Errors were already reported inside on_tick
            let _ = self.on_tick();
        }
    }

    /// Read at most one line and append it to the chart. Read and parse
    /// failures are reported and the tick is skipped.
    pub fn on_tick(&mut self) -> ConsoleResult<Option<TelemetryReading>> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(None);
        };
        if !transport.has_input_available() {
            return Ok(None);
        }

        let line = match transport.read_line() {
            Ok(line) => line,
            Err(e) => {
                warn!("{}", e);
                self.append_message(&format!("Error reading data: {}", e));
                return Err(e);
            }
        };
        debug!("RECV: {:?}", line);
        if line.trim().is_empty() {
            return Ok(None);
        }

        match TelemetryReading::parse(&line) {
            Ok(reading) => {
                self.window.append(reading);
                Ok(Some(reading))
            }
            Err(e) => {
                warn!("{}", e);
                self.append_message(&format!("Error reading data: {}", e));
                Err(e)
            }
        }
    }

    fn append_message(&mut self, msg: &str) {
        if !self.message.is_empty() {
            self.message.push('\n');
        }
        self.message.push_str(msg);
        if self.message.len() > MESSAGE_LIMIT {
            let mut cut = self.message.len() - MESSAGE_KEEP;
            while !self.message.is_char_boundary(cut) {
                cut += 1;
            }
            self.message = self.message.split_off(cut);
        }
    }

    pub fn clear_messages(&mut self) {
        self.message.clear();
    }

    pub fn messages(&self) -> &str {
        &self.message
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_polling(&self) -> bool {
        self.timer.is_active()
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    /// Epoch seconds that the chart's x axis counts from
    pub fn plot_origin(&self) -> f64 {
        self.started_at.timestamp_micros() as f64 / 1_000_000.0
    }

    pub fn until_next_tick(&self, now: Instant) -> Option<Duration> {
        self.timer.remaining(now)
    }
}

impl Drop for PidConsole {
    fn drop(&mut self) {
        self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default)]
    struct Wire {
        writes: Vec<String>,
        inbound: VecDeque<ConsoleResult<String>>,
        closes: usize,
        fail_writes: bool,
    }

    struct FakeLink(Rc<RefCell<Wire>>);

    impl LineTransport for FakeLink {
        fn write(&mut self, bytes: &[u8]) -> ConsoleResult<()> {
            let mut wire = self.0.borrow_mut();
            if wire.fail_writes {
                return Err(ConsoleError::Write("broken pipe".into()));
            }
            wire.writes.push(String::from_utf8_lossy(bytes).to_string());
            Ok(())
        }

        fn has_input_available(&mut self) -> bool {
            !self.0.borrow().inbound.is_empty()
        }

        fn read_line(&mut self) -> ConsoleResult<String> {
            self.0
                .borrow_mut()
                .inbound
                .pop_front()
                .unwrap_or_else(|| Err(ConsoleError::Read("empty".into())))
        }

        fn close(&mut self) {
            self.0.borrow_mut().closes += 1;
        }
    }

    struct FakeOpener {
        wire: Rc<RefCell<Wire>>,
        ports: Vec<String>,
        refuse: bool,
    }

    impl PortOpener for FakeOpener {
        fn list_ports(&self) -> Vec<String> {
            self.ports.clone()
        }

        fn open(&self, port: &str, _settings: &ConsoleSettings) -> ConsoleResult<Box<dyn LineTransport>> {
            if self.refuse {
                return Err(ConsoleError::port_open(port, "No such file or directory"));
            }
            Ok(Box::new(FakeLink(Rc::clone(&self.wire))))
        }
    }

    fn console_with(refuse: bool) -> (PidConsole, Rc<RefCell<Wire>>) {
        let wire = Rc::new(RefCell::new(Wire::default()));
        let opener = FakeOpener {
            wire: Rc::clone(&wire),
            ports: vec!["/dev/ttyACM0".into(), "/dev/ttyUSB0".into()],
            refuse,
        };
        (PidConsole::new(ConsoleSettings::default(), Box::new(opener)), wire)
    }

    fn connected() -> (PidConsole, Rc<RefCell<Wire>>) {
        let (mut console, wire) = console_with(false);
        console.connect(Instant::now()).unwrap();
        (console, wire)
    }

    fn push_line(wire: &Rc<RefCell<Wire>>, line: &str) {
        wire.borrow_mut().inbound.push_back(Ok(line.to_string()));
    }

    #[test]
    fn test_defaults_and_port_selection() {
        let (console, _) = console_with(false);
        assert_eq!(console.kp_text, "0.5");
        assert_eq!(console.ki_text, "0.0001");
        assert_eq!(console.kd_text, "0");
        assert_eq!(console.setpoint_text, "50");
        assert_eq!(console.selected_port, "/dev/ttyACM0");
        assert_eq!(console.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_connect_starts_polling() {
        let (console, _) = connected();
        assert!(console.is_connected());
        assert!(console.is_polling());
        assert!(console.messages().contains("Connected to /dev/ttyACM0"));
    }

    #[test]
    fn test_failed_connect_leaves_disconnected() {
        let (mut console, _) = console_with(true);
        let err = console.connect(Instant::now()).unwrap_err();
        assert!(matches!(err, ConsoleError::PortOpen { .. }));
        assert_eq!(console.state(), ConnectionState::Disconnected);
        assert!(!console.is_polling());
        assert!(console.messages().contains("Connection failed"));
    }

    #[test]
    fn test_connect_without_port_is_noop() {
        let (mut console, _) = console_with(false);
        console.selected_port.clear();
        console.connect(Instant::now()).unwrap();
        assert!(!console.is_connected());
        assert!(console.messages().contains("No serial port selected"));
    }

    #[test]
    fn test_send_writes_two_lines_in_order() {
        let (mut console, wire) = connected();
        let request = console.send().unwrap();
        assert_eq!(request.setpoint, 50);
        assert_eq!(
            wire.borrow().writes,
            vec!["PID:0.5,0.0001,0\n".to_string(), "SET:50\n".to_string()]
        );
        assert!(console.messages().contains("Sent PID: Kp=0.5, Ki=0.0001, Kd=0, Setpoint=50"));
    }

    #[test]
    fn test_send_with_bad_field_writes_nothing() {
        let (mut console, wire) = connected();
        console.kp_text = "abc".into();
        let err = console.send().unwrap_err();
        assert_eq!(err, ConsoleError::InputParse { field: "Kp", value: "abc".into() });
        assert!(wire.borrow().writes.is_empty());
    }

    #[test]
    fn test_send_while_disconnected() {
        let (mut console, wire) = console_with(false);
        assert_eq!(console.send().unwrap_err(), ConsoleError::NotConnected);
        assert!(wire.borrow().writes.is_empty());
    }

    #[test]
    fn test_send_write_failure_keeps_connection() {
        let (mut console, wire) = connected();
        wire.borrow_mut().fail_writes = true;
        assert!(matches!(console.send(), Err(ConsoleError::Write(_))));
        assert!(console.is_connected());
    }

    #[test]
    fn test_send_snaps_target_line() {
        let (mut console, wire) = connected();
        push_line(&wire, "RPM:40,SET:50,ERR:10");
        push_line(&wire, "RPM:45,SET:50,ERR:5");
        console.on_tick().unwrap();
        console.on_tick().unwrap();

        console.setpoint_text = "80".into();
        console.send().unwrap();

        let samples: Vec<_> = console.window().iter().copied().collect();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| s.setpoint == 80.0));
        assert_eq!(samples[0].error, 10.0);
        assert_eq!(samples[1].measured, 45.0);
    }

    #[test]
    fn test_tick_reads_one_line() {
        let (mut console, wire) = connected();
        push_line(&wire, "RPM:42.5,SET:50.0,ERR:-7.5");
        push_line(&wire, "RPM:43.0,SET:50.0,ERR:-7.0");
        let reading = console.on_tick().unwrap().unwrap();
        assert_eq!(reading.measured, 42.5);
        assert_eq!(console.window().len(), 1);
        assert_eq!(wire.borrow().inbound.len(), 1);
    }

    #[test]
    fn test_malformed_line_is_discarded() {
        let (mut console, wire) = connected();
        push_line(&wire, "RPM:abc,SET:50,ERR:1");
        assert!(matches!(console.on_tick(), Err(ConsoleError::TelemetryParse { .. })));
        assert!(console.window().is_empty());
        assert!(console.is_connected());
    }

    #[test]
    fn test_read_error_skips_tick() {
        let (mut console, wire) = connected();
        wire.borrow_mut().inbound.push_back(Err(ConsoleError::Read("timed out".into())));
        push_line(&wire, "RPM:1,SET:2,ERR:1");
        assert!(console.on_tick().is_err());
        assert!(console.window().is_empty());
        assert!(console.on_tick().unwrap().is_some());
        assert_eq!(console.window().len(), 1);
    }

    #[test]
    fn test_empty_line_and_idle_tick() {
        let (mut console, wire) = connected();
        assert_eq!(console.on_tick().unwrap(), None);
        push_line(&wire, "");
        assert_eq!(console.on_tick().unwrap(), None);
        assert!(console.window().is_empty());
    }

    #[test]
    fn test_poll_respects_timer() {
        let (mut console, wire) = console_with(false);
        let t0 = Instant::now();
        console.connect(t0).unwrap();
        push_line(&wire, "RPM:1,SET:2,ERR:1");
        console.poll(t0 + Duration::from_millis(10));
        assert!(console.window().is_empty());
        console.poll(t0 + Duration::from_millis(100));
        assert_eq!(console.window().len(), 1);
    }

    #[test]
    fn test_disconnect_twice_closes_once() {
        let (mut console, wire) = connected();
        console.disconnect();
        console.disconnect();
        assert_eq!(wire.borrow().closes, 1);
        assert_eq!(console.state(), ConnectionState::Disconnected);
        assert!(!console.is_polling());
    }

    #[test]
    fn test_no_polling_after_disconnect() {
        let (mut console, wire) = connected();
        console.disconnect();
        push_line(&wire, "RPM:1,SET:2,ERR:1");
        console.poll(Instant::now() + Duration::from_secs(1));
        assert!(console.window().is_empty());
    }

    #[test]
    fn test_message_buffer_is_bounded() {
        let (mut console, _) = console_with(false);
        for _ in 0..2000 {
            console.append_message("Invalid Kp input 'abc'. Please enter a valid number.");
        }
        assert!(console.messages().len() <= MESSAGE_LIMIT);
    }
}
