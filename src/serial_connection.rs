/// Serial link to the motor controller board.
///
/// The console only needs line-oriented text I/O, so the port is wrapped behind
/// `LineTransport`; `PortOpener` enumerates and opens ports. Both are traits so
/// the console can be driven without hardware.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use crate::config_loader::ConsoleSettings;
use crate::error::{ConsoleError, ConsoleResult};

pub trait LineTransport {
    fn write(&mut self, bytes: &[u8]) -> ConsoleResult<()>;
    /// True when at least one byte is waiting, without blocking
    fn has_input_available(&mut self) -> bool;
    /// Block up to the read timeout for one line; terminator stripped
    fn read_line(&mut self) -> ConsoleResult<String>;
    fn close(&mut self);
}

pub trait PortOpener {
    fn list_ports(&self) -> Vec<String>;
    fn open(&self, port: &str, settings: &ConsoleSettings) -> ConsoleResult<Box<dyn LineTransport>>;
}

/// OS serial ports via the `serialport` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortOpener;

impl PortOpener for SerialPortOpener {
    fn list_ports(&self) -> Vec<String> {
        match serialport::available_ports() {
            Ok(ports) => ports.into_iter().map(|p| p.port_name).collect(),
            Err(e) => {
                log::warn!("Port enumeration failed: {}", e);
                Vec::new()
            }
        }
    }

    fn open(&self, port: &str, settings: &ConsoleSettings) -> ConsoleResult<Box<dyn LineTransport>> {
        let opened = serialport::new(port, settings.baud_rate)
            .timeout(settings.read_timeout())
            .open()
            .map_err(|e| ConsoleError::port_open(port, e))?;
        log::info!("Opened {} @{}", port, settings.baud_rate);
        Ok(Box::new(SerialLink::new(opened, settings.read_timeout())))
    }
}

pub struct SerialLink {
    port: Option<Box<dyn serialport::SerialPort>>,
    timeout: Duration,
    // Bytes received but not yet returned as a full line
    pending: Vec<u8>,
}

impl SerialLink {
    pub fn new(port: Box<dyn serialport::SerialPort>, timeout: Duration) -> Self {
        Self { port: Some(port), timeout, pending: Vec::new() }
    }

    fn take_line(&mut self) -> Option<String> {
        split_line(&mut self.pending)
    }
}

/// Remove and decode the first `\n`-terminated line from `pending`
fn split_line(pending: &mut Vec<u8>) -> Option<String> {
    let pos = pending.iter().position(|&b| b == b'\n')?;
    let raw: Vec<u8> = pending.drain(..=pos).collect();
    let text = String::from_utf8_lossy(&raw[..pos]);
    Some(text.trim_end_matches('\r').to_string())
}

impl LineTransport for SerialLink {
    fn write(&mut self, bytes: &[u8]) -> ConsoleResult<()> {
        let port = self.port.as_mut().ok_or(ConsoleError::NotConnected)?;
        port.write_all(bytes).map_err(|e| ConsoleError::Write(e.to_string()))?;
        port.flush().map_err(|e| ConsoleError::Write(e.to_string()))
    }

    fn has_input_available(&mut self) -> bool {
        // A buffered partial line alone does not count; wait for new bytes
        if self.pending.contains(&b'\n') {
            return true;
        }
        match self.port.as_ref().map(|p| p.bytes_to_read()) {
            Some(Ok(n)) => n > 0,
            Some(Err(e)) => {
                log::debug!("bytes_to_read failed: {}", e);
                false
            }
            None => false,
        }
    }

    fn read_line(&mut self) -> ConsoleResult<String> {
        if let Some(line) = self.take_line() {
            return Ok(line);
        }
        let timeout = self.timeout;
        let port = self.port.as_mut().ok_or(ConsoleError::NotConnected)?;
        let start = Instant::now();
        let mut chunk = [0u8; 256];

        let outcome = loop {
            let remaining = timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                break Ok(());
            }
            // Each read may only wait for what is left of the deadline
            if let Err(e) = port.set_timeout(remaining) {
                break Err(ConsoleError::Read(e.to_string()));
            }
            match port.read(&mut chunk) {
                Ok(0) => std::thread::sleep(Duration::from_millis(5).min(remaining)),
                Ok(n) => {
                    self.pending.extend_from_slice(&chunk[..n]);
                    if self.pending.contains(&b'\n') {
                        break Ok(());
                    }
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => break Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(ConsoleError::Read(e.to_string())),
            }
        };
        if let Err(e) = port.set_timeout(timeout) {
            log::debug!("Restoring port timeout failed: {}", e);
        }
        outcome?;

        self.take_line()
            .ok_or_else(|| ConsoleError::Read(format!("no complete line within {:?}", timeout)))
    }

    fn close(&mut self) {
        // Dropping the handle releases the OS port
        if self.port.take().is_some() {
            self.pending.clear();
            log::info!("Serial port closed");
        }
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}
