/// Error kinds raised by the console.
///
/// Every variant is contained by the caller: none of them ends the process.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsoleError {
    /// Port busy, missing, or permission denied
    #[error("Connection failed on {port}: {reason}")]
    PortOpen { port: String, reason: String },
    #[error("Read error: {0}")]
    Read(String),
    #[error("Write error: {0}")]
    Write(String),
    /// Operator typed something that is not a number into a tuning field
    #[error("Invalid {field} input '{value}'. Please enter a valid number.")]
    InputParse { field: &'static str, value: String },
    /// Device line that does not match `RPM:<f>,SET:<f>,ERR:<f>`
    #[error("Malformed telemetry '{line}': {reason}")]
    TelemetryParse { line: String, reason: String },
    #[error("Not connected to a serial port")]
    NotConnected,
}

impl ConsoleError {
    pub fn port_open(port: &str, reason: impl ToString) -> Self {
        ConsoleError::PortOpen { port: port.to_string(), reason: reason.to_string() }
    }

    pub fn telemetry(line: &str, reason: impl ToString) -> Self {
        ConsoleError::TelemetryParse { line: line.to_string(), reason: reason.to_string() }
    }
}

pub type ConsoleResult<T> = std::result::Result<T, ConsoleError>;
