/// Line protocol spoken with the motor controller board.
///
/// Outbound (two lines per Send):
///   `PID:<kp>,<ki>,<kd>\n`
///   `SET:<setpoint>\n`
/// Inbound (one line per telemetry sample, up to 10 Hz):
///   `RPM:<measured>,SET:<setpoint>,ERR:<error>\n`

use crate::error::{ConsoleError, ConsoleResult};

const TELEMETRY_KEYS: [&str; 3] = ["RPM", "SET", "ERR"];

/// PID gains as typed by the operator, sent verbatim
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidParameters {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl PidParameters {
    pub fn command(&self) -> String {
        format!("PID:{},{},{}\n", self.kp, self.ki, self.kd)
    }
}

pub fn setpoint_command(setpoint: i64) -> String {
    format!("SET:{}\n", setpoint)
}

/// Parsed contents of the four tuning fields
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuningRequest {
    pub pid: PidParameters,
    pub setpoint: i64,
}

impl TuningRequest {
    /// Parse all four fields. Any bad field rejects the whole request.
    pub fn parse(kp: &str, ki: &str, kd: &str, setpoint: &str) -> ConsoleResult<Self> {
        let pid = PidParameters {
            kp: parse_gain("Kp", kp)?,
            ki: parse_gain("Ki", ki)?,
            kd: parse_gain("Kd", kd)?,
        };
        let setpoint = setpoint.trim().parse::<i64>().map_err(|_| ConsoleError::InputParse {
            field: "Setpoint",
            value: setpoint.to_string(),
        })?;
        Ok(Self { pid, setpoint })
    }

    /// The exact byte lines written to the port, in transmission order
    pub fn commands(&self) -> [String; 2] {
        [self.pid.command(), setpoint_command(self.setpoint)]
    }
}

fn parse_gain(field: &'static str, text: &str) -> ConsoleResult<f64> {
    text.trim()
        .parse::<f64>()
        .map_err(|_| ConsoleError::InputParse { field, value: text.to_string() })
}

/// One telemetry line as reported by the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryReading {
    pub measured: f64,
    pub setpoint: f64,
    pub error: f64,
}

impl TelemetryReading {
    pub fn parse(line: &str) -> ConsoleResult<Self> {
        let trimmed = line.trim();
        let fields: Vec<&str> = trimmed.split(',').collect();
        if fields.len() != TELEMETRY_KEYS.len() {
            return Err(ConsoleError::telemetry(
                trimmed,
                format!("expected {} fields, got {}", TELEMETRY_KEYS.len(), fields.len()),
            ));
        }

        let mut values = [0.0f64; 3];
        for (slot, (field, key)) in values.iter_mut().zip(fields.iter().zip(TELEMETRY_KEYS)) {
            let (name, raw) = field
                .split_once(':')
                .ok_or_else(|| ConsoleError::telemetry(trimmed, format!("field '{}' has no ':'", field)))?;
            if name.trim() != key {
                return Err(ConsoleError::telemetry(
                    trimmed,
                    format!("expected key {}, found '{}'", key, name),
                ));
            }
            *slot = raw.trim().parse::<f64>().map_err(|_| {
                ConsoleError::telemetry(trimmed, format!("{} value '{}' is not a number", key, raw))
            })?;
        }

        Ok(Self { measured: values[0], setpoint: values[1], error: values[2] })
    }
}
