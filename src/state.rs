//! Sample and record types shared by the drivers, the state store and the loop.
//!
//! Samples are `Copy`; one set is produced per iteration and dropped once the
//! record has been serialized.
use serde::{Deserialize, Serialize};

// ── Samples ───────────────────────────────────────────────────────────────────

/// Three-axis reading (accelerometer in m/s², magnetometer in gauss).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BaroSample {
    /// Pascals
    #[serde(rename = "p")]
    pub pressure: f32,
    /// Metres above the 101325 Pa reference
    pub alt: f32,
}

/// Last resolved GPS position, decimal degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsDatum {
    pub lat: f64,
    pub lon: f64,
}

// ── Commands / state ──────────────────────────────────────────────────────────

/// Commands the main flight computer understands.
pub const KNOWN_COMMANDS: [&str; 8] = [
    "none", "test", "arm", "disarm", "ignite", "abort", "pass", "fail",
];

/// Opaque command token received over the radio. It becomes the commanded
/// state as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(String);

impl Command {
    /// Parses one inbound radio line. Accepts a bare token (`arm`) or the main
    /// board's JSON form (`{"command":"arm"}`). Blank lines carry nothing.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if line.starts_with('{') {
            #[derive(Deserialize)]
            struct Wrapped {
                command: String,
            }
            if let Ok(w) = serde_json::from_str::<Wrapped>(line) {
                let token = w.command.trim();
                return (!token.is_empty()).then(|| Self(token.to_owned()));
            }
        }

        Some(Self(line.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_known(&self) -> bool {
        KNOWN_COMMANDS.contains(&self.0.as_str())
    }
}

impl Default for Command {
    fn default() -> Self {
        Self(KNOWN_COMMANDS[0].to_owned())
    }
}

/// Telemetry cached by the state store, as last reported by the main board.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    pub acc: Vector3,
    pub bar: BaroSample,
}

// ── Record ────────────────────────────────────────────────────────────────────

/// Raw readings the payload took itself this iteration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct PayloadSensors {
    pub acc: Vector3,
    pub bar: BaroSample,
    pub gps: GpsDatum,
    pub mag: Vector3,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PayloadBlock {
    pub sensor: PayloadSensors,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MainBlock {
    pub state: Command,
    pub sensor: Telemetry,
}

/// One line of the blackbox / downlink stream.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Record {
    pub time: u64,
    pub payload: PayloadBlock,
    pub main: MainBlock,
}

impl Record {
    pub fn compose(time: u64, sensor: PayloadSensors, state: Command, telemetry: Telemetry) -> Self {
        Self {
            time,
            payload: PayloadBlock { sensor },
            main: MainBlock {
                state,
                sensor: telemetry,
            },
        }
    }

    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
