//! Command/state store shared with the main flight computer.
//!
//! The store owns the commanded state outright: `set_state` overwrites it and
//! tells the main board. Telemetry flows the other way, one JSON object per
//! line, and `poll` keeps the latest report cached.

use std::io::{Read, Write};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::drivers::serial::{FrameWriter, LineBuffer, Sent};
use crate::error::Result;
use crate::state::{BaroSample, Command, Telemetry, Vector3};

/// Main-board telemetry lines carry every sensor, so they run long.
const LINK_LINE_MAX: usize = 1024;

#[derive(Debug, Default, Deserialize)]
struct MainSensors {
    #[serde(default)]
    acc: Vector3,
    #[serde(default)]
    bar: BaroSample,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum MainMessage {
    Telemetry {
        #[serde(default)]
        sensors: MainSensors,
    },
    State {
        #[serde(default)]
        state: String,
    },
    Result {
        #[serde(default)]
        pass: bool,
    },
    Error {
        #[serde(default)]
        message: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Serialize)]
struct Outbound<'a> {
    command: &'a str,
}

pub struct CommStore<L> {
    link: L,
    rx: LineBuffer<LINK_LINE_MAX>,
    tx: FrameWriter,
    state: Command,
    telemetry: Telemetry,
    pub reports: u32,
    pub malformed: u32,
}

impl<L: Read + Write> CommStore<L> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            rx: LineBuffer::new(),
            tx: FrameWriter::new(),
            state: Command::default(),
            telemetry: Telemetry::default(),
            reports: 0,
            malformed: 0,
        }
    }

    /// Takes `cmd` as the new state, unconditionally, and forwards it.
    pub fn set_state(&mut self, cmd: Command) -> Result<()> {
        if !cmd.is_known() {
            warn!("comm: unknown command {:?}, accepting as-is", cmd.as_str());
        }

        let line = serde_json::to_vec(&Outbound {
            command: cmd.as_str(),
        })?;
        if self.tx.send_line(&mut self.link, &line)? == Sent::Dropped {
            warn!("comm: link busy, {:?} not forwarded", cmd.as_str());
        }

        info!("comm: state {} -> {}", self.state.as_str(), cmd.as_str());
        self.state = cmd;
        Ok(())
    }

    /// Drains whatever the main board has sent since the last call.
    pub fn poll(&mut self) -> Result<()> {
        while let Some(line) = self.rx.poll_line(&mut self.link)? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<MainMessage>(&line) {
                Ok(msg) => self.handle(msg),
                Err(e) => {
                    self.malformed = self.malformed.wrapping_add(1);
                    warn!("comm: skipping malformed line ({e})");
                }
            }
        }
        Ok(())
    }

    fn handle(&mut self, msg: MainMessage) {
        match msg {
            MainMessage::Telemetry { sensors } => {
                self.telemetry = Telemetry {
                    acc: sensors.acc,
                    bar: sensors.bar,
                };
                self.reports = self.reports.wrapping_add(1);
            }
            MainMessage::State { state } => debug!("comm: main board reports {state}"),
            MainMessage::Result { pass } => info!("comm: main board self-test pass={pass}"),
            MainMessage::Error { message } => error!("comm: main board error: {message}"),
            MainMessage::Other => debug!("comm: ignoring unrecognised message"),
        }
    }

    pub fn get_state(&self) -> &Command {
        &self.state
    }

    pub fn get_telemetry(&self) -> Telemetry {
        self.telemetry
    }

    pub fn link(&self) -> &L {
        &self.link
    }
}
