use std::io::{Read, Write};

use log::{debug, info, warn};

use super::serial::{FrameWriter, LineBuffer, Sent};
use super::Radio;
use crate::error::Result;
use crate::state::Command;

/// Longest uplink line accepted; anything longer is dropped.
const RX_LINE_MAX: usize = 256;

/// Line-oriented radio modem on a serial port: one command per inbound line,
/// one record per outbound line.
pub struct SerialRadio<P> {
    port: P,
    rx: LineBuffer<RX_LINE_MAX>,
    tx: FrameWriter,
    pub frames_sent: u32,
    pub frames_dropped: u32,
}

impl<P: Read + Write> SerialRadio<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            rx: LineBuffer::new(),
            tx: FrameWriter::new(),
            frames_sent: 0,
            frames_dropped: 0,
        }
    }
}

impl<P: Read + Write> Radio for SerialRadio<P> {
    async fn init(&mut self) -> Result<()> {
        self.rx.clear();
        info!("radio: link open");
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Command>> {
        while let Some(line) = self.rx.poll_line(&mut self.port)? {
            if let Some(cmd) = Command::from_line(&line) {
                debug!("radio: uplink {:?}", cmd.as_str());
                return Ok(Some(cmd));
            }
        }
        Ok(None)
    }

    async fn send(&mut self, payload: &str) -> Result<()> {
        match self.tx.send_line(&mut self.port, payload.as_bytes())? {
            Sent::Complete => self.frames_sent = self.frames_sent.wrapping_add(1),
            Sent::Queued => {
                self.frames_sent = self.frames_sent.wrapping_add(1);
                debug!("radio: tx queue full, {} bytes carried over", self.tx.backlog());
            }
            // Modem still busy with the last frame: the downlink is lossy,
            // the blackbox is not.
            Sent::Dropped => {
                self.frames_dropped = self.frames_dropped.wrapping_add(1);
                warn!("radio: tx busy, frame dropped ({} so far)", self.frames_dropped);
            }
        }
        Ok(())
    }

    async fn deinit(&mut self) -> Result<()> {
        let unsent = self.tx.flush(&mut self.port)?;
        if unsent > 0 {
            warn!("radio: {unsent} bytes of the last frame never left");
        }
        info!(
            "radio: closed, {} frames sent, {} dropped",
            self.frames_sent, self.frames_dropped
        );
        Ok(())
    }
}
