//! Serial plumbing shared by the radio, the main-board link and GPS.

use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, StopBits, TTYPort};

/// Radio modem, main board and GPS all run at this rate unless told otherwise.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Opens a UART raw, 8N1, no flow control. A zero timeout makes reads and
/// writes return at once when the port has nothing to give or no room.
pub fn open_port(path: &str, baud: u32) -> serialport::Result<TTYPort> {
    serialport::new(path, baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(Duration::ZERO)
        .open_native()
}

/// `WouldBlock` from an `O_NONBLOCK` descriptor, `TimedOut` from a
/// zero-timeout serial port: either way the port is idle, not broken.
fn is_idle(e: &io::Error) -> bool {
    matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

/// Reads whatever is pending without waiting; `Ok(0)` means nothing arrived.
pub fn read_available(port: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match port.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if is_idle(&e) => return Ok(0),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}

/// Accumulates bytes and hands out complete `\n`-terminated lines, one at a time.
pub struct LineBuffer<const N: usize> {
    buf: heapless::Vec<u8, N>,
    /// Set after an overflow; input is discarded through the next `\n`.
    skipping: bool,
    /// Lines dropped because they did not fit in `N` bytes.
    pub overflows: u32,
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> LineBuffer<N> {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            skipping: false,
            overflows: 0,
        }
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.skipping = false;
    }

    pub fn push_bytes(&mut self, data: &[u8]) {
        for &b in data {
            if self.skipping {
                if b == b'\n' {
                    self.skipping = false;
                }
                continue;
            }
            if self.buf.push(b).is_err() {
                // The unterminated tail is the oversized line; complete lines
                // ahead of it stay queued.
                self.overflows = self.overflows.wrapping_add(1);
                let keep = self
                    .buf
                    .iter()
                    .rposition(|&c| c == b'\n')
                    .map_or(0, |i| i + 1);
                self.buf.truncate(keep);
                self.skipping = b != b'\n';
            }
        }
    }

    /// Pops the oldest complete line, without its terminator. Invalid UTF-8 is
    /// replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.buf.iter().position(|&b| b == b'\n')?;
        let line = String::from_utf8_lossy(&self.buf[..end])
            .trim_end_matches('\r')
            .to_owned();

        let consumed = end + 1;
        let len = self.buf.len();
        self.buf.rotate_left(consumed);
        self.buf.truncate(len - consumed);
        Some(line)
    }

    /// Tops the buffer up from `port` (non-blocking) and returns the next line.
    pub fn poll_line(&mut self, port: &mut impl Read) -> io::Result<Option<String>> {
        if let Some(line) = self.next_line() {
            return Ok(Some(line));
        }

        let mut chunk = [0u8; 256];
        loop {
            // Never read more than fits, so an overflow only ever hits the
            // partial line. A full buffer still takes one byte to trip it.
            let want = chunk.len().min(N - self.buf.len()).max(1);
            let n = read_available(port, &mut chunk[..want])?;
            if n == 0 {
                return Ok(None);
            }
            self.push_bytes(&chunk[..n]);
            if let Some(line) = self.next_line() {
                return Ok(Some(line));
            }
        }
    }
}

/// How far an outbound frame got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sent {
    /// Entirely on the wire.
    Complete,
    /// Partly written; the rest goes out ahead of the next frame.
    Queued,
    /// Not a byte written, either because an earlier frame is still
    /// draining or because the port had no room at all.
    Dropped,
}

/// Newline-framed writer for a port that may refuse or half-take a write.
/// Frames never interleave: a partly written frame is finished before the
/// next one starts, and a frame that cannot start is dropped whole.
#[derive(Default)]
pub struct FrameWriter {
    pending: Vec<u8>,
}

impl FrameWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of an earlier frame still waiting for room.
    pub fn backlog(&self) -> usize {
        self.pending.len()
    }

    fn drain(&mut self, port: &mut impl Write) -> io::Result<()> {
        while !self.pending.is_empty() {
            match port.write(&self.pending) {
                Ok(0) => return Err(ErrorKind::WriteZero.into()),
                Ok(n) => {
                    self.pending.drain(..n);
                }
                Err(e) if is_idle(&e) => return Ok(()),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn send_line(&mut self, port: &mut impl Write, payload: &[u8]) -> io::Result<Sent> {
        self.drain(port)?;
        if !self.pending.is_empty() {
            return Ok(Sent::Dropped);
        }

        let frame_len = payload.len() + 1;
        self.pending.reserve(frame_len);
        self.pending.extend_from_slice(payload);
        self.pending.push(b'\n');
        self.drain(port)?;

        Ok(match self.pending.len() {
            0 => Sent::Complete,
            n if n == frame_len => {
                self.pending.clear();
                Sent::Dropped
            }
            _ => Sent::Queued,
        })
    }

    /// Pushes out what it can of the backlog and flushes the port. Returns
    /// the bytes that still could not be written.
    pub fn flush(&mut self, port: &mut impl Write) -> io::Result<usize> {
        self.drain(port)?;
        match port.flush() {
            Err(e) if !is_idle(&e) => return Err(e),
            _ => {}
        }
        Ok(self.pending.len())
    }
}
