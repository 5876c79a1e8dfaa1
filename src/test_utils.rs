//! Bus and port doubles for driver and loop tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::rc::Rc;

use embedded_hal::i2c::{self, NoAcknowledgeSource};
use embedded_hal::spi;
use embedded_hal_async::delay::DelayNs;

// ── Delay ─────────────────────────────────────────────────────────────────────

pub(crate) struct NoDelay;

impl DelayNs for NoDelay {
    async fn delay_ns(&mut self, _ns: u32) {}
}

// ── Byte port ─────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PortInner {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    /// Bytes the transmit side still accepts; `None` = unlimited.
    tx_budget: Option<usize>,
    fail_reads: bool,
}

/// Non-blocking byte port. Clones share the same buffers so a test can keep a
/// handle after moving the port into a driver.
#[derive(Clone, Default)]
pub(crate) struct MockPort {
    inner: Rc<RefCell<PortInner>>,
}

impl MockPort {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn feed(&self, bytes: &[u8]) {
        self.inner.borrow_mut().rx.extend(bytes.iter().copied());
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.inner.borrow().tx.clone()
    }

    pub(crate) fn written_lines(&self) -> Vec<String> {
        String::from_utf8(self.written())
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    pub(crate) fn set_tx_would_block(&self, on: bool) {
        self.inner.borrow_mut().tx_budget = on.then_some(0);
    }

    /// Accepts `bytes` more, then reports `WouldBlock` like a full tx queue.
    pub(crate) fn set_tx_budget(&self, bytes: usize) {
        self.inner.borrow_mut().tx_budget = Some(bytes);
    }

    pub(crate) fn set_fail_reads(&self, on: bool) {
        self.inner.borrow_mut().fail_reads = on;
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        if inner.fail_reads {
            return Err(io::Error::new(ErrorKind::BrokenPipe, "port gone"));
        }
        if inner.rx.is_empty() {
            return Err(ErrorKind::WouldBlock.into());
        }
        let mut n = 0;
        while n < buf.len() {
            match inner.rx.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let n = match inner.tx_budget {
            Some(0) if !buf.is_empty() => return Err(ErrorKind::WouldBlock.into()),
            Some(budget) => {
                let n = budget.min(buf.len());
                inner.tx_budget = Some(budget - n);
                n
            }
            None => buf.len(),
        };
        inner.tx.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ── I2C register file ─────────────────────────────────────────────────────────

/// Single-device I2C target with an auto-incrementing register pointer.
pub(crate) struct MockI2c {
    address: u8,
    pub(crate) regs: [u8; 256],
    ptr: u8,
    pub(crate) writes: Vec<(u8, u8)>,
}

impl MockI2c {
    pub(crate) fn new(address: u8) -> Self {
        Self {
            address,
            regs: [0; 256],
            ptr: 0,
            writes: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, reg: u8, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.regs[usize::from(reg.wrapping_add(i as u8))] = b;
        }
    }
}

impl i2c::ErrorType for MockI2c {
    type Error = i2c::ErrorKind;
}

impl i2c::I2c for MockI2c {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        if address != self.address {
            return Err(i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address));
        }
        for op in operations {
            match op {
                i2c::Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        self.ptr = reg;
                        for &v in data {
                            self.regs[usize::from(self.ptr)] = v;
                            self.writes.push((self.ptr, v));
                            self.ptr = self.ptr.wrapping_add(1);
                        }
                    }
                }
                i2c::Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.regs[usize::from(self.ptr)];
                        self.ptr = self.ptr.wrapping_add(1);
                    }
                }
            }
        }
        Ok(())
    }
}

// ── SPI register file ─────────────────────────────────────────────────────────

/// SPI target using the common `0x80 = read` register convention.
pub(crate) struct MockSpi {
    pub(crate) regs: [u8; 128],
    pub(crate) writes: Vec<(u8, u8)>,
}

impl MockSpi {
    pub(crate) fn new() -> Self {
        Self {
            regs: [0; 128],
            writes: Vec::new(),
        }
    }

    fn access(&mut self, frame: &mut [u8]) {
        let Some((&mut cmd, data)) = frame.split_first_mut() else {
            return;
        };
        let mut reg = cmd & 0x7F;
        if cmd & 0x80 != 0 {
            for b in data.iter_mut() {
                *b = self.regs[usize::from(reg)];
                reg = (reg + 1) & 0x7F;
            }
        } else {
            for &v in data.iter() {
                self.regs[usize::from(reg)] = v;
                self.writes.push((reg, v));
                reg = (reg + 1) & 0x7F;
            }
        }
    }
}

impl spi::ErrorType for MockSpi {
    type Error = spi::ErrorKind;
}

impl spi::SpiDevice for MockSpi {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        for op in operations {
            match op {
                spi::Operation::Write(bytes) => {
                    let mut frame = bytes.to_vec();
                    self.access(&mut frame);
                }
                spi::Operation::TransferInPlace(buf) => self.access(buf),
                spi::Operation::Transfer(read, write) => {
                    let mut frame = write.to_vec();
                    self.access(&mut frame);
                    let n = read.len().min(frame.len());
                    read[..n].copy_from_slice(&frame[..n]);
                }
                spi::Operation::Read(_) | spi::Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}
