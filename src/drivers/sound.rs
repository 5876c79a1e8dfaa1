use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use log::{debug, info};

use super::serial::read_available;
use super::SoundCapture;
use crate::error::{Error, Result};

const DEVICE: &str = "sound";

/// Upper bound on what one `sample` call moves, so a backlog never stretches
/// an iteration.
pub const BLOCK_BYTES: usize = 4096;

/// Capture FIFO or device node opened `O_NONBLOCK`, so an idle microphone
/// never stalls the loop.
pub struct CaptureSource {
    file: File,
}

impl CaptureSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK | libc::O_NOCTTY)
            .open(path)?;
        Ok(Self { file })
    }
}

impl Read for CaptureSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// Raw PCM capture: drains a non-blocking source (FIFO, ALSA pipe) into a
/// file, one bounded block per iteration.
pub struct PcmCapture<S> {
    source: S,
    sink: Option<BufWriter<File>>,
    pub bytes_captured: u64,
}

impl<S: Read> PcmCapture<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            sink: None,
            bytes_captured: 0,
        }
    }
}

impl<S: Read> SoundCapture for PcmCapture<S> {
    async fn init(&mut self, destination: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)?;
        self.sink = Some(BufWriter::new(file));
        self.bytes_captured = 0;
        info!("{DEVICE}: capturing to {}", destination.display());
        Ok(())
    }

    async fn sample(&mut self) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(Error::NotInitialised(DEVICE))?;

        let mut block = [0u8; BLOCK_BYTES];
        let n = read_available(&mut self.source, &mut block)?;
        if n > 0 {
            sink.write_all(&block[..n])?;
            self.bytes_captured += n as u64;
            debug!("{DEVICE}: +{n} bytes");
        }
        Ok(())
    }

    async fn deinit(&mut self) -> Result<()> {
        let Some(mut sink) = self.sink.take() else {
            return Ok(());
        };
        sink.flush()?;
        sink.get_ref().sync_all()?;
        info!("{DEVICE}: closed after {} bytes", self.bytes_captured);
        Ok(())
    }
}
