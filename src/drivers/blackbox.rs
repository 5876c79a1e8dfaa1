use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use super::Recorder;
use crate::error::{Error, Result};

const DEVICE: &str = "blackbox";

/// Append-only flight recorder. Every record is flushed to the OS before the
/// write returns; `deinit` syncs it to storage.
#[derive(Default)]
pub struct Blackbox {
    file: Option<File>,
    path: PathBuf,
    pub records: u64,
}

impl Blackbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Recorder for Blackbox {
    async fn init(&mut self, destination: &Path) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(destination)?;
        self.file = Some(file);
        self.path = destination.to_path_buf();
        self.records = 0;
        info!("{DEVICE}: recording to {}", destination.display());
        Ok(())
    }

    async fn write(&mut self, payload: &str) -> Result<()> {
        let file = self.file.as_mut().ok_or(Error::NotInitialised(DEVICE))?;

        let mut line = Vec::with_capacity(payload.len() + 1);
        line.extend_from_slice(payload.as_bytes());
        line.push(b'\n');
        // Single write so a crash never leaves half of one record glued to the next.
        file.write_all(&line)?;
        file.flush()?;

        self.records += 1;
        Ok(())
    }

    async fn deinit(&mut self) -> Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        file.sync_all()?;
        info!(
            "{DEVICE}: closed {} after {} records",
            self.path.display(),
            self.records
        );
        Ok(())
    }
}
