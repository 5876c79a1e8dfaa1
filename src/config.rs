use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_FREQ_HZ: u32 = 10;
pub const DEFAULT_BLACKBOX: &str = "blackbox.json";
pub const DEFAULT_SOUND: &str = "sound.pcm";

/// How the loop spends the rest of each period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Cadence {
    /// Sleep the full period after the work, however long the work took.
    #[default]
    FixedDelay,
    /// Sleep only what is left of the period once the work is done.
    Compensated,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PayloadConfig {
    pub freq_hz: u32,
    pub blackbox: PathBuf,
    pub sound: PathBuf,
    pub cadence: Cadence,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            freq_hz: DEFAULT_FREQ_HZ,
            blackbox: PathBuf::from(DEFAULT_BLACKBOX),
            sound: PathBuf::from(DEFAULT_SOUND),
            cadence: Cadence::FixedDelay,
        }
    }
}

impl PayloadConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.freq_hz) {
            return Err(Error::Config(format!(
                "frequency must be within 1..=1000 Hz, got {}",
                self.freq_hz
            )));
        }
        if self.blackbox.as_os_str().is_empty() {
            return Err(Error::Config("blackbox destination is empty".into()));
        }
        if self.sound.as_os_str().is_empty() {
            return Err(Error::Config("sound destination is empty".into()));
        }
        Ok(())
    }

    /// Δ = 1000 / FREQ, integer milliseconds.
    pub fn period_ms(&self) -> u64 {
        1000 / u64::from(self.freq_hz.max(1))
    }
}
