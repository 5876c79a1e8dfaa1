use core::fmt::Debug;

use thiserror::Error;

/// Every fallible payload operation ends up here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{device}: bus fault ({detail})")]
    Bus { device: &'static str, detail: String },

    #[error("{device}: unexpected chip id {found:#04x}")]
    ChipId { device: &'static str, found: u32 },

    #[error("{0} used before init")]
    NotInitialised(&'static str),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Wraps a HAL bus error, which only promises `Debug`.
    pub fn bus<E: Debug>(device: &'static str, err: E) -> Self {
        Error::Bus {
            device,
            detail: format!("{err:?}"),
        }
    }
}

pub type Result<T> = core::result::Result<T, Error>;
