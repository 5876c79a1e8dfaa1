//! Collaborator interfaces the telemetry loop is written against, and the
//! Linux drivers that implement them.

use std::path::Path;

use crate::error::Result;
use crate::state::{BaroSample, Command, GpsDatum, Vector3};

pub mod blackbox;
pub mod gps;
pub mod hmc5883;
pub mod icm42688;
pub mod radio;
pub mod serial;
pub mod sound;
pub mod spl06;

pub trait Accelerometer {
    async fn init(&mut self) -> Result<()>;
    /// m/s²
    async fn read(&mut self) -> Result<Vector3>;
}

pub trait Barometer {
    async fn init(&mut self) -> Result<()>;
    async fn read(&mut self) -> Result<BaroSample>;
}

pub trait Magnetometer {
    async fn init(&mut self) -> Result<()>;
    /// Gauss
    async fn read(&mut self) -> Result<Vector3>;
}

/// Polling and retrieval are split: a fix may land well after the poll that
/// fed the parser.
pub trait Gps {
    async fn init(&mut self) -> Result<()>;
    async fn poll(&mut self) -> Result<()>;
    fn get_datum(&self) -> GpsDatum;
}

pub trait SoundCapture {
    async fn init(&mut self, destination: &Path) -> Result<()>;
    async fn sample(&mut self) -> Result<()>;
    async fn deinit(&mut self) -> Result<()>;
}

pub trait Radio {
    async fn init(&mut self) -> Result<()>;
    /// Never waits for traffic. At most one command per call.
    fn read(&mut self) -> Result<Option<Command>>;
    /// Fire-and-forget.
    async fn send(&mut self, payload: &str) -> Result<()>;
    async fn deinit(&mut self) -> Result<()>;
}

pub trait Recorder {
    async fn init(&mut self, destination: &Path) -> Result<()>;
    async fn write(&mut self, payload: &str) -> Result<()>;
    async fn deinit(&mut self) -> Result<()>;
}
