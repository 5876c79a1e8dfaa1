use std::io::{Read, Write};

use embassy_futures::select::{select, Either};
use log::{debug, error, info, warn};

use crate::comm::CommStore;
use crate::config::{Cadence, PayloadConfig};
use crate::drivers::{
    Accelerometer, Barometer, Gps, Magnetometer, Radio, Recorder, SoundCapture,
};
use crate::error::Result;
use crate::state::{PayloadSensors, Record};
use crate::timing::{Clock, Shutdown};

/// Everything the loop owns for the duration of a flight. Built and
/// initialised by the caller; released by [`run`] on every exit path.
pub struct Payload<A, B, M, G, S, L, R, K> {
    pub accel: A,
    pub baro: B,
    pub mag: M,
    pub gps: G,
    pub sound: S,
    pub comm: CommStore<L>,
    pub radio: R,
    pub blackbox: K,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Interrupted,
}

macro_rules! stop_if_interrupted {
    ($shutdown:expr) => {
        if $shutdown.signaled() {
            return Ok(Flow::Interrupted);
        }
    };
}

impl<A, B, M, G, S, L, R, K> Payload<A, B, M, G, S, L, R, K>
where
    A: Accelerometer,
    B: Barometer,
    M: Magnetometer,
    G: Gps,
    S: SoundCapture,
    L: Read + Write,
    R: Radio,
    K: Recorder,
{
    /// One pass: uplink, main-board telemetry, sensors, record, downlink.
    async fn iterate<C: Clock>(&mut self, clock: &C, shutdown: &Shutdown) -> Result<Flow> {
        if let Some(cmd) = self.radio.read()? {
            self.comm.set_state(cmd)?;
        }
        stop_if_interrupted!(shutdown);

        self.comm.poll()?;
        stop_if_interrupted!(shutdown);

        let acc = self.accel.read().await?;
        stop_if_interrupted!(shutdown);
        let bar = self.baro.read().await?;
        stop_if_interrupted!(shutdown);
        let mag = self.mag.read().await?;
        stop_if_interrupted!(shutdown);

        self.gps.poll().await?;
        let gps = self.gps.get_datum();
        stop_if_interrupted!(shutdown);

        self.sound.sample().await?;
        stop_if_interrupted!(shutdown);

        let record = Record::compose(
            clock.get_millis(),
            PayloadSensors { acc, bar, gps, mag },
            self.comm.get_state().clone(),
            self.comm.get_telemetry(),
        );
        let line = record.to_line()?;

        // Recorder first: a record that reached the radio is always on disk too.
        self.blackbox.write(&line).await?;
        self.radio.send(&line).await?;
        debug!("loop: record t={} state={}", record.time, record.main.state.as_str());

        Ok(Flow::Continue)
    }

    /// Stops sound, then the recorder, then the radio. Each step runs even if
    /// an earlier one failed.
    pub async fn release(&mut self) {
        if let Err(e) = self.sound.deinit().await {
            warn!("shutdown: sound deinit failed: {e}");
        }
        if let Err(e) = self.blackbox.deinit().await {
            warn!("shutdown: recorder deinit failed: {e}");
        }
        if let Err(e) = self.radio.deinit().await {
            warn!("shutdown: radio deinit failed: {e}");
        }
    }
}

/// Runs iterations at the configured cadence until `shutdown` is raised or a
/// runtime fault occurs. Returns the number of records produced.
pub async fn telemetry_loop<C, A, B, M, G, S, L, R, K>(
    config: &PayloadConfig,
    clock: &mut C,
    payload: &mut Payload<A, B, M, G, S, L, R, K>,
    shutdown: &Shutdown,
) -> Result<u64>
where
    C: Clock,
    A: Accelerometer,
    B: Barometer,
    M: Magnetometer,
    G: Gps,
    S: SoundCapture,
    L: Read + Write,
    R: Radio,
    K: Recorder,
{
    let period = config.period_ms();
    let mut records: u64 = 0;
    info!(
        "loop: running at {} Hz ({} ms, {:?})",
        config.freq_hz, period, config.cadence
    );

    loop {
        if shutdown.signaled() {
            break;
        }

        let started = clock.get_millis();
        match payload.iterate(clock, shutdown).await {
            Ok(Flow::Continue) => records += 1,
            Ok(Flow::Interrupted) => break,
            Err(e) => {
                error!("loop: fault after {records} records: {e}");
                return Err(e);
            }
        }

        let sleep = match config.cadence {
            Cadence::FixedDelay => period,
            Cadence::Compensated => {
                period.saturating_sub(clock.get_millis().saturating_sub(started))
            }
        };

        if let Either::Second(()) = select(clock.delay(sleep), shutdown.wait()).await {
            break;
        }
    }

    info!("loop: interrupted after {records} records");
    Ok(records)
}

/// Loop plus guaranteed release. The loop's outcome is returned only once the
/// sound, recorder and radio have been shut down.
pub async fn run<C, A, B, M, G, S, L, R, K>(
    config: &PayloadConfig,
    clock: &mut C,
    payload: &mut Payload<A, B, M, G, S, L, R, K>,
    shutdown: &Shutdown,
) -> Result<u64>
where
    C: Clock,
    A: Accelerometer,
    B: Barometer,
    M: Magnetometer,
    G: Gps,
    S: SoundCapture,
    L: Read + Write,
    R: Radio,
    K: Recorder,
{
    let outcome = telemetry_loop(config, clock, payload, shutdown).await;
    payload.release().await;
    outcome
}
