use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use embassy_executor::Spawner;
use embassy_time::Delay;
use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{I2cdev, SpidevDevice};
use serialport::TTYPort;
use log::{error, info, LevelFilter};

use payload_telemetry::comm::CommStore;
use payload_telemetry::config::{
    Cadence, PayloadConfig, DEFAULT_BLACKBOX, DEFAULT_FREQ_HZ, DEFAULT_SOUND,
};
use payload_telemetry::drivers::blackbox::Blackbox;
use payload_telemetry::drivers::gps::GpsReceiver;
use payload_telemetry::drivers::hmc5883::Hmc5883;
use payload_telemetry::drivers::icm42688::Icm42688;
use payload_telemetry::drivers::radio::SerialRadio;
use payload_telemetry::drivers::serial::{open_port, DEFAULT_BAUD};
use payload_telemetry::drivers::sound::{CaptureSource, PcmCapture};
use payload_telemetry::drivers::spl06::Spl06;
use payload_telemetry::drivers::{
    Accelerometer, Barometer, Gps, Magnetometer, Radio, Recorder, SoundCapture,
};
use payload_telemetry::tasks::{run, Payload};
use payload_telemetry::timing::{Shutdown, SystemClock};

// ── Shutdown token ────────────────────────────────────────────────────────────
//  Raised from the SIGINT/SIGTERM handler thread, consumed by the loop.
static SHUTDOWN: Shutdown = Shutdown::new();

#[derive(Parser)]
#[command(name = "Payload Telemetry")]
#[command(bin_name = "payload-telemetry")]
#[command(about = "Fixed-rate payload telemetry: sensors → blackbox → radio")]
struct Cli {
    /// Loop frequency in Hz
    #[arg(long, default_value_t = DEFAULT_FREQ_HZ)]
    freq: u32,

    /// Append-only record file
    #[arg(long, default_value = DEFAULT_BLACKBOX)]
    blackbox: PathBuf,

    /// Raw PCM capture file
    #[arg(long, default_value = DEFAULT_SOUND)]
    sound: PathBuf,

    /// Sleep only what remains of each period instead of a full period
    #[arg(long)]
    compensate_drift: bool,

    #[arg(long, default_value = "/dev/ttyS1")]
    radio: PathBuf,

    #[arg(long, default_value_t = DEFAULT_BAUD)]
    radio_baud: u32,

    /// Serial link to the main flight computer
    #[arg(long, default_value = "/dev/ttyS2")]
    main_link: PathBuf,

    #[arg(long, default_value_t = DEFAULT_BAUD)]
    main_baud: u32,

    #[arg(long, default_value = "/dev/ttyS3")]
    gps: PathBuf,

    #[arg(long, default_value_t = DEFAULT_BAUD)]
    gps_baud: u32,

    /// Bus shared by the barometer and magnetometer
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c: PathBuf,

    /// Accelerometer chip select
    #[arg(long, default_value = "/dev/spidev0.0")]
    spi: PathBuf,

    /// Capture source (FIFO or device node)
    #[arg(long, default_value = "/dev/payload-mic")]
    sound_source: PathBuf,
}

impl Cli {
    fn config(&self) -> PayloadConfig {
        PayloadConfig {
            freq_hz: self.freq,
            blackbox: self.blackbox.clone(),
            sound: self.sound.clone(),
            cadence: if self.compensate_drift {
                Cadence::Compensated
            } else {
                Cadence::FixedDelay
            },
        }
    }
}

fn open_spi(path: &Path) -> anyhow::Result<SpidevDevice> {
    let mut spi = SpidevDevice::open(path).map_err(|e| anyhow!("{}: {e:?}", path.display()))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(8_000_000)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .with_context(|| format!("configuring {}", path.display()))?;
    Ok(spi)
}

fn open_i2c(path: &Path) -> anyhow::Result<I2cdev> {
    I2cdev::new(path).map_err(|e| anyhow!("{}: {e:?}", path.display()))
}

fn open_serial(path: &Path, baud: u32) -> anyhow::Result<TTYPort> {
    open_port(&path.to_string_lossy(), baud)
        .with_context(|| format!("opening {} at {baud} baud", path.display()))
}

async fn fly(cli: Cli) -> anyhow::Result<u64> {
    let config = cli.config();
    config.validate()?;

    // 1. Radio
    let mut radio = SerialRadio::new(open_serial(&cli.radio, cli.radio_baud)?);
    radio.init().await.context("radio init")?;

    // 2. Accelerometer (SPI)
    let mut accel = Icm42688::new(open_spi(&cli.spi)?, Delay);
    accel.init().await.context("accelerometer init")?;

    // 3. Barometer + 4. magnetometer, same I2C bus
    let mut baro = Spl06::new(open_i2c(&cli.i2c)?, Delay);
    baro.init().await.context("barometer init")?;
    let mut mag = Hmc5883::new(open_i2c(&cli.i2c)?, Delay);
    mag.init().await.context("magnetometer init")?;

    // 5. GPS
    let mut gps = GpsReceiver::new(open_serial(&cli.gps, cli.gps_baud)?);
    gps.init().await.context("gps init")?;

    // 6. Sound
    let source = CaptureSource::open(&cli.sound_source)
        .with_context(|| format!("opening {}", cli.sound_source.display()))?;
    let mut sound = PcmCapture::new(source);
    sound.init(&config.sound).await.context("sound init")?;

    // 7. Blackbox
    let mut blackbox = Blackbox::new();
    blackbox.init(&config.blackbox).await.context("blackbox init")?;

    let comm = CommStore::new(open_serial(&cli.main_link, cli.main_baud)?);

    // 8. Clock epoch last so the first record starts near t=0
    let mut clock = SystemClock::init();

    let mut payload = Payload {
        accel,
        baro,
        mag,
        gps,
        sound,
        comm,
        radio,
        blackbox,
    };
    let records = run(&config, &mut clock, &mut payload, &SHUTDOWN).await?;
    Ok(records)
}

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    if let Err(e) = ctrlc::set_handler(|| SHUTDOWN.signal(())) {
        error!("cannot install signal handler: {e}");
        std::process::exit(1);
    }

    let code = match fly(cli).await {
        Ok(records) => {
            info!("payload: shut down cleanly, {records} records");
            0
        }
        Err(e) => {
            error!("payload: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
