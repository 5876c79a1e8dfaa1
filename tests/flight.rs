//! End-to-end flight against a real blackbox file and the real NMEA and
//! main-board parsers, with scripted sensors and a virtual clock.

use std::cell::Cell;
use std::collections::VecDeque;
use std::fs;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use embassy_futures::block_on;
use serde_json::Value;

use payload_telemetry::comm::CommStore;
use payload_telemetry::config::PayloadConfig;
use payload_telemetry::drivers::blackbox::Blackbox;
use payload_telemetry::drivers::gps::GpsReceiver;
use payload_telemetry::drivers::{
    Accelerometer, Barometer, Magnetometer, Radio, Recorder, SoundCapture,
};
use payload_telemetry::state::{BaroSample, Command, Vector3};
use payload_telemetry::tasks::{run, Payload};
use payload_telemetry::timing::{Clock, Shutdown};
use payload_telemetry::Result;

struct Clockwork {
    now: u64,
    sleeps: Rc<Cell<u32>>,
    stop_after: u32,
    shutdown: Rc<Shutdown>,
}

impl Clock for Clockwork {
    fn get_millis(&self) -> u64 {
        self.now
    }

    async fn delay(&mut self, ms: u64) {
        self.now += ms;
        self.sleeps.set(self.sleeps.get() + 1);
        if self.sleeps.get() >= self.stop_after {
            self.shutdown.signal(());
            core::future::pending::<()>().await;
        }
    }
}

struct Level;
impl Accelerometer for Level {
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }
    async fn read(&mut self) -> Result<Vector3> {
        Ok(Vector3::new(0.0, 0.0, 9.8))
    }
}

struct Ground;
impl Barometer for Ground {
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }
    async fn read(&mut self) -> Result<BaroSample> {
        Ok(BaroSample { pressure: 101325.0, alt: 0.0 })
    }
}

struct North;
impl Magnetometer for North {
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }
    async fn read(&mut self) -> Result<Vector3> {
        Ok(Vector3::new(0.5, 0.0, 0.0))
    }
}

struct Silence;
impl SoundCapture for Silence {
    async fn init(&mut self, _destination: &Path) -> Result<()> {
        Ok(())
    }
    async fn sample(&mut self) -> Result<()> {
        Ok(())
    }
    async fn deinit(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Hands out one scripted uplink per iteration (`None` = quiet).
struct Ground2Air {
    script: VecDeque<Option<&'static str>>,
    sent: Vec<String>,
    closed: bool,
}

impl Radio for Ground2Air {
    async fn init(&mut self) -> Result<()> {
        Ok(())
    }
    fn read(&mut self) -> Result<Option<Command>> {
        Ok(self
            .script
            .pop_front()
            .flatten()
            .and_then(Command::from_line))
    }
    async fn send(&mut self, payload: &str) -> Result<()> {
        self.sent.push(payload.to_owned());
        Ok(())
    }
    async fn deinit(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Main-board link: canned inbound bytes, captured outbound bytes.
struct MainLink {
    rx: Cursor<Vec<u8>>,
    tx: Vec<u8>,
}

impl Read for MainLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.rx.read(buf)
    }
}

impl Write for MainLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx.write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn scratch(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "payload-flight-{}-{name}.json",
        std::process::id()
    ));
    let _ = fs::remove_file(&path);
    path
}

#[test]
fn three_iterations_end_to_end() {
    let path = scratch("e2e");
    let shutdown = Rc::new(Shutdown::new());

    let nmea = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n".to_vec();
    let report = br#"{"type":"telemetry","time":10,"sensors":{"acc":{"x":1.0,"y":2.0,"z":3.0},"bar":{"p":90000.0,"alt":950.0}}}
"#
    .to_vec();

    let gps = GpsReceiver::new(Cursor::new(nmea));
    let mut blackbox = Blackbox::new();
    block_on(blackbox.init(&path)).unwrap();

    let mut payload = Payload {
        accel: Level,
        baro: Ground,
        mag: North,
        gps,
        sound: Silence,
        comm: CommStore::new(MainLink {
            rx: Cursor::new(report),
            tx: Vec::new(),
        }),
        radio: Ground2Air {
            script: VecDeque::from([None, Some("{\"command\":\"ignite\"}"), None]),
            sent: Vec::new(),
            closed: false,
        },
        blackbox,
    };
    let mut clock = Clockwork {
        now: 0,
        sleeps: Rc::new(Cell::new(0)),
        stop_after: 3,
        shutdown: shutdown.clone(),
    };

    let records = block_on(run(
        &PayloadConfig::default(),
        &mut clock,
        &mut payload,
        &shutdown,
    ))
    .unwrap();
    assert_eq!(records, 3);
    assert!(payload.radio.closed);
    assert_eq!(payload.blackbox.records, 3);

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, payload.radio.sent);

    let records: Vec<Value> = lines.iter().map(|l| serde_json::from_str(l).unwrap()).collect();
    let times: Vec<u64> = records.iter().map(|r| r["time"].as_u64().unwrap()).collect();
    assert_eq!(times, [0, 100, 200]);

    let states: Vec<&str> = records.iter().map(|r| r["main"]["state"].as_str().unwrap()).collect();
    assert_eq!(states, ["none", "ignite", "ignite"]);

    for r in &records {
        let gps = &r["payload"]["sensor"]["gps"];
        assert!((gps["lat"].as_f64().unwrap() - 48.1173).abs() < 1e-4);
        assert_eq!(r["main"]["sensor"]["bar"]["alt"], 950.0);
        assert_eq!(r["main"]["sensor"]["acc"]["z"], 3.0);
    }

    assert_eq!(
        String::from_utf8(payload.comm.link().tx.clone()).unwrap(),
        "{\"command\":\"ignite\"}\n"
    );

    fs::remove_file(&path).unwrap();
}
