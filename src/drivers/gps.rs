use core::str::FromStr;
use std::io::Read;

use log::{debug, info};

use super::serial::read_available;
use super::Gps;
use crate::error::Result;
use crate::state::GpsDatum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NmeaFrame {
    #[default]
    None,
    Gga,
    Rmc,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GpsData {
    pub lat: f64,
    pub lon: f64,
    /// Metres MSL
    pub alt: f32,
    /// Knots
    pub speed: f32,
    pub course: f32,
    pub sats: u8,
    pub fix_quality: u8,
    pub fix: bool,

    pub sentences_rx: u16,
    pub checksum_errors: u16,
    pub frame_errors: u16,
    pub last_frame: NmeaFrame,
    /// Bumped whenever a sentence carries a valid position.
    pub fixes: u32,
}

pub struct NmeaParser {
    buffer: heapless::String<128>,
    pub data: GpsData,
}

impl Default for NmeaParser {
    fn default() -> Self {
        Self::new()
    }
}

impl NmeaParser {
    pub fn new() -> Self {
        Self {
            buffer: heapless::String::new(),
            data: GpsData::default(),
        }
    }

    pub fn push_data(&mut self, data: &[u8]) {
        for &b in data {
            if b == b'$' {
                self.buffer.clear();
            }

            if self.buffer.push(b as char).is_err() {
                self.data.frame_errors = self.data.frame_errors.wrapping_add(1);
                self.buffer.clear();
                continue;
            }

            if b == b'\n' {
                self.parse_sentence();
                self.buffer.clear();
            }
        }
    }

    fn parse_sentence(&mut self) {
        let sentence: heapless::String<128> = self.buffer.clone();
        let s = sentence.as_str().trim();

        if s.len() < 6 || !s.starts_with('$') {
            return;
        }

        if !verify_checksum(s) {
            self.data.checksum_errors = self.data.checksum_errors.wrapping_add(1);
            return;
        }

        // Talker id is ignored: $GPGGA, $GNGGA, ... all classify the same.
        let frame = match s.get(3..6) {
            Some("GGA") => NmeaFrame::Gga,
            Some("RMC") => NmeaFrame::Rmc,
            _ => NmeaFrame::None,
        };

        self.data.sentences_rx = self.data.sentences_rx.wrapping_add(1);
        self.data.last_frame = frame;

        // Drop the checksum so the last field parses cleanly.
        let body = s.split('*').next().unwrap_or(s);
        match frame {
            NmeaFrame::Gga => self.parse_gga(body),
            NmeaFrame::Rmc => self.parse_rmc(body),
            NmeaFrame::None => {}
        }
    }

    // $xxGGA,time,lat,NS,lon,EW,qual,sats,hdop,alt,M,...
    fn parse_gga(&mut self, s: &str) {
        let mut parts = s.split(',').skip(2);
        let lat_raw = parts.next().unwrap_or("");
        let ns = parts.next().unwrap_or("");
        let lon_raw = parts.next().unwrap_or("");
        let ew = parts.next().unwrap_or("");
        let qual = parts.next().unwrap_or("");
        let sats = parts.next().unwrap_or("");
        let _hdop = parts.next();
        let alt = parts.next().unwrap_or("");

        self.data.fix_quality = u8::from_str(qual).unwrap_or(0);
        self.data.fix = self.data.fix_quality > 0;
        if let Ok(n) = u8::from_str(sats) {
            self.data.sats = n;
        }
        if let Ok(a) = f32::from_str(alt) {
            self.data.alt = a;
        }

        if self.data.fix {
            self.set_position(lat_raw, ns, lon_raw, ew);
        }
    }

    // $xxRMC,time,status,lat,NS,lon,EW,speed,course,date,...
    fn parse_rmc(&mut self, s: &str) {
        let mut parts = s.split(',').skip(2);
        let status = parts.next().unwrap_or("");
        let lat_raw = parts.next().unwrap_or("");
        let ns = parts.next().unwrap_or("");
        let lon_raw = parts.next().unwrap_or("");
        let ew = parts.next().unwrap_or("");
        let speed = parts.next().unwrap_or("");
        let course = parts.next().unwrap_or("");

        if let Ok(v) = f32::from_str(speed) {
            self.data.speed = v;
        }
        if let Ok(v) = f32::from_str(course) {
            self.data.course = v;
        }

        // V = void: no position to take
        if status == "A" {
            self.set_position(lat_raw, ns, lon_raw, ew);
        }
    }

    fn set_position(&mut self, lat_raw: &str, ns: &str, lon_raw: &str, ew: &str) {
        let (Some(lat), Some(lon)) = (
            nmea_to_degrees(lat_raw, ns == "S"),
            nmea_to_degrees(lon_raw, ew == "W"),
        ) else {
            return;
        };
        self.data.lat = lat;
        self.data.lon = lon;
        self.data.fixes = self.data.fixes.wrapping_add(1);
    }
}

/// `ddmm.mmmm` / `dddmm.mmmm` to signed decimal degrees.
fn nmea_to_degrees(raw: &str, negative: bool) -> Option<f64> {
    let v = f64::from_str(raw).ok()?;
    let deg = (v / 100.0).floor();
    let min = v - deg * 100.0;
    let out = deg + min / 60.0;
    Some(if negative { -out } else { out })
}

fn verify_checksum(s: &str) -> bool {
    if let Some((content, check_str)) = s.split_once('*') {
        let content = content.strip_prefix('$').unwrap_or(content);
        let calc = content.bytes().fold(0u8, |acc, b| acc ^ b);
        let hex = check_str.get(..2).unwrap_or(check_str);
        if let Ok(val) = u8::from_str_radix(hex.trim(), 16) {
            return calc == val;
        }
    }
    false
}

/// NMEA receiver on a non-blocking port.
pub struct GpsReceiver<P> {
    port: P,
    parser: NmeaParser,
    datum: GpsDatum,
    seen_fixes: u32,
}

impl<P: Read> GpsReceiver<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            parser: NmeaParser::new(),
            datum: GpsDatum::default(),
            seen_fixes: 0,
        }
    }

    pub fn data(&self) -> &GpsData {
        &self.parser.data
    }
}

impl<P: Read> Gps for GpsReceiver<P> {
    async fn init(&mut self) -> Result<()> {
        // Anything queued before start-up is stale.
        let mut scratch = [0u8; 512];
        while read_available(&mut self.port, &mut scratch)? > 0 {}
        info!("gps: receiver listening");
        Ok(())
    }

    async fn poll(&mut self) -> Result<()> {
        let mut buf = [0u8; 512];
        loop {
            let n = read_available(&mut self.port, &mut buf)?;
            if n == 0 {
                break;
            }
            self.parser.push_data(&buf[..n]);
        }

        let d = &self.parser.data;
        if d.fixes != self.seen_fixes {
            if self.seen_fixes == 0 {
                info!("gps: first fix, {} sats", d.sats);
            }
            self.seen_fixes = d.fixes;
            self.datum = GpsDatum {
                lat: d.lat,
                lon: d.lon,
            };
            debug!("gps: fix {:.6} {:.6}", d.lat, d.lon);
        }
        Ok(())
    }

    fn get_datum(&self) -> GpsDatum {
        self.datum
    }
}
