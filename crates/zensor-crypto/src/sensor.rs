//! Sensor log handling: PUF seed extraction and signal derivation.
//!
//! A device prints its SRAM PUF as `PUF: <hex>` followed by DHT11 samples:
//!
//! ```text
//! PUF: D3A09F...
//! =================================
//! Timestamp: 1043 ms
//! RAW DHT11 Sensor Data: 00110010 ...
//! Temperature: 24 Celsius
//! Humidity: 41%
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zensor_types::PUF_SEED_LEN;

/// First substring matching `D[0-9A-F]{62}`.
pub fn extract_puf_seed(log: &str) -> Option<&str> {
    let bytes = log.as_bytes();
    if bytes.len() < PUF_SEED_LEN {
        return None;
    }

    (0..=bytes.len() - PUF_SEED_LEN)
        .find(|&start| {
            bytes[start] == b'D'
                && bytes[start + 1..start + PUF_SEED_LEN]
                    .iter()
                    .all(|b| matches!(b, b'0'..=b'9' | b'A'..=b'F'))
        })
        .map(|start| &log[start..start + PUF_SEED_LEN])
}

/// Public signal for a blob of sensor data: `0x` + hex(SHA-256(data)).
pub fn sensor_signal(data: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha256::digest(data)))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub timestamp_ms: Option<u64>,
    pub temperature_c: Option<i32>,
    pub humidity_pct: Option<u32>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SensorLog {
    pub puf: Option<String>,
    pub readings: Vec<SensorReading>,
}

impl SensorLog {
    /// Parses the serial logger output. Unrecognized lines are skipped;
    /// a `====` separator starts a new reading.
    pub fn parse(text: &str) -> Self {
        let mut log = SensorLog {
            puf: extract_puf_seed(text).map(str::to_string),
            readings: Vec::new(),
        };
        let mut current: Option<SensorReading> = None;

        for line in text.lines().map(str::trim) {
            if line.starts_with("====") {
                if let Some(reading) = current.take() {
                    log.readings.push(reading);
                }
                current = Some(SensorReading::default());
                continue;
            }

            let Some(reading) = current.as_mut() else {
                continue;
            };

            if let Some(rest) = line.strip_prefix("Timestamp:") {
                reading.timestamp_ms = leading_number(rest).and_then(|n| n.parse().ok());
            } else if let Some(rest) = line.strip_prefix("Temperature:") {
                reading.temperature_c = leading_number(rest).and_then(|n| n.parse().ok());
            } else if let Some(rest) = line.strip_prefix("Humidity:") {
                reading.humidity_pct = leading_number(rest).and_then(|n| n.parse().ok());
            }
        }

        if let Some(reading) = current {
            log.readings.push(reading);
        }
        log
    }
}

fn leading_number(s: &str) -> Option<&str> {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        Some(&s[..end])
    }
}
