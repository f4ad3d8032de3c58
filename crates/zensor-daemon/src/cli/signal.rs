use super::commands::OutputFormat;
use super::utils::{print_json, read_file};
use std::path::Path;
use zensor_crypto::{sensor_signal, SensorLog};
use zensor_types::ZensorResult;

pub fn show_signal(file: &Path, readings: bool, format: &OutputFormat) -> ZensorResult<()> {
    let data = read_file(file)?;
    let signal = sensor_signal(&data);
    let log = readings.then(|| SensorLog::parse(&String::from_utf8_lossy(&data)));

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "signal": signal,
            "log": log,
        })),
        OutputFormat::Text => {
            println!("{}", signal);
            if let Some(log) = log {
                if let Some(puf) = &log.puf {
                    println!("PUF: {}...", &puf[..12.min(puf.len())]);
                }
                for reading in &log.readings {
                    println!(
                        "  t={:>8} ms  temp={:>4} C  humidity={:>3} %",
                        display(reading.timestamp_ms),
                        display(reading.temperature_c),
                        display(reading.humidity_pct)
                    );
                }
            }
            Ok(())
        }
    }
}

fn display<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}
