use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use scpi_link::transport::BAUD_RATES;
use scpi_link::{Journal, LinkConfig, MonitorSchedule};

/// Terminal console for the ESP32 IEEE 488.2 / SCPI GPIO controller.
#[derive(Parser, Debug)]
#[command(name = "scpi_console", version, about)]
pub struct Cli {
    /// Serial device to open at start-up (e.g. /dev/ttyUSB0 or COM3).
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate: 9600, 19200, 38400, 57600 or 115200.
    #[arg(short, long, default_value_t = 9600, value_parser = parse_baud)]
    pub baud: u32,

    /// Idle delay of the reader between polls, in milliseconds.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=100))]
    pub poll_ms: u64,

    /// Monitoring interval, in milliseconds.
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(100..=5000))]
    pub monitor_ms: u64,

    /// Keep at most this many communication log entries (unbounded when absent).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub log_capacity: Option<u64>,

    /// File that receives diagnostic logging while the console owns the terminal.
    #[arg(long, default_value = "scpi_console.log")]
    pub log_file: PathBuf,

    /// Log filter in RUST_LOG syntax (e.g. `debug` or `scpi_link=trace`).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print the available serial ports and exit.
    #[arg(long)]
    pub list_ports: bool,
}

fn parse_baud(s: &str) -> Result<u32, String> {
    let baud: u32 = s.parse().map_err(|_| format!("'{}' is not a number", s))?;
    if BAUD_RATES.contains(&baud) {
        Ok(baud)
    } else {
        Err(format!("unsupported baud rate {} (expected one of {:?})", baud, BAUD_RATES))
    }
}

impl Cli {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig {
            poll_interval: Duration::from_millis(self.poll_ms),
            ..LinkConfig::default()
        }
    }

    pub fn monitor_schedule(&self) -> MonitorSchedule {
        MonitorSchedule::new(Duration::from_millis(self.monitor_ms))
    }

    pub fn journal(&self) -> Journal {
        match self.log_capacity {
            Some(capacity) => {
                Journal::with_capacity_limit(usize::try_from(capacity).unwrap_or(usize::MAX))
            }
            None => Journal::new(),
        }
    }
}
