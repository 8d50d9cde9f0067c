//! stderr logger for the server binary
//!
//! Level comes from `HIERGEO_LOG` (`error`, `warn`, `info`, `debug`,
//! `trace`, `off`; default `info`). Lines can be mirrored to a log file,
//! which is truncated when the logger is installed.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;

/// Environment variable holding the log level
pub const LOG_ENV: &str = "HIERGEO_LOG";

pub struct ServerLogger {
    level: LevelFilter,
    started: Instant,
    file: Option<Mutex<File>>,
}

impl ServerLogger {
    pub fn new(level: LevelFilter, file: Option<File>) -> Self {
        Self { level, started: Instant::now(), file: file.map(Mutex::new) }
    }

    fn format(&self, record: &Record) -> String {
        format!(
            "[{:>9.3}s {:<5}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            record.args()
        )
    }
}

impl Log for ServerLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        eprintln!("{}", line);
        if let Some(file) = &self.file {
            // a failing log file must not take the server down
            let _ = writeln!(file.lock(), "{}", line);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Parse a level name; unknown names fall back to `info`
pub fn level_from_str(s: &str) -> LevelFilter {
    LevelFilter::from_str(s.trim()).unwrap_or(LevelFilter::Info)
}

/// Install the logger as the global `log` backend
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let level = std::env::var(LOG_ENV).map(|v| level_from_str(&v)).unwrap_or(LevelFilter::Info);
    let file = match log_file {
        Some(path) => Some(OpenOptions::new().create(true).write(true).truncate(true).open(path)?),
        None => None,
    };
    log::set_boxed_logger(Box::new(ServerLogger::new(level, file)))
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {}", e))?;
    log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_str() {
        assert_eq!(level_from_str("debug"), LevelFilter::Debug);
        assert_eq!(level_from_str(" WARN "), LevelFilter::Warn);
        assert_eq!(level_from_str("off"), LevelFilter::Off);
        assert_eq!(level_from_str("loud"), LevelFilter::Info);
    }

    #[test]
    fn test_enabled_respects_level() {
        let logger = ServerLogger::new(LevelFilter::Warn, None);
        let warn = Metadata::builder().level(log::Level::Warn).build();
        let info = Metadata::builder().level(log::Level::Info).build();
        assert!(logger.enabled(&warn));
        assert!(!logger.enabled(&info));
    }
}
