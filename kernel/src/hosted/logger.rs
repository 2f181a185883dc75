//! Stderr logger for hosted runs
//!
//! The level comes from `SCHED_LOG` (`off`, `error`, `warn`, `info`, `debug`,
//! `trace`); unset or unrecognized means `warn`.

use std::env;
use std::eprintln;
use std::string::String;

use log::{LevelFilter, Metadata, Record};

/// Environment variable holding the maximum level
pub const LEVEL_VAR: &str = "SCHED_LOG";

static LOGGER: StderrLogger = StderrLogger;
static INIT: spin::Once<()> = spin::Once::new();

/// Install the logger; later calls, or another logger already installed,
/// leave the existing setup alone
pub fn init() {
    INIT.call_once(|| {
        let level = env::var(LEVEL_VAR)
            .ok()
            .map_or(LevelFilter::Warn, |value| parse_level(&value));
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
    });
}

fn parse_level(value: &str) -> LevelFilter {
    value.trim().parse().unwrap_or(LevelFilter::Warn)
}

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let thread = std::thread::current();
        let name = thread.name().map_or_else(String::new, String::from);
        eprintln!(
            "[{:5}] {} {}: {}",
            record.level(),
            name,
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}
