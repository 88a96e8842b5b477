use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use wasm_bindgen::JsValue;
use web_sys::console;

/// `log` backend that forwards records to the browser console.
pub struct ConsoleLogger {
    level: LevelFilter,
}

static LOGGER: ConsoleLogger = ConsoleLogger {
    level: LevelFilter::Debug,
};

/// Install the console logger. Fails if another logger is already set.
pub fn install() -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(LOGGER.level);
    Ok(())
}

fn format_record(record: &Record) -> String {
    format!("[{}] {}: {}", record.level(), record.target(), record.args())
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format_record(record));
        match record.level() {
            Level::Error => console::error_1(&line),
            Level::Warn => console::warn_1(&line),
            Level::Info => console::info_1(&line),
            Level::Debug | Level::Trace => console::debug_1(&line),
        }
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_includes_level_and_target() {
        let line = format_record(
            &Record::builder()
                .args(format_args!("round {} done", 3))
                .level(Level::Debug)
                .target("team_elo_sim::simulation")
                .build(),
        );
        assert_eq!(line, "[DEBUG] team_elo_sim::simulation: round 3 done");
    }

    #[test]
    fn test_trace_is_filtered() {
        let trace = Metadata::builder().level(Level::Trace).build();
        let info = Metadata::builder().level(Level::Info).build();
        assert!(!LOGGER.enabled(&trace));
        assert!(LOGGER.enabled(&info));
    }
}
