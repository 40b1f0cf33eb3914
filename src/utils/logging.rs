use log::{LevelFilter, SetLoggerError, Level};
use env_logger::{Builder, Target};
use std::env;
use std::io::Write;

pub fn parse_level(value: &str) -> LevelFilter {
    match value.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// Install the global logger. Lines go to stderr so command output on
/// stdout stays clean. Returns an error if a logger is already set.
pub fn init_logging() -> Result<(), SetLoggerError> {
    let level = env::var("RUST_LOG")
        .map(|value| parse_level(&value))
        .unwrap_or(LevelFilter::Info);

    let mut builder = Builder::new();
    builder.format(|buf, record| {
        let timestamp = buf.timestamp();
        match record.level() {
            Level::Info | Level::Debug | Level::Trace => writeln!(
                buf,
                "{} [{}] [{}]: {}",
                timestamp,
                record.level(),
                record.target(),
                record.args()
            ),
            level => writeln!(
                buf,
                "{} [{}] [{}:{}] {}: {}",
                timestamp,
                level,
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.target(),
                record.args()
            ),
        }
    });
    builder.filter_level(level);

    // Transport crates are chatty at debug level
    if env::var("RUST_ENV").map_or(false, |value| value == "production") {
        for module in ["reqwest", "hyper", "rustls"] {
            builder.filter_module(module, LevelFilter::Warn);
        }
    }

    builder.target(Target::Stderr).try_init()
}

pub fn log_error_with_context(error: &(dyn std::error::Error + 'static), context: &str) {
    log::error!("[{}] {}", context, error);

    // Log chain of causes for better debugging
    let mut source = error.source();
    while let Some(err) = source {
        log::error!("  Caused by: {}", err);
        source = err.source();
    }
}

pub fn log_snapshot_applied(events_count: usize, dropped_duplicates: usize) {
    if dropped_duplicates > 0 {
        log::warn!("[Sync] Snapshot carried {} duplicate ids; kept first occurrences",
                   dropped_duplicates);
    }
    log::info!("[Sync] Applied snapshot with {} events", events_count);
}

pub fn log_store_operation(operation: &str, collection: &str, duration_ms: u64) {
    log::debug!("[Store] {} on collection {} took {}ms", operation, collection, duration_ms);
}

pub fn log_calendar_export(event_id: &str, calendar_id: &str) {
    log::info!("[Calendar] Exported event '{}' to calendar '{}'", event_id, calendar_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(parse_level("error"), LevelFilter::Error);
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("verbose"), LevelFilter::Info);
    }
}
