//! Logging initialization
//!
//! Console output with KST timestamps (collection dates are Korea-local),
//! optional daily-rolled file output, and per-module level filters from the
//! configuration.

use anyhow::Result;
use chrono::{FixedOffset, Utc};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking file writer alive for the process lifetime.
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// KST (UTC+9) timestamp formatter.
struct KstTimeFormatter;

impl FormatTime for KstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let kst_offset = FixedOffset::east_opt(9 * 3600).expect("valid offset");
        let kst_time = Utc::now().with_timezone(&kst_offset);
        write!(w, "{}", kst_time.format("%Y-%m-%d %H:%M:%S%.3f %Z"))
    }
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    // RUST_LOG wins over the config file when set.
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let mut directives = vec![config.level.clone()];
    for (module, level) in &config.module_filters {
        directives.push(format!("{module}={level}"));
    }
    EnvFilter::new(directives.join(","))
}

/// Initialize the tracing subscriber from configuration. Call once at
/// process start.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);

    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_timer(KstTimeFormatter)
            .with_target(true)
    });

    let file_layer = if config.file_output {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = rolling::daily(&config.log_dir, "land-collector.log");
        let (writer, guard) = non_blocking(appender);
        LOG_GUARDS.lock().expect("log guards poisoned").push(guard);
        Some(
            fmt::layer()
                .with_timer(KstTimeFormatter)
                .with_ansi(false)
                .with_writer(writer),
        )
    } else {
        None
    };

    Registry::default()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(())
}
