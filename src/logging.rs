//! Compact timestamped logging with per-module levels.
//!
//! Log targets follow the module tree:
//!
//! | Target | What it reports |
//! |---|---|
//! | `treesync::monitor` | path lifecycle, dispatched events, dropped events |
//! | `treesync::monitor::backend` | raw notify errors, polling scans |
//! | `treesync::scanner` | baseline scans and skipped entries |
//! | `treesync::sync` | store integrity errors, remote results, batch sizes |
//! | `treesync::service` | pipeline start and stop |
//!
//! Module keys in `[logging.modules]` may drop the `treesync::` prefix.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! sync = "info"
//! "monitor::backend" = "debug"
//! ```
//!
//! `RUST_LOG` takes precedence over config:
//! ```bash
//! RUST_LOG=debug treesync watch
//! RUST_LOG=treesync::monitor=trace treesync watch
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Initialize logging with configuration.
///
/// Only the first call takes effect.
///
/// Integrity violations and remote failures are logged at `error`; per-event
/// dispatch lines at `info`; coalescing detail at `debug`.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        // RUST_LOG env var takes precedence over config
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Build the `EnvFilter` directive string for a logging config.
///
/// Short module keys are resolved under `treesync::`; keys naming another
/// crate (`notify`, `rusqlite`) are passed through untouched.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    // HashMap order is random; keep the directive string stable
    modules.sort();

    let mut directives = config.default.clone();
    for (module, level) in modules {
        directives.push(',');
        if !module.starts_with("treesync") && is_own_module(module) {
            directives.push_str("treesync::");
        }
        directives.push_str(&format!("{module}={level}"));
    }
    directives
}

fn is_own_module(module: &str) -> bool {
    let top = module.split("::").next().unwrap_or(module);
    matches!(
        top,
        "monitor" | "scanner" | "sync" | "service" | "cli" | "config" | "logging"
    )
}

/// Initialize logging with `LoggingConfig::default()` (`warn`).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Log an event with component context.
///
/// # Examples
/// ```ignore
/// log_event!("monitor", "CREATED", "{}", path.display());
/// log_event!("reconciler", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Debug-only event logging.
///
/// # Examples
/// ```ignore
/// debug_event!("coalescer", "cancelled", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}
