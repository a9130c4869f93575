//! tracing setup shared by every gitpulse binary
//!
//! One subscriber per process: an env filter plus a single fmt layer whose
//! format and destination come from `LoggingConfig`.

use serde::{Deserialize, Serialize};
use std::io;
use std::sync::Mutex;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Subscriber settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level, overridden by `RUST_LOG` when set
    pub level: String,
    pub format: LogFormat,
    /// Emit file and line of each event
    pub include_location: bool,
    pub include_thread: bool,
    /// Log file path; logs go to stderr when unset
    pub log_file_path: Option<String>,
    /// Whether to emit span close events with timings
    pub enable_performance_monitoring: bool,
    /// Extra `target=level` directives appended to the filter
    pub filter_directives: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_location: false,
            include_thread: false,
            log_file_path: None,
            enable_performance_monitoring: false,
            filter_directives: vec![
                "hyper=warn".to_string(),
                "reqwest=warn".to_string(),
            ],
        }
    }
}

impl LoggingConfig {
    /// Raise the crate-level verbosity for all gitpulse crates
    pub fn verbose(mut self) -> Self {
        self.level = "debug".to_string();
        self.filter_directives.extend([
            "gitpulse=debug".to_string(),
            "gitpulse_core=debug".to_string(),
            "gitpulse_repo=debug".to_string(),
        ]);
        self
    }
}

/// Initialize the logging system. Can only succeed once per process.
pub fn init_logging(
    config: &LoggingConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    for directive in &config.filter_directives {
        filter = filter.add_directive(directive.parse()?);
    }

    let writer = match &config.log_file_path {
        Some(log_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::stderr),
    };

    let span_events = if config.enable_performance_monitoring {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let base = fmt::layer()
        .with_writer(writer)
        .with_ansi(config.log_file_path.is_none())
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread)
        .with_thread_names(config.include_thread);

    let fmt_layer = match config.format {
        LogFormat::Json => base.json().boxed(),
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

/// Timing helpers for pipeline stages
pub mod performance {
    use std::time::{Duration, Instant};
    use tracing::{debug_span, Instrument};

    /// Run `future` inside a `stage` span and log how long it took
    pub async fn measure_async<F, T>(stage: &str, future: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        let watch = Stopwatch::start(stage);
        let result = future.instrument(debug_span!("stage", name = stage)).await;
        watch.finish();
        result
    }

    /// Wall-clock timer that reports under the `performance` target
    #[derive(Debug)]
    pub struct Stopwatch {
        label: String,
        started: Instant,
    }

    impl Stopwatch {
        pub fn start(label: impl Into<String>) -> Self {
            Self {
                label: label.into(),
                started: Instant::now(),
            }
        }

        pub fn elapsed(&self) -> Duration {
            self.started.elapsed()
        }

        /// Log the elapsed time and return it
        pub fn finish(self) -> Duration {
            let elapsed = self.elapsed();
            tracing::debug!(
                target: "performance",
                label = %self.label,
                elapsed_ms = elapsed.as_millis() as u64,
                "Timed"
            );
            elapsed
        }
    }
}

/// `info` event marking the start of a named operation, with optional fields
#[macro_export]
macro_rules! log_operation_start {
    ($operation:expr $(, $($field:tt)*)?) => {
        $crate::tracing::info!(operation = $operation, $($($field)*,)? "Started")
    };
}

/// `info` event marking successful completion
#[macro_export]
macro_rules! log_operation_success {
    ($operation:expr $(, $($field:tt)*)?) => {
        $crate::tracing::info!(operation = $operation, $($($field)*,)? "Finished")
    };
}

/// `error` event carrying the failure's display form
#[macro_export]
macro_rules! log_operation_error {
    ($operation:expr, $error:expr $(, $($field:tt)*)?) => {
        $crate::tracing::error!(operation = $operation, error = %$error, $($($field)*,)? "Failed")
    };
}
