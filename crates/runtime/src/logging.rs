//! Structured logging setup with tracing.

use launcher_core::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

/// Crates whose request-level chatter is capped at `warn`.
const QUIET_TARGETS: &[&str] = &["hyper", "h2"];

/// Logging format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable text format.
    #[default]
    Text,
    /// JSON format for log shippers.
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}")),
        }
    }
}

/// Filter directive used when `RUST_LOG` is unset.
fn default_directives(level: &str) -> String {
    let mut directives = level.to_string();
    for target in QUIET_TARGETS {
        directives.push_str(&format!(",{target}=warn"));
    }
    directives
}

/// Initialize the logging subsystem.
///
/// `RUST_LOG` wins over `level` when set. A second call is a no-op.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    // JSON lines carry the request span (request id, character, output id).
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Text => fmt::layer().compact().boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
    };

    let _ = tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init();
}

/// Initialize logging from the `logging` config section.
///
/// An unparseable format falls back to text.
pub fn init_logging_from_config(config: &LoggingConfig) {
    let format = config.format.parse().unwrap_or_default();
    init_logging(&config.level, format);
}
