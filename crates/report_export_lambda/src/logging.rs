//! Logging setup for the Lambda binary using `tracing` + `tracing-subscriber`.
//!
//! Events are written as JSON lines to stderr so CloudWatch keeps the
//! structured fields. The filter comes from `REPORT_LOG` and defaults to
//! `info`.

use lambda_runtime::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_VAR: &str = "REPORT_LOG";
const DEFAULT_LOG_FILTER: &str = "info";

/// Initialise the global subscriber. Call once at startup.
pub fn init_logging() -> Result<(), Error> {
    let filter = log_filter(std::env::var(LOG_FILTER_VAR).ok().as_deref());

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_current_span(false)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .try_init()
}

fn log_filter(raw: Option<&str>) -> EnvFilter {
    raw.map(str::trim)
        .filter(|directive| !directive.is_empty())
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info() {
        assert_eq!(log_filter(None).to_string(), "info");
        assert_eq!(log_filter(Some("  ")).to_string(), "info");
    }

    #[test]
    fn honours_valid_directives() {
        assert_eq!(log_filter(Some("debug")).to_string(), "debug");
        assert_eq!(
            log_filter(Some("report_export_core=trace")).to_string(),
            "report_export_core=trace"
        );
    }
}
