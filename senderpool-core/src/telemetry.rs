//! Logging initialisation.
//!
//! Library code only emits `tracing` events; host applications decide where
//! they go. [`init_logging`] is the batteries-included option.

use crate::{
    config::{LogFormat, LoggingSettings},
    Error, Result,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install a global subscriber honouring `settings`.
///
/// `RUST_LOG`, when set, takes precedence over `settings.level`.
///
/// # Errors
/// Returns [`Error::Configuration`] if the filter directive is invalid or a
/// global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| Error::Configuration(format!("Invalid log level '{}': {e}", settings.level)))?,
    };

    let fmt_layer = match settings.format {
        LogFormat::Text => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init()
        .map_err(|e| Error::Configuration(format!("Logging already initialised: {e}")))?;

    tracing::info!(format = ?settings.format, "Logging initialised");
    Ok(())
}

/// Best-effort subscriber for tests: debug level, output captured by the test
/// harness, repeated calls ignored.
pub fn init_test_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_test_writer()
        .try_init()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_reports_error() {
        init_test_logging();
        let result = init_logging(&LoggingSettings::default());
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
