use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::time::OffsetTime, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = mk_filter(&cfg.level)?;
    let output = output_layer(cfg)?;

    tracing_subscriber::registry()
        .with(output.with_filter(filter))
        .try_init()
        .map_err(as_error)
}

fn output_layer(cfg: &LoggerConfig) -> Result<OutputLayer, LoggerError> {
    let layer: OutputLayer = match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer())
            .boxed(),
        // One object per line; span fields carry the task name.
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .with_span_list(false)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer())
            .boxed(),
        LoggerFormat::Journald => journald_layer()?,
    };
    Ok(layer)
}

/// `level` is a full `EnvFilter` directive; a bare level applies to every target.
fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

// Under a multi-threaded runtime `time` cannot read the local offset; UTC then.
fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("SetGlobalDefaultError") || s.contains("global default") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(s)
    }
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    tracing_journald::layer()
        .map(|layer| layer.with_syslog_identifier("wfbench".to_string()).boxed())
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_level_is_reported() {
        assert!(matches!(
            mk_filter("wfb.cores=loud"),
            Err(LoggerError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn directives_are_accepted() {
        assert!(mk_filter("info").is_ok());
        assert!(mk_filter("wfb.cores=debug,warn").is_ok());
    }

    #[test]
    fn text_and_json_layers_build() {
        for format in [LoggerFormat::Text, LoggerFormat::Json] {
            let cfg = LoggerConfig {
                format,
                ..LoggerConfig::default()
            };
            assert!(output_layer(&cfg).is_ok());
        }
    }

    #[cfg(not(all(target_os = "linux", feature = "journald")))]
    #[test]
    fn journald_layer_needs_feature() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Journald,
            ..LoggerConfig::default()
        };
        assert!(matches!(
            output_layer(&cfg),
            Err(LoggerError::JournaldNotSupported)
        ));
    }
}
