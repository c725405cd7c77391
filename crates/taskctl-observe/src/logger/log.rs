use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan, time::OffsetTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// One output layer under a global `EnvFilter`.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = mk_filter(&cfg.level)?;
    let output = output_layer(cfg)?;
    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()
        .map_err(as_error)?;
    tracing::debug!(
        target: "taskctl.observe.logger",
        format = %cfg.format,
        filter = %cfg.level,
        span_timings = cfg.span_timings,
        "logger installed"
    );
    Ok(())
}

fn output_layer(cfg: &LoggerConfig) -> Result<OutputLayer, LoggerError> {
    match cfg.format {
        LoggerFormat::Text => Ok(text_layer(cfg)),
        LoggerFormat::Json => Ok(json_layer(cfg)),
        LoggerFormat::Journald => journald_layer(),
    }
}

fn text_layer(cfg: &LoggerConfig) -> OutputLayer {
    fmt::layer()
        .with_ansi(cfg.use_color)
        .with_target(cfg.with_targets)
        .with_timer(mk_timer())
        .with_span_events(span_events(cfg))
        .boxed()
}

/// Every line carries the innermost span, so job lines include `session` and `job`.
fn json_layer(cfg: &LoggerConfig) -> OutputLayer {
    fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_target(cfg.with_targets)
        .with_timer(mk_timer())
        .with_span_events(span_events(cfg))
        .boxed()
}

/// With span timings on, each job span logs its busy/idle time when it closes.
fn span_events(cfg: &LoggerConfig) -> FmtSpan {
    if cfg.span_timings {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

pub(crate) fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("global default") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(s)
    }
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?
        .with_syslog_identifier("taskctl".to_string());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_accepts_target_directives() {
        assert!(mk_filter("info").is_ok());
        assert!(mk_filter("warn,taskctl=debug").is_ok());
    }

    #[test]
    fn filter_rejects_garbage() {
        assert!(matches!(
            mk_filter("taskctl=loudest"),
            Err(LoggerError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn span_timings_toggle_close_events() {
        let cfg = LoggerConfig::default();
        assert_eq!(span_events(&cfg), FmtSpan::NONE);
        assert_eq!(span_events(&cfg.with_span_timings(true)), FmtSpan::CLOSE);
    }

    #[test]
    fn text_and_json_layers_build() {
        let cfg = LoggerConfig::default().with_color(false);
        assert!(output_layer(&cfg).is_ok());
        assert!(output_layer(&cfg.with_format(LoggerFormat::Json)).is_ok());
    }

    #[cfg(not(all(target_os = "linux", feature = "journald")))]
    #[test]
    fn journald_layer_requires_feature() {
        let cfg = LoggerConfig::default().with_format(LoggerFormat::Journald);
        assert!(matches!(
            output_layer(&cfg),
            Err(LoggerError::JournaldNotSupported)
        ));
    }

    #[test]
    fn second_install_is_rejected() {
        let cfg = LoggerConfig::default()
            .with_color(false)
            .with_level("warn");
        let _ = install(&cfg);
        assert!(matches!(install(&cfg), Err(LoggerError::AlreadyInitialized)));
    }
}
