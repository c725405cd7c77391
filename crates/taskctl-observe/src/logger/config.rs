use std::io::IsTerminal;

use crate::logger::{error::LoggerError, format::LoggerFormat};

/// Environment variable holding the output format (`text|json|journald`).
pub const LOG_FORMAT_ENV: &str = "TASKCTL_LOG_FORMAT";
/// Environment variable holding the filter directives (e.g. `info,taskctl.core=debug`).
pub const LOG_LEVEL_ENV: &str = "TASKCTL_LOG";
/// Environment variable enabling span close events with busy/idle timings.
pub const LOG_SPANS_ENV: &str = "TASKCTL_LOG_SPANS";

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directives.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Log each job span's lifetime when it closes.
    pub span_timings: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
            span_timings: false,
        }
    }
}

impl LoggerConfig {
    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    pub fn with_targets(mut self, on: bool) -> Self {
        self.with_targets = on;
        self
    }

    pub fn with_color(mut self, on: bool) -> Self {
        self.use_color = on;
        self
    }

    pub fn with_span_timings(mut self, on: bool) -> Self {
        self.span_timings = on;
        self
    }

    /// Defaults overridden by [`LOG_FORMAT_ENV`], [`LOG_LEVEL_ENV`] and [`LOG_SPANS_ENV`] when set.
    ///
    /// Worker processes spawned by a supervisor inherit its environment, so both
    /// sides log the same way without extra plumbing.
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggerError> {
        let mut cfg = Self::default();
        if let Some(format) = lookup(LOG_FORMAT_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.format = format.parse()?;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.level = level;
        }
        if let Some(flag) = lookup(LOG_SPANS_ENV).filter(|v| !v.trim().is_empty()) {
            cfg.span_timings = parse_flag(LOG_SPANS_ENV, &flag)?;
        }
        Ok(cfg)
    }
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, LoggerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(LoggerError::InvalidFlag {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let cfg = LoggerConfig::default()
            .with_format(LoggerFormat::Json)
            .with_level("debug")
            .with_targets(false)
            .with_color(false);

        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level, "debug");
        assert!(!cfg.with_targets);
        assert!(!cfg.use_color);
    }

    #[test]
    fn lookup_overrides() {
        let cfg = LoggerConfig::from_lookup(|key| match key {
            LOG_FORMAT_ENV => Some("JSON".into()),
            LOG_LEVEL_ENV => Some("warn,taskctl=trace".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.format, LoggerFormat::Json);
        assert_eq!(cfg.level, "warn,taskctl=trace");
    }

    #[test]
    fn blank_values_are_ignored() {
        let cfg = LoggerConfig::from_lookup(|_| Some("  ".into())).unwrap();
        assert_eq!(cfg.format, LoggerFormat::Text);
        assert_eq!(cfg.level, "info");
    }

    #[test]
    fn span_timings_from_lookup() {
        let on = LoggerConfig::from_lookup(|key| (key == LOG_SPANS_ENV).then(|| "On".into())).unwrap();
        assert!(on.span_timings);

        let err = LoggerConfig::from_lookup(|key| (key == LOG_SPANS_ENV).then(|| "maybe".into()))
            .unwrap_err();
        assert!(matches!(err, LoggerError::InvalidFlag { var: LOG_SPANS_ENV, .. }));
    }

    #[test]
    fn bad_format_is_reported() {
        let err = LoggerConfig::from_lookup(|key| (key == LOG_FORMAT_ENV).then(|| "xml".into()))
            .unwrap_err();
        assert!(matches!(err, LoggerError::InvalidFormat(f) if f == "xml"));
    }
}
