//! Logging helpers for Tarshell
//!
//! The library emits `tracing` events; the driver decides where they go.
//!
//! # Log Levels
//!
//! - **ERROR**: bootstrap failures
//! - **WARN**: skipped startup scripts, rejected archive entries
//! - **INFO**: session lifecycle (create/load archive, script start and end)
//! - **DEBUG**: each dispatched command and its exit status
//!
//! Command lines come from users and script files, so they are sanitised
//! before being logged: control characters are escaped (a line containing
//! `\n[ERROR] ...` must not forge a log entry) and long values are truncated.

use std::borrow::Cow;

/// Configuration for logging behavior.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to log each startup-script line verbatim (default: false).
    ///
    /// When disabled only a line/byte summary of the script is logged.
    pub log_script_content: bool,

    /// Maximum length of logged values before truncation (default: 200).
    pub max_value_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_script_content: false,
            max_value_length: 200,
        }
    }
}

impl LogConfig {
    /// Create a new log configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Log startup-script lines verbatim.
    pub fn log_scripts(mut self) -> Self {
        self.log_script_content = true;
        self
    }

    /// Set maximum length for logged values.
    pub fn max_value_length(mut self, len: usize) -> Self {
        self.max_value_length = len;
        self
    }

    /// Sanitise and truncate a command line for a log event.
    pub fn command<'a>(&self, line: &'a str) -> Cow<'a, str> {
        if line.chars().any(char::is_control) {
            Cow::Owned(self.truncate(&sanitize_for_log(line)).into_owned())
        } else {
            self.truncate(line)
        }
    }

    /// Truncate value if it exceeds max length.
    ///
    /// Cuts on a char boundary so multi-byte input never panics.
    fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.len() <= self.max_value_length {
            Cow::Borrowed(value)
        } else {
            let mut end = self.max_value_length;
            while end > 0 && !value.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!(
                "{}...[truncated {} bytes]",
                &value[..end],
                value.len() - end
            ))
        }
    }
}

/// Escape control characters that could be used for log injection.
pub fn sanitize_for_log(input: &str) -> String {
    input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

/// Format startup-script content for logging.
pub fn format_script_for_log(script: &str, config: &LogConfig) -> String {
    if !config.log_script_content {
        let lines = script.lines().count();
        let bytes = script.len();
        return format!("[script: {} lines, {} bytes]", lines, bytes);
    }

    let sanitized = sanitize_for_log(script);
    config.truncate(&sanitized).into_owned()
}
