//! Single-line log format.
//!
//! ```text
//! 02/01/2024 15:04:05,123 INFO handler.rs:42 orders TRACEID 1-abc [mail-1|mitra-9] MSSG:done [1.234 ms]
//! ```
//!
//! Fields, in order: timestamp, upper-case level, call site (file name and
//! line), application name, optional trace id, optional bracketed
//! correlation ids, the message, and the optional elapsed time since the
//! transaction started.

use chrono::{DateTime, Local};
use std::fmt::{self, Write as _};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use crate::config::LoggingConfig;
use crate::observability::fields::{FieldVisitor, LogFields};

/// Everything the formatter needs from one log call.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub timestamp: DateTime<Local>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub fields: LogFields,
}

/// Formats log records into single text lines.
#[derive(Debug, Clone)]
pub struct LogLineFormat {
    app_name: String,
    timestamp_format: String,
    thousands_separator: char,
}

impl Default for LogLineFormat {
    fn default() -> Self {
        Self::from_config(&LoggingConfig::default())
    }
}

/// Level names as the log collectors expect them.
pub fn level_name(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "TRACE",
        Level::DEBUG => "DEBUG",
        Level::INFO => "INFO",
        Level::WARN => "WARNING",
        Level::ERROR => "ERROR",
    }
}

/// Group digits in threes: `1234567` → `1.234.567` with `'.'`.
pub fn group_thousands(value: i64, separator: char) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(c);
    }
    out
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

impl LogLineFormat {
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            app_name: config.app_name.clone(),
            timestamp_format: config.timestamp_format.clone(),
            thousands_separator: config.thousands_separator,
        }
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Render `record` as one line, newline included.
    ///
    /// `now_ms` (epoch milliseconds) is the reference for the elapsed time.
    pub fn format_record(&self, record: &LogRecord, now_ms: i64) -> String {
        let mut line = String::with_capacity(128);

        // An unusable pattern must not lose the log line.
        if write!(line, "{}", record.timestamp.format(&self.timestamp_format)).is_err() {
            line.clear();
            line.push_str(&record.timestamp.to_rfc3339());
        }
        line.push(' ');
        line.push_str(level_name(&record.level));
        line.push(' ');
        line.push_str(record.file.as_deref().map(file_name).unwrap_or("<unknown>"));
        line.push(':');
        line.push_str(&record.line.unwrap_or(0).to_string());
        line.push(' ');
        line.push_str(&self.app_name);
        line.push(' ');

        let fields = &record.fields;
        if let Some(trace_id) = fields.trace_id.as_deref().filter(|v| !v.is_empty()) {
            line.push_str("TRACEID ");
            line.push_str(trace_id);
            line.push(' ');
        }
        if let Some(email) = fields.email_request.as_deref().filter(|v| !v.is_empty()) {
            line.push('[');
            line.push_str(email);
            if let Some(partner) = fields.partner_request.as_deref().filter(|v| !v.is_empty()) {
                line.push('|');
                line.push_str(partner);
            }
            line.push_str("] ");
        }

        line.push_str("MSSG:");
        line.push_str(fields.message.as_deref().unwrap_or_default());

        if let Some(start) = fields.start_time_ms {
            let elapsed = now_ms.saturating_sub(start).max(0);
            line.push_str(" [");
            line.push_str(&group_thousands(elapsed, self.thousands_separator));
            line.push_str(" ms]");
        }

        line.push('\n');
        line
    }
}

impl<S, N> FormatEvent<S, N> for LogLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = LogFields::default();
        event.record(&mut FieldVisitor(&mut fields));

        // Innermost span first, so the closest value wins.
        if let Some(scope) = ctx.event_scope() {
            for span in scope {
                if let Some(span_fields) = span.extensions().get::<LogFields>() {
                    fields.fill_from(span_fields);
                }
            }
        }

        let metadata = event.metadata();
        let now = Local::now();
        let record = LogRecord {
            level: *metadata.level(),
            timestamp: now,
            file: metadata.file().map(str::to_string),
            line: metadata.line(),
            fields,
        };
        writer.write_str(&self.format_record(&record, now.timestamp_millis()))
    }
}
