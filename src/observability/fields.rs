//! Recognized log context fields.
//!
//! Only four context fields reach the log line: the trace id, the two
//! correlation ids and the transaction start time. They are collected from
//! the event itself and from every enclosing span; the span side is kept in
//! span extensions by [`LogFieldsLayer`].

use std::fmt;
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id, Record};
use tracing::Subscriber;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

/// Trace identifier of the current request.
pub const TRACE_ID_FIELD: &str = "TRACEID";
/// Correlation id of an e-mail request.
pub const EMAIL_REQUEST_FIELD: &str = "EMAILREQ";
/// Correlation id of a partner (mitra) request.
pub const PARTNER_REQUEST_FIELD: &str = "MITRAREQ";
/// Transaction start, epoch milliseconds.
pub const START_TIME_FIELD: &str = "STARTTIME";

const MESSAGE_FIELD: &str = "message";

/// Values of the recognized fields found on an event or span.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFields {
    pub trace_id: Option<String>,
    pub email_request: Option<String>,
    pub partner_request: Option<String>,
    pub start_time_ms: Option<i64>,
    pub message: Option<String>,
}

impl LogFields {
    fn set_text(&mut self, name: &str, value: String) {
        match name {
            TRACE_ID_FIELD => self.trace_id = Some(value),
            EMAIL_REQUEST_FIELD => self.email_request = Some(value),
            PARTNER_REQUEST_FIELD => self.partner_request = Some(value),
            START_TIME_FIELD => {
                if let Ok(ms) = value.trim().parse() {
                    self.start_time_ms = Some(ms);
                }
            }
            MESSAGE_FIELD => self.message = Some(value),
            _ => {}
        }
    }

    fn set_int(&mut self, name: &str, value: i64) {
        if name == START_TIME_FIELD {
            self.start_time_ms = Some(value);
        } else {
            self.set_text(name, value.to_string());
        }
    }

    /// Fill every unset field from `outer`. The message is never inherited.
    pub fn fill_from(&mut self, outer: &LogFields) {
        if self.trace_id.is_none() {
            self.trace_id.clone_from(&outer.trace_id);
        }
        if self.email_request.is_none() {
            self.email_request.clone_from(&outer.email_request);
        }
        if self.partner_request.is_none() {
            self.partner_request.clone_from(&outer.partner_request);
        }
        if self.start_time_ms.is_none() {
            self.start_time_ms = outer.start_time_ms;
        }
    }

    fn is_empty(&self) -> bool {
        *self == LogFields::default()
    }
}

/// Visitor feeding recorded values into [`LogFields`].
pub struct FieldVisitor<'a>(pub &'a mut LogFields);

impl Visit for FieldVisitor<'_> {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.set_int(field.name(), value);
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match i64::try_from(value) {
            Ok(v) => self.0.set_int(field.name(), v),
            Err(_) => self.0.set_text(field.name(), value.to_string()),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.set_text(field.name(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.set_text(field.name(), format!("{value:?}"));
    }
}

/// Stores recognized span fields in the span's extensions, including
/// values recorded after creation with `Span::record`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFieldsLayer;

impl<S> Layer<S> for LogFieldsLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut fields = LogFields::default();
        attrs.record(&mut FieldVisitor(&mut fields));
        if !fields.is_empty() {
            span.extensions_mut().insert(fields);
        }
    }

    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: Context<'_, S>) {
        let Some(span) = ctx.span(id) else {
            return;
        };
        let mut extensions = span.extensions_mut();
        match extensions.get_mut::<LogFields>() {
            Some(fields) => values.record(&mut FieldVisitor(fields)),
            None => {
                let mut fields = LogFields::default();
                values.record(&mut FieldVisitor(&mut fields));
                extensions.insert(fields);
            }
        }
    }
}
