//! Span capability interface for pipeline instrumentation.
//!
//! Stages receive a `Tracer` at construction time; whether spans go to the
//! tracing subscriber or nowhere is decided once, never at call sites.

use std::sync::Arc;
use std::time::Instant;

/// One in-flight span. Attributes accumulate until `end` is called.
pub trait Span: Send {
    fn set_attribute(&mut self, key: &str, value: String);
    fn end(self: Box<Self>);
}

pub trait Tracer: Send + Sync {
    fn start(&self, name: &'static str) -> Box<dyn Span>;
}

// ============================================================================
// No-op implementation
// ============================================================================

pub struct NoopTracer;

struct NoopSpan;

impl Span for NoopSpan {
    fn set_attribute(&mut self, _key: &str, _value: String) {}
    fn end(self: Box<Self>) {}
}

impl Tracer for NoopTracer {
    fn start(&self, _name: &'static str) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}

// ============================================================================
// tracing-backed implementation
// ============================================================================

/// Emits a debug event with the collected attributes and elapsed time when
/// the span ends.
pub struct LogTracer;

struct LogSpan {
    name: &'static str,
    started: Instant,
    attributes: Vec<(String, String)>,
}

impl Span for LogSpan {
    fn set_attribute(&mut self, key: &str, value: String) {
        self.attributes.push((key.to_string(), value));
    }

    fn end(self: Box<Self>) {
        let elapsed_ms = self.started.elapsed().as_millis();
        let attrs = self
            .attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::debug!(span = self.name, elapsed_ms, %attrs, "span ended");
    }
}

impl Tracer for LogTracer {
    fn start(&self, name: &'static str) -> Box<dyn Span> {
        Box::new(LogSpan { name, started: Instant::now(), attributes: vec![] })
    }
}

/// Tracer selection at construction time.
pub fn tracer(enabled: bool) -> Arc<dyn Tracer> {
    if enabled { Arc::new(LogTracer) } else { Arc::new(NoopTracer) }
}
