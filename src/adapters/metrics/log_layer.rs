//! Log Event Counter - Counts Emitted Log Events by Level
//!
//! A `tracing_subscriber` layer feeding the always-present
//! `<namespace>_log_messages_total{level}` counter. Only events that
//! pass the subscriber's filter are counted.

use prometheus::IntCounterVec;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

#[derive(Clone)]
pub struct LogEventCounter {
    counter: IntCounterVec,
}

impl LogEventCounter {
    pub fn new(counter: IntCounterVec) -> Self {
        Self { counter }
    }
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::ERROR => "error",
        Level::WARN => "warning",
        Level::INFO => "info",
        Level::DEBUG => "debug",
        _ => "trace",
    }
}

impl<S: Subscriber> Layer<S> for LogEventCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = level_label(*event.metadata().level());
        self.counter.with_label_values(&[level]).inc();
    }
}
