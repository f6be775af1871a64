//! # Tracing Bridge
//!
//! A `tracing_subscriber` layer that copies the service's own `tracing`
//! events into a registry [`Logger`], so framework and handler diagnostics
//! land in the rotated files next to explicit log calls.
//!
//! Events emitted from inside `rollgate::logging` are skipped: they can fire
//! while a sink lock is held, and writing them back into a sink would deadlock.

use super::record::{Severity, SourceLocation};
use super::registry::Logger;
use std::fmt::Write;
use std::sync::Arc;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const INTERNAL_TARGET: &str = "rollgate::logging";

/// Function name recorded for bridged events; `tracing` metadata carries no function
const BRIDGED_FUNCTION: &str = "event";

/// Forwards `tracing` events to one logger
#[derive(Debug, Clone)]
pub struct RegistryLayer {
    logger: Arc<Logger>,
}

impl RegistryLayer {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

/// Collects the `message` field plus any other fields as `key=value`
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn push_field(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        write!(self.fields, "{}={:?}", field.name(), value).ok();
    }

    fn into_message(self) -> String {
        match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        }
    }
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.push_field(field, value);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.push_field(field, &value);
        }
    }
}

impl<S> Layer<S> for RegistryLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(INTERNAL_TARGET) {
            return;
        }

        let severity = Severity::from(metadata.level());
        if !self.logger.is_enabled_for(severity) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let location = SourceLocation::new(
            metadata.module_path().unwrap_or_else(|| metadata.target()),
            BRIDGED_FUNCTION,
            metadata.line().unwrap_or(0),
        );

        if let Err(e) = self.logger.log(severity, visitor.into_message(), location) {
            warn!(logger = self.logger.name(), "Dropped bridged event: {}", e);
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
//****                              Tests                                ****//
///////////////////////////////////////////////////////////////////////////////
