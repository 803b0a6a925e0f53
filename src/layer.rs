// Copyright (C) 2026 pg-journal developers
//
// This file is part of pg-journal.
//
// pg-journal is free software: you can redistribute it and/or modify it under the terms of the
// GNU General Public License as published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// pg-journal is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without
// even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with pg-journal.  If
// not, see <http://www.gnu.org/licenses/>.

//! [pg-journal](crate) [`Layer`] implementation.
//!
//! [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
//!
//! Hosts with a bespoke diagnostics pipeline drive [`JournalHook::emit`] directly with fully
//! populated [`Record`]s. Everything else that already speaks [`tracing`] can mount this layer
//! instead: it turns each [`Event`] into a [`Record`] — message from the event's `message`
//! field, severity from the event's level, source location and target from its metadata — and
//! hands it to the hook. The record a `tracing` event yields is necessarily sparser than a
//! database host's (no SQLSTATE, no session metadata), which is fine: absent fields are simply
//! omitted from the batch.
//!
//! [`Event`]: https://docs.rs/tracing/latest/tracing/struct.Event.html

use crate::{
    error::Result,
    hook::JournalHook,
    record::Record,
    severity::Severity,
    transport::{Journal, JournalSocket},
};

use tracing::Event;
use tracing_subscriber::layer::Context;

// When the tracing-log feature is enabled, use NormalizeEvent to extract file/line metadata
// from events that originated from the `log` crate. This follows the same pattern used by
// tracing-subscriber's fmt layer.
// See: https://github.com/tokio-rs/tracing/blob/master/tracing-subscriber/src/fmt/fmt_layer.rs
#[cfg(feature = "tracing-log")]
use tracing_log::NormalizeEvent;

/// The default severity for each [`tracing`] level. TRACE lands on the noisiest debug tier and
/// DEBUG on the quietest; the rest line up by name.
fn default_severity_mapping(level: &tracing::Level) -> Severity {
    match level {
        &tracing::Level::TRACE => Severity::DEBUG5,
        &tracing::Level::DEBUG => Severity::DEBUG1,
        &tracing::Level::INFO => Severity::INFO,
        &tracing::Level::WARN => Severity::WARNING,
        &tracing::Level::ERROR => Severity::ERROR,
    }
}

struct MessageEventVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageEventVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            // Regrettably, we have only a `Debug` implementation available to us; but the tracing
            // macros `info!()`, `event!()` & the like all take care to "pre-format" the `message`
            // field so that `value` actually refers to a `std::fmt::Arguments` instance, which
            // will print to a debug format without enclosing double-quotes.
            self.message = Some(format!("{:?}", value));
        }
    }
}

/// A [`tracing-subscriber`]-compliant [`Layer`] implementation that forwards [`Event`]s to the
/// journal through a [`JournalHook`].
///
/// [`tracing-subscriber`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/index.html
/// [`Layer`]: https://docs.rs/tracing-subscriber/latest/tracing_subscriber/layer/trait.Layer.html
/// [`Event`]: https://docs.rs/tracing/latest/tracing/struct.Event.html
pub struct Layer<S, J: Journal>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    hook: JournalHook<J>,
    map_level: Box<dyn Fn(&tracing::Level) -> Severity + Send + Sync>,
    // I need the Subscriber implementation type as a type parameter to satisfy the Layer trait.
    // 👇 gets the compiler to shut-up about unused type parameters.
    subscriber_type: std::marker::PhantomData<S>,
}

impl<S> Layer<S, JournalSocket>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    /// Attempt to construct a [`Layer`] that will send to this machine's journald.
    pub fn try_default() -> Result<Self> {
        Ok(Layer::with_journal(JournalSocket::try_default()?))
    }
}

impl<S, J: Journal> Layer<S, J>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    /// Construct a [`Layer`] around an already-configured hook.
    pub fn new(hook: JournalHook<J>) -> Self {
        Layer {
            hook,
            map_level: Box::new(default_severity_mapping),
            subscriber_type: std::marker::PhantomData,
        }
    }

    /// Construct a [`Layer`] that will send to `journal` with default hook settings.
    pub fn with_journal(journal: J) -> Self {
        Layer::new(JournalHook::new(journal))
    }

    /// Replace the level-to-severity mapping.
    pub fn map_level(
        mut self,
        f: impl Fn(&tracing::Level) -> Severity + Send + Sync + 'static,
    ) -> Self {
        self.map_level = Box::new(f);
        self
    }
}

impl<S, J> tracing_subscriber::layer::Layer<S> for Layer<S, J>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    J: Journal + Send + Sync + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        // When the tracing-log feature is enabled, use normalized_metadata() to get file/line
        // info for events that originated from the `log` crate. For native tracing events,
        // normalized_metadata() returns None and we use the event's own metadata.
        #[cfg(feature = "tracing-log")]
        let normalized_meta = event.normalized_metadata();
        #[cfg(feature = "tracing-log")]
        let meta = normalized_meta.as_ref().unwrap_or_else(|| event.metadata());
        #[cfg(not(feature = "tracing-log"))]
        let meta = event.metadata();

        let mut visitor = MessageEventVisitor { message: None };
        event.record(&mut visitor);
        let message = match visitor.message {
            Some(message) => message,
            // No message field, nothing to forward
            None => return,
        };

        let mut record = Record::new((self.map_level)(meta.level()), &message);
        record.file = meta.file();
        record.line = meta.line().unwrap_or(0);
        record.function = meta.module_path();
        record.application_name = Some(meta.target());
        self.hook.emit(&mut record);
    }
}
