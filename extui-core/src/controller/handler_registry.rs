//! HandlerRegistry: widget group → handler table
//!
//! Built wholesale from the requested capabilities and the capabilities the
//! host already externalizes:
//! - requested and free: handler enabled, widget added to the delivery set
//! - requested but externalized elsewhere: explicit `Disabled` entry
//! - not requested: no entry at all (unknown group on resolution)
//!
//! Handlers are validated when the registry is built, so resolution only has
//! to check whether a handler accepts the event type.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use ahash::AHashMap;
use compact_str::CompactString;
use enum_map::EnumMap;
use tracing::{debug, info};

use crate::controller::traits::WidgetHandler;
use crate::error::RouterError;
use crate::model::event::{CapabilitySet, EventName, RawEvent, Widget};
use crate::util::diagnostics::Diagnostics;

/// Rate-limit key shared by every event name that fails to parse.
const UNPARSABLE_KEY: &str = "<unparsable>";

/// Available handler implementations, one per widget.
#[derive(Default)]
pub struct HandlerCatalog {
    handlers: EnumMap<Widget, Option<Rc<dyn WidgetHandler>>>,
}

impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the widget the handler reports; replaces any previous one.
    pub fn register(&mut self, handler: Rc<dyn WidgetHandler>) {
        let widget = handler.widget();
        self.handlers[widget] = Some(handler);
    }

    #[must_use]
    pub fn with(mut self, handler: Rc<dyn WidgetHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, widget: Widget) -> Option<Rc<dyn WidgetHandler>> {
        self.handlers[widget].clone()
    }
}

impl fmt::Debug for HandlerCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widgets: Vec<Widget> = self
            .handlers
            .iter()
            .filter_map(|(widget, handler)| handler.as_ref().map(|_| widget))
            .collect();
        f.debug_struct("HandlerCatalog").field("widgets", &widgets).finish()
    }
}

/// Per-handler counters, updated by the dispatch cycle.
#[derive(Debug, Default)]
pub struct HandlerMetrics {
    event_count: Cell<u64>,
    failure_count: Cell<u64>,
    total_processing_time: Cell<Duration>,
}

impl HandlerMetrics {
    pub fn record(&self, elapsed: Duration, failed: bool) {
        self.event_count.set(self.event_count.get() + 1);
        self.total_processing_time
            .set(self.total_processing_time.get() + elapsed);
        if failed {
            self.failure_count.set(self.failure_count.get() + 1);
        }
    }
}

/// Handler performance statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerStats {
    pub widget: Widget,
    pub event_count: u64,
    pub failure_count: u64,
    pub average_processing_time: Duration,
}

pub enum HandlerEntry {
    Enabled {
        handler: Rc<dyn WidgetHandler>,
        metrics: Rc<HandlerMetrics>,
    },

    /// Requested, but another UI already externalizes the widget.
    Disabled,
}

/// A successful resolution: the handler plus what it was resolved from.
#[derive(Clone)]
pub struct ResolvedHandler {
    pub handler: Rc<dyn WidgetHandler>,
    pub metrics: Rc<HandlerMetrics>,
    pub name: EventName,
}

impl fmt::Debug for ResolvedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedHandler")
            .field("widget", &self.handler.widget())
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    entries: AHashMap<CompactString, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the registry and the delivery set to attach with.
    ///
    /// Nothing is returned on error, so a failed rebuild never leaves a
    /// partially populated registry behind.
    pub fn build(
        requested: CapabilitySet,
        externalized: CapabilitySet,
        catalog: &HandlerCatalog,
        diagnostics: &Diagnostics,
    ) -> Result<(CapabilitySet, Self), RouterError> {
        let mut delivery = CapabilitySet::empty();
        let mut entries = AHashMap::new();

        for widget in requested.iter() {
            if externalized.contains(widget) {
                diagnostics.warn(&format!(
                    "`{}` is already externalized by another ui",
                    widget.ext_option()
                ));
                entries.insert(CompactString::new(widget.group()), HandlerEntry::Disabled);
                continue;
            }

            let handler = catalog.get(widget).ok_or(RouterError::MissingHandler(widget))?;
            validate(widget, handler.as_ref())?;

            delivery.insert(widget);
            entries.insert(
                CompactString::new(widget.group()),
                HandlerEntry::Enabled {
                    handler,
                    metrics: Rc::default(),
                },
            );
        }

        info!(
            marker = "REGISTRY_BUILT",
            delivery = ?delivery.ext_options(),
            "HandlerRegistry built with {} entries",
            entries.len()
        );

        Ok((delivery, Self { entries }))
    }

    /// Map a raw event to the handler that accepts it.
    pub fn resolve(&self, raw: &RawEvent, diagnostics: &Diagnostics) -> Option<ResolvedHandler> {
        let Some(name) = EventName::parse(&raw.name) else {
            diagnostics.rate_limited(UNPARSABLE_KEY, || format!("No ui router for {}", raw.name));
            return None;
        };

        match self.entries.get(&name.group) {
            None => {
                diagnostics.rate_limited(&name.group, || {
                    format!("No ui router for {}", name.group)
                });
                None
            }

            Some(HandlerEntry::Disabled) => None,

            Some(HandlerEntry::Enabled { handler, metrics }) => {
                if !handler.accepts(&name.event_type) {
                    let method = name.method();
                    let key = compact_str::format_compact!("{}.{}", name.group, method);
                    diagnostics.rate_limited(&key, || {
                        format!(
                            "No ui router for **{}** events: group `{}` has no `{}`; payload: {:?}",
                            raw.name, name.group, method, raw.payload
                        )
                    });
                    return None;
                }

                debug!(group = %name.group, event_type = %name.event_type, "Resolved handler");

                Some(ResolvedHandler {
                    handler: Rc::clone(handler),
                    metrics: Rc::clone(metrics),
                    name,
                })
            }
        }
    }

    /// Enabled handlers, in widget order.
    pub fn enabled(&self) -> Vec<Rc<dyn WidgetHandler>> {
        let mut handlers: Vec<Rc<dyn WidgetHandler>> = self
            .entries
            .values()
            .filter_map(|entry| match entry {
                HandlerEntry::Enabled { handler, .. } => Some(Rc::clone(handler)),
                HandlerEntry::Disabled => None,
            })
            .collect();
        handlers.sort_by_key(|handler| handler.widget() as u8);
        handlers
    }

    pub fn is_disabled(&self, widget: Widget) -> bool {
        matches!(self.entries.get(widget.group()), Some(HandlerEntry::Disabled))
    }

    pub fn handler_count(&self) -> usize {
        self.entries.len()
    }

    /// Get performance report for all enabled handlers
    pub fn performance_report(&self) -> Vec<HandlerStats> {
        let mut report: Vec<HandlerStats> = self
            .entries
            .values()
            .filter_map(|entry| match entry {
                HandlerEntry::Enabled { handler, metrics } => {
                    let event_count = metrics.event_count.get();
                    let total = metrics.total_processing_time.get();
                    let average_processing_time = average(total, event_count);

                    Some(HandlerStats {
                        widget: handler.widget(),
                        event_count,
                        failure_count: metrics.failure_count.get(),
                        average_processing_time,
                    })
                }
                HandlerEntry::Disabled => None,
            })
            .collect();
        report.sort_by_key(|stats| stats.widget as u8);
        report
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn validate(widget: Widget, handler: &dyn WidgetHandler) -> Result<(), RouterError> {
    if handler.widget() != widget {
        return Err(RouterError::invalid_handler(
            widget,
            format!("handler is registered for {}", handler.widget()),
        ));
    }

    for required in widget.required_types() {
        if !handler.accepts(required) {
            return Err(RouterError::invalid_handler(
                widget,
                format!("missing on_{required}"),
            ));
        }
    }

    Ok(())
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handler_count", &self.entries.len())
            .finish()
    }
}
