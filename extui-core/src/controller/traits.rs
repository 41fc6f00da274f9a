//! Collaborator seams of the router: the host editor, the widget handlers and
//! the render, tick and statistics owners.

use crate::error::RouterError;
use crate::model::event::{CapabilitySet, Event, Widget};

/// A per-widget renderer fed by the router.
///
/// Methods take `&self`: a handler may trigger host activity that re-enters
/// the router and calls the same handler again before the first call returns.
pub trait WidgetHandler {
    fn widget(&self) -> Widget;

    /// Event types (the part after `<group>_`) this handler accepts.
    fn event_types(&self) -> &'static [&'static str];

    /// Capability-specific initialization, run on every successful enable.
    fn setup(&self) -> anyhow::Result<()> {
        Ok(())
    }

    fn handle(&self, event: &Event) -> anyhow::Result<()>;

    fn accepts(&self, event_type: &str) -> bool {
        self.event_types().contains(&event_type)
    }
}

/// The editor emitting UI events.
pub trait Host {
    /// Once true, every delivery becomes a no-op.
    fn is_exiting(&self) -> bool;

    /// True while the host waits on user input (hit-enter, getchar, ...).
    fn is_blocking(&self) -> bool;

    /// Widgets another attached UI already externalizes.
    fn externalized(&self) -> CapabilitySet;

    fn attach(&self, capabilities: CapabilitySet) -> Result<(), RouterError>;

    fn detach(&self);

    /// Feed keys to the host as if typed by the user.
    fn feed_input(&self, keys: &str);
}

/// Continuations the router asks to run on the next safe tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduledTask {
    /// Drain events delivered from a fast context.
    DeferredFlush,

    /// Re-attach after a redirect.
    Enable,
}

pub trait Scheduler {
    /// Run `Router::run_scheduled(task)` on the next tick that is safe for
    /// host mutation. Never runs the task inline.
    fn schedule(&self, task: ScheduledTask);
}

pub trait Renderer {
    /// Redraw whatever changed. Must be safe to call when nothing did.
    fn update(&self) -> anyhow::Result<()>;

    /// Force pending echo output out before handlers are swapped.
    fn echo_pending(&self);
}

/// Read side of the external state version counter.
pub trait TickSource {
    fn tick(&self) -> u64;
}

pub trait StatsSink {
    /// Fire-and-forget counter increment.
    fn track(&self, counter: &str);
}
