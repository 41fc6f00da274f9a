//! Dispatcher: drains the event queue and decides, per event, whether the
//! renderer has to run.
//!
//! The tick owner is read before and after every handler call. Only a tick
//! change triggers `Renderer::update`; unchanged ticks are counted as
//! `<group>.skipped`. During a burst this keeps redraws to the events that
//! actually changed something.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Instant;

use compact_str::format_compact;
use tracing::{debug, error, trace, warn};

use crate::controller::event_queue::{EventQueue, QueuedEvent};
use crate::controller::traits::{Host, Renderer, StatsSink, TickSource, WidgetHandler};
use crate::error::RouterError;
use crate::model::dispatcher_state::DispatcherState;
use crate::model::event::Event;

pub struct Dispatcher {
    host: Rc<dyn Host>,
    renderer: Rc<dyn Renderer>,
    ticks: Rc<dyn TickSource>,
    stats: Rc<dyn StatsSink>,
}

impl Dispatcher {
    pub fn new(
        host: Rc<dyn Host>,
        renderer: Rc<dyn Renderer>,
        ticks: Rc<dyn TickSource>,
        stats: Rc<dyn StatsSink>,
    ) -> Self {
        Self {
            host,
            renderer,
            ticks,
            stats,
        }
    }

    /// Process queued events until the queue is empty.
    ///
    /// Loops on emptiness rather than a count, so events enqueued by handlers
    /// during the drain are delivered by this same loop. Returns the number of
    /// events processed.
    pub fn drain(&self, state: &DispatcherState, queue: &EventQueue) -> Result<usize, RouterError> {
        let _processing = state.begin_processing();
        let mut processed = 0;

        while let Some(queued) = queue.pop() {
            if let Err(err) = self.process_one(state, queued) {
                let dropped = queue.clear();
                warn!(marker = "QUEUE_DISCARDED", dropped, "Discarding queued ui events");
                return Err(err);
            }
            processed += 1;
        }

        trace!(processed, "Queue drained");
        Ok(processed)
    }

    fn process_one(&self, state: &DispatcherState, queued: QueuedEvent) -> Result<(), RouterError> {
        if let Some(depth) = state.halted_at() {
            return Err(RouterError::FatalLoopDetected { depth });
        }

        let _depth = match state.enter() {
            Ok(guard) => guard,
            Err(depth) => {
                error!(
                    marker = "FATAL_LOOP",
                    depth, "Event loop detected; shutting down the ui router"
                );
                state.halt(depth);
                return Err(RouterError::FatalLoopDetected { depth });
            }
        };

        let QueuedEvent { handler: resolved, raw } = queued;
        let event = Event::new(resolved.name, raw);

        let tick_before = self.ticks.tick();
        let started = Instant::now();
        let ok = invoke_protected(resolved.handler.as_ref(), &event);
        resolved.metrics.record(started.elapsed(), !ok);

        // A nested drain hit the ceiling while this handler was running.
        if let Some(depth) = state.halted_at() {
            return Err(RouterError::FatalLoopDetected { depth });
        }

        let tick_after = self.ticks.tick();
        if tick_after > tick_before {
            if !self.host.is_blocking() && event.is_low_priority() {
                trace!(event = %event.name, kind = %event.kind, "Refresh deferred for low-priority update");
            } else {
                try_update(self.renderer.as_ref());
            }
        } else {
            self.stats.track(&format_compact!("{}.skipped", event.group));
        }

        Ok(())
    }
}

/// Run the renderer, logging instead of propagating errors and panics.
pub(crate) fn try_update(renderer: &dyn Renderer) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| renderer.update())) {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(marker = "RENDER_FAILED", "Failed to update the ui: {e:#}");
            false
        }
        Err(payload) => {
            error!(
                marker = "RENDER_PANICKED",
                "Failed to update the ui: {}",
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

/// Call the handler, isolating errors and panics to this one event.
fn invoke_protected(handler: &dyn WidgetHandler, event: &Event) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event))) {
        Ok(Ok(())) => {
            debug!(event = %event.name, kind = %event.kind, "Handled ui event");
            true
        }
        Ok(Err(e)) => {
            error!(
                marker = "HANDLER_FAILED",
                event = %event.name,
                kind = %event.kind,
                "An error happened while handling a ui event: {e:#}"
            );
            false
        }
        Err(payload) => {
            error!(
                marker = "HANDLER_PANICKED",
                event = %event.name,
                kind = %event.kind,
                "An error happened while handling a ui event: {}",
                panic_message(payload.as_ref())
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "handler panicked"
    }
}
