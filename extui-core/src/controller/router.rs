//! Router: the ingestion gateway registered with the host, plus the
//! enable / disable / redirect lifecycle around it.
//!
//! `Router` is a cheap `Rc` handle. Handlers that trigger host activity keep a
//! clone and may call back into [`Router::ingest`] or
//! [`Router::run_scheduled`] while a drain is running; the queue, the
//! dispatcher state and the registry are all usable through `&self` for that
//! reason.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::{debug, info, trace, warn};

use crate::config::Config;
use crate::controller::dispatcher::{Dispatcher, try_update};
use crate::controller::event_queue::{EventQueue, QueuedEvent};
use crate::controller::handler_registry::{HandlerCatalog, HandlerRegistry, HandlerStats};
use crate::controller::traits::{
    Host, Renderer, ScheduledTask, Scheduler, StatsSink, TickSource,
};
use crate::error::RouterError;
use crate::model::dispatcher_state::DispatcherState;
use crate::model::event::{CapabilitySet, DeliveryContext, RawEvent};
use crate::util::diagnostics::Diagnostics;

/// Keys fed back to the host to dismiss a hit-enter prompt.
const CONFIRM_INPUT: &str = "<CR>";

/// Everything outside the router it talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub host: Rc<dyn Host>,
    pub scheduler: Rc<dyn Scheduler>,
    pub renderer: Rc<dyn Renderer>,
    pub ticks: Rc<dyn TickSource>,
    pub stats: Rc<dyn StatsSink>,
}

#[derive(Clone)]
pub struct Router {
    inner: Rc<RouterInner>,
}

struct RouterInner {
    requested: CapabilitySet,
    catalog: HandlerCatalog,
    registry: RefCell<HandlerRegistry>,
    queue: EventQueue,
    state: DispatcherState,
    dispatcher: Dispatcher,
    host: Rc<dyn Host>,
    scheduler: Rc<dyn Scheduler>,
    renderer: Rc<dyn Renderer>,
    diagnostics: Diagnostics,
    attached: Cell<bool>,
    swap_hook: Cell<bool>,
}

impl Router {
    pub fn new(config: &Config, catalog: HandlerCatalog, collaborators: Collaborators) -> Self {
        let Collaborators {
            host,
            scheduler,
            renderer,
            ticks,
            stats,
        } = collaborators;

        let dispatcher = Dispatcher::new(Rc::clone(&host), Rc::clone(&renderer), ticks, stats);

        Self {
            inner: Rc::new(RouterInner {
                requested: config.requested(),
                catalog,
                registry: RefCell::new(HandlerRegistry::empty()),
                queue: EventQueue::new(),
                state: DispatcherState::new(),
                dispatcher,
                host,
                scheduler,
                renderer,
                diagnostics: Diagnostics::new(config.debug, config.diagnostic_interval),
                attached: Cell::new(false),
                swap_hook: Cell::new(false),
            }),
        }
    }

    /* ========================== Ingestion ========================== */

    /// The host callback. Returns `true` when the event is claimed, which
    /// suppresses the host's default handling of it.
    ///
    /// Only a runaway reentrancy loop produces an error; every other failure
    /// is isolated to the event that caused it.
    pub fn ingest(&self, raw: RawEvent, context: DeliveryContext) -> Result<bool, RouterError> {
        let inner = &self.inner;

        if inner.state.is_halted() {
            trace!(event = %raw.name, "Router halted, ignoring ui event");
            return Ok(false);
        }

        if inner.host.is_exiting() {
            return Ok(true);
        }

        if !inner.attached.get() {
            return Ok(false);
        }

        if raw.is_return_prompt() {
            debug!(marker = "RETURN_PROMPT", "Confirming return prompt");
            inner.host.feed_input(CONFIRM_INPUT);
            return Ok(true);
        }

        let Some(handler) = inner.registry.borrow().resolve(&raw, &inner.diagnostics) else {
            return Ok(false);
        };
        let queued = QueuedEvent { handler, raw };

        match context {
            DeliveryContext::Fast => {
                if inner.queue.push_deferred(queued) {
                    inner.scheduler.schedule(ScheduledTask::DeferredFlush);
                }
            }

            DeliveryContext::Safe => {
                // Earlier fast deliveries go first.
                inner.queue.absorb_deferred();
                inner.queue.push(queued);

                if !inner.state.is_processing() {
                    self.drain()?;
                }
            }
        }

        Ok(true)
    }

    /// Entry point for continuations requested through the [`Scheduler`].
    pub fn run_scheduled(&self, task: ScheduledTask) -> Result<(), RouterError> {
        let inner = &self.inner;

        match task {
            ScheduledTask::DeferredFlush => {
                inner.queue.disarm();
                if inner.state.is_halted() {
                    return Ok(());
                }

                let moved = inner.queue.absorb_deferred();
                trace!(moved, "Deferred flush fired");

                // Runs even when a drain is already in progress further up
                // the stack; this is the one path that nests dispatch.
                if !inner.queue.is_empty() {
                    self.drain()?;
                }
                Ok(())
            }

            ScheduledTask::Enable => self.enable().map(|_| ()),
        }
    }

    fn drain(&self) -> Result<usize, RouterError> {
        let inner = &self.inner;

        match inner.dispatcher.drain(&inner.state, &inner.queue) {
            Err(err) if err.is_fatal() => {
                self.disable();
                Err(err)
            }
            other => other,
        }
    }

    /* ========================== Lifecycle ========================== */

    /// Rebuild the registry and attach to the host.
    ///
    /// Returns `Ok(false)` when nothing is left to externalize. On error the
    /// previous registry and attachment stay as they were.
    pub fn enable(&self) -> Result<bool, RouterError> {
        let inner = &self.inner;

        if let Some(depth) = inner.state.halted_at() {
            return Err(RouterError::FatalLoopDetected { depth });
        }

        let (delivery, registry) = HandlerRegistry::build(
            inner.requested,
            inner.host.externalized(),
            &inner.catalog,
            &inner.diagnostics,
        )?;

        if delivery.is_empty() {
            inner.diagnostics.warn("No extensions enabled");
            *inner.registry.borrow_mut() = registry;
            return Ok(false);
        }

        for handler in registry.enabled() {
            handler.setup().map_err(|e| {
                RouterError::invalid_handler(handler.widget(), format!("setup failed: {e:#}"))
            })?;
        }

        inner.host.attach(delivery)?;
        *inner.registry.borrow_mut() = registry;
        inner.attached.set(true);
        inner.swap_hook.set(true);

        info!(
            marker = "ROUTER_ENABLED",
            delivery = ?delivery.ext_options(),
            "Attached to host"
        );
        Ok(true)
    }

    /// Detach from the host. Safe to call when already detached.
    pub fn disable(&self) {
        let inner = &self.inner;

        if inner.attached.replace(false) {
            inner.swap_hook.set(false);
            inner.host.detach();
            info!(marker = "ROUTER_DISABLED", "Detached from host");
        }
    }

    /// Swap handler configuration mid-session without losing output:
    /// detach, flush pending echo output, re-attach on the next safe tick.
    pub fn redirect(&self) {
        let inner = &self.inner;

        self.disable();
        inner.renderer.echo_pending();
        inner.scheduler.schedule(ScheduledTask::Enable);
        debug!(marker = "ROUTER_REDIRECT", "Re-enable scheduled");
    }

    /// Host reported a conflicting swap file; get rendered state on screen
    /// before the host prompts.
    pub fn on_swap_exists(&self) {
        if self.inner.swap_hook.get() {
            try_update(self.inner.renderer.as_ref());
        }
    }

    /* ========================== Inspection ========================= */

    pub fn is_attached(&self) -> bool {
        self.inner.attached.get()
    }

    pub fn is_halted(&self) -> bool {
        self.inner.state.is_halted()
    }

    /// Current reentrancy depth; zero whenever the router is idle.
    pub fn depth(&self) -> u32 {
        self.inner.state.depth()
    }

    pub fn is_processing(&self) -> bool {
        self.inner.state.is_processing()
    }

    /// Events waiting in the main queue and in the deferred hand-off.
    pub fn pending(&self) -> (usize, usize) {
        (self.inner.queue.len(), self.inner.queue.deferred_len())
    }

    pub fn performance_report(&self) -> Vec<HandlerStats> {
        self.inner.registry.borrow().performance_report()
    }

    pub fn log_report(&self) {
        for stats in self.performance_report() {
            info!(
                marker = "HANDLER_STATS",
                widget = %stats.widget,
                events = stats.event_count,
                failures = stats.failure_count,
                avg_us = stats.average_processing_time.as_micros() as u64,
                "Handler statistics"
            );
        }

        let (pending, deferred) = self.pending();
        if pending + deferred > 0 {
            warn!(pending, deferred, "Events still queued");
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = &self.inner;
        f.debug_struct("Router")
            .field("attached", &inner.attached.get())
            .field("depth", &inner.state.depth())
            .field("processing", &inner.state.is_processing())
            .field("halted", &inner.state.is_halted())
            .field("queued", &inner.queue.len())
            .field("registry", &*inner.registry.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::controller::test_support::Fixture;
    use crate::model::dispatcher_state::MAX_REENTRANCY_DEPTH;
    use crate::model::event::Widget;

    fn safe(fixture: &Fixture, name: &str, kind: &str) -> bool {
        fixture
            .router
            .ingest(RawEvent::new(name, kind), DeliveryContext::Safe)
            .unwrap()
    }

    fn fast(fixture: &Fixture, name: &str, kind: &str) -> bool {
        fixture
            .router
            .ingest(RawEvent::new(name, kind), DeliveryContext::Fast)
            .unwrap()
    }

    /* --------------------------- lifecycle --------------------------- */

    #[test]
    fn test_enable_attaches_with_delivery_set() {
        let fixture = Fixture::new(Config::default());
        fixture
            .host
            .externalized
            .set(CapabilitySet::of(&[Widget::Popupmenu]));

        assert!(fixture.router.enable().unwrap());
        assert!(fixture.router.is_attached());
        assert_eq!(
            *fixture.host.attaches.borrow(),
            vec![CapabilitySet::of(&[Widget::Message, Widget::Cmdline])]
        );
        assert_eq!(fixture.msg.setups.get(), 1);
        assert_eq!(fixture.popupmenu.setups.get(), 0);

        // externalized elsewhere: dropped silently, not claimed
        assert!(!safe(&fixture, "popupmenu_show", ""));
        assert!(fixture.log().is_empty());
    }

    #[test]
    fn test_enable_without_deliverable_widgets_does_not_attach() {
        let fixture = Fixture::new(Config::default());
        fixture
            .host
            .externalized
            .set(CapabilitySet::of(&Widget::ALL));

        assert!(!fixture.router.enable().unwrap());
        assert!(!fixture.router.is_attached());
        assert!(fixture.host.attaches.borrow().is_empty());
    }

    #[test]
    fn test_enable_with_missing_handler_fails_without_attaching() {
        let fixture = Fixture::with_catalog(Config::default(), |widget| widget != Widget::Cmdline);

        let err = fixture.router.enable().unwrap_err();
        assert!(matches!(err, RouterError::MissingHandler(Widget::Cmdline)));
        assert!(!fixture.router.is_attached());
        assert!(fixture.host.attaches.borrow().is_empty());
        assert_eq!(fixture.msg.setups.get(), 0);
    }

    #[test]
    fn test_failed_rebuild_keeps_previous_attachment() {
        let fixture = Fixture::enabled();
        fixture.host.fail_attach.set(true);

        assert!(matches!(fixture.router.enable(), Err(RouterError::Attach(_))));
        assert!(fixture.router.is_attached());
        assert!(safe(&fixture, "msg_show", "echo"));
        assert_eq!(fixture.log(), vec!["msg_show:echo"]);
    }

    #[test]
    fn test_disable_is_idempotent() {
        let fixture = Fixture::enabled();

        fixture.router.disable();
        fixture.router.disable();

        assert!(!fixture.router.is_attached());
        assert_eq!(fixture.host.detaches.get(), 1);
        assert!(!safe(&fixture, "msg_show", "echo"));
        assert!(fixture.log().is_empty());
    }

    #[test]
    fn test_redirect_flushes_echo_and_reenables_on_next_tick() {
        let fixture = Fixture::enabled();

        fixture.router.redirect();
        assert!(!fixture.router.is_attached());
        assert_eq!(fixture.host.detaches.get(), 1);
        assert_eq!(fixture.renderer.echoes.get(), 1);
        assert_eq!(fixture.scheduler.scheduled(), vec![ScheduledTask::Enable]);

        fixture.scheduler.run_all(&fixture.router).unwrap();
        assert!(fixture.router.is_attached());
        assert_eq!(fixture.host.attaches.borrow().len(), 2);
        assert_eq!(fixture.msg.setups.get(), 2);
    }

    #[test]
    fn test_swap_hook_updates_only_while_enabled() {
        let fixture = Fixture::new(Config::default());
        fixture.router.on_swap_exists();
        assert_eq!(fixture.updates(), 0);

        fixture.router.enable().unwrap();
        fixture.router.on_swap_exists();
        assert_eq!(fixture.updates(), 1);

        fixture.renderer.fail.set(true);
        fixture.router.on_swap_exists();
        assert_eq!(fixture.updates(), 2);

        fixture.router.disable();
        fixture.router.on_swap_exists();
        assert_eq!(fixture.updates(), 2);
    }

    /* ----------------------- gateway and queue ----------------------- */

    #[test]
    fn test_safe_deliveries_are_fifo() {
        let fixture = Fixture::enabled();

        assert!(safe(&fixture, "cmdline_show", "a"));
        assert!(safe(&fixture, "msg_show", "b"));
        assert!(safe(&fixture, "popupmenu_select", "c"));
        assert!(safe(&fixture, "cmdline_hide", "d"));

        assert_eq!(
            fixture.log(),
            vec!["cmdline_show:a", "msg_show:b", "popupmenu_select:c", "cmdline_hide:d"]
        );
        assert_eq!(fixture.router.pending(), (0, 0));
        assert_eq!(fixture.router.depth(), 0);
        assert!(!fixture.router.is_processing());
    }

    #[test]
    fn test_msg_show_with_content_change_refreshes_once() {
        let fixture = Fixture::enabled();
        let raw = RawEvent::new("msg_show", "normal").with_payload([json!("hello")]);

        assert!(fixture.router.ingest(raw, DeliveryContext::Safe).unwrap());

        assert_eq!(fixture.log(), vec!["msg_show:normal"]);
        assert_eq!(fixture.updates(), 1);
        assert_eq!(fixture.stats.get("msg.skipped"), 0);
    }

    #[test]
    fn test_unchanged_tick_skips_refresh_and_counts_group() {
        let fixture = Fixture::enabled();
        fixture.cmdline.bump.set(false);

        safe(&fixture, "cmdline_pos", "");
        assert_eq!(fixture.updates(), 0);
        assert_eq!(fixture.stats.get("cmdline.skipped"), 1);

        safe(&fixture, "cmdline_pos", "");
        assert_eq!(fixture.stats.get("cmdline.skipped"), 2);
        assert_eq!(fixture.stats.get("msg.skipped"), 0);
    }

    #[test]
    fn test_one_refresh_per_changing_event() {
        let fixture = Fixture::enabled();
        fixture.msg.bump.set(false);

        // handler re-enters with two more changing events while draining
        let router = fixture.router.clone();
        fixture.msg.set_hook(move |event| {
            if event.kind == "burst" {
                router.ingest(RawEvent::new("cmdline_show", "1"), DeliveryContext::Safe)?;
                router.ingest(RawEvent::new("cmdline_show", "2"), DeliveryContext::Safe)?;
            }
            Ok(())
        });

        safe(&fixture, "msg_show", "burst");

        assert_eq!(fixture.log(), vec!["msg_show:burst", "cmdline_show:1", "cmdline_show:2"]);
        assert_eq!(fixture.updates(), 2);
        assert_eq!(fixture.stats.get("msg.skipped"), 1);
    }

    #[test]
    fn test_ruler_refresh_suppressed_unless_blocking() {
        let fixture = Fixture::enabled();

        assert!(safe(&fixture, "msg_ruler", ""));
        assert_eq!(fixture.log(), vec!["msg_ruler:"]);
        assert_eq!(fixture.updates(), 0);
        assert_eq!(fixture.stats.get("msg.skipped"), 0);

        safe(&fixture, "msg_show", "search_count");
        assert_eq!(fixture.updates(), 0);

        fixture.host.blocking.set(true);
        safe(&fixture, "msg_ruler", "");
        assert_eq!(fixture.updates(), 1);
    }

    #[test]
    fn test_return_prompt_is_confirmed_and_never_queued() {
        let fixture = Fixture::enabled();

        assert!(safe(&fixture, "msg_show", "return_prompt"));
        assert_eq!(*fixture.host.input.borrow(), vec!["<CR>"]);
        assert!(fixture.log().is_empty());
        assert_eq!(fixture.router.pending(), (0, 0));

        assert!(fast(&fixture, "msg_show", "return_prompt"));
        assert!(fixture.scheduler.scheduled().is_empty());
    }

    #[test]
    fn test_exiting_host_claims_events_without_handling() {
        let fixture = Fixture::enabled();
        fixture.host.exiting.set(true);

        assert!(safe(&fixture, "msg_show", "echo"));
        assert!(safe(&fixture, "msg_show", "return_prompt"));
        assert!(fast(&fixture, "cmdline_show", ""));

        assert!(fixture.log().is_empty());
        assert!(fixture.host.input.borrow().is_empty());
        assert_eq!(fixture.router.pending(), (0, 0));
    }

    #[test]
    fn test_exiting_does_not_cancel_queued_events() {
        let fixture = Fixture::enabled();

        fast(&fixture, "msg_show", "queued");
        fixture.host.exiting.set(true);
        fixture.scheduler.run_all(&fixture.router).unwrap();

        assert_eq!(fixture.log(), vec!["msg_show:queued"]);
    }

    #[test]
    fn test_unresolved_events_are_not_claimed() {
        let mut config = Config::default();
        config.debug = true;
        config.popupmenu.enabled = false;
        let fixture = Fixture::new(config);
        fixture.router.enable().unwrap();

        assert!(!safe(&fixture, "popupmenu_show", ""));
        assert!(!safe(&fixture, "tabline_update", ""));
        assert!(!safe(&fixture, "msg_unknown", ""));
        assert!(!safe(&fixture, "Grid_line", ""));

        assert!(fixture.log().is_empty());
        assert_eq!(fixture.router.pending(), (0, 0));
    }

    #[test]
    fn test_fast_deliveries_coalesce_into_one_flush() {
        let fixture = Fixture::enabled();

        assert!(fast(&fixture, "msg_show", "1"));
        assert!(fast(&fixture, "msg_show", "2"));
        assert!(fast(&fixture, "cmdline_show", "3"));

        assert!(fixture.log().is_empty());
        assert_eq!(fixture.router.pending(), (0, 3));
        assert_eq!(fixture.scheduler.scheduled(), vec![ScheduledTask::DeferredFlush]);

        fixture.scheduler.run_all(&fixture.router).unwrap();
        assert_eq!(fixture.log(), vec!["msg_show:1", "msg_show:2", "cmdline_show:3"]);
        assert_eq!(fixture.updates(), 3);

        // the flush re-arms for the next fast delivery
        fast(&fixture, "msg_clear", "");
        assert_eq!(fixture.scheduler.scheduled(), vec![ScheduledTask::DeferredFlush]);
    }

    #[test]
    fn test_deferred_batch_precedes_later_safe_delivery() {
        let fixture = Fixture::enabled();

        fast(&fixture, "msg_show", "fast1");
        fast(&fixture, "msg_show", "fast2");
        safe(&fixture, "cmdline_show", "sync");

        assert_eq!(fixture.log(), vec!["msg_show:fast1", "msg_show:fast2", "cmdline_show:sync"]);

        // the timer still fires, finds nothing, and is a no-op
        fixture.scheduler.run_all(&fixture.router).unwrap();
        assert_eq!(fixture.log().len(), 3);
        assert_eq!(fixture.updates(), 3);
    }

    #[test]
    fn test_reentrant_safe_ingest_joins_active_drain() {
        let fixture = Fixture::enabled();
        let depths = Rc::new(RefCell::new(Vec::new()));

        let seen = Rc::clone(&depths);
        let inner = fixture.router.clone();
        fixture.msg.set_hook(move |event| {
            seen.borrow_mut().push(inner.depth());
            if event.kind == "outer" {
                assert!(inner.ingest(RawEvent::new("msg_show", "inner"), DeliveryContext::Safe)?);
                // not delivered yet: the active drain picks it up after us
                assert_eq!(inner.pending(), (1, 0));
            }
            Ok(())
        });

        safe(&fixture, "msg_show", "outer");

        assert_eq!(fixture.log(), vec!["msg_show:outer", "msg_show:inner"]);
        assert_eq!(*depths.borrow(), vec![1, 1]);
    }

    /* ------------------------ failure isolation ------------------------ */

    #[test]
    fn test_handler_error_is_isolated() {
        let fixture = Fixture::enabled();
        fixture.msg.set_hook(|event| {
            if event.kind == "bad" {
                anyhow::bail!("cannot render");
            }
            Ok(())
        });

        safe(&fixture, "msg_show", "bad");
        safe(&fixture, "msg_show", "good");

        assert_eq!(fixture.log(), vec!["msg_show:bad", "msg_show:good"]);
        assert_eq!(fixture.router.depth(), 0);

        let report = fixture.router.performance_report();
        let msg = report.iter().find(|s| s.widget == Widget::Message).unwrap();
        assert_eq!(msg.event_count, 2);
        assert_eq!(msg.failure_count, 1);
    }

    #[test]
    fn test_handler_panic_is_isolated() {
        let fixture = Fixture::enabled();
        fixture.cmdline.set_hook(|event| {
            if event.kind == "boom" {
                panic!("index out of range");
            }
            Ok(())
        });

        fast(&fixture, "cmdline_show", "boom");
        fast(&fixture, "cmdline_show", "fine");
        fixture.scheduler.run_all(&fixture.router).unwrap();

        assert_eq!(fixture.log(), vec!["cmdline_show:boom", "cmdline_show:fine"]);
        assert_eq!(fixture.router.depth(), 0);
        assert!(!fixture.router.is_processing());
        assert!(!fixture.router.is_halted());
    }

    #[test]
    fn test_render_failure_is_isolated() {
        let fixture = Fixture::enabled();
        fixture.renderer.fail.set(true);

        assert!(safe(&fixture, "msg_show", "a"));
        assert!(safe(&fixture, "msg_show", "b"));

        assert_eq!(fixture.log().len(), 2);
        assert_eq!(fixture.updates(), 2);
    }

    #[test]
    fn test_render_panic_is_isolated() {
        let fixture = Fixture::enabled();
        fixture.renderer.panic.set(true);

        assert!(fast(&fixture, "msg_show", "queued"));
        assert!(safe(&fixture, "msg_show", "first"));

        assert_eq!(fixture.log(), vec!["msg_show:queued", "msg_show:first"]);
        assert_eq!(fixture.updates(), 2);
        assert_eq!(fixture.router.pending(), (0, 0));
        assert_eq!(fixture.router.depth(), 0);
        assert!(!fixture.router.is_processing());

        // the swap hook goes through the same guard
        fixture.router.on_swap_exists();
        assert_eq!(fixture.updates(), 3);
    }

    #[test]
    fn test_nested_loop_is_fatal_on_the_51st_entry() {
        let fixture = Fixture::enabled();
        let router = fixture.router.clone();
        let scheduler = Rc::clone(&fixture.scheduler);

        // every delivery queues another one from a fast context and then
        // pumps the scheduler, nesting one dispatch deeper each time
        fixture.msg.set_hook(move |_| {
            router.ingest(RawEvent::new("msg_show", "again"), DeliveryContext::Fast)?;
            scheduler.run_all(&router)?;
            Ok(())
        });

        let err = fixture
            .router
            .ingest(RawEvent::new("msg_show", "start"), DeliveryContext::Safe)
            .unwrap_err();

        assert!(matches!(err, RouterError::FatalLoopDetected { depth: 51 }));
        assert_eq!(fixture.log().len(), MAX_REENTRANCY_DEPTH as usize);
        assert!(fixture.router.is_halted());
        assert!(!fixture.router.is_attached());
        assert_eq!(fixture.host.detaches.get(), 1);
        assert_eq!(fixture.router.depth(), 0);
        assert!(!fixture.router.is_processing());
        assert_eq!(fixture.router.pending(), (0, 0));

        // nothing is processed afterwards
        assert!(!safe(&fixture, "msg_show", "after"));
        fixture.scheduler.run_all(&fixture.router).unwrap();
        assert_eq!(fixture.log().len(), MAX_REENTRANCY_DEPTH as usize);
        assert!(matches!(
            fixture.router.enable(),
            Err(RouterError::FatalLoopDetected { depth: 51 })
        ));
    }

    #[test]
    fn test_shallow_nesting_is_allowed() {
        let fixture = Fixture::enabled();
        let router = fixture.router.clone();
        let scheduler = Rc::clone(&fixture.scheduler);
        let max_depth = Rc::new(Cell::new(0));

        let seen = Rc::clone(&max_depth);
        fixture.msg.set_hook(move |event| {
            seen.set(seen.get().max(router.depth()));
            let n: u32 = event.kind.parse().unwrap_or(0);
            if n < 10 {
                router.ingest(
                    RawEvent::new("msg_show", &(n + 1).to_string()),
                    DeliveryContext::Fast,
                )?;
                scheduler.run_all(&router)?;
            }
            Ok(())
        });

        assert!(safe(&fixture, "msg_show", "0"));
        assert_eq!(fixture.log().len(), 11);
        assert_eq!(max_depth.get(), 11);
        assert_eq!(fixture.router.depth(), 0);
        assert!(!fixture.router.is_halted());
    }
}
