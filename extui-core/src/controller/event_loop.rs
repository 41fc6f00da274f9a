//! ``src/controller/event_loop.rs``
//! ============================================================================
//! # Event Loop
//!
//! Async driver that owns a [`Router`] and feeds it host callbacks received
//! over a channel. Continuations the router schedules are queued in a
//! [`LoopScheduler`] and run before the next host message is read, which is
//! what "next safe tick" means for this driver.
//!
//! The router is single-threaded, so the loop future is `!Send`; run it on a
//! current-thread runtime or inside a `LocalSet`.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use serde::Serialize;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, error, info, trace, warn};

use crate::controller::router::Router;
use crate::controller::traits::{ScheduledTask, Scheduler};
use crate::error::RouterError;
use crate::model::event::{DeliveryContext, RawEvent};

/// What the host side of the channel can send.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    /// A ui callback.
    Event {
        raw: RawEvent,
        context: DeliveryContext,
    },

    /// The host found a conflicting swap file.
    SwapExists,

    /// Reconfigure handlers without losing pending output.
    Redirect,

    Shutdown,
}

/// Scheduler backed by the loop: tasks wait here until the loop wakes up.
#[derive(Debug, Default)]
pub struct LoopScheduler {
    tasks: RefCell<VecDeque<ScheduledTask>>,
    wake: Notify,
}

impl LoopScheduler {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Everything scheduled so far. Tasks scheduled while these run wait for
    /// the following tick.
    fn take(&self) -> Vec<ScheduledTask> {
        self.tasks.borrow_mut().drain(..).collect()
    }
}

impl Scheduler for LoopScheduler {
    fn schedule(&self, task: ScheduledTask) {
        self.tasks.borrow_mut().push_back(task);
        self.wake.notify_one();
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub messages: u64,
    pub claimed: u64,
    pub unclaimed: u64,
    pub scheduled_runs: u64,
}

pub struct EventLoop {
    router: Router,
    scheduler: Rc<LoopScheduler>,
    host_rx: mpsc::UnboundedReceiver<HostMessage>,
    summary: LoopSummary,
}

impl EventLoop {
    /// `scheduler` must be the one the router was built with.
    pub fn new(
        router: Router,
        scheduler: Rc<LoopScheduler>,
    ) -> (Self, mpsc::UnboundedSender<HostMessage>) {
        let (host_tx, host_rx) = mpsc::unbounded_channel();
        let event_loop = Self {
            router,
            scheduler,
            host_rx,
            summary: LoopSummary::default(),
        };
        (event_loop, host_tx)
    }

    /// Run until `Shutdown`, the channel closing, or a fatal loop.
    pub async fn run(mut self) -> Result<LoopSummary, RouterError> {
        info!(marker = "EVENT_LOOP_START", "Event loop started");

        loop {
            tokio::select! {
                biased;

                _ = self.scheduler.wake.notified() => {
                    self.run_scheduled()?;
                }

                message = self.host_rx.recv() => {
                    match message {
                        Some(HostMessage::Shutdown) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Some(message) => self.handle(message)?,
                        None => {
                            debug!("Host channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Flush whatever the last message scheduled.
        self.run_scheduled()?;

        info!(
            marker = "EVENT_LOOP_STOP",
            messages = self.summary.messages,
            claimed = self.summary.claimed,
            "Event loop stopped"
        );
        self.router.log_report();
        Ok(self.summary)
    }

    fn handle(&mut self, message: HostMessage) -> Result<(), RouterError> {
        self.summary.messages += 1;

        match message {
            HostMessage::Event { raw, context } => {
                trace!(event = %raw.name, kind = %raw.kind, ?context, "Host event");
                match self.router.ingest(raw, context) {
                    Ok(true) => self.summary.claimed += 1,
                    Ok(false) => self.summary.unclaimed += 1,
                    Err(err) => {
                        error!(marker = "EVENT_LOOP_FATAL", "Stopping event loop: {err}");
                        return Err(err);
                    }
                }
            }
            HostMessage::SwapExists => self.router.on_swap_exists(),
            HostMessage::Redirect => self.router.redirect(),
            HostMessage::Shutdown => {}
        }
        Ok(())
    }

    fn run_scheduled(&mut self) -> Result<(), RouterError> {
        for task in self.scheduler.take() {
            self.summary.scheduled_runs += 1;

            match self.router.run_scheduled(task) {
                Ok(()) => {}
                Err(err) if err.is_fatal() => {
                    error!(marker = "EVENT_LOOP_FATAL", ?task, "Stopping event loop: {err}");
                    return Err(err);
                }
                Err(err) => warn!(?task, "Scheduled task failed: {err}"),
            }
        }
        Ok(())
    }
}
