//! Fakes for the router's collaborators, shared by the controller tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::anyhow;

use crate::config::Config;
use crate::controller::handler_registry::HandlerCatalog;
use crate::controller::router::{Collaborators, Router};
use crate::controller::traits::{Host, Renderer, ScheduledTask, Scheduler, WidgetHandler};
use crate::error::RouterError;
use crate::model::event::{CapabilitySet, Event, Widget};
use crate::model::tick::TickCounter;
use crate::util::stats::StatsCollector;

#[derive(Debug, Default)]
pub struct FakeHost {
    pub exiting: Cell<bool>,
    pub blocking: Cell<bool>,
    pub externalized: Cell<CapabilitySet>,
    pub fail_attach: Cell<bool>,
    pub attaches: RefCell<Vec<CapabilitySet>>,
    pub detaches: Cell<usize>,
    pub input: RefCell<Vec<String>>,
}

impl Host for FakeHost {
    fn is_exiting(&self) -> bool {
        self.exiting.get()
    }

    fn is_blocking(&self) -> bool {
        self.blocking.get()
    }

    fn externalized(&self) -> CapabilitySet {
        self.externalized.get()
    }

    fn attach(&self, capabilities: CapabilitySet) -> Result<(), RouterError> {
        if self.fail_attach.get() {
            return Err(RouterError::Attach("ui busy".into()));
        }
        self.attaches.borrow_mut().push(capabilities);
        Ok(())
    }

    fn detach(&self) {
        self.detaches.set(self.detaches.get() + 1);
    }

    fn feed_input(&self, keys: &str) {
        self.input.borrow_mut().push(keys.to_string());
    }
}

/// Scheduler whose "next safe tick" is whenever the test says so.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    tasks: RefCell<VecDeque<ScheduledTask>>,
}

impl ManualScheduler {
    pub fn scheduled(&self) -> Vec<ScheduledTask> {
        self.tasks.borrow().iter().copied().collect()
    }

    pub fn run_all(&self, router: &Router) -> Result<(), RouterError> {
        loop {
            let next = self.tasks.borrow_mut().pop_front();
            match next {
                Some(task) => router.run_scheduled(task)?,
                None => return Ok(()),
            }
        }
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, task: ScheduledTask) {
        self.tasks.borrow_mut().push_back(task);
    }
}

#[derive(Debug, Default)]
pub struct FakeRenderer {
    pub updates: Cell<usize>,
    pub echoes: Cell<usize>,
    pub fail: Cell<bool>,
    pub panic: Cell<bool>,
}

impl Renderer for FakeRenderer {
    fn update(&self) -> anyhow::Result<()> {
        self.updates.set(self.updates.get() + 1);
        if self.panic.get() {
            panic!("renderer state corrupted");
        }
        if self.fail.get() {
            return Err(anyhow!("renderer unavailable"));
        }
        Ok(())
    }

    fn echo_pending(&self) {
        self.echoes.set(self.echoes.get() + 1);
    }
}

type Hook = Rc<dyn Fn(&Event) -> anyhow::Result<()>>;

/// Records `"<name>:<kind>"` into a shared log and bumps the tick unless
/// told otherwise.
pub struct RecordingHandler {
    widget: Widget,
    types: &'static [&'static str],
    log: Rc<RefCell<Vec<String>>>,
    tick: TickCounter,
    pub bump: Cell<bool>,
    pub setups: Cell<usize>,
    hook: RefCell<Option<Hook>>,
}

impl RecordingHandler {
    pub fn new(
        widget: Widget,
        types: &'static [&'static str],
        log: Rc<RefCell<Vec<String>>>,
        tick: TickCounter,
    ) -> Rc<Self> {
        Rc::new(Self {
            widget,
            types,
            log,
            tick,
            bump: Cell::new(true),
            setups: Cell::new(0),
            hook: RefCell::new(None),
        })
    }

    /// Extra behaviour run after recording, e.g. re-entering the router.
    pub fn set_hook<F>(&self, hook: F)
    where
        F: Fn(&Event) -> anyhow::Result<()> + 'static,
    {
        *self.hook.borrow_mut() = Some(Rc::new(hook));
    }
}

impl WidgetHandler for RecordingHandler {
    fn widget(&self) -> Widget {
        self.widget
    }

    fn event_types(&self) -> &'static [&'static str] {
        self.types
    }

    fn setup(&self) -> anyhow::Result<()> {
        self.setups.set(self.setups.get() + 1);
        Ok(())
    }

    fn handle(&self, event: &Event) -> anyhow::Result<()> {
        self.log
            .borrow_mut()
            .push(format!("{}:{}", event.name, event.kind));

        if self.bump.get() {
            self.tick.bump();
        }

        let hook = self.hook.borrow().clone();
        match hook {
            Some(hook) => hook(event),
            None => Ok(()),
        }
    }
}

pub const MSG_TYPES: &[&str] = &["show", "clear", "ruler", "showmode", "history_show"];
pub const CMDLINE_TYPES: &[&str] = &["show", "hide", "pos"];
pub const POPUPMENU_TYPES: &[&str] = &["show", "select", "hide"];

pub struct Fixture<S = ManualScheduler> {
    pub router: Router,
    pub host: Rc<FakeHost>,
    pub scheduler: Rc<S>,
    pub renderer: Rc<FakeRenderer>,
    pub ticks: TickCounter,
    pub stats: StatsCollector,
    pub log: Rc<RefCell<Vec<String>>>,
    pub msg: Rc<RecordingHandler>,
    pub cmdline: Rc<RecordingHandler>,
    pub popupmenu: Rc<RecordingHandler>,
}

impl Fixture {
    pub fn new(config: Config) -> Self {
        Self::with_catalog(config, |_| true)
    }

    /// Only widgets for which `include` returns true get a catalog entry.
    pub fn with_catalog<F: Fn(Widget) -> bool>(config: Config, include: F) -> Self {
        Fixture::build(config, Rc::new(ManualScheduler::default()), include)
    }

    /// Default config, enabled, every widget attached.
    pub fn enabled() -> Self {
        let fixture = Self::new(Config::default());
        assert!(fixture.router.enable().unwrap());
        fixture
    }
}

impl<S: Scheduler + 'static> Fixture<S> {
    pub fn build<F: Fn(Widget) -> bool>(config: Config, scheduler: Rc<S>, include: F) -> Self {
        let host = Rc::new(FakeHost::default());
        let renderer = Rc::new(FakeRenderer::default());
        let ticks = TickCounter::new();
        let stats = StatsCollector::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let msg = RecordingHandler::new(Widget::Message, MSG_TYPES, Rc::clone(&log), ticks.clone());
        let cmdline =
            RecordingHandler::new(Widget::Cmdline, CMDLINE_TYPES, Rc::clone(&log), ticks.clone());
        let popupmenu = RecordingHandler::new(
            Widget::Popupmenu,
            POPUPMENU_TYPES,
            Rc::clone(&log),
            ticks.clone(),
        );

        let mut catalog = HandlerCatalog::new();
        for handler in [&msg, &cmdline, &popupmenu] {
            if include(handler.widget()) {
                catalog.register(Rc::clone(handler) as Rc<dyn WidgetHandler>);
            }
        }

        let router = Router::new(
            &config,
            catalog,
            Collaborators {
                host: Rc::clone(&host) as Rc<dyn Host>,
                scheduler: Rc::clone(&scheduler) as Rc<dyn Scheduler>,
                renderer: Rc::clone(&renderer) as Rc<dyn Renderer>,
                ticks: Rc::new(ticks.clone()),
                stats: Rc::new(stats.clone()),
            },
        );

        Self {
            router,
            host,
            scheduler,
            renderer,
            ticks,
            stats,
            log,
            msg,
            cmdline,
            popupmenu,
        }
    }

    pub fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn updates(&self) -> usize {
        self.renderer.updates.get()
    }
}
