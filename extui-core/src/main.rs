//! src/main.rs
//! Replays recorded ui callbacks through the router and reports what happened.
//!
//! Input is one JSON object per line on stdin:
//! `{"event": "msg_show", "kind": "echo", "payload": ["hi"], "fast": false}`
//! or `{"control": "redirect"}`.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result, bail};
use compact_str::CompactString;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use extui_core::{
    Config, RouterError, init_logging, install_panic_hook,
    controller::{
        Collaborators, EventLoop, HandlerCatalog, Host, HostMessage, LoopScheduler, LoopSummary,
        Renderer, Router, Scheduler, WidgetHandler,
    },
    model::{CapabilitySet, DeliveryContext, Event, RawEvent, TickCounter, Widget},
    util::{StatsCollector, StatsSnapshot},
};

const MSG_TYPES: &[&str] = &[
    "show",
    "clear",
    "showmode",
    "showcmd",
    "ruler",
    "history_show",
    "history_clear",
];
const CMDLINE_TYPES: &[&str] = &[
    "show",
    "hide",
    "pos",
    "special_char",
    "block_show",
    "block_append",
    "block_hide",
];
const POPUPMENU_TYPES: &[&str] = &["show", "select", "hide"];

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::load_from(Path::new(&path)).await,
        None => Config::load().await,
    }
    .context("Failed to load configuration")?;

    let _log_guard = init_logging(config.logging.clone(), config.debug)
        .context("Failed to initialize logging")?;
    install_panic_hook();
    info!("Starting ui event replay");

    let ticks = TickCounter::new();
    let stats = StatsCollector::new();
    let renderer = Rc::new(ReplayRenderer::default());
    let scheduler = LoopScheduler::new();

    let router = Router::new(
        &config,
        demo_catalog(&ticks),
        Collaborators {
            host: Rc::new(ReplayHost),
            scheduler: Rc::clone(&scheduler) as Rc<dyn Scheduler>,
            renderer: Rc::clone(&renderer) as Rc<dyn Renderer>,
            ticks: Rc::new(ticks),
            stats: Rc::new(stats.clone()),
        },
    );

    if !router.enable().context("Failed to enable the router")? {
        bail!("Nothing to replay: every widget is disabled or already externalized");
    }

    let (event_loop, host_tx) = EventLoop::new(router, scheduler);
    let reader = tokio::spawn(read_host_messages(host_tx));

    let outcome = event_loop.run().await;

    // Shutdown or a fatal stop can leave stdin open.
    reader.abort();
    match reader.await {
        Ok(Ok(lines)) => info!(lines, "Stdin fully read"),
        Ok(Err(e)) => warn!("Stdin reader failed: {e:#}"),
        Err(e) if e.is_cancelled() => debug!("Stdin reader cancelled"),
        Err(e) => warn!("Stdin reader panicked: {e}"),
    }

    let summary = outcome.context("Event loop stopped")?;
    let report = ReplayReport {
        summary,
        redraws: renderer.redraws.get(),
        stats: stats.snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("Replay finished");
    Ok(())
}

#[derive(Debug, Serialize)]
struct ReplayReport {
    summary: LoopSummary,
    redraws: u64,
    stats: StatsSnapshot,
}

/* ============================ Input ============================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Control {
    Redirect,
    SwapExists,
    Shutdown,
}

#[derive(Debug, Deserialize)]
struct ReplayLine {
    #[serde(default)]
    event: Option<CompactString>,
    #[serde(default)]
    kind: CompactString,
    #[serde(default)]
    payload: Vec<Value>,
    #[serde(default)]
    fast: bool,
    #[serde(default)]
    control: Option<Control>,
}

impl ReplayLine {
    fn into_message(self) -> Result<HostMessage> {
        if let Some(control) = self.control {
            return Ok(match control {
                Control::Redirect => HostMessage::Redirect,
                Control::SwapExists => HostMessage::SwapExists,
                Control::Shutdown => HostMessage::Shutdown,
            });
        }

        let Some(name) = self.event else {
            bail!("line has neither \"event\" nor \"control\"");
        };

        let context = if self.fast {
            DeliveryContext::Fast
        } else {
            DeliveryContext::Safe
        };

        Ok(HostMessage::Event {
            raw: RawEvent {
                name,
                kind: self.kind,
                payload: self.payload.into_iter().collect(),
            },
            context,
        })
    }
}

/// Forward stdin lines until EOF; dropping the sender ends the event loop.
async fn read_host_messages(host_tx: mpsc::UnboundedSender<HostMessage>) -> Result<u64> {
    let mut lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new());
    let mut line_no = 0u64;

    while let Some(line) = lines.next().await {
        let line = line.context("Failed to read stdin")?;
        line_no += 1;

        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let message = serde_json::from_str::<ReplayLine>(trimmed)
            .map_err(anyhow::Error::from)
            .and_then(ReplayLine::into_message);

        match message {
            Ok(message) => {
                if host_tx.send(message).is_err() {
                    debug!(line_no, "Event loop gone, stop reading");
                    break;
                }
            }
            Err(e) => warn!(line_no, "Skipping malformed line: {e:#}"),
        }
    }

    Ok(line_no)
}

/* ======================= Demo collaborators ===================== */

/// Host stand-in: accepts every attach and prints fed input.
struct ReplayHost;

impl Host for ReplayHost {
    fn is_exiting(&self) -> bool {
        false
    }

    fn is_blocking(&self) -> bool {
        false
    }

    fn externalized(&self) -> CapabilitySet {
        CapabilitySet::empty()
    }

    fn attach(&self, capabilities: CapabilitySet) -> Result<(), RouterError> {
        info!(options = ?capabilities.ext_options(), "Host attach");
        Ok(())
    }

    fn detach(&self) {
        info!("Host detach");
    }

    fn feed_input(&self, keys: &str) {
        println!("> input {keys}");
    }
}

#[derive(Debug, Default)]
struct ReplayRenderer {
    redraws: Cell<u64>,
}

impl Renderer for ReplayRenderer {
    fn update(&self) -> anyhow::Result<()> {
        self.redraws.set(self.redraws.get() + 1);
        println!("~ redraw #{}", self.redraws.get());
        Ok(())
    }

    fn echo_pending(&self) {
        debug!("Nothing buffered to echo");
    }
}

/// Prints each event it receives and reports a state change.
struct EchoHandler {
    widget: Widget,
    event_types: &'static [&'static str],
    ticks: TickCounter,
}

impl WidgetHandler for EchoHandler {
    fn widget(&self) -> Widget {
        self.widget
    }

    fn event_types(&self) -> &'static [&'static str] {
        self.event_types
    }

    fn handle(&self, event: &Event) -> anyhow::Result<()> {
        println!(
            "[{}] {} kind={:?} payload={}",
            event.group,
            event.event_type,
            event.kind.as_str(),
            serde_json::to_string(&event.payload)?
        );
        self.ticks.bump();
        Ok(())
    }
}

fn demo_catalog(ticks: &TickCounter) -> HandlerCatalog {
    [
        (Widget::Message, MSG_TYPES),
        (Widget::Cmdline, CMDLINE_TYPES),
        (Widget::Popupmenu, POPUPMENU_TYPES),
    ]
    .into_iter()
    .fold(HandlerCatalog::new(), |catalog, (widget, event_types)| {
        catalog.with(Rc::new(EchoHandler {
            widget,
            event_types,
            ticks: ticks.clone(),
        }))
    })
}
