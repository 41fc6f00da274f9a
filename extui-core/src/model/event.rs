//! Event model: widget groups, capability sets and the records that travel
//! from the host callback to the widget handlers.

use std::fmt;

use compact_str::CompactString;
use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

/// Trailing callback arguments. Most UI events carry a handful of values.
pub type Payload = SmallVec<[Value; 4]>;

/// Host event name that carries message output.
pub const MSG_SHOW: &str = "msg_show";

/// `msg_show` kind the host uses to ask for a hit-enter confirmation.
pub const RETURN_PROMPT: &str = "return_prompt";

/// Ruler updates; frequent and cheap to delay.
pub const MSG_RULER: &str = "msg_ruler";

/// `msg_show` kind for the `[1/5]` search counter.
pub const SEARCH_COUNT: &str = "search_count";

/// UI surfaces that can be externalized from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Widget {
    Message,
    Cmdline,
    Popupmenu,
}

impl Widget {
    pub const ALL: [Widget; 3] = [Widget::Message, Widget::Cmdline, Widget::Popupmenu];

    /// Event-name prefix the host uses for this widget.
    pub const fn group(self) -> &'static str {
        match self {
            Widget::Message => "msg",
            Widget::Cmdline => "cmdline",
            Widget::Popupmenu => "popupmenu",
        }
    }

    /// Attach option that asks the host to externalize this widget.
    pub const fn ext_option(self) -> &'static str {
        match self {
            Widget::Message => "ext_messages",
            Widget::Cmdline => "ext_cmdline",
            Widget::Popupmenu => "ext_popupmenu",
        }
    }

    /// Event types every handler for this widget must accept.
    pub const fn required_types(self) -> &'static [&'static str] {
        match self {
            Widget::Message => &["show", "clear"],
            Widget::Cmdline => &["show", "hide"],
            Widget::Popupmenu => &["show", "select", "hide"],
        }
    }

    pub fn from_group(group: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|w| w.group() == group)
    }
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.group())
    }
}

/// Per-widget flag set. Used for the delivery set handed to the host and for
/// the widgets the host reports as already externalized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet(EnumMap<Widget, bool>);

impl CapabilitySet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(widgets: &[Widget]) -> Self {
        let mut set = Self::empty();
        for &widget in widgets {
            set.insert(widget);
        }
        set
    }

    pub fn insert(&mut self, widget: Widget) {
        self.0[widget] = true;
    }

    pub fn contains(&self, widget: Widget) -> bool {
        self.0[widget]
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|enabled| !enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = Widget> + '_ {
        self.0
            .iter()
            .filter_map(|(widget, &enabled)| enabled.then_some(widget))
    }

    /// Host attach options, e.g. `["ext_messages", "ext_cmdline"]`.
    pub fn ext_options(&self) -> Vec<&'static str> {
        self.iter().map(Widget::ext_option).collect()
    }
}

/// `"<group>_<type>"` split on the first underscore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventName {
    pub group: CompactString,
    pub event_type: CompactString,
}

impl EventName {
    /// Returns `None` unless the group is non-empty lower-case ASCII alphabetic.
    pub fn parse(name: &str) -> Option<Self> {
        let (group, event_type) = name.split_once('_').unwrap_or((name, ""));

        if group.is_empty() || !group.bytes().all(|b| b.is_ascii_lowercase()) {
            return None;
        }

        Some(Self {
            group: CompactString::new(group),
            event_type: CompactString::new(event_type),
        })
    }

    /// Handler method name this event would be routed to.
    pub fn method(&self) -> CompactString {
        compact_str::format_compact!("on_{}", self.event_type)
    }
}

/// The callback arguments exactly as the host delivered them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub name: CompactString,
    #[serde(default)]
    pub kind: CompactString,
    #[serde(default)]
    pub payload: Payload,
}

impl RawEvent {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: CompactString::new(name),
            kind: CompactString::new(kind),
            payload: Payload::new(),
        }
    }

    #[must_use]
    pub fn with_payload<I: IntoIterator<Item = Value>>(mut self, values: I) -> Self {
        self.payload.extend(values);
        self
    }

    pub fn is_return_prompt(&self) -> bool {
        self.name == MSG_SHOW && self.kind == RETURN_PROMPT
    }
}

/// What a handler receives: the raw callback plus the parsed name.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: CompactString,
    pub group: CompactString,
    pub event_type: CompactString,
    pub kind: CompactString,
    pub payload: Payload,
}

impl Event {
    pub fn new(name: EventName, raw: RawEvent) -> Self {
        Self {
            name: raw.name,
            group: name.group,
            event_type: name.event_type,
            kind: raw.kind,
            payload: raw.payload,
        }
    }

    /// Ruler and search-count updates change state constantly while typing;
    /// redrawing for them is deferred unless the host waits on input.
    pub fn is_low_priority(&self) -> bool {
        self.name == MSG_RULER || self.kind == SEARCH_COUNT
    }
}

/// Where the host callback is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryContext {
    /// Main synchronous path; host state may be mutated.
    #[default]
    Safe,

    /// Signal-like delivery; mutation must wait for the next safe tick.
    Fast,
}
