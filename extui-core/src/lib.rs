pub mod error;

pub mod config;

pub mod controller {
    pub mod traits;
    pub use traits::{Host, Renderer, ScheduledTask, Scheduler, StatsSink, TickSource, WidgetHandler};

    pub mod handler_registry;
    pub use handler_registry::{HandlerCatalog, HandlerRegistry, HandlerStats};

    pub mod event_queue;

    pub mod dispatcher;

    pub mod router;
    pub use router::{Collaborators, Router};

    pub mod event_loop;
    pub use event_loop::{EventLoop, HostMessage, LoopScheduler, LoopSummary};

    #[cfg(test)]
    pub mod test_support;
}

pub mod model {
    pub mod event;
    pub use event::{CapabilitySet, DeliveryContext, Event, EventName, RawEvent, Widget};

    pub mod dispatcher_state;
    pub use dispatcher_state::{DispatcherState, MAX_REENTRANCY_DEPTH};

    pub mod tick;
    pub use tick::TickCounter;
}

pub mod util {
    pub mod diagnostics;

    pub mod stats;
    pub use stats::{StatsCollector, StatsSnapshot};
}

pub mod logging;
pub use logging::{LoggerBuilder, LoggerConfig, init_logging, install_panic_hook};

pub use config::Config;

pub use error::RouterError;

pub use controller::{Router, WidgetHandler};
