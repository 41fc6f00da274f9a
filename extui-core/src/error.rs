//! src/error.rs
//! ============================================================================
//! # `RouterError`: Unified Error Type for the UI Event Router
//!
//! Setup failures (missing or malformed handlers, host attach failures,
//! configuration problems) and the single fatal runtime condition, a
//! reentrancy loop, are all reported through this enum. Per-event handler
//! failures never surface here: the dispatch cycle isolates and logs them.

use std::{io, path::PathBuf};
use thiserror::Error;

use crate::model::event::Widget;

/// Unified error type for router setup and dispatch.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Configuration requests a widget but no handler module is available.
    #[error("No handler available for the {0} widget")]
    MissingHandler(Widget),

    /// A handler failed registration-time validation.
    #[error("Invalid handler for {widget}: {reason}")]
    InvalidHandler { widget: Widget, reason: String },

    /// The host rejected the attach request.
    #[error("Failed to attach to host: {0}")]
    Attach(String),

    /// Dispatch re-entered itself more often than the hard ceiling allows.
    #[error("Event loop detected: dispatch depth reached {depth}")]
    FatalLoopDetected { depth: u32 },

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// TOML config serialization error.
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    /// Config file I/O error with path.
    #[error("Failed to access config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl RouterError {
    /// Create a handler validation error
    pub fn invalid_handler<S: Into<String>>(widget: Widget, reason: S) -> Self {
        Self::InvalidHandler {
            widget,
            reason: reason.into(),
        }
    }

    /// Create a config I/O error for the given path
    pub fn config_io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }

    /// True for the one condition that must stop the owning event loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalLoopDetected { .. })
    }
}
