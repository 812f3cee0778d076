//! Accessory mirror - per-device state synchronized with both update sources
//!
//! This module owns the in-process mirror of accessory state. Values arrive
//! from two independent directions (the framework's local writes and the
//! remote controller's socket messages) and every stored value carries a
//! label recording which side it came from, so an acknowledgment is never
//! mistaken for a fresh change.

mod registry;
mod state;

pub use registry::AccessoryRegistry;
pub use state::AccessoryState;

use chrono::Local;

use crate::debounce::DebounceScheduler;
use crate::server::Outbound;

/// Origin tag of a value change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// Local write through the accessory framework.
    Homekit,
    /// Remote write from the socket controller.
    Websocket,
    /// Caller-supplied tag for stores without a client-facing update.
    Tag(String),
}

impl Trigger {
    pub fn as_str(&self) -> &str {
        match self {
            Trigger::Homekit => "homekit",
            Trigger::Websocket => "websocket",
            Trigger::Tag(tag) => tag,
        }
    }

    /// Whether this trigger marks a remote-originated change. A local write
    /// carrying a remote trigger is the echo of a command already applied
    /// and must not be re-sent outbound.
    pub fn is_remote(&self) -> bool {
        match self {
            Trigger::Websocket => true,
            Trigger::Tag(tag) => tag.contains("websocket"),
            Trigger::Homekit => false,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Origin record of the most recent value: wall-clock time plus trigger.
/// Travels with framework notifications as update context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    /// HH:MM:SS local time of the change.
    pub timestamp: String,
    pub trigger: Trigger,
}

impl Label {
    pub fn now(trigger: Trigger) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S").to_string(),
            trigger,
        }
    }
}

/// Identity of this bridge, used when synthesizing metadata defaults.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
}

impl Default for PluginInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Shared wiring handed to every component at construction time.
///
/// Built once in `main` and passed by reference everywhere; there is no
/// ambient or static state in the crate.
pub struct BridgeContext {
    pub outbound: Outbound,
    pub debounce: DebounceScheduler,
    pub plugin: PluginInfo,
}

impl BridgeContext {
    pub fn new(outbound: Outbound) -> Self {
        Self {
            debounce: DebounceScheduler::new(outbound.clone()),
            outbound,
            plugin: PluginInfo::default(),
        }
    }
}
