//! Accessory GW - Rust implementation
//!
//! Bridges a single remote controller speaking JSON-over-WebSocket with a
//! smart-home accessory framework. The synchronization core keeps one
//! mirror per device in step with both update sources - local framework
//! writes and remote socket commands - while origin labels suppress echo
//! loops and a per-key debounce absorbs bursts from analog controls.

pub mod accessory;
pub mod config;
pub mod debounce;
pub mod error;
pub mod framework;
pub mod protocol;
pub mod router;
pub mod server;
pub mod value;

pub use accessory::{AccessoryRegistry, AccessoryState, BridgeContext};
pub use config::AppConfig;
pub use error::BridgeError;
pub use router::MessageRouter;
pub use server::Outbound;
