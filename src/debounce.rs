//! Debounced outbound delivery for noisy analog characteristics
//!
//! Dragging a dimmer or thermostat slider produces a burst of writes; only
//! the last one matters to the remote system. Each (device, characteristic)
//! pair owns an epoch counter: scheduling bumps the epoch and arms a timer,
//! and a timer only fires its send if its epoch is still current when the
//! quiet window elapses. Distinct pairs never cancel each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::framework::catalog::CharacteristicId;
use crate::protocol::OutboundMsg;
use crate::server::Outbound;

/// Quiet interval before a coalesced send goes out.
pub const QUIET_WINDOW: Duration = Duration::from_millis(300);

/// Characteristics whose outbound commands are coalesced.
pub fn is_debounced(characteristic: CharacteristicId) -> bool {
    use CharacteristicId::*;
    matches!(
        characteristic,
        Brightness
            | TargetPosition
            | TargetHorizontalTiltAngle
            | TargetVerticalTiltAngle
            | TargetRelativeHumidity
            | TargetTemperature
    )
}

type SlotKey = (String, CharacteristicId);

/// Coalesces rapid repeated outbound commands per (device, characteristic).
#[derive(Clone)]
pub struct DebounceScheduler {
    slots: Arc<Mutex<HashMap<SlotKey, u64>>>,
    outbound: Outbound,
}

impl DebounceScheduler {
    pub fn new(outbound: Outbound) -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
            outbound,
        }
    }

    /// Send `msg` for (`name`, `characteristic`), coalescing it behind the
    /// quiet window when the characteristic is in the debounced set.
    /// Non-debounced characteristics go out immediately.
    pub fn send(&self, name: &str, characteristic: CharacteristicId, msg: OutboundMsg) {
        if !is_debounced(characteristic) {
            self.outbound.send(&msg);
            return;
        }

        let key: SlotKey = (name.to_string(), characteristic);
        let epoch = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.clone()).or_insert(0);
            *slot += 1;
            *slot
        };
        trace!("debounce {} {} epoch {}", key.0, characteristic, epoch);

        let slots = self.slots.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            tokio::time::sleep(QUIET_WINDOW).await;
            let current = slots.lock().get(&key).copied();
            if current == Some(epoch) {
                debug!("debounced send {} {}", key.0, key.1);
                outbound.send(&msg);
            } else {
                trace!("debounce {} {} epoch {} superseded", key.0, key.1, epoch);
            }
        });
    }
}
