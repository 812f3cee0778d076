//! Accessory framework boundary
//!
//! The bridge does not own device registration, pairing, or the wire
//! protocol to end-user clients; that belongs to the accessory framework.
//! This module pins down the contract the synchronization engine relies on:
//! a [`Framework`] that registers devices and hands back per-device
//! [`DeviceHandle`]s, and an [`AccessoryDelegate`] the bridge implements to
//! receive the framework's read/write/identify events as plain synchronous
//! calls.
//!
//! [`local::LocalFramework`] is the in-process implementation used by the
//! binary and the tests.

pub mod catalog;
pub mod local;
pub mod service;

use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::accessory::Label;
use crate::error::BridgeError;
use catalog::{CharacteristicId, CharacteristicProps};
use service::{InputSource, ServiceKind};

/// Identity metadata of a registered device.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessoryInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_revision: Option<String>,
}

/// Partial identity update; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InfoUpdate {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "serialnumber")]
    pub serial_number: Option<String>,
    #[serde(rename = "firmwarerevision")]
    pub firmware_revision: Option<String>,
}

impl InfoUpdate {
    pub fn is_empty(&self) -> bool {
        self.manufacturer.is_none()
            && self.model.is_none()
            && self.serial_number.is_none()
            && self.firmware_revision.is_none()
    }
}

/// Receiver for framework-originated events on one device.
///
/// The bridge's accessory mirror implements this. Calls arrive on the
/// framework's thread and must not block: `read` returns the cached value
/// (or `None` for never-set, which the framework maps to an explicit
/// "not currently available" signal, never a default), `write` records a
/// local user change and decides whether it goes back out on the socket.
pub trait AccessoryDelegate: Send + Sync {
    fn read(&self, characteristic: CharacteristicId) -> Option<Value>;
    fn write(&self, characteristic: CharacteristicId, value: Value, ctx: Option<&Label>);
    fn identify(&self);
}

/// Handle to one framework-side device object.
pub trait DeviceHandle: Send + Sync {
    fn service(&self) -> ServiceKind;

    /// Characteristics currently exposed on the bound service, in a stable
    /// order. The implicit "Name" characteristic is never listed.
    fn characteristics(&self) -> Vec<CharacteristicId>;

    /// Declared properties of an exposed characteristic.
    fn props(&self, characteristic: CharacteristicId) -> Option<CharacteristicProps>;

    /// Expose one of the service's optional characteristics. Returns false
    /// if the characteristic is not optional for this service.
    fn enable_characteristic(&self, characteristic: CharacteristicId) -> bool;

    /// Narrow the declared bounds of an exposed characteristic.
    fn override_props(&self, characteristic: CharacteristicId, min_value: Option<f64>, max_value: Option<f64>);

    /// Attach the delegate that receives get/set/identify events.
    fn bind_delegate(&self, delegate: Weak<dyn AccessoryDelegate>);

    /// Push a new value into the framework so its own clients see the
    /// change. `ctx` travels with the framework's change notification and
    /// comes back on the delegate's `write`, which is how the origin of a
    /// change survives the round trip.
    fn set_value(&self, characteristic: CharacteristicId, value: &Value, ctx: Option<&Label>);

    fn info(&self) -> AccessoryInfo;

    /// Apply an identity update. Returns true if any field was applied.
    fn update_info(&self, update: &InfoUpdate) -> bool;
}

/// A device the framework restored from its own cache at startup.
pub struct CachedAccessory {
    pub name: String,
    pub service: ServiceKind,
    pub handle: Arc<dyn DeviceHandle>,
}

/// Device registration surface of the accessory framework.
pub trait Framework: Send + Sync {
    fn register_device(
        &self,
        name: &str,
        service: ServiceKind,
        input_sources: Vec<InputSource>,
    ) -> Result<Arc<dyn DeviceHandle>, BridgeError>;

    fn unregister_device(&self, name: &str);

    /// Previously-registered devices, surfaced once during startup so the
    /// bridge can rebind its mirrors.
    fn cached_devices(&self) -> Vec<CachedAccessory>;
}
