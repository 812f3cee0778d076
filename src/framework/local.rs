//! In-process accessory framework
//!
//! Reference implementation of the [`Framework`] boundary: owns the
//! device objects, dispatches get/set/identify events to the bound
//! delegate, and keeps a JSON device cache on disk so previously
//! registered devices come back through the restore path at startup.
//! The real pairing/wire machinery of a full accessory stack is outside
//! this repository; everything the synchronization engine observes is
//! reproduced here, including the re-entrant change notification that
//! `set_value` triggers.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::accessory::Label;
use crate::error::BridgeError;

use super::catalog::{CharacteristicId, CharacteristicProps};
use super::service::{InputSource, ServiceKind};
use super::{AccessoryDelegate, AccessoryInfo, CachedAccessory, DeviceHandle, Framework, InfoUpdate};

/// Cached characteristic: name plus the bounds in effect (catalog defaults
/// or per-device overrides).
#[derive(Debug, Serialize, Deserialize)]
struct CachedCharacteristic {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_value: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    name: String,
    service: ServiceKind,
    #[serde(default)]
    input_sources: Vec<InputSource>,
    #[serde(default)]
    characteristics: Vec<CachedCharacteristic>,
}

struct Inner {
    devices: RwLock<BTreeMap<String, Arc<LocalDevice>>>,
    cache_path: Option<PathBuf>,
}

impl Inner {
    fn save_cache(&self) {
        let Some(path) = &self.cache_path else {
            return;
        };
        let entries: Vec<CacheEntry> = self
            .devices
            .read()
            .values()
            .map(|device| device.cache_entry())
            .collect();
        match serde_json::to_string_pretty(&entries) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    warn!("failed to write device cache {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("failed to serialize device cache: {}", e),
        }
    }

    fn load_cache(path: &std::path::Path) -> Vec<CacheEntry> {
        match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("ignoring malformed device cache {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        }
    }
}

/// In-process framework. Clonable; all clones share the same device set.
#[derive(Clone)]
pub struct LocalFramework {
    inner: Arc<Inner>,
}

impl LocalFramework {
    /// Framework without a device cache (tests, ephemeral runs).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                devices: RwLock::new(BTreeMap::new()),
                cache_path: None,
            }),
        }
    }

    /// Framework backed by a JSON device cache. Devices present in the
    /// cache are recreated immediately and surface through
    /// [`Framework::cached_devices`].
    pub fn with_cache(path: PathBuf) -> Self {
        let entries = Inner::load_cache(&path);
        let framework = Self {
            inner: Arc::new(Inner {
                devices: RwLock::new(BTreeMap::new()),
                cache_path: Some(path),
            }),
        };
        for entry in entries {
            let device = LocalDevice::from_cache(&framework.inner, &entry);
            framework
                .inner
                .devices
                .write()
                .insert(entry.name, Arc::new(device));
        }
        let restored = framework.inner.devices.read().len();
        if restored > 0 {
            info!("device cache: {} accessories restored", restored);
        }
        framework
    }

    pub fn device(&self, name: &str) -> Option<Arc<LocalDevice>> {
        self.inner.devices.read().get(name).cloned()
    }

    /// Simulate a framework client reading a characteristic (delivers the
    /// read event to the delegate and returns its cached answer, `None`
    /// meaning "not currently available").
    pub fn read_characteristic(&self, name: &str, c: CharacteristicId) -> Option<Value> {
        let delegate = self.device(name)?.delegate()?;
        delegate.read(c)
    }

    /// Simulate a local user write through the framework (no update
    /// context, as for a genuine client-originated change). Characteristics
    /// without the paired-write permission never deliver set events.
    pub fn write_characteristic(&self, name: &str, c: CharacteristicId, value: Value) {
        let Some(device) = self.device(name) else {
            return;
        };
        if !device.props(c).is_some_and(|p| p.writable()) {
            warn!("framework: '{}' {} is not writable", name, c);
            return;
        }
        if let Some(delegate) = device.delegate() {
            delegate.write(c, value, None);
        }
    }

    /// Deliver an identify event for a device.
    pub fn identify(&self, name: &str) {
        if let Some(delegate) = self.device(name).and_then(|d| d.delegate()) {
            delegate.identify();
        }
    }
}

impl Default for LocalFramework {
    fn default() -> Self {
        Self::new()
    }
}

impl Framework for LocalFramework {
    fn register_device(
        &self,
        name: &str,
        service: ServiceKind,
        input_sources: Vec<InputSource>,
    ) -> Result<Arc<dyn DeviceHandle>, BridgeError> {
        let device = {
            let mut devices = self.inner.devices.write();
            if devices.contains_key(name) {
                return Err(BridgeError::DuplicateName(name.to_string()));
            }
            let device = Arc::new(LocalDevice::new(&self.inner, name, service, input_sources));
            devices.insert(name.to_string(), device.clone());
            device
        };
        debug!("framework: registered '{}' as {}", name, service);
        self.inner.save_cache();
        Ok(device)
    }

    fn unregister_device(&self, name: &str) {
        let removed = self.inner.devices.write().remove(name);
        if removed.is_some() {
            debug!("framework: unregistered '{}'", name);
            self.inner.save_cache();
        }
    }

    fn cached_devices(&self) -> Vec<CachedAccessory> {
        self.inner
            .devices
            .read()
            .values()
            .map(|device| CachedAccessory {
                name: device.name.clone(),
                service: device.service,
                handle: device.clone() as Arc<dyn DeviceHandle>,
            })
            .collect()
    }
}

/// One framework-side device object.
pub struct LocalDevice {
    name: String,
    service: ServiceKind,
    input_sources: Vec<InputSource>,
    exposed: RwLock<Vec<CharacteristicId>>,
    props: RwLock<BTreeMap<CharacteristicId, CharacteristicProps>>,
    info: RwLock<AccessoryInfo>,
    delegate: RwLock<Option<Weak<dyn AccessoryDelegate>>>,
    owner: Weak<Inner>,
}

impl LocalDevice {
    fn new(owner: &Arc<Inner>, name: &str, service: ServiceKind, input_sources: Vec<InputSource>) -> Self {
        let exposed: Vec<CharacteristicId> = service.characteristics().to_vec();
        let props = exposed.iter().map(|c| (*c, c.props())).collect();
        Self {
            name: name.to_string(),
            service,
            input_sources,
            exposed: RwLock::new(exposed),
            props: RwLock::new(props),
            info: RwLock::new(AccessoryInfo::default()),
            delegate: RwLock::new(None),
            owner: Arc::downgrade(owner),
        }
    }

    fn from_cache(owner: &Arc<Inner>, entry: &CacheEntry) -> Self {
        let device = Self::new(owner, &entry.name, entry.service, entry.input_sources.clone());
        {
            let mut exposed = device.exposed.write();
            let mut props = device.props.write();
            for cached in &entry.characteristics {
                let Some(c) = CharacteristicId::from_name(&cached.name) else {
                    continue;
                };
                if !exposed.contains(&c) {
                    exposed.push(c);
                    props.insert(c, c.props());
                }
                if let Some(entry) = props.get_mut(&c) {
                    if cached.min_value.is_some() {
                        entry.min_value = cached.min_value;
                    }
                    if cached.max_value.is_some() {
                        entry.max_value = cached.max_value;
                    }
                }
            }
        }
        device
    }

    fn cache_entry(&self) -> CacheEntry {
        let props = self.props.read();
        CacheEntry {
            name: self.name.clone(),
            service: self.service,
            input_sources: self.input_sources.clone(),
            characteristics: self
                .exposed
                .read()
                .iter()
                .map(|c| CachedCharacteristic {
                    name: c.name().to_string(),
                    min_value: props.get(c).and_then(|p| p.min_value),
                    max_value: props.get(c).and_then(|p| p.max_value),
                })
                .collect(),
        }
    }

    fn delegate(&self) -> Option<Arc<dyn AccessoryDelegate>> {
        self.delegate.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn input_sources(&self) -> &[InputSource] {
        &self.input_sources
    }

    fn save_cache(&self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.save_cache();
        }
    }
}

impl DeviceHandle for LocalDevice {
    fn service(&self) -> ServiceKind {
        self.service
    }

    fn characteristics(&self) -> Vec<CharacteristicId> {
        self.exposed.read().clone()
    }

    fn props(&self, characteristic: CharacteristicId) -> Option<CharacteristicProps> {
        self.props.read().get(&characteristic).copied()
    }

    fn enable_characteristic(&self, characteristic: CharacteristicId) -> bool {
        if !self
            .service
            .optional_characteristics()
            .contains(&characteristic)
        {
            return false;
        }
        {
            let mut exposed = self.exposed.write();
            if exposed.contains(&characteristic) {
                return true;
            }
            exposed.push(characteristic);
        }
        self.props
            .write()
            .insert(characteristic, characteristic.props());
        self.save_cache();
        true
    }

    fn override_props(
        &self,
        characteristic: CharacteristicId,
        min_value: Option<f64>,
        max_value: Option<f64>,
    ) {
        {
            let mut props = self.props.write();
            let Some(entry) = props.get_mut(&characteristic) else {
                return;
            };
            if min_value.is_some() {
                entry.min_value = min_value;
            }
            if max_value.is_some() {
                entry.max_value = max_value;
            }
        }
        self.save_cache();
    }

    fn bind_delegate(&self, delegate: Weak<dyn AccessoryDelegate>) {
        *self.delegate.write() = Some(delegate);
    }

    fn set_value(&self, characteristic: CharacteristicId, value: &Value, ctx: Option<&Label>) {
        debug!(
            "framework: '{}' {} <- {}",
            self.name, characteristic, value
        );
        // The framework's own change notification: delivered back through
        // the delegate's write path with the caller's update context, the
        // same round trip a paired client's write takes.
        if let Some(delegate) = self.delegate() {
            delegate.write(characteristic, value.clone(), ctx);
        }
    }

    fn info(&self) -> AccessoryInfo {
        self.info.read().clone()
    }

    fn update_info(&self, update: &InfoUpdate) -> bool {
        let mut info = self.info.write();
        let mut applied = false;
        if let Some(manufacturer) = &update.manufacturer {
            info.manufacturer = Some(manufacturer.clone());
            applied = true;
        }
        if let Some(model) = &update.model {
            info.model = Some(model.clone());
            applied = true;
        }
        if let Some(serial) = &update.serial_number {
            info.serial_number = Some(serial.clone());
            applied = true;
        }
        if let Some(firmware) = &update.firmware_revision {
            info.firmware_revision = Some(firmware.clone());
            applied = true;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_exposes_required_characteristics() {
        let framework = LocalFramework::new();
        let handle = framework
            .register_device("Lamp1", ServiceKind::Lightbulb, Vec::new())
            .unwrap();
        assert_eq!(handle.characteristics(), vec![CharacteristicId::On]);
        assert!(handle.props(CharacteristicId::On).is_some());
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let framework = LocalFramework::new();
        framework
            .register_device("Lamp1", ServiceKind::Switch, Vec::new())
            .unwrap();
        let err = framework
            .register_device("Lamp1", ServiceKind::Switch, Vec::new())
            .err()
            .unwrap();
        assert_eq!(err, BridgeError::DuplicateName("Lamp1".into()));
    }

    #[test]
    fn test_enable_optional_and_override() {
        let framework = LocalFramework::new();
        let handle = framework
            .register_device("Lamp1", ServiceKind::Lightbulb, Vec::new())
            .unwrap();
        assert!(handle.enable_characteristic(CharacteristicId::Brightness));
        // Not optional for a Lightbulb
        assert!(!handle.enable_characteristic(CharacteristicId::TargetPosition));

        handle.override_props(CharacteristicId::Brightness, None, Some(80.0));
        let props = handle.props(CharacteristicId::Brightness).unwrap();
        assert_eq!(props.max_value, Some(80.0));
        assert_eq!(props.min_value, Some(0.0));
    }

    #[test]
    fn test_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accessories.json");

        {
            let framework = LocalFramework::with_cache(path.clone());
            let handle = framework
                .register_device("Lamp1", ServiceKind::Lightbulb, Vec::new())
                .unwrap();
            handle.enable_characteristic(CharacteristicId::Brightness);
            handle.override_props(CharacteristicId::Brightness, None, Some(80.0));
            framework
                .register_device("Door1", ServiceKind::ContactSensor, Vec::new())
                .unwrap();
        }

        let reborn = LocalFramework::with_cache(path);
        let cached = reborn.cached_devices();
        assert_eq!(cached.len(), 2);

        let lamp = reborn.device("Lamp1").unwrap();
        assert!(lamp
            .characteristics()
            .contains(&CharacteristicId::Brightness));
        assert_eq!(
            lamp.props(CharacteristicId::Brightness).unwrap().max_value,
            Some(80.0)
        );
    }

    #[test]
    fn test_unregister_forgets_device() {
        let framework = LocalFramework::new();
        framework
            .register_device("Lamp1", ServiceKind::Switch, Vec::new())
            .unwrap();
        framework.unregister_device("Lamp1");
        assert!(framework.device("Lamp1").is_none());
        assert!(framework.cached_devices().is_empty());
    }
}
