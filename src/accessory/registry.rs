//! Device registry
//!
//! Name → accessory mirror plus the framework-side handle, with name
//! uniqueness enforced. Creation goes through the external framework; a
//! failed registration never leaves a partial entry behind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::BridgeError;
use crate::framework::catalog::CharacteristicId;
use crate::framework::service::ServiceKind;
use crate::framework::{CachedAccessory, Framework, InfoUpdate};
use crate::protocol::{AccessorySummary, AddPayload};

use super::{AccessoryState, BridgeContext};

/// Registry of all devices known to the bridge.
pub struct AccessoryRegistry {
    framework: Arc<dyn Framework>,
    ctx: Arc<BridgeContext>,
    accessories: RwLock<HashMap<String, Arc<AccessoryState>>>,
}

impl AccessoryRegistry {
    pub fn new(framework: Arc<dyn Framework>, ctx: Arc<BridgeContext>) -> Arc<Self> {
        Arc::new(Self {
            framework,
            ctx,
            accessories: RwLock::new(HashMap::new()),
        })
    }

    pub fn get(&self, name: &str) -> Option<Arc<AccessoryState>> {
        self.accessories.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.accessories.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessories.read().is_empty()
    }

    /// Create a device from an `add` definition: register it with the
    /// framework, apply optional-characteristic enables and per-device
    /// props overrides from the definition, and bind the state mirror.
    pub fn add(&self, def: &AddPayload) -> Result<String, BridgeError> {
        if self.accessories.read().contains_key(&def.name) {
            return Err(BridgeError::DuplicateName(def.name.clone()));
        }
        let service = ServiceKind::from_name(&def.service)
            .ok_or_else(|| BridgeError::UnsupportedService(def.service.clone()))?;

        let handle =
            self.framework
                .register_device(&def.name, service, def.input_sources.clone())?;

        // Optional characteristics named in the definition, with "default"
        // keeping catalog props and an object narrowing the bounds
        for (key, val) in &def.characteristics {
            let Some(c) = CharacteristicId::from_name(key) else {
                continue;
            };
            handle.enable_characteristic(c);
            if let Some(obj) = val.as_object() {
                handle.override_props(
                    c,
                    obj.get("minValue").and_then(Value::as_f64),
                    obj.get("maxValue").and_then(Value::as_f64),
                );
            }
        }

        let state = AccessoryState::bind(def.name.clone(), service, handle, self.ctx.clone());
        self.accessories.write().insert(def.name.clone(), state);

        Ok(format!("accessory '{}' is added.", def.name))
    }

    /// Remove a device, capturing its serial number and model so the
    /// remote side can correlate the removal with a specific unit.
    #[allow(clippy::type_complexity)]
    pub fn remove(
        &self,
        name: &str,
    ) -> Result<(String, Option<String>, Option<String>), BridgeError> {
        let accessory = self
            .accessories
            .write()
            .remove(name)
            .ok_or_else(|| BridgeError::NotFound(name.to_string()))?;

        let info = accessory.info();
        self.framework.unregister_device(name);
        debug!("removeAccessory '{}'", name);

        Ok((
            format!("accessory '{}' is removed.", name),
            info.serial_number,
            info.model,
        ))
    }

    /// Rebind a device the framework restored from its own cache.
    /// A name collision here means ambiguous identity and aborts startup.
    pub fn restore(&self, cached: CachedAccessory) -> Result<(), BridgeError> {
        if self.accessories.read().contains_key(&cached.name) {
            return Err(BridgeError::DuplicateName(cached.name.clone()));
        }
        info!("restoring cached accessory '{}'", cached.name);
        let state = AccessoryState::bind(
            cached.name.clone(),
            cached.service,
            cached.handle,
            self.ctx.clone(),
        );
        self.accessories.write().insert(cached.name, state);
        Ok(())
    }

    /// Apply an identity-metadata update to a registered device.
    /// Returns (ack, message) for the response envelope.
    pub fn set_accessory_information(
        &self,
        name: &str,
        update: &InfoUpdate,
    ) -> Result<(bool, String), BridgeError> {
        let accessory = self
            .get(name)
            .ok_or_else(|| BridgeError::AccessoryUndefined(name.to_string()))?;

        if accessory.update_info(update) {
            Ok((
                true,
                format!("accessory '{}', accessoryinformation is set.", name),
            ))
        } else {
            Ok((
                false,
                format!("accessory '{}', accessoryinformation properties undefined.", name),
            ))
        }
    }

    /// Metadata defaults for a fresh device: plugin identity as
    /// manufacturer, version string as model, current date truncated to the
    /// minute as serial, numeric version as firmware revision.
    pub fn default_info(&self, def: &AddPayload) -> InfoUpdate {
        let plugin = &self.ctx.plugin;
        InfoUpdate {
            manufacturer: def
                .manufacturer
                .clone()
                .or_else(|| Some(plugin.name.clone())),
            model: def.model.clone().or_else(|| Some(format!("v{}", plugin.version))),
            serial_number: def
                .serial_number
                .clone()
                .or_else(|| Some(Utc::now().format("%Y-%m-%dT%H:%M").to_string())),
            firmware_revision: def
                .firmware_revision
                .clone()
                .or_else(|| Some(plugin.version.clone())),
        }
    }

    /// Serializable summary: every device for `None`, or a single named
    /// device augmented with its serial number.
    pub fn describe(
        &self,
        name: Option<&str>,
    ) -> Result<BTreeMap<String, AccessorySummary>, BridgeError> {
        let mut out = BTreeMap::new();
        match name {
            None => {
                for (name, accessory) in self.accessories.read().iter() {
                    out.insert(name.clone(), accessory.summary(false));
                }
            }
            Some(name) => {
                let accessory = self
                    .get(name)
                    .ok_or_else(|| BridgeError::UnknownName(name.to_string()))?;
                out.insert(name.to_string(), accessory.summary(true));
            }
        }
        Ok(out)
    }
}
