//! Message router - inbound topic dispatch and outbound envelope building
//!
//! Stateless dispatch: each inbound envelope is parsed, validated and
//! routed to a registry operation, and the structured ack (if any) goes
//! back through the connection manager. The validation chain for value
//! writes runs in a fixed order and the first failing check decides the
//! error message.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::accessory::{AccessoryRegistry, AccessoryState, Trigger};
use crate::error::BridgeError;
use crate::framework::catalog::CharacteristicId;
use crate::protocol::{
    AddPayload, Envelope, GetPayload, InfoPayload, OutboundMsg, RemovePayload, ResponsePayload,
    SetPayload,
};
use crate::server::Outbound;
use crate::value::{coerce, display};

#[cfg(test)]
mod tests;

/// Routes inbound protocol envelopes to registry operations.
pub struct MessageRouter {
    registry: Arc<AccessoryRegistry>,
    outbound: Outbound,
}

impl MessageRouter {
    pub fn new(registry: Arc<AccessoryRegistry>, outbound: Outbound) -> Self {
        Self { registry, outbound }
    }

    /// Process one inbound frame to completion.
    pub fn handle_message(&self, raw: &str) {
        if raw.trim().is_empty() {
            debug!("ignoring empty frame");
            return;
        }
        let envelope: Envelope = match serde_json::from_str(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("unparseable frame: {}", e);
                return;
            }
        };

        match envelope.topic.as_str() {
            "add" | "addAccessory" => self.on_add(envelope.payload),
            "remove" | "removeAccessory" => self.on_remove(envelope.payload),
            "set" | "setValue" => self.on_set(envelope.payload),
            "setAccessories" => self.on_set_accessories(envelope.payload),
            "callback" => self.on_callback(envelope.payload),
            "get" | "getAccessory" | "getAccessories" => self.on_get(envelope.payload),
            other => {
                let err = BridgeError::UnknownTopic(other.to_string());
                warn!("onMessage {}", err);
                self.ack(false, err.to_string());
            }
        }
    }

    fn ack(&self, ack: bool, message: String) {
        self.outbound.send(&OutboundMsg::ack(ack, message));
    }

    fn on_add(&self, payload: Value) {
        let Some(def) = self.parse::<AddPayload>("add", payload) else {
            return;
        };
        match self.registry.add(&def) {
            Ok(message) => {
                info!("addAccessory {}", message);
                self.ack(true, message);
                // Follow-up metadata update with synthesized defaults for
                // whatever the definition left out; it acks separately.
                let defaults = self.registry.default_info(&def);
                match self.registry.set_accessory_information(&def.name, &defaults) {
                    Ok((ack, message)) => self.ack(ack, message),
                    Err(e) => self.ack(false, e.to_string()),
                }
            }
            Err(e) => {
                info!("addAccessory {}", e);
                self.ack(false, e.to_string());
            }
        }
    }

    fn on_remove(&self, payload: Value) {
        let Some(def) = self.parse::<RemovePayload>("remove", payload) else {
            return;
        };
        match self.registry.remove(&def.name) {
            Ok((message, serialnumber, model)) => {
                info!("removeAccessory {}", message);
                self.outbound.send(&OutboundMsg::Response(ResponsePayload {
                    ack: true,
                    message,
                    serialnumber,
                    service: model,
                }));
            }
            Err(e) => {
                info!("removeAccessory {}", e);
                self.ack(false, e.to_string());
            }
        }
    }

    fn on_set(&self, payload: Value) {
        let Some(def) = self.parse::<SetPayload>("set", payload) else {
            return;
        };
        debug!("setValue {} {}", def.name, def.characteristic);
        let result = self.validate(&def).and_then(|(accessory, c, value)| {
            accessory.set_from_trigger(Trigger::Websocket, c, &value)
        });
        // A successful remote set is acknowledged through the framework's
        // change notification, not with a response frame
        if let Err(e) = result {
            debug!("setValue {}", e);
            self.ack(false, e.to_string());
        }
    }

    fn on_callback(&self, payload: Value) {
        let Some(def) = self.parse::<SetPayload>("callback", payload) else {
            return;
        };
        debug!("callback {} {}", def.name, def.characteristic);
        let result = self
            .validate(&def)
            .and_then(|(accessory, c, value)| accessory.set_silently(c, &value));
        if let Err(e) = result {
            warn!("callback {}", e);
            self.ack(false, e.to_string());
        }
    }

    fn on_set_accessories(&self, payload: Value) {
        let Some(def) = self.parse::<InfoPayload>("setAccessories", payload) else {
            return;
        };
        debug!("setAccessories {}", def.name);
        match self
            .registry
            .set_accessory_information(&def.name, &def.update)
        {
            Ok((ack, message)) => self.ack(ack, message),
            Err(e) => self.ack(false, e.to_string()),
        }
    }

    fn on_get(&self, payload: Value) {
        let def: GetPayload = serde_json::from_value(payload).unwrap_or_default();
        let name = match def.name.as_deref() {
            None | Some("all") => None,
            Some(name) => Some(name),
        };
        match self.registry.describe(name) {
            Ok(accessories) => self.outbound.send(&OutboundMsg::Accessories(accessories)),
            Err(e) => {
                warn!("onMessage.get {}", e);
                self.ack(false, e.to_string());
            }
        }
    }

    /// Validation chain for value-carrying topics; checks run in order and
    /// the first failure wins: device exists, characteristic recognized,
    /// value present and non-null, characteristic exposed on the device,
    /// value passes coercion.
    fn validate(
        &self,
        payload: &SetPayload,
    ) -> Result<(Arc<AccessoryState>, CharacteristicId, Value), BridgeError> {
        let accessory = self
            .registry
            .get(&payload.name)
            .ok_or_else(|| BridgeError::UnknownName(payload.name.clone()))?;

        let c = CharacteristicId::from_name(&payload.characteristic)
            .ok_or_else(|| BridgeError::UnknownCharacteristic(payload.characteristic.clone()))?;

        let value = payload
            .value
            .clone()
            .filter(|v| !v.is_null())
            .ok_or_else(|| BridgeError::MissingValue {
                name: payload.name.clone(),
            })?;

        let props = accessory
            .props(c)
            .ok_or_else(|| BridgeError::CharacteristicMismatch {
                name: payload.name.clone(),
            })?;

        let coerced = coerce(props.format, &value, props.min_value, props.max_value);
        if !coerced.valid {
            return Err(BridgeError::Validation {
                value: display(&coerced.value),
            });
        }

        Ok((accessory, c, value))
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, topic: &str, payload: Value) -> Option<T> {
        match serde_json::from_value(payload) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("{} payload invalid: {}", topic, e);
                self.ack(
                    false,
                    BridgeError::InvalidPayload(topic.to_string()).to_string(),
                );
                None
            }
        }
    }
}
