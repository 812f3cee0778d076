//! Per-device state mirror
//!
//! One `AccessoryState` per registered device: characteristic values, the
//! label of the most recent change, and the declared props copied from the
//! framework at configuration time. Both update streams end here - remote
//! socket writes through `set_from_trigger`/`set_silently`, local framework
//! writes through the [`AccessoryDelegate`] implementation - and the label
//! is what keeps one side's acknowledgment from bouncing back as the other
//! side's fresh change.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::error::BridgeError;
use crate::framework::catalog::{CharacteristicId, CharacteristicProps, Format};
use crate::framework::service::ServiceKind;
use crate::framework::{AccessoryDelegate, AccessoryInfo, DeviceHandle, InfoUpdate};
use crate::protocol::{AccessorySummary, CommandPayload, OutboundMsg, ReadNotification};
use crate::value::{coerce, display};

use super::{BridgeContext, Label, Trigger};

#[derive(Default)]
struct Mirror {
    values: BTreeMap<CharacteristicId, Option<Value>>,
    labels: BTreeMap<CharacteristicId, Label>,
    props: BTreeMap<CharacteristicId, CharacteristicProps>,
}

/// Authoritative in-process mirror of one device's characteristic values.
pub struct AccessoryState {
    name: String,
    service: ServiceKind,
    handle: Arc<dyn DeviceHandle>,
    ctx: Arc<BridgeContext>,
    mirror: RwLock<Mirror>,
}

impl AccessoryState {
    /// Create the mirror for a freshly registered or restored device and
    /// bind it to the framework object: one entry per exposed
    /// characteristic, value seeded to the unset placeholder, props copied
    /// from the framework.
    pub fn bind(
        name: String,
        service: ServiceKind,
        handle: Arc<dyn DeviceHandle>,
        ctx: Arc<BridgeContext>,
    ) -> Arc<Self> {
        let state = Arc::new(Self {
            name,
            service,
            handle,
            ctx,
            mirror: RwLock::new(Mirror::default()),
        });

        {
            let mut mirror = state.mirror.write();
            for c in state.handle.characteristics() {
                if let Some(props) = state.handle.props(c) {
                    mirror.values.insert(c, None);
                    mirror.props.insert(c, props);
                    trace!("{}: configured {}", state.name, c);
                }
            }
        }

        let dyn_state: Arc<dyn AccessoryDelegate> = state.clone();
        let delegate: Weak<dyn AccessoryDelegate> = Arc::downgrade(&dyn_state);
        state.handle.bind_delegate(delegate);
        state
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service(&self) -> ServiceKind {
        self.service
    }

    /// Declared props of an exposed characteristic (including per-device
    /// overrides applied at add time).
    pub fn props(&self, characteristic: CharacteristicId) -> Option<CharacteristicProps> {
        self.mirror.read().props.get(&characteristic).copied()
    }

    /// Cached value, or `None` if the characteristic was never set.
    pub fn value(&self, characteristic: CharacteristicId) -> Option<Value> {
        self.mirror
            .read()
            .values
            .get(&characteristic)
            .cloned()
            .flatten()
    }

    /// Label of the most recent client-facing change, if any.
    pub fn label(&self, characteristic: CharacteristicId) -> Option<Label> {
        self.mirror.read().labels.get(&characteristic).cloned()
    }

    pub fn info(&self) -> AccessoryInfo {
        self.handle.info()
    }

    pub fn update_info(&self, update: &InfoUpdate) -> bool {
        self.handle.update_info(update)
    }

    /// Validate and store a value, stamp its origin label, and push the
    /// change into the framework with the label as update context. On a
    /// failed validation nothing is mutated and the error carries the
    /// parsed value for the ack text.
    pub fn set_from_trigger(
        &self,
        trigger: Trigger,
        characteristic: CharacteristicId,
        raw: &Value,
    ) -> Result<Value, BridgeError> {
        let (value, label) = {
            let mut mirror = self.mirror.write();
            let props = mirror.props.get(&characteristic).copied().ok_or_else(|| {
                BridgeError::CharacteristicMismatch {
                    name: self.name.clone(),
                }
            })?;

            let coerced = coerce(props.format, raw, props.min_value, props.max_value);
            if !coerced.valid {
                return Err(BridgeError::Validation {
                    value: display(&coerced.value),
                });
            }

            let label = Label::now(trigger);
            mirror.values.insert(characteristic, Some(coerced.value.clone()));
            mirror.labels.insert(characteristic, label.clone());
            (coerced.value, label)
        };

        debug!(
            "{}: {} = {} ({})",
            self.name, characteristic, value, label.trigger
        );
        // Outside the mirror lock: the framework's change notification
        // re-enters this accessory through the delegate write path.
        self.handle.set_value(characteristic, &value, Some(&label));
        Ok(value)
    }

    /// Validate and store a value without a label write or framework
    /// notification. Used to acknowledge a value that originated from the
    /// framework itself.
    pub fn set_silently(
        &self,
        characteristic: CharacteristicId,
        raw: &Value,
    ) -> Result<Value, BridgeError> {
        let mut mirror = self.mirror.write();
        let props = mirror.props.get(&characteristic).copied().ok_or_else(|| {
            BridgeError::CharacteristicMismatch {
                name: self.name.clone(),
            }
        })?;

        let coerced = coerce(props.format, raw, props.min_value, props.max_value);
        if !coerced.valid {
            return Err(BridgeError::Validation {
                value: display(&coerced.value),
            });
        }

        trace!("{}: {} = {} (silent)", self.name, characteristic, coerced.value);
        mirror.values.insert(characteristic, Some(coerced.value.clone()));
        Ok(coerced.value)
    }

    /// Snapshot entry for the `accessories` topic. Never-set values appear
    /// as the `"blank"` placeholder on the wire.
    pub fn summary(&self, with_serial: bool) -> AccessorySummary {
        let mirror = self.mirror.read();
        let characteristics = mirror
            .values
            .iter()
            .map(|(c, v)| {
                (
                    c.name().to_string(),
                    v.clone().unwrap_or_else(|| Value::String("blank".into())),
                )
            })
            .collect();
        AccessorySummary {
            service: self.service.name().to_string(),
            characteristics,
            serialnumber: if with_serial {
                self.handle.info().serial_number
            } else {
                None
            },
        }
    }

    fn notify_read(&self, characteristic: CharacteristicId) {
        let info = self.handle.info();
        self.ctx.outbound.send(&OutboundMsg::Get(ReadNotification {
            name: self.name.clone(),
            characteristic: characteristic.name().to_string(),
            serialnumber: info.serial_number,
            service: self.service.name().to_string(),
            model: info.model,
        }));
    }

    fn forward_command(&self, characteristic: CharacteristicId, value: Value) {
        let info = self.handle.info();
        let msg = OutboundMsg::Set(CommandPayload {
            name: self.name.clone(),
            characteristic: characteristic.name().to_string(),
            value,
            serialnumber: info.serial_number,
            service: self.service.name().to_string(),
            model: info.model,
        });
        self.ctx.debounce.send(&self.name, characteristic, msg);
    }
}

impl AccessoryDelegate for AccessoryState {
    /// Framework read event: always forward a read notification to the
    /// remote side (fire-and-forget, the returned value is unaffected),
    /// then answer from the cache. `None` means never-set and surfaces as
    /// an explicit "not currently available" at the framework boundary.
    fn read(&self, characteristic: CharacteristicId) -> Option<Value> {
        self.notify_read(characteristic);
        self.value(characteristic)
    }

    /// Framework write event: a local user changed the characteristic.
    fn write(&self, characteristic: CharacteristicId, value: Value, ctx: Option<&Label>) {
        // "On" always coerces numeric/falsy inputs to a boolean
        let value = if characteristic == CharacteristicId::On {
            coerce(Format::Bool, &value, None, None).value
        } else {
            value
        };

        {
            let mut mirror = self.mirror.write();
            mirror.values.insert(characteristic, Some(value.clone()));
            if ctx.is_none() {
                // No trigger tag: a genuine local write
                mirror
                    .labels
                    .insert(characteristic, Label::now(Trigger::Homekit));
            }
        }

        if let Some(label) = ctx {
            if label.trigger.is_remote() {
                // Local echo of a remote command already applied: ack only
                debug!(
                    "{}: {} write acknowledged (remote echo)",
                    self.name, characteristic
                );
                return;
            }
        }

        debug!("{}: {} = {} (homekit)", self.name, characteristic, value);
        self.forward_command(characteristic, value);
    }

    fn identify(&self) {
        info!("identify '{}'", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::local::LocalFramework;
    use crate::framework::Framework as _;
    use crate::server::Outbound;
    use serde_json::json;
    use tokio::sync::mpsc;

    fn lamp() -> (Arc<AccessoryState>, mpsc::UnboundedReceiver<String>) {
        let outbound = Outbound::new();
        let (tx, rx) = mpsc::unbounded_channel();
        outbound.attach(tx);
        let ctx = Arc::new(BridgeContext::new(outbound));

        let framework = LocalFramework::new();
        let handle = framework
            .register_device("Lamp1", ServiceKind::Lightbulb, Vec::new())
            .unwrap();
        handle.enable_characteristic(CharacteristicId::Brightness);

        let state = AccessoryState::bind("Lamp1".into(), ServiceKind::Lightbulb, handle, ctx);
        (state, rx)
    }

    #[test]
    fn test_set_from_trigger_stores_and_stamps() {
        let (lamp, _rx) = lamp();
        let stored = lamp
            .set_from_trigger(Trigger::Websocket, CharacteristicId::Brightness, &json!(50))
            .unwrap();
        assert_eq!(stored, json!(50));
        assert_eq!(lamp.value(CharacteristicId::Brightness), Some(json!(50)));

        let label = lamp.label(CharacteristicId::Brightness).unwrap();
        assert_eq!(label.trigger, Trigger::Websocket);
        assert_eq!(label.timestamp.len(), 8); // HH:MM:SS
    }

    #[test]
    fn test_invalid_value_mutates_nothing() {
        let (lamp, _rx) = lamp();
        lamp.set_from_trigger(Trigger::Websocket, CharacteristicId::Brightness, &json!(50))
            .unwrap();
        let before = lamp.label(CharacteristicId::Brightness).unwrap();

        let err = lamp
            .set_from_trigger(Trigger::Websocket, CharacteristicId::Brightness, &json!(200))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::Validation {
                value: "200".into()
            }
        );
        assert_eq!(lamp.value(CharacteristicId::Brightness), Some(json!(50)));
        assert_eq!(lamp.label(CharacteristicId::Brightness).unwrap(), before);
    }

    #[test]
    fn test_set_silently_skips_label_and_framework() {
        let (lamp, mut rx) = lamp();
        lamp.set_silently(CharacteristicId::Brightness, &json!(40))
            .unwrap();
        assert_eq!(lamp.value(CharacteristicId::Brightness), Some(json!(40)));
        assert!(lamp.label(CharacteristicId::Brightness).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_characteristic_not_exposed() {
        let (lamp, _rx) = lamp();
        let err = lamp
            .set_from_trigger(Trigger::Websocket, CharacteristicId::TargetPosition, &json!(1))
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::CharacteristicMismatch {
                name: "Lamp1".into()
            }
        );
    }

    #[test]
    fn test_summary_uses_blank_placeholder() {
        let (lamp, _rx) = lamp();
        lamp.set_from_trigger(Trigger::Websocket, CharacteristicId::Brightness, &json!(75))
            .unwrap();

        let summary = lamp.summary(false);
        assert_eq!(summary.service, "Lightbulb");
        assert_eq!(summary.characteristics["Brightness"], json!(75));
        assert_eq!(summary.characteristics["On"], json!("blank"));
        assert!(summary.serialnumber.is_none());
    }
}
