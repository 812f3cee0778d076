//! Wire protocol envelopes
//!
//! Inbound frames are `{topic, payload}`; payload shapes are per-topic and
//! deserialized only after the topic is dispatched. Outbound frames use the
//! same envelope, produced by serializing [`OutboundMsg`].

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::framework::service::InputSource;
use crate::framework::InfoUpdate;

/// Inbound message envelope.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub topic: String,
    #[serde(default)]
    pub payload: Value,
}

/// Payload of `add` / `addAccessory`.
///
/// Unrecognized keys are characteristic names from the service's optional
/// set, mapping either to `"default"` (expose with catalog props) or to a
/// props-override object (`{minValue, maxValue}`).
#[derive(Debug, Deserialize)]
pub struct AddPayload {
    pub name: String,
    pub service: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "serialnumber")]
    pub serial_number: Option<String>,
    #[serde(rename = "firmwarerevision")]
    pub firmware_revision: Option<String>,
    #[serde(rename = "inputSources", default)]
    pub input_sources: Vec<InputSource>,
    #[serde(flatten)]
    pub characteristics: HashMap<String, Value>,
}

/// Payload of `remove` / `removeAccessory`.
#[derive(Debug, Deserialize)]
pub struct RemovePayload {
    pub name: String,
}

/// Payload of `set` / `setValue` and `callback`.
#[derive(Debug, Deserialize)]
pub struct SetPayload {
    pub name: String,
    pub characteristic: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Payload of `setAccessories`.
#[derive(Debug, Deserialize)]
pub struct InfoPayload {
    pub name: String,
    #[serde(flatten)]
    pub update: InfoUpdate,
}

/// Payload of `get` / `getAccessory` / `getAccessories`. An absent name
/// means "all".
#[derive(Debug, Default, Deserialize)]
pub struct GetPayload {
    #[serde(default)]
    pub name: Option<String>,
}

/// Outbound message, serialized as `{topic, payload}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", content = "payload", rename_all = "lowercase")]
pub enum OutboundMsg {
    /// Structured ack for a mutating request.
    Response(ResponsePayload),
    /// Full state snapshot for `get`.
    Accessories(BTreeMap<String, AccessorySummary>),
    /// Device-initiated read notification.
    Get(ReadNotification),
    /// Device-initiated command.
    Set(CommandPayload),
}

impl OutboundMsg {
    pub fn ack(ack: bool, message: impl Into<String>) -> Self {
        OutboundMsg::Response(ResponsePayload {
            ack,
            message: message.into(),
            serialnumber: None,
            service: None,
        })
    }

    /// Short name of the topic, for logging.
    pub fn topic(&self) -> &'static str {
        match self {
            OutboundMsg::Response(_) => "response",
            OutboundMsg::Accessories(_) => "accessories",
            OutboundMsg::Get(_) => "get",
            OutboundMsg::Set(_) => "set",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsePayload {
    pub ack: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialnumber: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Per-device entry of the `accessories` snapshot. Characteristic values
/// are the mirror contents; never-set entries serialize as `"blank"`.
#[derive(Debug, Clone, Serialize)]
pub struct AccessorySummary {
    pub service: String,
    pub characteristics: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialnumber: Option<String>,
}

/// `{topic: "get"}` payload: the remote side learns someone asked for a
/// characteristic, independent of the answer.
#[derive(Debug, Clone, Serialize)]
pub struct ReadNotification {
    pub name: String,
    pub characteristic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialnumber: Option<String>,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "Model", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `{topic: "set"}` payload: a device-originated command for the remote
/// system to apply.
#[derive(Debug, Clone, Serialize)]
pub struct CommandPayload {
    pub name: String,
    pub characteristic: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serialnumber: Option<String>,
    #[serde(rename = "Service")]
    pub service: String,
    #[serde(rename = "Model", skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}
