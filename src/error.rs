//! Error taxonomy for the bridge protocol
//!
//! Every recoverable failure on the socket protocol maps to one of these
//! variants; the `Display` text is exactly what goes out in the `response`
//! ack payload, so the wire strings live here and nowhere else.

use thiserror::Error;

/// Recoverable bridge errors, turned into structured acks over the channel.
///
/// None of these abort the process; state is left unchanged when they occur.
/// The unrecoverable case (duplicate identity during startup restore) is
/// surfaced as [`BridgeError::DuplicateName`] too, but the caller in `main`
/// converts it into a reported startup failure with a non-zero exit.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    // ── Validation ──────────────────────────────────────────────────
    /// Value failed the format/range check.
    #[error("value '{value}' outside range")]
    Validation { value: String },

    /// Payload carried no value (or an explicit null).
    #[error("name '{name}' value undefined.")]
    MissingValue { name: String },

    // ── Not found ───────────────────────────────────────────────────
    /// Device name not registered (validation / get paths).
    #[error("name '{0}' undefined.")]
    UnknownName(String),

    /// Characteristic name not in the recognized vocabulary.
    #[error("characteristic '{0}' undefined.")]
    UnknownCharacteristic(String),

    /// Device exists but its service does not expose this characteristic.
    #[error("name '{name}' characteristic do not match.")]
    CharacteristicMismatch { name: String },

    /// Device name not registered (remove path).
    #[error("accessory '{0}' not found.")]
    NotFound(String),

    /// Device name not registered (metadata update path).
    #[error("accessory '{0}' undefined.")]
    AccessoryUndefined(String),

    // ── Creation ────────────────────────────────────────────────────
    /// Service type unrecognized by the framework.
    #[error("service '{0}' undefined.")]
    UnsupportedService(String),

    /// Name collision on add, or ambiguous identity during restore.
    #[error("name '{0}' is already used.")]
    DuplicateName(String),

    // ── Protocol ────────────────────────────────────────────────────
    /// Topic not in the dispatch table.
    #[error("topic '{0}' unknown.")]
    UnknownTopic(String),

    /// Payload did not deserialize to the topic's shape.
    #[error("topic '{0}' payload invalid.")]
    InvalidPayload(String),

    // ── Channel ─────────────────────────────────────────────────────
    /// No live outbound connection.
    #[error("client disconnected.")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_messages() {
        assert_eq!(
            BridgeError::Validation {
                value: "150".into()
            }
            .to_string(),
            "value '150' outside range"
        );
        assert_eq!(
            BridgeError::UnknownName("Lamp2".into()).to_string(),
            "name 'Lamp2' undefined."
        );
        assert_eq!(
            BridgeError::DuplicateName("Lamp1".into()).to_string(),
            "name 'Lamp1' is already used."
        );
        assert_eq!(
            BridgeError::UnsupportedService("Toaster".into()).to_string(),
            "service 'Toaster' undefined."
        );
        assert_eq!(
            BridgeError::NotFound("Lamp1".into()).to_string(),
            "accessory 'Lamp1' not found."
        );
    }
}
