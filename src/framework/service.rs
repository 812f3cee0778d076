//! Service templates - device categories and their characteristic sets
//!
//! Each supported service kind declares the characteristics it always
//! exposes plus the optional ones an add definition may enable. Television
//! additionally carries an ordered list of linked input-source descriptors,
//! fixed at creation time.

use serde::{Deserialize, Serialize};

use super::catalog::CharacteristicId;

/// Supported device categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    Switch,
    Outlet,
    Lightbulb,
    Fan,
    Thermostat,
    TemperatureSensor,
    HumiditySensor,
    MotionSensor,
    ContactSensor,
    OccupancySensor,
    LightSensor,
    LeakSensor,
    SmokeSensor,
    Door,
    Window,
    WindowCovering,
    GarageDoorOpener,
    LockMechanism,
    Television,
}

impl ServiceKind {
    pub fn from_name(name: &str) -> Option<Self> {
        use ServiceKind::*;
        Some(match name {
            "Switch" => Switch,
            "Outlet" => Outlet,
            "Lightbulb" => Lightbulb,
            "Fan" => Fan,
            "Thermostat" => Thermostat,
            "TemperatureSensor" => TemperatureSensor,
            "HumiditySensor" => HumiditySensor,
            "MotionSensor" => MotionSensor,
            "ContactSensor" => ContactSensor,
            "OccupancySensor" => OccupancySensor,
            "LightSensor" => LightSensor,
            "LeakSensor" => LeakSensor,
            "SmokeSensor" => SmokeSensor,
            "Door" => Door,
            "Window" => Window,
            "WindowCovering" => WindowCovering,
            "GarageDoorOpener" => GarageDoorOpener,
            "LockMechanism" => LockMechanism,
            "Television" => Television,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        use ServiceKind::*;
        match self {
            Switch => "Switch",
            Outlet => "Outlet",
            Lightbulb => "Lightbulb",
            Fan => "Fan",
            Thermostat => "Thermostat",
            TemperatureSensor => "TemperatureSensor",
            HumiditySensor => "HumiditySensor",
            MotionSensor => "MotionSensor",
            ContactSensor => "ContactSensor",
            OccupancySensor => "OccupancySensor",
            LightSensor => "LightSensor",
            LeakSensor => "LeakSensor",
            SmokeSensor => "SmokeSensor",
            Door => "Door",
            Window => "Window",
            WindowCovering => "WindowCovering",
            GarageDoorOpener => "GarageDoorOpener",
            LockMechanism => "LockMechanism",
            Television => "Television",
        }
    }

    /// Characteristics every instance of this service exposes.
    pub fn characteristics(&self) -> &'static [CharacteristicId] {
        use CharacteristicId::*;
        use ServiceKind::*;
        match self {
            Switch => &[On],
            Outlet => &[On, OutletInUse],
            Lightbulb => &[On],
            Fan => &[On],
            Thermostat => &[
                CurrentHeatingCoolingState,
                TargetHeatingCoolingState,
                CurrentTemperature,
                TargetTemperature,
                TemperatureDisplayUnits,
            ],
            TemperatureSensor => &[CurrentTemperature],
            HumiditySensor => &[CurrentRelativeHumidity],
            MotionSensor => &[MotionDetected],
            ContactSensor => &[ContactSensorState],
            OccupancySensor => &[OccupancyDetected],
            LightSensor => &[CurrentAmbientLightLevel],
            LeakSensor => &[LeakDetected],
            SmokeSensor => &[SmokeDetected],
            Door | Window => &[CurrentPosition, TargetPosition, PositionState],
            WindowCovering => &[CurrentPosition, TargetPosition, PositionState],
            GarageDoorOpener => &[CurrentDoorState, TargetDoorState, ObstructionDetected],
            LockMechanism => &[LockCurrentState, LockTargetState],
            Television => &[Active, ActiveIdentifier, ConfiguredName, SleepDiscoveryMode],
        }
    }

    /// Optional characteristics an add definition may enable by naming them.
    pub fn optional_characteristics(&self) -> &'static [CharacteristicId] {
        use CharacteristicId::*;
        use ServiceKind::*;
        match self {
            Lightbulb => &[Brightness, Hue, Saturation],
            Fan => &[RotationSpeed],
            Thermostat => &[CurrentRelativeHumidity, TargetRelativeHumidity],
            WindowCovering => &[
                TargetHorizontalTiltAngle,
                TargetVerticalTiltAngle,
                CurrentHorizontalTiltAngle,
                CurrentVerticalTiltAngle,
                HoldPosition,
            ],
            Door | Window => &[HoldPosition, ObstructionDetected],
            Television => &[RemoteKey],
            _ => &[],
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Input-source descriptor for Television devices, attached at creation
/// time and immutable thereafter. Field names match the wire payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InputSource {
    pub identifier: u32,
    pub configured_name: String,
    pub is_configured: u8,
    pub input_source_type: u8,
    pub input_device_type: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_lookup() {
        assert_eq!(ServiceKind::from_name("Lightbulb"), Some(ServiceKind::Lightbulb));
        assert_eq!(ServiceKind::from_name("Toaster"), None);
    }

    #[test]
    fn test_lightbulb_optionals() {
        let optionals = ServiceKind::Lightbulb.optional_characteristics();
        assert!(optionals.contains(&CharacteristicId::Brightness));
        assert!(!ServiceKind::Switch
            .optional_characteristics()
            .contains(&CharacteristicId::Brightness));
    }

    #[test]
    fn test_input_source_wire_names() {
        let src: InputSource = serde_json::from_value(serde_json::json!({
            "Identifier": 1,
            "ConfiguredName": "HDMI 1",
            "IsConfigured": 1,
            "InputSourceType": 3,
            "InputDeviceType": 1
        }))
        .unwrap();
        assert_eq!(src.configured_name, "HDMI 1");
        assert_eq!(src.identifier, 1);
    }
}
