//! Characteristic catalog - the recognized characteristic vocabulary
//!
//! A closed enumeration of characteristic identifiers with an explicit
//! lookup table from identifier to declared properties (format, bounds,
//! permissions). Names arriving on the wire are matched after stripping
//! whitespace, so `"Target Position"` and `"TargetPosition"` are the same
//! identifier.

use serde::Serialize;

/// Value format declared for a characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Bool,
    Int,
    Uint8,
    Uint16,
    Uint32,
    Float,
    String,
}

/// Permission flags on a characteristic.
///
/// `PairedWrite` gates whether external "set" events are accepted at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Perm {
    #[serde(rename = "pr")]
    PairedRead,
    #[serde(rename = "pw")]
    PairedWrite,
    #[serde(rename = "ev")]
    Events,
}

/// Declared properties of a characteristic, copied into the accessory
/// mirror at configuration time. Bounds may be overridden per device by
/// the add definition; the catalog values are the defaults.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CharacteristicProps {
    pub format: Format,
    #[serde(rename = "minValue", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(rename = "maxValue", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    pub perms: &'static [Perm],
}

impl CharacteristicProps {
    pub fn writable(&self) -> bool {
        self.perms.contains(&Perm::PairedWrite)
    }
}

const PR_EV: &[Perm] = &[Perm::PairedRead, Perm::Events];
const PR_PW_EV: &[Perm] = &[Perm::PairedRead, Perm::PairedWrite, Perm::Events];
const PW: &[Perm] = &[Perm::PairedWrite];
const PR: &[Perm] = &[Perm::PairedRead];

macro_rules! props {
    ($format:ident, $perms:ident) => {
        CharacteristicProps {
            format: Format::$format,
            min_value: None,
            max_value: None,
            perms: $perms,
        }
    };
    ($format:ident, $min:expr, $max:expr, $perms:ident) => {
        CharacteristicProps {
            format: Format::$format,
            min_value: Some($min),
            max_value: Some($max),
            perms: $perms,
        }
    };
}

/// Closed set of recognized characteristic identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharacteristicId {
    On,
    Brightness,
    Hue,
    Saturation,
    OutletInUse,
    RotationSpeed,
    CurrentTemperature,
    TargetTemperature,
    CurrentHeatingCoolingState,
    TargetHeatingCoolingState,
    TemperatureDisplayUnits,
    CurrentRelativeHumidity,
    TargetRelativeHumidity,
    CurrentPosition,
    TargetPosition,
    PositionState,
    CurrentHorizontalTiltAngle,
    TargetHorizontalTiltAngle,
    CurrentVerticalTiltAngle,
    TargetVerticalTiltAngle,
    HoldPosition,
    MotionDetected,
    ContactSensorState,
    OccupancyDetected,
    CurrentAmbientLightLevel,
    LeakDetected,
    SmokeDetected,
    CurrentDoorState,
    TargetDoorState,
    ObstructionDetected,
    LockCurrentState,
    LockTargetState,
    Active,
    ActiveIdentifier,
    ConfiguredName,
    SleepDiscoveryMode,
    RemoteKey,
    Identifier,
    IsConfigured,
    InputSourceType,
    InputDeviceType,
}

impl CharacteristicId {
    /// Parse a wire name. Whitespace is stripped first, matching the
    /// framework's display-name convention ("Target Position").
    pub fn from_name(name: &str) -> Option<Self> {
        use CharacteristicId::*;
        let stripped: String = name.chars().filter(|c| !c.is_whitespace()).collect();
        Some(match stripped.as_str() {
            "On" => On,
            "Brightness" => Brightness,
            "Hue" => Hue,
            "Saturation" => Saturation,
            "OutletInUse" => OutletInUse,
            "RotationSpeed" => RotationSpeed,
            "CurrentTemperature" => CurrentTemperature,
            "TargetTemperature" => TargetTemperature,
            "CurrentHeatingCoolingState" => CurrentHeatingCoolingState,
            "TargetHeatingCoolingState" => TargetHeatingCoolingState,
            "TemperatureDisplayUnits" => TemperatureDisplayUnits,
            "CurrentRelativeHumidity" => CurrentRelativeHumidity,
            "TargetRelativeHumidity" => TargetRelativeHumidity,
            "CurrentPosition" => CurrentPosition,
            "TargetPosition" => TargetPosition,
            "PositionState" => PositionState,
            "CurrentHorizontalTiltAngle" => CurrentHorizontalTiltAngle,
            "TargetHorizontalTiltAngle" => TargetHorizontalTiltAngle,
            "CurrentVerticalTiltAngle" => CurrentVerticalTiltAngle,
            "TargetVerticalTiltAngle" => TargetVerticalTiltAngle,
            "HoldPosition" => HoldPosition,
            "MotionDetected" => MotionDetected,
            "ContactSensorState" => ContactSensorState,
            "OccupancyDetected" => OccupancyDetected,
            "CurrentAmbientLightLevel" => CurrentAmbientLightLevel,
            "LeakDetected" => LeakDetected,
            "SmokeDetected" => SmokeDetected,
            "CurrentDoorState" => CurrentDoorState,
            "TargetDoorState" => TargetDoorState,
            "ObstructionDetected" => ObstructionDetected,
            "LockCurrentState" => LockCurrentState,
            "LockTargetState" => LockTargetState,
            "Active" => Active,
            "ActiveIdentifier" => ActiveIdentifier,
            "ConfiguredName" => ConfiguredName,
            "SleepDiscoveryMode" => SleepDiscoveryMode,
            "RemoteKey" => RemoteKey,
            "Identifier" => Identifier,
            "IsConfigured" => IsConfigured,
            "InputSourceType" => InputSourceType,
            "InputDeviceType" => InputDeviceType,
            _ => return None,
        })
    }

    /// Canonical name as it appears on the wire and in snapshots.
    pub fn name(&self) -> &'static str {
        use CharacteristicId::*;
        match self {
            On => "On",
            Brightness => "Brightness",
            Hue => "Hue",
            Saturation => "Saturation",
            OutletInUse => "OutletInUse",
            RotationSpeed => "RotationSpeed",
            CurrentTemperature => "CurrentTemperature",
            TargetTemperature => "TargetTemperature",
            CurrentHeatingCoolingState => "CurrentHeatingCoolingState",
            TargetHeatingCoolingState => "TargetHeatingCoolingState",
            TemperatureDisplayUnits => "TemperatureDisplayUnits",
            CurrentRelativeHumidity => "CurrentRelativeHumidity",
            TargetRelativeHumidity => "TargetRelativeHumidity",
            CurrentPosition => "CurrentPosition",
            TargetPosition => "TargetPosition",
            PositionState => "PositionState",
            CurrentHorizontalTiltAngle => "CurrentHorizontalTiltAngle",
            TargetHorizontalTiltAngle => "TargetHorizontalTiltAngle",
            CurrentVerticalTiltAngle => "CurrentVerticalTiltAngle",
            TargetVerticalTiltAngle => "TargetVerticalTiltAngle",
            HoldPosition => "HoldPosition",
            MotionDetected => "MotionDetected",
            ContactSensorState => "ContactSensorState",
            OccupancyDetected => "OccupancyDetected",
            CurrentAmbientLightLevel => "CurrentAmbientLightLevel",
            LeakDetected => "LeakDetected",
            SmokeDetected => "SmokeDetected",
            CurrentDoorState => "CurrentDoorState",
            TargetDoorState => "TargetDoorState",
            ObstructionDetected => "ObstructionDetected",
            LockCurrentState => "LockCurrentState",
            LockTargetState => "LockTargetState",
            Active => "Active",
            ActiveIdentifier => "ActiveIdentifier",
            ConfiguredName => "ConfiguredName",
            SleepDiscoveryMode => "SleepDiscoveryMode",
            RemoteKey => "RemoteKey",
            Identifier => "Identifier",
            IsConfigured => "IsConfigured",
            InputSourceType => "InputSourceType",
            InputDeviceType => "InputDeviceType",
        }
    }

    /// Declared default properties for this characteristic.
    pub fn props(&self) -> CharacteristicProps {
        use CharacteristicId::*;
        match self {
            On => props!(Bool, PR_PW_EV),
            Brightness => props!(Int, 0.0, 100.0, PR_PW_EV),
            Hue => props!(Float, 0.0, 360.0, PR_PW_EV),
            Saturation => props!(Float, 0.0, 100.0, PR_PW_EV),
            OutletInUse => props!(Bool, PR_EV),
            RotationSpeed => props!(Float, 0.0, 100.0, PR_PW_EV),
            CurrentTemperature => props!(Float, 0.0, 100.0, PR_EV),
            TargetTemperature => props!(Float, 10.0, 38.0, PR_PW_EV),
            CurrentHeatingCoolingState => props!(Uint8, 0.0, 2.0, PR_EV),
            TargetHeatingCoolingState => props!(Uint8, 0.0, 3.0, PR_PW_EV),
            TemperatureDisplayUnits => props!(Uint8, 0.0, 1.0, PR_PW_EV),
            CurrentRelativeHumidity => props!(Float, 0.0, 100.0, PR_EV),
            TargetRelativeHumidity => props!(Float, 0.0, 100.0, PR_PW_EV),
            CurrentPosition => props!(Uint8, 0.0, 100.0, PR_EV),
            TargetPosition => props!(Uint8, 0.0, 100.0, PR_PW_EV),
            PositionState => props!(Uint8, 0.0, 2.0, PR_EV),
            CurrentHorizontalTiltAngle => props!(Int, -90.0, 90.0, PR_EV),
            TargetHorizontalTiltAngle => props!(Int, -90.0, 90.0, PR_PW_EV),
            CurrentVerticalTiltAngle => props!(Int, -90.0, 90.0, PR_EV),
            TargetVerticalTiltAngle => props!(Int, -90.0, 90.0, PR_PW_EV),
            HoldPosition => props!(Bool, PW),
            MotionDetected => props!(Bool, PR_EV),
            ContactSensorState => props!(Uint8, 0.0, 1.0, PR_EV),
            OccupancyDetected => props!(Uint8, 0.0, 1.0, PR_EV),
            CurrentAmbientLightLevel => props!(Float, 0.0001, 100000.0, PR_EV),
            LeakDetected => props!(Uint8, 0.0, 1.0, PR_EV),
            SmokeDetected => props!(Uint8, 0.0, 1.0, PR_EV),
            CurrentDoorState => props!(Uint8, 0.0, 4.0, PR_EV),
            TargetDoorState => props!(Uint8, 0.0, 1.0, PR_PW_EV),
            ObstructionDetected => props!(Bool, PR_EV),
            LockCurrentState => props!(Uint8, 0.0, 3.0, PR_EV),
            LockTargetState => props!(Uint8, 0.0, 1.0, PR_PW_EV),
            Active => props!(Uint8, 0.0, 1.0, PR_PW_EV),
            ActiveIdentifier => props!(Uint32, 0.0, 255.0, PR_PW_EV),
            ConfiguredName => props!(String, PR_PW_EV),
            SleepDiscoveryMode => props!(Uint8, 0.0, 1.0, PR_EV),
            RemoteKey => props!(Uint8, 0.0, 16.0, PW),
            Identifier => props!(Uint32, 0.0, 255.0, PR),
            IsConfigured => props!(Uint8, 0.0, 1.0, PR_PW_EV),
            InputSourceType => props!(Uint8, 0.0, 10.0, PR_EV),
            InputDeviceType => props!(Uint8, 0.0, 6.0, PR_EV),
        }
    }
}

impl std::fmt::Display for CharacteristicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
