//! Compiled Option Table

use crate::values::{
    ALARM_5S, AUTO_NONE, MOUNT_CEILING, NETWORK_AP, NOTIFY_DOOR_CLOSE, NOTIFY_DOOR_OPEN,
};
use crate::{DEFAULT_DEVICE_KEY, DEFAULT_DEVICE_NAME, FIRMWARE_VERSION};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of options in the table
pub const OPTION_COUNT: usize = 25;

/// Stable option identifiers; the discriminant is the table index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum OptionId {
    FirmwareVersion = 0,
    MountType,
    DoorThreshold,
    VehicleThreshold,
    ReadInterval,
    Alarm,
    HttpPort,
    ClickDelay,
    NetworkMode,
    AutoInterval,
    AutoOption,
    AutoTime,
    AutoTimeOption,
    NotifyOptions,
    UseStaticIp,
    Ssid,
    Password,
    CloudToken,
    DeviceKey,
    DeviceName,
    IftttKey,
    MqttServer,
    DeviceIp,
    GatewayIp,
    Subnet,
}

impl OptionId {
    /// All identifiers in table order
    pub const ALL: [OptionId; OPTION_COUNT] = [
        OptionId::FirmwareVersion,
        OptionId::MountType,
        OptionId::DoorThreshold,
        OptionId::VehicleThreshold,
        OptionId::ReadInterval,
        OptionId::Alarm,
        OptionId::HttpPort,
        OptionId::ClickDelay,
        OptionId::NetworkMode,
        OptionId::AutoInterval,
        OptionId::AutoOption,
        OptionId::AutoTime,
        OptionId::AutoTimeOption,
        OptionId::NotifyOptions,
        OptionId::UseStaticIp,
        OptionId::Ssid,
        OptionId::Password,
        OptionId::CloudToken,
        OptionId::DeviceKey,
        OptionId::DeviceName,
        OptionId::IftttKey,
        OptionId::MqttServer,
        OptionId::DeviceIp,
        OptionId::GatewayIp,
        OptionId::Subnet,
    ];

    /// Position in the option table
    pub fn index(self) -> usize {
        self as usize
    }

    /// Identifier at a table position
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Table entry for this option
    pub fn def(self) -> &'static OptionDef {
        &OPTIONS[self.index()]
    }

    /// Key used in the option file
    pub fn name(self) -> &'static str {
        self.def().name
    }
}

/// Kind of an option, derived from its bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKind {
    /// Integer in `[0, max]`
    Integer { max: u32 },
    /// Free-form text
    String,
}

/// One entry of the compiled option table.
///
/// A `max` of zero marks a string option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionDef {
    pub name: &'static str,
    pub max: u32,
    pub default_int: u32,
    pub default_str: &'static str,
}

impl OptionDef {
    const fn int(name: &'static str, default: u32, max: u32) -> Self {
        Self {
            name,
            max,
            default_int: default,
            default_str: "",
        }
    }

    const fn string(name: &'static str, default: &'static str) -> Self {
        Self {
            name,
            max: 0,
            default_int: 0,
            default_str: default,
        }
    }

    pub fn kind(&self) -> OptionKind {
        if self.max > 0 {
            OptionKind::Integer { max: self.max }
        } else {
            OptionKind::String
        }
    }

    pub fn is_integer(&self) -> bool {
        self.max > 0
    }

    /// Compiled-in default value
    pub fn default_value(&self) -> OptionValue {
        match self.kind() {
            OptionKind::Integer { .. } => OptionValue::Int(self.default_int),
            OptionKind::String => OptionValue::Str(self.default_str.to_string()),
        }
    }
}

/// Current value of an option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Int(u32),
    Str(String),
}

impl OptionValue {
    pub fn as_int(&self) -> Option<u32> {
        match self {
            OptionValue::Int(v) => Some(*v),
            OptionValue::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Int(_) => None,
            OptionValue::Str(s) => Some(s),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Int(v) => write!(f, "{}", v),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

/// The option table. Order defines the order of the saved file.
pub static OPTIONS: [OptionDef; OPTION_COUNT] = [
    OptionDef::int("fwv", FIRMWARE_VERSION, 255),
    OptionDef::int("mnt", MOUNT_CEILING, 3),
    OptionDef::int("dth", 50, 65535),
    OptionDef::int("vth", 150, 65535),
    OptionDef::int("riv", 5, 300),
    OptionDef::int("alm", ALARM_5S, 2),
    OptionDef::int("htp", 80, 65535),
    OptionDef::int("cdt", 0xFF, 5000),
    OptionDef::int("mod", NETWORK_AP, 255),
    OptionDef::int("ati", 30, 720),
    OptionDef::int("ato", AUTO_NONE, 255),
    OptionDef::int("atib", 3, 24),
    OptionDef::int("atob", AUTO_NONE, 255),
    OptionDef::int("noto", NOTIFY_DOOR_OPEN | NOTIFY_DOOR_CLOSE, 255),
    OptionDef::int("usi", 0, 1),
    OptionDef::string("ssid", ""),
    OptionDef::string("pass", ""),
    OptionDef::string("auth", ""),
    OptionDef::string("dkey", DEFAULT_DEVICE_KEY),
    OptionDef::string("name", DEFAULT_DEVICE_NAME),
    OptionDef::string("iftt", ""),
    OptionDef::string("mqtt", "-.-.-.-"),
    OptionDef::string("dvip", "-.-.-.-"),
    OptionDef::string("gwip", "-.-.-.-"),
    OptionDef::string("subn", "255.255.255.0"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_match_table_positions() {
        for (index, id) in OptionId::ALL.iter().enumerate() {
            assert_eq!(id.index(), index);
            assert_eq!(OptionId::from_index(index), Some(*id));
        }
        assert_eq!(OptionId::from_index(OPTION_COUNT), None);
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<_> = OPTIONS.iter().map(|d| d.name).collect();
        assert_eq!(names.len(), OPTION_COUNT);
    }

    #[test]
    fn test_defaults_within_bounds() {
        for def in OPTIONS.iter().filter(|d| d.is_integer()) {
            assert!(def.default_int <= def.max, "{} default out of range", def.name);
        }
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            OptionId::DoorThreshold.def().kind(),
            OptionKind::Integer { max: 65535 }
        );
        assert_eq!(OptionId::CloudToken.def().kind(), OptionKind::String);
        assert_eq!(
            OptionId::Subnet.def().default_value(),
            OptionValue::Str("255.255.255.0".to_string())
        );
    }

    #[test]
    fn test_value_display() {
        assert_eq!(OptionValue::Int(150).to_string(), "150");
        assert_eq!(OptionValue::Str("garage".into()).to_string(), "garage");
    }
}
