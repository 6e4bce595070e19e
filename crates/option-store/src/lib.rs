//! Device Option Store
//!
//! Fixed table of typed options (bounded integers and free-form strings)
//! persisted as a line-oriented `name:value` text file.

mod error;
mod store;
mod table;

pub use error::StoreError;
pub use store::{LoadReport, OptionStore, SetupOutcome, StaticIp};
pub use table::{OptionDef, OptionId, OptionKind, OptionValue, OPTIONS, OPTION_COUNT};

/// Firmware version written to the `fwv` option
pub const FIRMWARE_VERSION: u32 = 124;

/// Length of a valid cloud authentication token
pub const CLOUD_TOKEN_LEN: usize = 32;

/// Default device key for local control
pub const DEFAULT_DEVICE_KEY: &str = "opendoor";

/// Default device name
pub const DEFAULT_DEVICE_NAME: &str = "My OpenGarage";

/// Option value constants
pub mod values {
    /// Sensor mounted on the ceiling, looking down at the door
    pub const MOUNT_CEILING: u32 = 0x00;
    /// Sensor mounted on the side wall
    pub const MOUNT_SIDE: u32 = 0x01;

    /// No alarm before closing
    pub const ALARM_NONE: u32 = 0;
    /// 5 second alarm before closing
    pub const ALARM_5S: u32 = 1;
    /// 10 second alarm before closing
    pub const ALARM_10S: u32 = 2;

    /// Access point (setup) network mode
    pub const NETWORK_AP: u32 = 0xA9;
    /// Station network mode
    pub const NETWORK_STA: u32 = 0x2A;

    /// No automation
    pub const AUTO_NONE: u32 = 0;

    /// Notify when the door opens
    pub const NOTIFY_DOOR_OPEN: u32 = 0x01;
    /// Notify when the door closes
    pub const NOTIFY_DOOR_CLOSE: u32 = 0x02;
}
