//! Door and Vehicle Classification

use option_store::values::MOUNT_SIDE;
use serde::Serialize;

/// Door state derived from a distance reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum DoorStatus {
    Closed = 0,
    Open = 1,
}

/// Vehicle presence under a closed door
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum VehicleStatus {
    Absent = 0,
    Present = 1,
    /// Door is open, the sensor sees the door panel
    Unknown = 2,
}

/// Classify the door from a distance in centimetres.
///
/// A ceiling sensor sees the raised door panel close by when open. A side
/// sensor sees across the opening, so a long distance means open.
pub fn classify_door(mount: u32, threshold: u32, distance: u32) -> DoorStatus {
    let open = if mount == MOUNT_SIDE {
        distance > threshold
    } else {
        distance < threshold
    };
    if open {
        DoorStatus::Open
    } else {
        DoorStatus::Closed
    }
}

/// Classify vehicle presence; only meaningful while the door is closed
pub fn classify_vehicle(door: DoorStatus, threshold: u32, distance: u32) -> VehicleStatus {
    match door {
        DoorStatus::Open => VehicleStatus::Unknown,
        DoorStatus::Closed if distance < threshold => VehicleStatus::Present,
        DoorStatus::Closed => VehicleStatus::Absent,
    }
}
