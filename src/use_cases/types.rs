// Use-case level inputs/outputs for the control loop.

use crate::domain::UnitSnapshot;

/// Operator input delivered by the rendering/input surface.
#[derive(Debug, Clone)]
pub enum SurfaceEvent {
    SelectUnit { index: usize },
    PointerDown { x: f32, y: f32 },
    ToggleLink,
}

/// Notifications flowing from the link session back into the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    UnitReleased { unit_id: u8 },
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct FleetUpdate {
    pub tick: u64,
    pub selected: Option<usize>,
    pub units: Vec<UnitSnapshot>,
}
