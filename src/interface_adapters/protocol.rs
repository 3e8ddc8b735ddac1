// Wire protocol DTOs and conversions for the rendering/input surface.

use crate::domain::{LinkState, UnitSnapshot};
use crate::use_cases::{FleetUpdate, SurfaceEvent};
use serde::{Deserialize, Serialize};

// Bound on either click coordinate; any move inside the square stays within the 2-byte
// distance range of the command packet.
pub const FIELD_LIMIT: f32 = 9_000.0;

fn on_field(v: f32) -> bool {
    v.is_finite() && v.abs() <= FIELD_LIMIT
}

/// Messages the controller sends to the surface over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ControllerMessage {
    // Fleet snapshot for a given tick.
    FleetUpdate(FleetUpdateDto),
    // Link status indicator.
    LinkStatus(LinkStatusDto),
}

/// Messages the surface sends to the controller over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SurfaceMessage {
    // Pointer down on a unit sprite.
    SelectUnit { index: usize },
    // Pointer down on the open field.
    PointerDown { x: f32, y: f32 },
    // Link toggle control.
    ToggleLink,
}

impl SurfaceMessage {
    /// Converts to a control-loop event, rejecting coordinates off the field.
    pub fn into_event(self) -> Option<SurfaceEvent> {
        match self {
            SurfaceMessage::SelectUnit { index } => Some(SurfaceEvent::SelectUnit { index }),
            SurfaceMessage::PointerDown { x, y } if on_field(x) && on_field(y) => {
                Some(SurfaceEvent::PointerDown { x, y })
            }
            SurfaceMessage::PointerDown { .. } => None,
            SurfaceMessage::ToggleLink => Some(SurfaceEvent::ToggleLink),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FleetUpdateDto {
    pub tick: u64,
    pub selected: Option<usize>,
    pub units: Vec<UnitStateDto>,
}

impl From<FleetUpdate> for FleetUpdateDto {
    fn from(update: FleetUpdate) -> Self {
        Self {
            tick: update.tick,
            selected: update.selected,
            units: update.units.iter().map(UnitStateDto::from).collect(),
        }
    }
}

/// Flattened unit state for wire transmission in fleet updates.
#[derive(Debug, Clone, Serialize)]
pub struct UnitStateDto {
    pub index: usize,
    pub id: u8,
    pub x: f32,
    pub y: f32,
    pub orientation: f32,
    pub heading: f32,
    pub locked: bool,
    pub busy: bool,
}

impl From<&UnitSnapshot> for UnitStateDto {
    fn from(unit: &UnitSnapshot) -> Self {
        Self {
            index: unit.index,
            id: unit.id,
            x: unit.x,
            y: unit.y,
            orientation: unit.orientation,
            heading: unit.heading,
            locked: unit.locked,
            busy: unit.busy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkStatusDto {
    pub state: LinkStateDto,
    pub label: &'static str,
}

impl From<LinkState> for LinkStatusDto {
    fn from(state: LinkState) -> Self {
        Self {
            state: state.into(),
            label: state.label(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub enum LinkStateDto {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    Error,
}

impl From<LinkState> for LinkStateDto {
    fn from(state: LinkState) -> Self {
        match state {
            LinkState::Disconnected => LinkStateDto::Disconnected,
            LinkState::Connecting => LinkStateDto::Connecting,
            LinkState::Connected => LinkStateDto::Connected,
            LinkState::Disconnecting => LinkStateDto::Disconnecting,
            LinkState::Error => LinkStateDto::Error,
        }
    }
}
