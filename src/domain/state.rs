// Domain-level unit and command state plus the snapshot handed to the surface.

use glam::Vec2;

/// Two-phase motion owned by a single unit: rotate in place, then drive straight.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    /// Degrees added to the displayed orientation per rotation tick.
    pub rotation_rate: f32,
    pub rotation_ticks: u32,
    /// Field units added to the position per translation tick.
    pub velocity: Vec2,
    pub translation_ticks: u32,
}

impl Command {
    pub const IDLE: Command = Command {
        rotation_rate: 0.0,
        rotation_ticks: 0,
        velocity: Vec2::ZERO,
        translation_ticks: 0,
    };

    pub fn is_idle(&self) -> bool {
        self.rotation_ticks == 0 && self.translation_ticks == 0
    }
}

pub struct Unit {
    /// Protocol address of the remote unit.
    pub id: u8,
    pub position: Vec2,

    // Displayed rotation in screen degrees (clockwise positive).
    pub orientation: f32,
    // Heading in the unit's own frame (counter-clockwise positive); always -orientation.
    pub heading: f32,

    // Set while a dispatched packet is unacknowledged.
    pub locked: bool,
    pub command: Command,
}

impl Unit {
    pub fn new(id: u8, position: Vec2) -> Self {
        Self {
            id,
            position,
            orientation: 0.0,
            heading: 0.0,
            locked: false,
            command: Command::IDLE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitSnapshot {
    pub index: usize,
    pub id: u8,
    pub x: f32,
    pub y: f32,
    pub orientation: f32,
    pub heading: f32,
    pub locked: bool,
    pub busy: bool,
}

impl UnitSnapshot {
    pub fn from_unit(index: usize, unit: &Unit) -> Self {
        Self {
            index,
            id: unit.id,
            x: unit.position.x,
            y: unit.position.y,
            orientation: unit.orientation,
            heading: unit.heading,
            locked: unit.locked,
            busy: !unit.command.is_idle(),
        }
    }
}

/// Connection lifecycle of the radio link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    // Last transition failed; retried exactly like Disconnected.
    Error,
}

impl LinkState {
    /// True when `connect` may start from this state.
    pub fn can_connect(self) -> bool {
        matches!(self, LinkState::Disconnected | LinkState::Error)
    }

    /// Operator-facing label for the status indicator.
    pub fn label(self) -> &'static str {
        match self {
            LinkState::Disconnected => "Not Connected",
            LinkState::Connecting => "Connecting",
            LinkState::Connected => "Connected",
            LinkState::Disconnecting => "Disconnecting",
            LinkState::Error => "Error",
        }
    }
}
