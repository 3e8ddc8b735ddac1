use glam::Vec2;

use crate::domain::geometry::turn_angle;
use crate::domain::packet::CommandPacket;
use crate::domain::state::{Command, Unit};
use crate::domain::tuning::motion::MotionTuning;

/// Planner output: the local command plus the packet for the remote unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub command: Command,
    // None when the target is the unit's own position.
    pub packet: Option<CommandPacket>,
}

impl Plan {
    fn stay() -> Self {
        Self {
            command: Command::IDLE,
            packet: None,
        }
    }
}

/// Turns a target click into a rotate-then-drive command for `unit`.
///
/// Both phases are counted independently; ordering is enforced by the executor.
pub fn plan(unit: &Unit, target: Vec2, tuning: &MotionTuning) -> Plan {
    let delta = target - unit.position;
    let distance = delta.length();
    // Overflowing distances cannot be driven or encoded.
    if !distance.is_finite() || distance <= f32::EPSILON {
        return Plan::stay();
    }

    // Clockwise-positive, matching how orientation is displayed.
    let turn = -turn_angle(unit.position, target, unit.heading);

    let rotation_ticks = (turn.abs() / tuning.rotation_step).floor() as u32;
    let rotation_rate = if turn > 0.0 {
        tuning.rotation_step
    } else if turn < 0.0 {
        -tuning.rotation_step
    } else {
        0.0
    };

    let velocity = delta * (tuning.translation_step / distance);
    let translation_ticks = (distance / tuning.translation_step).floor() as u32;

    Plan {
        command: Command {
            rotation_rate,
            rotation_ticks,
            velocity,
            translation_ticks,
        },
        packet: Some(CommandPacket {
            unit_id: unit.id,
            turn: turn.round() as i32,
            distance: distance.round() as u32,
        }),
    }
}
