use crate::domain::geometry::normalize_degrees;
use crate::domain::state::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rotated,
    Translated,
    Idle,
}

/// Advances one unit's command by a single tick.
///
/// A tick either rotates or translates, never both, so the unit finishes turning in place
/// before it starts to drive.
pub fn tick_unit(unit: &mut Unit) -> TickOutcome {
    let command = &mut unit.command;

    if command.rotation_ticks > 0 {
        command.rotation_ticks -= 1;
        // Orientation is screen-clockwise, heading counter-clockwise: they move in opposite
        // directions and stay exact negations of each other.
        unit.orientation = normalize_degrees(unit.orientation + command.rotation_rate);
        unit.heading = normalize_degrees(unit.heading - command.rotation_rate);
        TickOutcome::Rotated
    } else if command.translation_ticks > 0 {
        command.translation_ticks -= 1;
        unit.position += command.velocity;
        TickOutcome::Translated
    } else {
        TickOutcome::Idle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::state::Command;
    use glam::Vec2;

    fn unit_with(command: Command) -> Unit {
        let mut unit = Unit::new(1, Vec2::new(100.0, 100.0));
        unit.command = command;
        unit
    }

    #[test]
    fn rotation_finishes_before_translation_starts() {
        let mut unit = unit_with(Command {
            rotation_rate: 0.8,
            rotation_ticks: 5,
            velocity: Vec2::new(2.0, 0.0),
            translation_ticks: 3,
        });

        for remaining in (0..5).rev() {
            assert_eq!(tick_unit(&mut unit), TickOutcome::Rotated);
            assert_eq!(unit.command.rotation_ticks, remaining);
            assert_eq!(unit.command.translation_ticks, 3);
            assert_eq!(unit.position, Vec2::new(100.0, 100.0));
        }

        for _ in 0..3 {
            assert_eq!(tick_unit(&mut unit), TickOutcome::Translated);
        }
        assert_eq!(unit.position, Vec2::new(106.0, 100.0));
        assert!(unit.command.is_idle());
    }

    #[test]
    fn idle_ticks_do_not_mutate_the_unit() {
        let mut unit = unit_with(Command::IDLE);
        unit.heading = -37.5;
        unit.orientation = 37.5;

        for _ in 0..10 {
            assert_eq!(tick_unit(&mut unit), TickOutcome::Idle);
        }

        assert_eq!(unit.position, Vec2::new(100.0, 100.0));
        assert_eq!(unit.heading, -37.5);
        assert_eq!(unit.orientation, 37.5);
    }

    #[test]
    fn heading_mirrors_orientation_and_stays_canonical() {
        let mut unit = unit_with(Command {
            rotation_rate: -0.8,
            rotation_ticks: 2_000,
            velocity: Vec2::ZERO,
            translation_ticks: 0,
        });

        while tick_unit(&mut unit) != TickOutcome::Idle {
            assert!(unit.heading > -180.0 && unit.heading <= 180.0);
            assert!(unit.orientation > -180.0 && unit.orientation <= 180.0);
            let drift = normalize_degrees(unit.heading + unit.orientation);
            assert!(drift.abs() < 1e-2 || (drift - 360.0).abs() < 1e-2);
        }
    }
}
