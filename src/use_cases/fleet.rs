// Fleet state owned by the control loop: units, selection and the per-tick executor.

use crate::domain::state::{Command, Unit, UnitSnapshot};
use crate::domain::systems::executor::{self, TickOutcome};
use crate::domain::tuning::fleet::FleetTuning;
use crate::use_cases::types::FleetUpdate;
use glam::Vec2;
use tracing::{debug, info};

/// Result of trying to select a unit for the next target click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    Selected,
    Locked,
    UnknownIndex,
}

pub struct FleetState {
    units: Vec<Unit>,
    selected: Option<usize>,
    tick: u64,
}

impl FleetState {
    /// Spawns the fixed fleet: unit `n` (1-based id) on the spawn row at `n * spacing`.
    pub fn init(tuning: &FleetTuning) -> Self {
        let units = (1..=tuning.unit_count)
            .map(|id| {
                let position = Vec2::new(f32::from(id) * tuning.spawn_spacing, tuning.spawn_y);
                Unit::new(id, position)
            })
            .collect();

        Self {
            units,
            selected: None,
            tick: 0,
        }
    }

    /// Advances every unit's command by one step, in index order.
    pub fn tick(&mut self) -> u64 {
        for (index, unit) in self.units.iter_mut().enumerate() {
            if executor::tick_unit(unit) != TickOutcome::Idle && unit.command.is_idle() {
                debug!(index, unit_id = unit.id, "unit command finished");
            }
        }
        self.tick += 1;
        self.tick
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, index: usize) -> Option<&Unit> {
        self.units.get(index)
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn select(&mut self, index: usize) -> SelectOutcome {
        match self.units.get(index) {
            None => SelectOutcome::UnknownIndex,
            Some(unit) if unit.locked => SelectOutcome::Locked,
            Some(_) => {
                self.selected = Some(index);
                SelectOutcome::Selected
            }
        }
    }

    pub fn take_selection(&mut self) -> Option<usize> {
        self.selected.take()
    }

    /// Replaces the unit's command; any unfinished remainder is discarded.
    pub fn assign(&mut self, index: usize, command: Command) {
        if let Some(unit) = self.units.get_mut(index) {
            if !unit.command.is_idle() {
                debug!(
                    index,
                    unit_id = unit.id,
                    rotation_ticks = unit.command.rotation_ticks,
                    translation_ticks = unit.command.translation_ticks,
                    "preempting unfinished command"
                );
            }
            unit.command = command;
        }
    }

    pub fn lock(&mut self, index: usize) {
        if let Some(unit) = self.units.get_mut(index) {
            unit.locked = true;
        }
    }

    /// Clears the lock on the unit addressed by `unit_id`; returns false for unknown ids.
    pub fn release(&mut self, unit_id: u8) -> bool {
        match self.units.iter_mut().find(|u| u.id == unit_id) {
            Some(unit) => {
                if unit.locked {
                    info!(unit_id, "unit released");
                }
                unit.locked = false;
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self) -> FleetUpdate {
        FleetUpdate {
            tick: self.tick,
            selected: self.selected,
            units: self
                .units
                .iter()
                .enumerate()
                .map(|(index, unit)| UnitSnapshot::from_unit(index, unit))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_spawns_fixed_row() {
        let fleet = FleetState::init(&FleetTuning::default());

        let ids: Vec<u8> = fleet.units().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(fleet.unit(0).map(|u| u.position), Some(Vec2::new(100.0, 100.0)));
        assert_eq!(fleet.unit(2).map(|u| u.position), Some(Vec2::new(300.0, 100.0)));
        assert!(fleet.units().iter().all(|u| u.command.is_idle() && !u.locked));
        assert_eq!(fleet.selected(), None);
    }

    #[test]
    fn locked_and_unknown_units_cannot_be_selected() {
        let mut fleet = FleetState::init(&FleetTuning::default());
        fleet.lock(1);

        assert_eq!(fleet.select(1), SelectOutcome::Locked);
        assert_eq!(fleet.select(9), SelectOutcome::UnknownIndex);
        assert_eq!(fleet.selected(), None);

        assert_eq!(fleet.select(2), SelectOutcome::Selected);
        assert_eq!(fleet.select(0), SelectOutcome::Selected);
        assert_eq!(fleet.selected(), Some(0));
        assert_eq!(fleet.take_selection(), Some(0));
        assert_eq!(fleet.selected(), None);
    }

    #[test]
    fn release_unlocks_by_protocol_id() {
        let mut fleet = FleetState::init(&FleetTuning::default());
        fleet.lock(2);

        assert!(fleet.release(3));
        assert!(!fleet.release(42));
        assert_eq!(fleet.select(2), SelectOutcome::Selected);
    }

    #[test]
    fn tick_advances_every_unit_in_one_step() {
        let mut fleet = FleetState::init(&FleetTuning::default());
        fleet.assign(
            0,
            Command {
                rotation_rate: 0.8,
                rotation_ticks: 1,
                velocity: Vec2::new(0.0, 2.0),
                translation_ticks: 1,
            },
        );
        fleet.assign(
            2,
            Command {
                velocity: Vec2::new(-2.0, 0.0),
                translation_ticks: 2,
                ..Command::IDLE
            },
        );

        assert_eq!(fleet.tick(), 1);
        let snapshot = fleet.snapshot();
        assert_eq!(snapshot.tick, 1);
        assert_eq!((snapshot.units[0].x, snapshot.units[0].y), (100.0, 100.0));
        assert!((snapshot.units[0].orientation - 0.8).abs() < 1e-6);
        assert_eq!((snapshot.units[2].x, snapshot.units[2].y), (298.0, 100.0));

        fleet.tick();
        fleet.tick();
        let snapshot = fleet.snapshot();
        assert_eq!((snapshot.units[0].x, snapshot.units[0].y), (100.0, 102.0));
        assert_eq!((snapshot.units[2].x, snapshot.units[2].y), (296.0, 100.0));
        assert!(snapshot.units.iter().all(|u| !u.busy));
    }

    #[test]
    fn assign_preempts_unfinished_command() {
        let mut fleet = FleetState::init(&FleetTuning::default());
        fleet.assign(
            1,
            Command {
                velocity: Vec2::new(2.0, 0.0),
                translation_ticks: 50,
                ..Command::IDLE
            },
        );
        fleet.tick();

        fleet.assign(
            1,
            Command {
                velocity: Vec2::new(0.0, -2.0),
                translation_ticks: 1,
                ..Command::IDLE
            },
        );
        fleet.tick();
        fleet.tick();

        assert_eq!(fleet.unit(1).map(|u| u.position), Some(Vec2::new(202.0, 98.0)));
        assert!(fleet.unit(1).is_some_and(|u| u.command.is_idle()));
    }
}
