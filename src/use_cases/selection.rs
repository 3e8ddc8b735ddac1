// Pointer glue: a unit click selects, a field click plans, dispatches and locks.

use crate::domain::CommandPacket;
use crate::domain::systems::planner;
use crate::domain::tuning::motion::MotionTuning;
use crate::use_cases::fleet::{FleetState, SelectOutcome};
use glam::Vec2;
use tracing::{debug, info, warn};

/// Why an outbound packet never reached the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotConnected,
    TransitionInFlight,
    Backlogged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Queued,
    Dropped(DropReason),
}

// Port for handing packets to the radio without waiting on delivery.
pub trait CommandSink {
    fn send(&self, packet: &CommandPacket) -> SendOutcome;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    NoSelection,
    // Target was the unit's own position; nothing planned or sent.
    AlreadyThere { unit_id: u8 },
    Dispatched { unit_id: u8, send: SendOutcome },
}

pub struct SelectionController<S> {
    pub sink: S,
    pub tuning: MotionTuning,
}

impl<S> SelectionController<S>
where
    S: CommandSink,
{
    pub fn unit_pointer_down(&self, fleet: &mut FleetState, index: usize) -> SelectOutcome {
        let outcome = fleet.select(index);
        match outcome {
            SelectOutcome::Selected => debug!(index, "unit selected"),
            SelectOutcome::Locked => debug!(index, "locked unit ignored"),
            SelectOutcome::UnknownIndex => warn!(index, "pointer down on unknown unit index"),
        }
        outcome
    }

    pub fn field_pointer_down(&self, fleet: &mut FleetState, target: Vec2) -> DispatchOutcome {
        let Some(index) = fleet.take_selection() else {
            return DispatchOutcome::NoSelection;
        };
        let Some(unit) = fleet.unit(index) else {
            return DispatchOutcome::NoSelection;
        };
        let unit_id = unit.id;

        let plan = planner::plan(unit, target, &self.tuning);
        let Some(packet) = plan.packet else {
            debug!(unit_id, "target equals unit position; nothing to do");
            return DispatchOutcome::AlreadyThere { unit_id };
        };

        // The local simulation runs whether or not the radio takes the packet.
        fleet.assign(index, plan.command);

        let send = self.sink.send(&packet);
        match send {
            SendOutcome::Queued => {
                fleet.lock(index);
                info!(
                    unit_id,
                    turn = packet.turn,
                    distance = packet.distance,
                    "command dispatched"
                );
            }
            SendOutcome::Dropped(reason) => {
                // Left unlocked so the operator can re-select and retry.
                debug!(unit_id, ?reason, "command packet dropped");
            }
        }

        DispatchOutcome::Dispatched { unit_id, send }
    }
}
