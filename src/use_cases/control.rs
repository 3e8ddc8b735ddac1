use super::fleet::FleetState;
use super::link_session::LinkSession;
use super::selection::{DispatchOutcome, SelectionController};
use super::types::{FleetUpdate, LinkEvent, SurfaceEvent};
use crate::domain::LinkError;
use crate::domain::tuning::fleet::FleetTuning;
use crate::domain::tuning::motion::MotionTuning;
use glam::Vec2;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ControlSettings {
    pub tick_interval: Duration,
    pub fleet: FleetTuning,
    pub motion: MotionTuning,
}

/// Owns the fleet and drives it at a fixed step: surface input, then link events, then one
/// executor tick, then a snapshot broadcast.
pub async fn control_task(
    mut input_rx: mpsc::Receiver<SurfaceEvent>,
    mut link_events_rx: mpsc::Receiver<LinkEvent>,
    fleet_tx: broadcast::Sender<FleetUpdate>,
    session: LinkSession,
    settings: ControlSettings,
    shutdown: Arc<Notify>,
) {
    let mut fleet = FleetState::init(&settings.fleet);
    let controller = SelectionController {
        sink: session,
        tuning: settings.motion,
    };
    info!(units = fleet.units().len(), "control loop started");

    let mut interval = tokio::time::interval(settings.tick_interval);

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                break;
            }
            _ = interval.tick() => {}
        }

        while let Ok(event) = input_rx.try_recv() {
            apply_surface_event(&controller, &mut fleet, event);
        }

        while let Ok(event) = link_events_rx.try_recv() {
            apply_link_event(&mut fleet, event);
        }

        fleet.tick();

        // No subscribers is fine; the surface may not be attached yet.
        let _ = fleet_tx.send(fleet.snapshot());
    }

    info!(tick = fleet.snapshot().tick, "control loop stopped");
}

fn apply_surface_event(
    controller: &SelectionController<LinkSession>,
    fleet: &mut FleetState,
    event: SurfaceEvent,
) {
    match event {
        SurfaceEvent::SelectUnit { index } => {
            controller.unit_pointer_down(fleet, index);
        }
        SurfaceEvent::PointerDown { x, y } => {
            if let DispatchOutcome::NoSelection =
                controller.field_pointer_down(fleet, Vec2::new(x, y))
            {
                debug!(x, y, "field click with no selection ignored");
            }
        }
        SurfaceEvent::ToggleLink => {
            // Connect/disconnect can take seconds; the loop keeps ticking meanwhile.
            let session = controller.sink.clone();
            tokio::spawn(async move {
                match session.toggle().await {
                    Ok(()) => {}
                    Err(LinkError::TransitionInFlight) => {
                        debug!("link toggle ignored; transition in flight");
                    }
                    Err(e) => warn!(error = %e, "link toggle failed"),
                }
            });
        }
    }
}

fn apply_link_event(fleet: &mut FleetState, event: LinkEvent) {
    match event {
        LinkEvent::UnitReleased { unit_id } => {
            if !fleet.release(unit_id) {
                warn!(unit_id, "acknowledgement for unknown unit ignored");
            }
        }
        LinkEvent::Disconnected => {
            // Locks stay until their unit reports back.
            let locked = fleet.units().iter().filter(|u| u.locked).count();
            info!(locked, "link lost; fleet keeps simulating");
        }
    }
}
