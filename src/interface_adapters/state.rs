use crate::interface_adapters::sim_radio::SimulatedRadio;
use crate::use_cases::{FleetUpdate, LinkSession, SurfaceEvent};
use axum::extract::ws::Utf8Bytes;
use tokio::sync::{broadcast, mpsc, watch};

#[derive(Clone)]
pub struct AppState {
    // Surface input flowing into the control loop.
    pub input_tx: mpsc::Sender<SurfaceEvent>,
    // Fleet snapshots produced by the control loop (use-case structs).
    pub fleet_tx: broadcast::Sender<FleetUpdate>,
    // Serialized fleet snapshots, shared across all sockets.
    pub fleet_bytes_tx: broadcast::Sender<Utf8Bytes>,
    // Latest serialized snapshot for lag recovery and GET /fleet.
    pub fleet_latest_tx: watch::Sender<Utf8Bytes>,
    // Radio link; its state feed drives the status indicator.
    pub link: LinkSession,
    // Peer side of the link, for injected drops.
    pub radio: SimulatedRadio,
}
