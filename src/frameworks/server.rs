// Framework bootstrap for the swarm controller runtime.

use crate::frameworks::config;
use crate::interface_adapters::net::{
    fleet_snapshot_handler, fleet_update_serializer, link_status_handler, sim_drop_handler,
    ws_handler,
};
use crate::interface_adapters::sim_radio::{SimRadioSettings, SimulatedRadio};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{
    ControlSettings, FleetUpdate, LinkSession, LinkSettings, SurfaceEvent, control_task,
};

use axum::{
    Router,
    extract::ws::Utf8Bytes,
    routing::{get, post},
};
use std::net::SocketAddr;
use std::{io::Result, sync::Arc};
use tokio::sync::{Notify, broadcast, mpsc, watch};

fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let shutdown = Arc::new(Notify::new());
    let state = build_state(shutdown.clone());

    let app = Router::new()
        .route("/ws", get(ws_handler))
        .route("/fleet", get(fleet_snapshot_handler))
        .route("/link", get(link_status_handler))
        .route("/sim/drop", post(sim_drop_handler))
        .with_state(state);

    tracing::info!(%address, "listening");

    let served = axum::serve(listener, app).await.inspect_err(|e| {
        tracing::error!(error = %e, "server error");
    });
    // Stop the control loop with the server so nothing keeps commanding units.
    shutdown.notify_one();
    served
}

pub async fn run_with_config() -> Result<()> {
    init_runtime();

    let address = SocketAddr::from(([127, 0, 0, 1], config::http_port()));

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

fn build_state(shutdown: Arc<Notify>) -> Arc<AppState> {
    let fleet = config::fleet_tuning();
    let motion = config::motion_tuning();
    let service = config::service_uuid();
    let command_characteristic = config::command_characteristic_uuid();
    let notify_characteristic = config::notify_characteristic_uuid(command_characteristic);
    tracing::debug!(
        %service,
        %command_characteristic,
        notify_characteristic = ?notify_characteristic,
        units = fleet.unit_count,
        rotation_step = motion.rotation_step,
        translation_step = motion.translation_step,
        "controller configured"
    );
    if notify_characteristic.is_none() {
        tracing::warn!("acknowledgements disabled; commanded units stay locked until restart");
    }

    // input_tx/rx: all surface input goes to the single control task.
    let (input_tx, input_rx) = mpsc::channel::<SurfaceEvent>(config::INPUT_CHANNEL_CAPACITY);
    // link_events_tx/rx: acknowledgements and drops flowing back from the link.
    let (link_events_tx, link_events_rx) = mpsc::channel(config::LINK_EVENT_CAPACITY);
    let (fleet_tx, _fleet_rx) = broadcast::channel::<FleetUpdate>(config::FLEET_BROADCAST_CAPACITY);
    let (fleet_bytes_tx, _fleet_bytes_rx) =
        broadcast::channel::<Utf8Bytes>(config::FLEET_BROADCAST_CAPACITY);
    let (fleet_latest_tx, _fleet_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));

    let radio = SimulatedRadio::new(SimRadioSettings {
        peer_name: config::SIM_PEER_NAME.to_string(),
        service,
        command_characteristic,
        notify_characteristic: notify_characteristic.unwrap_or(command_characteristic),
        unit_ids: (1..=fleet.unit_count).collect(),
        turn_rate_deg_per_sec: config::SIM_TURN_RATE_DEG_PER_SEC,
        drive_speed_per_sec: config::SIM_DRIVE_SPEED_PER_SEC,
        connect_latency: config::SIM_CONNECT_LATENCY,
    });
    let link = LinkSession::new(
        Arc::new(radio.clone()),
        LinkSettings {
            service,
            command_characteristic,
            notify_characteristic,
            outbound_capacity: config::OUTBOUND_PACKET_CAPACITY,
        },
        link_events_tx,
    );

    tokio::spawn(control_task(
        input_rx,
        link_events_rx,
        fleet_tx.clone(),
        link.clone(),
        ControlSettings {
            tick_interval: config::TICK_INTERVAL,
            fleet,
            motion,
        },
        shutdown,
    ));

    // Serialize once per tick for every socket.
    tokio::spawn(fleet_update_serializer(
        fleet_tx.subscribe(),
        fleet_bytes_tx.clone(),
        fleet_latest_tx.clone(),
    ));

    Arc::new(AppState {
        input_tx,
        fleet_tx,
        fleet_bytes_tx,
        fleet_latest_tx,
        link,
        radio,
    })
}
