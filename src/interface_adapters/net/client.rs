use crate::domain::LinkState;
use crate::interface_adapters::protocol::{ControllerMessage, FleetUpdateDto, SurfaceMessage};
use crate::interface_adapters::state::AppState;
use crate::use_cases::{FleetUpdate, SurfaceEvent};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    FleetUpdatesClosed,
    LinkStatusClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

pub async fn fleet_update_serializer(
    mut fleet_rx: broadcast::Receiver<FleetUpdate>,
    fleet_bytes_tx: broadcast::Sender<Utf8Bytes>,
    fleet_latest_tx: watch::Sender<Utf8Bytes>,
) {
    // Serialize each snapshot once and broadcast the shared bytes.
    loop {
        match fleet_rx.recv().await {
            Ok(update) => {
                let msg = ControllerMessage::FleetUpdate(FleetUpdateDto::from(update));
                let txt = match serde_json::to_string(&msg) {
                    Ok(txt) => txt,
                    Err(e) => {
                        error!(error = ?e, "failed to serialize fleet update");
                        continue;
                    }
                };

                let bytes = Utf8Bytes::from(txt);
                // Latest bytes back lag recovery and GET /fleet; stored even with no surface
                // attached.
                fleet_latest_tx.send_replace(bytes.clone());
                let _ = fleet_bytes_tx.send(bytes);
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(missed = n, "fleet serializer lagged; skipping to latest update");
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("fleet updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Connection id correlates every log line of one surface session.
    let conn_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| {
        handle_socket(socket, state).instrument(info_span!("surface", %conn_id))
    })
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut ctx = match bootstrap_connection(&mut socket, &state).await {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(error = ?e, "failed to bootstrap surface connection");
            let _ = socket.close().await;
            return;
        }
    };
    info!("surface connected");

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "surface loop exited with error");
    }

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        lag_recovery_count = ctx.lag_recovery_count,
        "connection stats"
    );
    info!("surface disconnected");
}

async fn send_message(socket: &mut WebSocket, msg: &ControllerMessage) -> Result<usize, NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    let bytes = txt.len();
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)?;
    Ok(bytes)
}

struct ConnCtx {
    pub input_tx: mpsc::Sender<SurfaceEvent>,
    pub fleet_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    pub fleet_latest_rx: watch::Receiver<Utf8Bytes>,
    pub link_state_rx: watch::Receiver<LinkState>,
    // Count lag recovery snapshots sent to this surface.
    pub lag_recovery_count: u64,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_json: u32,

    pub last_input_full_log: Instant,
    pub last_fleet_lag_log: Instant,
    pub last_invalid_input_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    state: &AppState,
) -> Result<ConnCtx, NetError> {
    // Subscribe before any await so no update slips between the snapshot and the stream.
    let fleet_bytes_rx = state.fleet_bytes_tx.subscribe();
    let fleet_latest_rx = state.fleet_latest_tx.subscribe();
    let mut link_state_rx = state.link.subscribe_state();

    // Initial link status so the indicator never starts blank.
    let link_state = *link_state_rx.borrow_and_update();
    let mut msgs_out = 1;
    let mut bytes_out =
        send_message(socket, &ControllerMessage::LinkStatus(link_state.into())).await? as u64;

    // Latest snapshot, when the loop has produced one already.
    let latest = fleet_latest_rx.borrow().clone();
    if !latest.is_empty() {
        bytes_out += latest.len() as u64;
        msgs_out += 1;
        socket.send(Message::Text(latest)).await?;
    }

    let now = Instant::now() - LOG_THROTTLE;
    Ok(ConnCtx {
        input_tx: state.input_tx.clone(),
        fleet_bytes_rx,
        fleet_latest_rx,
        link_state_rx,
        lag_recovery_count: 0,

        msgs_in: 0,
        msgs_out,
        bytes_in: 0,
        bytes_out,

        invalid_json: 0,

        last_input_full_log: now,
        last_fleet_lag_log: now,
        last_invalid_input_log: now,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

fn process_surface_message(
    input_tx: &mpsc::Sender<SurfaceEvent>,
    msg: SurfaceMessage,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
) -> Result<LoopControl, NetError> {
    let Some(event) = msg.into_event() else {
        if should_log(last_invalid_input_log) {
            warn!("invalid pointer coordinates (NaN/inf); dropping");
        }
        return Ok(LoopControl::Continue);
    };

    match input_tx.try_send(event) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_evt)) => {
            if should_log(last_input_full_log) {
                warn!("input channel full; dropping surface event");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_evt)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    // Split borrows so `tokio::select!` can hold them concurrently.
    let ConnCtx {
        input_tx,
        fleet_bytes_rx,
        fleet_latest_rx,
        link_state_rx,
        lag_recovery_count,
        msgs_in,
        msgs_out,
        bytes_in,
        bytes_out,
        invalid_json,
        last_input_full_log,
        last_fleet_lag_log,
        last_invalid_input_log,
        close_frame,
    } = ctx;

    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    input_tx,
                    msgs_in,
                    bytes_in,
                    invalid_json,
                    last_input_full_log,
                    last_invalid_input_log,
                    close_frame,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            fleet_msg = fleet_bytes_rx.recv() => {
                match fleet_msg {
                    Ok(bytes) => match forward_fleet_bytes(bytes, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(last_fleet_lag_log) {
                            warn!(missed = n, "fleet updates lagged; sending snapshot");
                        }

                        // Resync with the latest snapshot instead of replaying the backlog.
                        let latest = fleet_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            *lag_recovery_count += 1;
                            match forward_fleet_bytes(latest, socket, msgs_out, bytes_out).await {
                                LoopControl::Continue => false,
                                LoopControl::Disconnect => true,
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::FleetUpdatesClosed);
                        true
                    }
                }
            }

            changed = link_state_rx.changed() => {
                match changed {
                    Ok(()) => match forward_link_status(link_state_rx, socket, msgs_out, bytes_out).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    Err(_) => {
                        warn!("link status channel closed; disconnecting");
                        fatal = Some(NetError::LinkStatusClosed);
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    input_tx: &mpsc::Sender<SurfaceEvent>,
    msgs_in: &mut u64,
    bytes_in: &mut u64,
    invalid_json: &mut u32,
    last_input_full_log: &mut Instant,
    last_invalid_input_log: &mut Instant,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                *msgs_in += 1;
                *bytes_in += text.len() as u64;

                match serde_json::from_str::<SurfaceMessage>(&text) {
                    Ok(msg) => process_surface_message(
                        input_tx,
                        msg,
                        last_input_full_log,
                        last_invalid_input_log,
                    ),
                    Err(parse_err) => {
                        *invalid_json += 1;
                        if should_log(last_invalid_input_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse surface message"
                            );
                        }

                        if *invalid_json > MAX_INVALID_JSON {
                            *close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                *close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_fleet_bytes(
    fleet_msg: Utf8Bytes,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let bytes_len = fleet_msg.len();
    match socket.send(Message::Text(fleet_msg)).await.map_err(NetError::Ws) {
        Ok(()) => {
            *msgs_out += 1;
            *bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send fleet update");
            LoopControl::Disconnect
        }
    }
}

async fn forward_link_status(
    link_state_rx: &mut watch::Receiver<LinkState>,
    socket: &mut WebSocket,
    msgs_out: &mut u64,
    bytes_out: &mut u64,
) -> LoopControl {
    let state = *link_state_rx.borrow_and_update();
    let msg = ControllerMessage::LinkStatus(state.into());
    match send_message(socket, &msg).await {
        Ok(bytes) => {
            *msgs_out += 1;
            *bytes_out += bytes as u64;
            LoopControl::Continue
        }
        Err(err) => {
            warn!(error = ?err, "failed to send link status");
            LoopControl::Disconnect
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn serializer_keeps_latest_snapshot_without_subscribers() {
        let (fleet_tx, fleet_rx) = broadcast::channel(4);
        let (fleet_bytes_tx, _) = broadcast::channel(4);
        let (fleet_latest_tx, fleet_latest_rx) = watch::channel(Utf8Bytes::from(""));
        drop(fleet_latest_rx);

        tokio::spawn(fleet_update_serializer(
            fleet_rx,
            fleet_bytes_tx,
            fleet_latest_tx.clone(),
        ));
        fleet_tx
            .send(FleetUpdate {
                tick: 7,
                selected: None,
                units: Vec::new(),
            })
            .expect("serializer subscribed");

        let mut latest = fleet_latest_tx.subscribe();
        let stored = tokio::time::timeout(
            Duration::from_secs(1),
            latest.wait_for(|bytes| !bytes.as_str().is_empty()),
        )
        .await
        .expect("snapshot stored in time")
        .expect("sender alive")
        .clone();

        let json: serde_json::Value = serde_json::from_str(stored.as_str()).expect("json");
        assert_eq!(json["type"], "FleetUpdate");
        assert_eq!(json["data"]["tick"], 7);
    }
}
