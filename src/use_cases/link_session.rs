// Radio link session: connection state machine, one-time discovery and fire-and-forget sends.

use crate::domain::codec::{self, COMMAND_LEN};
use crate::domain::ports::{Characteristic, LinkProvider, Transport};
use crate::domain::{CommandPacket, LinkError, LinkState};
use crate::use_cases::selection::{CommandSink, DropReason, SendOutcome};
use crate::use_cases::types::LinkEvent;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Identifiers and buffer sizes for one deployment.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub service: Uuid,
    pub command_characteristic: Uuid,
    /// Characteristic carrying 1-byte unit acknowledgements; may equal the command one.
    pub notify_characteristic: Option<Uuid>,
    /// Encoded packets waiting for the writer task.
    pub outbound_capacity: usize,
}

/// Cheaply cloneable handle to the single link session.
#[derive(Clone)]
pub struct LinkSession {
    shared: Arc<Shared>,
}

struct Shared {
    provider: Arc<dyn LinkProvider>,
    settings: LinkSettings,
    state_tx: watch::Sender<LinkState>,
    events_tx: mpsc::Sender<LinkEvent>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    // Single-flight guard for connect/disconnect.
    in_flight: bool,
    // Generation of the current connection attempt; stale callbacks and transitions compare
    // against it and back off.
    epoch: u64,
    connection: Option<Connection>,
}

struct Connection {
    transport: Arc<dyn Transport>,
    outbound_tx: mpsc::Sender<[u8; COMMAND_LEN]>,
    ack_task: Option<JoinHandle<()>>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.ack_task.take() {
            task.abort();
        }
    }
}

// Everything discovery produced, before it is installed as the live connection.
struct Established {
    transport: Arc<dyn Transport>,
    command: Arc<dyn Characteristic>,
    acks: Option<BoxStream<'static, Vec<u8>>>,
}

struct Failed {
    error: LinkError,
    // Transport to tear down when the failure happened after it came up.
    transport: Option<Arc<dyn Transport>>,
}

impl From<LinkError> for Failed {
    fn from(error: LinkError) -> Self {
        Self {
            error,
            transport: None,
        }
    }
}

/// Held for the duration of one connect/disconnect; releases the single-flight guard even
/// when the future is dropped half way.
struct Transition {
    shared: Arc<Shared>,
    epoch: u64,
}

impl Drop for Transition {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if inner.epoch != self.epoch || !inner.in_flight {
            return;
        }
        inner.in_flight = false;
        // Only reached when the transition was cancelled before it settled.
        let state = *self.shared.state_tx.borrow();
        match state {
            LinkState::Connecting => {
                inner.connection = None;
                self.shared.set_state(LinkState::Disconnected);
            }
            LinkState::Disconnecting => {
                // Transport state unknown; keep it so its drop still lands.
                self.shared.set_state(LinkState::Error);
            }
            _ => {}
        }
    }
}

impl LinkSession {
    pub fn new(
        provider: Arc<dyn LinkProvider>,
        settings: LinkSettings,
        events_tx: mpsc::Sender<LinkEvent>,
    ) -> Self {
        let (state_tx, _state_rx) = watch::channel(LinkState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                provider,
                settings,
                state_tx,
                events_tx,
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    pub fn state(&self) -> LinkState {
        *self.shared.state_tx.borrow()
    }

    /// Status indicator feed; every state change is published here.
    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.shared.state_tx.subscribe()
    }

    pub fn is_transition_in_flight(&self) -> bool {
        self.shared.lock().in_flight
    }

    /// Connects when idle, disconnects when connected.
    pub async fn toggle(&self) -> Result<(), LinkError> {
        if self.state() == LinkState::Connected {
            self.disconnect().await
        } else {
            self.connect().await
        }
    }

    pub async fn connect(&self) -> Result<(), LinkError> {
        let transition = self.begin(LinkState::can_connect, LinkState::Connecting, true)?;

        // A failed disconnect leaves its transport behind; its epoch is already retired.
        let stale = self.shared.lock().connection.take();
        if let Some(stale) = stale {
            info!("closing transport left by a failed disconnect");
            close_quietly(stale.transport.clone()).await;
        }

        match self.establish(transition.epoch).await {
            Ok(established) => self.finish_connect(transition, established),
            Err(failed) => {
                warn!(error = %failed.error, "link connect failed");
                self.fail(&transition, true);
                if let Some(transport) = failed.transport {
                    close_quietly(transport).await;
                }
                Err(failed.error)
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), LinkError> {
        let transition =
            self.begin(|s| s == LinkState::Connected, LinkState::Disconnecting, false)?;

        let transport = self
            .shared
            .lock()
            .connection
            .as_ref()
            .map(|c| c.transport.clone());
        let Some(transport) = transport else {
            self.fail(&transition, true);
            return Err(LinkError::InvalidState(LinkState::Connected));
        };

        match transport.disconnect().await {
            Ok(()) => {
                let mut inner = self.shared.lock();
                // The transport usually reports its own drop first, which already settled the
                // state.
                if inner.epoch == transition.epoch {
                    inner.in_flight = false;
                    inner.epoch += 1;
                    inner.connection = None;
                    self.shared.set_state(LinkState::Disconnected);
                }
                info!("link disconnected");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "link disconnect failed");
                self.fail(&transition, false);
                Err(e)
            }
        }
    }

    // Claims the single-flight guard and moves into the transitional state.
    fn begin(
        &self,
        allowed: impl Fn(LinkState) -> bool,
        next: LinkState,
        new_epoch: bool,
    ) -> Result<Transition, LinkError> {
        let mut inner = self.shared.lock();
        if inner.in_flight {
            debug!(?next, "link transition already in flight; dropping request");
            return Err(LinkError::TransitionInFlight);
        }
        let state = *self.shared.state_tx.borrow();
        if !allowed(state) {
            debug!(?state, ?next, "link transition not valid from current state");
            return Err(LinkError::InvalidState(state));
        }

        inner.in_flight = true;
        if new_epoch {
            inner.epoch += 1;
        }
        self.shared.set_state(next);

        Ok(Transition {
            shared: self.shared.clone(),
            epoch: inner.epoch,
        })
    }

    async fn establish(&self, epoch: u64) -> Result<Established, Failed> {
        let settings = &self.shared.settings;

        let peer = self.shared.provider.request_peer(settings.service).await?;
        debug!(peer = %peer.name(), "peer selected");
        let transport = peer.connect_transport().await?;

        let discovered = async {
            let service = transport.service(settings.service).await?;
            let command = service
                .characteristic(settings.command_characteristic)
                .await?;

            // Watch for drops from here on; a drop forces Disconnected in any state.
            let weak: Weak<Shared> = Arc::downgrade(&self.shared);
            transport.on_disconnect(Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.transport_lost(epoch);
                }
            }));

            let acks = match settings.notify_characteristic {
                Some(id) if id == settings.command_characteristic => {
                    Some(command.subscribe().await?)
                }
                Some(id) => Some(service.characteristic(id).await?.subscribe().await?),
                None => None,
            };
            Ok::<_, LinkError>((command, acks))
        }
        .await;

        match discovered {
            Ok((command, acks)) => Ok(Established {
                transport,
                command,
                acks,
            }),
            Err(error) => Err(Failed {
                error,
                transport: Some(transport),
            }),
        }
    }

    fn finish_connect(
        &self,
        transition: Transition,
        established: Established,
    ) -> Result<(), LinkError> {
        let Established {
            transport,
            command,
            acks,
        } = established;

        let mut inner = self.shared.lock();
        if inner.epoch != transition.epoch {
            drop(inner);
            warn!("link dropped while connecting; discarding new transport");
            tokio::spawn(close_quietly(transport));
            return Err(LinkError::Superseded);
        }

        let (outbound_tx, outbound_rx) = mpsc::channel(self.shared.settings.outbound_capacity);
        tokio::spawn(write_loop(outbound_rx, command));
        let ack_task = acks.map(|acks| {
            tokio::spawn(forward_acks(acks, self.shared.events_tx.clone()))
        });

        inner.connection = Some(Connection {
            transport,
            outbound_tx,
            ack_task,
        });
        inner.in_flight = false;
        self.shared.set_state(LinkState::Connected);
        info!("link connected");
        Ok(())
    }

    // Settles a failed transition into Error, unless a transport drop got there first.
    // `retire` drops the attempt so teardown of its transport is not reported as a drop;
    // without it the connection stays owned and its later drop still forces Disconnected.
    fn fail(&self, transition: &Transition, retire: bool) {
        let mut inner = self.shared.lock();
        if inner.epoch != transition.epoch {
            return;
        }
        inner.in_flight = false;
        if retire {
            inner.epoch += 1;
            inner.connection = None;
        }
        self.shared.set_state(LinkState::Error);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: LinkState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            info!(from = ?previous, to = ?next, status = next.label(), "link state changed");
        }
    }

    fn transport_lost(&self, epoch: u64) {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!(epoch, "ignoring disconnect from a retired transport");
            return;
        }
        inner.epoch += 1;
        inner.in_flight = false;
        inner.connection = None;
        self.set_state(LinkState::Disconnected);
        drop(inner);

        warn!("peer disconnected");
        if let Err(e) = self.events_tx.try_send(LinkEvent::Disconnected) {
            warn!(error = %e, "could not report link drop");
        }
    }
}

impl CommandSink for LinkSession {
    fn send(&self, packet: &CommandPacket) -> SendOutcome {
        let inner = self.shared.lock();
        if inner.in_flight {
            debug!(unit_id = packet.unit_id, "link transition in flight; dropping packet");
            return SendOutcome::Dropped(DropReason::TransitionInFlight);
        }
        let connection = match (self.state(), inner.connection.as_ref()) {
            (LinkState::Connected, Some(connection)) => connection,
            (state, _) => {
                debug!(unit_id = packet.unit_id, ?state, "link not connected; dropping packet");
                return SendOutcome::Dropped(DropReason::NotConnected);
            }
        };

        match connection.outbound_tx.try_send(codec::encode_command(packet)) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(unit_id = packet.unit_id, "outbound queue full; dropping packet");
                SendOutcome::Dropped(DropReason::Backlogged)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                SendOutcome::Dropped(DropReason::NotConnected)
            }
        }
    }
}

async fn write_loop(
    mut outbound_rx: mpsc::Receiver<[u8; COMMAND_LEN]>,
    command: Arc<dyn Characteristic>,
) {
    // Ends when the connection (and its sender) is dropped.
    while let Some(bytes) = outbound_rx.recv().await {
        if let Err(e) = command.write_without_response(&bytes).await {
            warn!(error = %e, unit_id = bytes[0], "command write failed");
        }
    }
    debug!("command writer exiting");
}

async fn forward_acks(mut acks: BoxStream<'static, Vec<u8>>, events_tx: mpsc::Sender<LinkEvent>) {
    while let Some(payload) = acks.next().await {
        match codec::decode_ack(&payload) {
            Ok(ack) => {
                debug!(unit_id = ack.unit_id, "unit acknowledged");
                if events_tx
                    .send(LinkEvent::UnitReleased {
                        unit_id: ack.unit_id,
                    })
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => warn!(error = %e, "malformed acknowledgement ignored"),
        }
    }
    debug!("acknowledgement stream ended");
}

async fn close_quietly(transport: Arc<dyn Transport>) {
    if let Err(e) = transport.disconnect().await {
        debug!(error = %e, "transport teardown failed");
    }
}
