// In-process stand-in for the radio peer: decodes command writes, "drives" the addressed unit
// for a while and notifies its id back, like the unit firmware does.

use crate::domain::codec;
use crate::domain::ports::{
    Characteristic, DisconnectCallback, LinkProvider, Peer, Service, Transport,
};
use crate::domain::{CommandPacket, LinkError, UnitAck};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SimRadioSettings {
    pub peer_name: String,
    pub service: Uuid,
    pub command_characteristic: Uuid,
    // Characteristic the units notify on; firmware reuses the command one.
    pub notify_characteristic: Uuid,
    pub unit_ids: Vec<u8>,
    pub turn_rate_deg_per_sec: f32,
    pub drive_speed_per_sec: f32,
    pub connect_latency: Duration,
}

impl SimRadioSettings {
    /// Time a unit spends executing one packet before it reports back.
    pub fn move_duration(&self, packet: &CommandPacket) -> Duration {
        let turn = packet.turn.unsigned_abs() as f32 / self.turn_rate_deg_per_sec;
        let drive = packet.distance as f32 / self.drive_speed_per_sec;
        Duration::try_from_secs_f32(turn + drive).unwrap_or(Duration::ZERO)
    }
}

#[derive(Clone)]
pub struct SimulatedRadio {
    shared: Arc<SimShared>,
}

struct SimShared {
    settings: SimRadioSettings,
    connection: Mutex<Option<SimConnection>>,
    next_generation: Mutex<u64>,
    // One lane per unit so its moves run back to back, never overlapping.
    lanes: HashMap<u8, Arc<tokio::sync::Mutex<()>>>,
}

struct SimConnection {
    generation: u64,
    on_disconnect: Vec<DisconnectCallback>,
    subscribers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
}

impl SimulatedRadio {
    pub fn new(settings: SimRadioSettings) -> Self {
        let lanes = settings
            .unit_ids
            .iter()
            .map(|id| (*id, Arc::new(tokio::sync::Mutex::new(()))))
            .collect();
        Self {
            shared: Arc::new(SimShared {
                settings,
                connection: Mutex::new(None),
                next_generation: Mutex::new(0),
                lanes,
            }),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connection().is_some()
    }

    /// Drops the live connection from the peer side, as if it went out of range.
    pub fn inject_disconnect(&self) {
        let current = self.shared.connection().as_ref().map(|c| c.generation);
        match current {
            Some(generation) => {
                warn!(generation, "simulated peer dropping the link");
                self.shared.close(generation);
            }
            None => debug!("simulated disconnect with no live link"),
        }
    }
}

impl SimShared {
    fn connection(&self) -> MutexGuard<'_, Option<SimConnection>> {
        self.connection
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, generation: u64) -> bool {
        self.connection()
            .as_ref()
            .is_some_and(|c| c.generation == generation)
    }

    fn open(&self) -> u64 {
        let generation = {
            let mut next = self
                .next_generation
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        // The peer serves a single central; a new one displaces the old without notice.
        let previous = self.connection().replace(SimConnection {
            generation,
            on_disconnect: Vec::new(),
            subscribers: Vec::new(),
        });
        if let Some(previous) = previous {
            debug!(previous = previous.generation, "replacing stale simulated link");
        }
        generation
    }

    // Callbacks run outside the lock; they may call straight back into the session.
    fn close(&self, generation: u64) {
        let closed = {
            let mut connection = self.connection();
            let current = connection
                .as_ref()
                .is_some_and(|c| c.generation == generation);
            if current { connection.take() } else { None }
        };
        if let Some(closed) = closed {
            for callback in &closed.on_disconnect {
                callback();
            }
        }
    }

    fn notify(&self, generation: u64, payload: &[u8]) -> bool {
        let mut connection = self.connection();
        let Some(live) = connection.as_mut().filter(|c| c.generation == generation) else {
            return false;
        };
        live.subscribers.retain(|tx| tx.send(payload.to_vec()).is_ok());
        true
    }

    fn execute(self: &Arc<Self>, generation: u64, packet: CommandPacket) {
        let Some(lane) = self.lanes.get(&packet.unit_id).cloned() else {
            debug!(unit_id = packet.unit_id, "no simulated unit with this id; packet ignored");
            return;
        };
        let duration = self.settings.move_duration(&packet);
        let shared = self.clone();

        tokio::spawn(async move {
            let _busy = lane.lock().await;
            debug!(
                unit_id = packet.unit_id,
                turn = packet.turn,
                distance = packet.distance,
                millis = duration.as_millis() as u64,
                "simulated unit moving"
            );
            tokio::time::sleep(duration).await;

            let ack = codec::encode_ack(UnitAck {
                unit_id: packet.unit_id,
            });
            if !shared.notify(generation, &ack) {
                debug!(unit_id = packet.unit_id, "link gone before unit finished; ack lost");
            }
        });
    }
}

#[async_trait]
impl LinkProvider for SimulatedRadio {
    async fn request_peer(&self, service: Uuid) -> Result<Arc<dyn Peer>, LinkError> {
        if service != self.shared.settings.service {
            return Err(LinkError::PeerNotFound(service));
        }
        Ok(Arc::new(SimPeer {
            shared: self.shared.clone(),
        }))
    }
}

struct SimPeer {
    shared: Arc<SimShared>,
}

#[async_trait]
impl Peer for SimPeer {
    fn name(&self) -> String {
        self.shared.settings.peer_name.clone()
    }

    async fn connect_transport(&self) -> Result<Arc<dyn Transport>, LinkError> {
        tokio::time::sleep(self.shared.settings.connect_latency).await;
        let generation = self.shared.open();
        info!(generation, peer = %self.shared.settings.peer_name, "simulated link up");
        Ok(Arc::new(SimTransport {
            shared: self.shared.clone(),
            generation,
        }))
    }
}

struct SimTransport {
    shared: Arc<SimShared>,
    generation: u64,
}

#[async_trait]
impl Transport for SimTransport {
    async fn service(&self, id: Uuid) -> Result<Arc<dyn Service>, LinkError> {
        if !self.shared.is_live(self.generation) {
            return Err(LinkError::Connect("transport closed".to_string()));
        }
        if id != self.shared.settings.service {
            return Err(LinkError::ServiceMissing(id));
        }
        Ok(Arc::new(SimService {
            shared: self.shared.clone(),
            generation: self.generation,
        }))
    }

    fn on_disconnect(&self, callback: DisconnectCallback) {
        let late = {
            let mut connection = self.shared.connection();
            match connection.as_mut() {
                Some(live) if live.generation == self.generation => {
                    live.on_disconnect.push(callback);
                    None
                }
                _ => Some(callback),
            }
        };
        // Registering on a transport that is already gone reports the drop right away.
        if let Some(callback) = late {
            callback();
        }
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.shared.close(self.generation);
        info!(generation = self.generation, "simulated link closed");
        Ok(())
    }
}

struct SimService {
    shared: Arc<SimShared>,
    generation: u64,
}

#[async_trait]
impl Service for SimService {
    async fn characteristic(&self, id: Uuid) -> Result<Arc<dyn Characteristic>, LinkError> {
        let settings = &self.shared.settings;
        if id != settings.command_characteristic && id != settings.notify_characteristic {
            return Err(LinkError::CharacteristicMissing(id));
        }
        Ok(Arc::new(SimCharacteristic {
            shared: self.shared.clone(),
            generation: self.generation,
            id,
        }))
    }
}

struct SimCharacteristic {
    shared: Arc<SimShared>,
    generation: u64,
    id: Uuid,
}

#[async_trait]
impl Characteristic for SimCharacteristic {
    async fn write_without_response(&self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.id != self.shared.settings.command_characteristic {
            return Err(LinkError::Write(format!("characteristic {} is not writable", self.id)));
        }
        if !self.shared.is_live(self.generation) {
            return Err(LinkError::Write("transport closed".to_string()));
        }

        // The peer has no way to reject a write; bad payloads just never move anything.
        match codec::decode_command(bytes) {
            Ok(packet) => self.shared.execute(self.generation, packet),
            Err(e) => warn!(error = %e, "simulated peer ignored malformed command"),
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>, LinkError> {
        if self.id != self.shared.settings.notify_characteristic {
            return Err(LinkError::Subscribe(format!(
                "characteristic {} does not notify",
                self.id
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut connection = self.shared.connection();
            match connection.as_mut() {
                Some(live) if live.generation == self.generation => live.subscribers.push(tx),
                _ => return Err(LinkError::Subscribe("transport closed".to_string())),
            }
        }

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|payload| (payload, rx))
        })
        .boxed())
    }
}
