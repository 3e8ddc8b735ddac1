use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::{Notify, mpsc};
use uuid::Uuid;

use crate::domain::LinkError;
use crate::domain::ports::{
    Characteristic, DisconnectCallback, LinkProvider, Peer, Service, Transport,
};
use crate::use_cases::link_session::LinkSettings;

pub(crate) const SERVICE: Uuid = Uuid::from_u128(0x0000_ffe0_0000_1000_8000_0080_5f9b_34fb);
pub(crate) const COMMAND_CHAR: Uuid = Uuid::from_u128(0x0000_ffe1_0000_1000_8000_0080_5f9b_34fb);

pub(crate) fn settings(notify: Option<Uuid>) -> LinkSettings {
    LinkSettings {
        service: SERVICE,
        command_characteristic: COMMAND_CHAR,
        notify_characteristic: notify,
        outbound_capacity: 8,
    }
}

#[derive(Clone, Copy, Default)]
pub(crate) struct FailureFlags {
    pub request_peer: bool,
    pub connect: bool,
    pub service: bool,
    pub characteristic: bool,
    pub subscribe: bool,
    pub write: bool,
    pub disconnect: bool,
}

#[derive(Default)]
struct RadioInner {
    failures: Mutex<FailureFlags>,
    // When set, connect_transport parks until notified.
    connect_gate: Mutex<Option<Arc<Notify>>>,
    callbacks: Mutex<Vec<DisconnectCallback>>,
    // When set, the next disconnect callback fires as soon as it is registered.
    drop_on_register: AtomicBool,
    writes: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    notifications: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

/// One fake peer playing every link port, recording writes and letting tests inject drops
/// and notifications.
#[derive(Clone, Default)]
pub(crate) struct FakeRadio {
    inner: Arc<RadioInner>,
}

impl FakeRadio {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_failures(self, failures: FailureFlags) -> Self {
        self.set_failures(failures);
        self
    }

    pub(crate) fn set_failures(&self, failures: FailureFlags) {
        *self.inner.failures.lock().expect("failures mutex poisoned") = failures;
    }

    pub(crate) fn gate_connect(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.inner.connect_gate.lock().expect("gate mutex poisoned") = Some(gate.clone());
        gate
    }

    /// Receives every payload written to the command characteristic.
    pub(crate) fn record_writes(&self) -> mpsc::UnboundedReceiver<Vec<u8>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.writes.lock().expect("writes mutex poisoned") = Some(tx);
        rx
    }

    pub(crate) fn notify(&self, payload: Vec<u8>) {
        let guard = self.inner.notifications.lock().expect("notify mutex poisoned");
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(payload);
        }
    }

    /// Simulates the peer going away without being asked to.
    pub(crate) fn drop_link(&self) {
        let callbacks = std::mem::take(
            &mut *self.inner.callbacks.lock().expect("callbacks mutex poisoned"),
        );
        for callback in &callbacks {
            callback();
        }
    }

    /// Drops the link right after the next transport registers for drop events.
    pub(crate) fn drop_during_discovery(&self) {
        self.inner.drop_on_register.store(true, Ordering::SeqCst);
    }

    pub(crate) fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.inner.disconnects.load(Ordering::SeqCst)
    }

    fn failures(&self) -> FailureFlags {
        *self.inner.failures.lock().expect("failures mutex poisoned")
    }
}

#[async_trait]
impl LinkProvider for FakeRadio {
    async fn request_peer(&self, service: Uuid) -> Result<Arc<dyn Peer>, LinkError> {
        if self.failures().request_peer {
            return Err(LinkError::PeerNotFound(service));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Peer for FakeRadio {
    fn name(&self) -> String {
        "fake-peer".to_string()
    }

    async fn connect_transport(&self) -> Result<Arc<dyn Transport>, LinkError> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        let gate = self.inner.connect_gate.lock().expect("gate mutex poisoned").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.failures().connect {
            return Err(LinkError::Connect("gatt server unreachable".to_string()));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Transport for FakeRadio {
    async fn service(&self, id: Uuid) -> Result<Arc<dyn Service>, LinkError> {
        if self.failures().service {
            return Err(LinkError::ServiceMissing(id));
        }
        Ok(Arc::new(self.clone()))
    }

    fn on_disconnect(&self, callback: DisconnectCallback) {
        if self.inner.drop_on_register.swap(false, Ordering::SeqCst) {
            callback();
            return;
        }
        self.inner
            .callbacks
            .lock()
            .expect("callbacks mutex poisoned")
            .push(callback);
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.inner.disconnects.fetch_add(1, Ordering::SeqCst);
        if self.failures().disconnect {
            return Err(LinkError::Disconnect("peer busy".to_string()));
        }
        // Real transports report their own drop as well.
        self.drop_link();
        Ok(())
    }
}

#[async_trait]
impl Service for FakeRadio {
    async fn characteristic(&self, id: Uuid) -> Result<Arc<dyn Characteristic>, LinkError> {
        if self.failures().characteristic {
            return Err(LinkError::CharacteristicMissing(id));
        }
        Ok(Arc::new(self.clone()))
    }
}

#[async_trait]
impl Characteristic for FakeRadio {
    async fn write_without_response(&self, bytes: &[u8]) -> Result<(), LinkError> {
        if self.failures().write {
            return Err(LinkError::Write("radio busy".to_string()));
        }
        if let Some(tx) = self.inner.writes.lock().expect("writes mutex poisoned").as_ref() {
            let _ = tx.send(bytes.to_vec());
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<BoxStream<'static, Vec<u8>>, LinkError> {
        if self.failures().subscribe {
            return Err(LinkError::Subscribe("notifications unsupported".to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.inner.notifications.lock().expect("notify mutex poisoned") = Some(tx);
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|payload| (payload, rx))
        })
        .boxed())
    }
}
