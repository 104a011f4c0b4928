//! Bus de notificaciones: publicación síncrona + log append-only.

use chrono::{DateTime, Utc};
use std::panic::{catch_unwind, AssertUnwindSafe};
use uuid::Uuid;

use super::{QueueEvent, QueueEventKind};

/// Observador de eventos de la cola.
pub type Subscriber = Box<dyn FnMut(&QueueEvent)>;

/// Canal de publicación de eventos de una cola.
///
/// La cola publica; los suscriptores externos observan. Sin garantía de
/// entrega a suscriptores que fallan: un panic dentro de un suscriptor se
/// contiene y el tick continúa.
pub trait EventBus {
    /// Publica un evento, lo entrega a los suscriptores y lo devuelve
    /// completo (con `seq` y `ts`).
    fn publish(&mut self, queue_id: Uuid, ts: DateTime<Utc>, kind: QueueEventKind) -> QueueEvent;

    /// Eventos publicados hasta ahora, en orden ascendente por `seq`.
    fn list(&self) -> Vec<QueueEvent>;

    /// Registra un observador.
    fn subscribe(&mut self, subscriber: Subscriber);
}

/// Bus in-memory: log en un `Vec` + suscriptores síncronos.
#[derive(Default)]
pub struct InMemoryEventBus {
    log: Vec<QueueEvent>,
    subscribers: Vec<Subscriber>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&mut self, queue_id: Uuid, ts: DateTime<Utc>, kind: QueueEventKind) -> QueueEvent {
        let ev = QueueEvent { seq: self.log.len() as u64,
                              queue_id,
                              kind,
                              ts };
        self.log.push(ev.clone());

        for sub in self.subscribers.iter_mut() {
            // Best-effort: un suscriptor que revienta no aborta el tick.
            if catch_unwind(AssertUnwindSafe(|| sub(&ev))).is_err() {
                tracing::warn!(seq = ev.seq, "event subscriber panicked; event dropped for it");
            }
        }
        ev
    }

    fn list(&self) -> Vec<QueueEvent> {
        self.log.clone()
    }

    fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }
}

impl std::fmt::Debug for InMemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventBus")
         .field("log", &self.log.len())
         .field("subscribers", &self.subscribers.len())
         .finish()
    }
}
