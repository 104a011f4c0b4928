//! Tipos de evento de la cola y estructura `QueueEvent`.
//!
//! Rol en el sistema:
//! - Cada transición observable de la cola publica un evento en el bus.
//! - El contrato mínimo hacia observadores externos son `QueueStarted`,
//!   `TaskStarted` y `QueueStopped`; el resto del ciclo de vida por step
//!   se publica para que los fallos sean visibles sin consultar la cola.
//! - La entrega es síncrona, in-process y best-effort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::StepError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum QueueEventKind {
    /// La cola pasó de `Idle` a `Running`.
    QueueStarted,
    /// Un step pasó de `Pending` a `Running`. Se emite una vez por step,
    /// en orden de encolado.
    TaskStarted { step_index: usize, step_name: String },
    /// El step actual terminó en `Succeeded`.
    StepSucceeded { step_index: usize, step_name: String },
    /// El step actual terminó en `Failed` (acción con error o reintentos
    /// agotados). La cola queda estacionada sobre él.
    StepFailed {
        step_index: usize,
        step_name: String,
        error: StepError,
    },
    /// El step actual agotó su presupuesto de tiempo.
    StepTimedOut { step_index: usize, step_name: String },
    /// El step actual fue cancelado por `stop`/`skip_current`.
    StepCancelled { step_index: usize, step_name: String },
    /// Arranca el intento `attempt` (>= 2) del step actual.
    RetryScheduled {
        step_index: usize,
        step_name: String,
        attempt: u32,
    },
    /// La cola terminó el run: drenada o detenida externamente.
    QueueStopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    /// Orden de publicación dentro del bus (asignado por el bus).
    pub seq: u64,
    pub queue_id: Uuid,
    pub kind: QueueEventKind,
    /// Instante del tick que produjo el evento, según el reloj de la cola.
    pub ts: DateTime<Utc>,
}
