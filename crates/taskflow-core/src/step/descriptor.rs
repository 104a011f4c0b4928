//! Descriptor de un step: la unidad de trabajo planificable.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::context::{StepAction, StepCondition};
use super::policy::{PostDelay, RetryPolicy};
use super::status::StepState;
use crate::engine::QueueControl;
use crate::errors::StepError;

/// Callback invocado exactamente una vez cuando el step termina en
/// `Failed`, `Cancelled` o `TimedOut`. Recibe el control de la cola para
/// poder pedir `stop`/`skip_current` (punto deliberado de inversión de
/// control: la cola nunca avanza sola sobre un step fallido).
pub type FailureHook = Box<dyn FnMut(&StepSnapshot, Option<&StepError>, &mut QueueControl)>;

/// Callback invocado exactamente una vez al agotarse los reintentos.
pub type RetryExceededHook = Box<dyn FnMut(&StepSnapshot, &mut QueueControl)>;

/// Especificación inmutable-tras-construcción de una unidad de trabajo,
/// más su registro de ejecución (estado, intento, marcas de tiempo).
///
/// Los productores construyen un `TaskStep` únicamente a través de
/// `TaskBuilder`; una vez encolado, la cola es su dueña exclusiva y la
/// única que muta su estado. Desde fuera sólo quedan lecturas.
pub struct TaskStep {
    pub(crate) name: String,
    pub(crate) action: Option<Box<dyn StepAction>>,
    /// Acción alternativa para los intentos 2..n. El primer intento corre
    /// siempre `action`.
    pub(crate) retry_action: Option<Box<dyn StepAction>>,
    pub(crate) condition: Option<Box<dyn StepCondition>>,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) post_delay: Option<PostDelay>,
    pub(crate) on_failed_or_cancelled: Option<FailureHook>,
    pub(crate) on_max_retries_exceeded: Option<RetryExceededHook>,

    // Registro de ejecución. Marcas de tiempo explícitas en lugar de
    // sleeps: suspender el hilo pararía a todos los demás steps y al
    // driver externo.
    pub(crate) state: StepState,
    pub(crate) attempt: u32,
    pub(crate) started_at: Option<DateTime<Utc>>,
    pub(crate) last_attempt_at: Option<DateTime<Utc>>,
    pub(crate) condition_met_at: Option<DateTime<Utc>>,
    pub(crate) error: Option<StepError>,
}

impl TaskStep {
    pub(crate) fn new(name: String) -> Self {
        Self { name,
               action: None,
               retry_action: None,
               condition: None,
               retry: None,
               timeout: None,
               post_delay: None,
               on_failed_or_cancelled: None,
               on_max_retries_exceeded: None,
               state: StepState::Pending,
               attempt: 0,
               started_at: None,
               last_attempt_at: None,
               condition_met_at: None,
               error: None }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn state(&self) -> StepState {
        self.state
    }

    /// Intento en curso; 0 mientras el step sigue `Pending`.
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[inline]
    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }

    #[inline]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Copia inmutable del registro de ejecución, para callbacks y
    /// consultas externas.
    pub fn snapshot(&self) -> StepSnapshot {
        StepSnapshot { name: self.name.clone(),
                       state: self.state,
                       attempt: self.attempt,
                       started_at: self.started_at,
                       error: self.error.clone() }
    }
}

impl std::fmt::Debug for TaskStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskStep")
         .field("name", &self.name)
         .field("state", &self.state)
         .field("attempt", &self.attempt)
         .field("error", &self.error)
         .finish_non_exhaustive()
    }
}

/// Vista serializable de un step en un instante dado.
#[derive(Debug, Clone, Serialize)]
pub struct StepSnapshot {
    pub name: String,
    pub state: StepState,
    pub attempt: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub error: Option<StepError>,
}
