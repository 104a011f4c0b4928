//! Contexto de ejecución entregado a las acciones y condiciones de un step.
//!
//! Las acciones y condiciones NO son closures ambiente colgando de la cola:
//! son implementaciones de `StepAction`/`StepCondition`. Cualquier closure
//! con la firma correcta sirve (hay impls blanket), pero el estado capturado
//! puede vivir en un struct explícito e inspeccionable cuando hace falta
//! testearlo sin ejecutar la orquestación completa.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::metadata::MetadataStore;

/// Acción con efectos de un step. Corre a lo sumo una vez por intento.
///
/// Un `Err` marca el step como `Failed` de inmediato, saltándose los
/// reintentos pendientes: un error lanzado es fatal, sólo la condición
/// "todavía no" se reintenta.
pub trait StepAction {
    fn run(&mut self, ctx: &mut StepCtx<'_>) -> anyhow::Result<()>;
}

impl<F> StepAction for F where F: FnMut(&mut StepCtx<'_>) -> anyhow::Result<()>
{
    fn run(&mut self, ctx: &mut StepCtx<'_>) -> anyhow::Result<()> {
        (self)(ctx)
    }
}

/// Condición de avance de un step, sondeada una vez por tick.
///
/// Devolver `false` no es un error: significa "el proceso externo todavía
/// no llegó". Las esperas largas se expresan devolviendo `false` durante
/// muchos ticks, nunca bloqueando dentro de la llamada.
pub trait StepCondition {
    fn poll(&mut self, ctx: &mut StepCtx<'_>) -> bool;
}

impl<F> StepCondition for F where F: FnMut(&mut StepCtx<'_>) -> bool
{
    fn poll(&mut self, ctx: &mut StepCtx<'_>) -> bool {
        (self)(ctx)
    }
}

/// Vista del step en curso + acceso al almacén de metadata.
///
/// Es lo único que una acción/condición ve del motor: no puede tocar el
/// cursor, ni el estado de otros steps, ni encolar trabajo.
pub struct StepCtx<'a> {
    step_name: &'a str,
    attempt: u32,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    metadata: &'a mut MetadataStore,
}

impl<'a> StepCtx<'a> {
    pub(crate) fn new(step_name: &'a str,
                      attempt: u32,
                      started_at: DateTime<Utc>,
                      now: DateTime<Utc>,
                      metadata: &'a mut MetadataStore)
                      -> Self {
        Self { step_name,
               attempt,
               started_at,
               now,
               metadata }
    }

    /// Nombre del step en curso.
    #[inline]
    pub fn step_name(&self) -> &str {
        self.step_name
    }

    /// Número de intento en curso (arranca en 1).
    #[inline]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Instante del tick actual, según el reloj de la cola.
    #[inline]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Tiempo transcurrido desde que el step pasó a `Running`.
    pub fn elapsed(&self) -> Duration {
        self.now
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Guarda el resultado del step en curso, visible para los intentos
    /// siguientes y para cualquier step posterior. No se revierte nunca.
    pub fn set_metadata<T: Serialize>(&mut self, value: &T) -> serde_json::Result<()> {
        self.metadata.set(self.step_name, value)
    }

    /// Variante sin serialización para valores ya en JSON.
    pub fn set_metadata_value(&mut self, value: Value) {
        self.metadata.set_value(self.step_name, value);
    }

    /// Lee la metadata guardada por un step anterior (o por un intento
    /// anterior de este mismo step). `None` si nunca se escribió.
    pub fn metadata_of<T: DeserializeOwned>(&self, step_name: &str) -> Option<T> {
        self.metadata.get(step_name)
    }
}
