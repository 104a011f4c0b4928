//! Builder para `TaskStep`.
//!
//! Notas de diseño
//! - El builder acumula la configuración y la entrega completa a la cola
//!   con el terminal `enqueue_to`: el scheduler jamás observa un step a
//!   medio configurar.
//! - `enqueue_to` consume el builder, de modo que el doble encolado del
//!   mismo builder es irrepresentable.
//! - Sin `with_retries` el step tiene un único intento cuya condición se
//!   sondea indefinidamente (acotada sólo por `with_timeout`); con
//!   `with_retries` cada intento dispone de su ventana y el step falla al
//!   cerrarse la última.
//!
//! Ejemplo de uso:
//!
//! ```ignore
//! TaskBuilder::create("open merchant window")
//!     .with_action(|ctx| { /* pedir apertura */ Ok(()) })
//!     .with_condition(|ctx| /* ¿ventana lista? */ false)
//!     .with_retries(5, [Duration::from_secs(2), Duration::from_secs(1)])
//!     .enqueue_to(&mut queue);
//! ```

use std::time::Duration;

use crate::engine::{QueueControl, TaskQueue};
use crate::errors::StepError;
use crate::event::EventBus;
use crate::step::{PostDelay, RetryPolicy, StepAction, StepCondition, StepSnapshot, TaskStep};
use crate::time::Clock;

#[derive(Debug)]
pub struct TaskBuilder {
    step: TaskStep,
}

impl TaskBuilder {
    /// Arranca la construcción de un step con nombre legible. El nombre es
    /// además la clave de su metadata.
    pub fn create(name: impl Into<String>) -> Self {
        Self { step: TaskStep::new(name.into()) }
    }

    /// Acción con efectos, ejecutada a lo sumo una vez por intento. Un
    /// `Err` marca el step `Failed` de inmediato, sin reintentos.
    pub fn with_action(mut self, action: impl StepAction + 'static) -> Self {
        self.step.action = Some(Box::new(action));
        self
    }

    /// Acción alternativa para los intentos 2..n (el primer intento corre
    /// siempre la acción principal).
    pub fn with_retry_action(mut self, action: impl StepAction + 'static) -> Self {
        self.step.retry_action = Some(Box::new(action));
        self
    }

    /// Condición de avance, sondeada una vez por tick. Sin condición el
    /// step queda listo en el primer tick.
    pub fn with_condition(mut self, condition: impl StepCondition + 'static) -> Self {
        self.step.condition = Some(Box::new(condition));
        self
    }

    /// Reintentos acotados: hasta `max_attempts` intentos, separados por
    /// las ventanas de `delays` (el último valor se repite).
    pub fn with_retries(mut self, max_attempts: u32, delays: impl IntoIterator<Item = Duration>) -> Self {
        self.step.retry = Some(RetryPolicy::new(max_attempts, delays.into_iter().collect()));
        self
    }

    /// Presupuesto de tiempo total del step, desde su arranque. Al vencer,
    /// el step pasa a `TimedOut` sin importar la política de reintentos.
    pub fn with_timeout(mut self, budget: Duration) -> Self {
        self.step.timeout = Some(budget);
        self
    }

    /// Tiempo muerto tras el éxito, antes de avanzar al siguiente step.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.step.post_delay = Some(PostDelay::Fixed(delay));
        self
    }

    /// Variante calculada a partir del step ya completado.
    pub fn with_delay_fn(mut self, f: impl Fn(&StepSnapshot) -> Duration + 'static) -> Self {
        self.step.post_delay = Some(PostDelay::PerStep(Box::new(f)));
        self
    }

    /// Callback de transición terminal a `Failed`/`Cancelled`/`TimedOut`.
    /// Se invoca exactamente una vez.
    pub fn on_failed_or_cancelled(mut self,
                                  hook: impl FnMut(&StepSnapshot, Option<&StepError>, &mut QueueControl) + 'static)
                                  -> Self {
        self.step.on_failed_or_cancelled = Some(Box::new(hook));
        self
    }

    /// Callback de reintentos agotados. Se invoca exactamente una vez,
    /// antes que `on_failed_or_cancelled`.
    pub fn on_max_retries_exceeded(mut self,
                                   hook: impl FnMut(&StepSnapshot, &mut QueueControl) + 'static)
                                   -> Self {
        self.step.on_max_retries_exceeded = Some(Box::new(hook));
        self
    }

    /// Terminal: entrega el step inmutable a la cola. Consume el builder.
    pub fn enqueue_to<C: Clock, B: EventBus>(self, queue: &mut TaskQueue<C, B>) {
        queue.push_step(self.step);
    }

    // ------------------------------------------------------------------
    // Atajos de conveniencia
    // ------------------------------------------------------------------

    /// Encola un step de sólo-acción: corre la acción y queda listo en el
    /// mismo tick.
    pub fn add_action<C: Clock, B: EventBus>(queue: &mut TaskQueue<C, B>,
                                             name: impl Into<String>,
                                             action: impl StepAction + 'static) {
        Self::create(name).with_action(action).enqueue_to(queue);
    }

    /// Encola un step de espera pura: sin acción ni condición, sólo el
    /// tiempo muerto antes de dejar avanzar el cursor.
    pub fn add_delay<C: Clock, B: EventBus>(queue: &mut TaskQueue<C, B>, delay: Duration) {
        Self::create(format!("delay {}ms", delay.as_millis())).with_delay(delay)
                                                             .enqueue_to(queue);
    }
}
