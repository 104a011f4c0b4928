//! Driver de ticks: el bucle externo que avanza la cola.
//!
//! La cola no posee hilo; alguien tiene que invocarle `advance()` con una
//! cadencia. En un host gráfico esa cadencia es el frame loop; el driver
//! empaqueta el mismo bucle para binarios y tests. Bloquea el hilo del
//! llamador entre ticks; nunca crea hilos propios.

use std::time::Duration;

use crate::engine::{RunState, TaskQueue};
use crate::event::EventBus;
use crate::time::Clock;

#[derive(Debug, Clone, Copy)]
pub struct TickDriver {
    interval: Duration,
}

impl TickDriver {
    /// Driver con el intervalo entre ticks dado. Cero = sin espera (útil
    /// con reloj manual).
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Avanza la cola exactamente `n` ticks (o hasta que quede `Idle`).
    /// Devuelve los ticks ejecutados.
    pub fn tick_n<C: Clock, B: EventBus>(&self, queue: &mut TaskQueue<C, B>, n: usize) -> usize {
        let mut ticks = 0;
        while ticks < n && queue.run_state() != RunState::Idle {
            queue.advance();
            ticks += 1;
            if queue.run_state() != RunState::Idle && !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }
        ticks
    }

    /// Avanza la cola hasta que vuelva a `Idle` (drenada o detenida).
    /// Devuelve los ticks ejecutados.
    ///
    /// Una cola `Paused` se sigue tickeando (los ticks no hacen nada): la
    /// reanudación llega de afuera.
    ///
    /// Ojo: una cola estacionada sobre un step fallido cuyo handler no
    /// pide `stop`/`skip_current` no vuelve a `Idle` jamás. Si los
    /// handlers no están bajo su control, use `tick_n`.
    pub fn run_until_idle<C: Clock, B: EventBus>(&self, queue: &mut TaskQueue<C, B>) -> usize {
        let mut ticks = 0;
        while queue.run_state() != RunState::Idle {
            queue.advance();
            ticks += 1;
            if queue.run_state() != RunState::Idle && !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
        }
        ticks
    }
}
