//! Estrangulador de lecturas caras sobre el proceso externo.
//!
//! Una condición se sondea en cada tick, pero algunas lecturas del proceso
//! (el roster de personajes, por ejemplo) son caras o ruidosas. `Throttle`
//! las ejecuta a lo sumo una vez por intervalo y entre medio sirve el
//! último valor bueno; una lectura vacía no pisa la cache.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    last_poll: Option<DateTime<Utc>>,
    cached: Option<T>,
}

impl<T: Clone> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self { interval,
               last_poll: None,
               cached: None }
    }

    /// Ejecuta `read` si el intervalo venció; si no, devuelve la cache.
    /// `read` devolviendo `None` conserva el último valor conocido.
    pub fn poll(&mut self, now: DateTime<Utc>, read: impl FnOnce() -> Option<T>) -> Option<T> {
        let due = match self.last_poll {
            None => true,
            Some(t) => {
                let delta = TimeDelta::from_std(self.interval).unwrap_or(TimeDelta::MAX);
                now.signed_duration_since(t) >= delta
            }
        };
        if due {
            self.last_poll = Some(now);
            if let Some(value) = read() {
                self.cached = Some(value);
            }
        }
        self.cached.clone()
    }
}
