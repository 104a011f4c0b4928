//! Reloj inyectable para el motor.
//!
//! La cola nunca duerme ni consulta el reloj del sistema directamente: todo
//! el tiempo entra por el trait `Clock`. Esto permite que los reintentos,
//! timeouts y delays se prueben con un reloj manual, sin `sleep` y sin
//! depender de la cadencia real de los ticks.

use chrono::{DateTime, TimeDelta, Utc};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

/// Fuente de tiempo del motor.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Reloj de producción: hora UTC del sistema.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Reloj manual para tests.
///
/// Es un handle clonable: la cola posee una copia y el test otra, ambas
/// apuntando al mismo instante compartido. Avanzar el reloj desde el test
/// se refleja inmediatamente dentro del motor.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Rc::new(Cell::new(start)) }
    }

    /// Reloj arrancando en el epoch Unix. Suficiente para tests.
    pub fn epoch() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Avanza el instante compartido.
    pub fn advance(&self, d: Duration) {
        let delta = TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX);
        self.now.set(self.now.get() + delta);
    }

    pub fn set(&self, t: DateTime<Utc>) {
        self.now.set(t);
    }
}

impl Clock for ManualClock {
    #[inline]
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}

/// `true` si entre `since` y `now` pasó al menos `d`.
pub(crate) fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>, d: Duration) -> bool {
    let delta = TimeDelta::from_std(d).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(since) >= delta
}
