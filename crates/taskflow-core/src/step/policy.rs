//! Políticas de reintento y de delay posterior de un step.

use std::time::Duration;

use super::descriptor::StepSnapshot;

/// Reintentos acotados de la pareja acción/condición de un step.
///
/// El intento `k` dispone de una ventana `delays[k-1]` (el último valor se
/// repite si la secuencia se agota) para que la condición se cumpla; cuando
/// la ventana del último intento vence sin éxito el step pasa a `Failed`.
///
/// Un step SIN política de reintentos sondea su condición indefinidamente,
/// acotado sólo por su timeout. Ese es el caso normal de "esperar a que el
/// proceso externo llegue".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delays: Vec<Duration>,
}

impl RetryPolicy {
    /// `max_attempts` se satura en 1: cero intentos no es representable.
    pub fn new(max_attempts: u32, delays: Vec<Duration>) -> Self {
        Self { max_attempts: max_attempts.max(1),
               delays }
    }

    /// Ventana que separa al intento `attempt` del siguiente (o del fallo
    /// final, si `attempt` era el último). `delays` vacío equivale a cero.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(1) as usize;
        match self.delays.get(idx) {
            Some(d) => *d,
            None => self.delays.last().copied().unwrap_or(Duration::ZERO),
        }
    }
}

/// Tiempo muerto tras el éxito de un step, antes de permitir que el cursor
/// avance al siguiente.
pub enum PostDelay {
    /// Duración fija.
    Fixed(Duration),
    /// Calculado a partir del step ya completado.
    PerStep(Box<dyn Fn(&StepSnapshot) -> Duration>),
}

impl PostDelay {
    pub(crate) fn resolve(&self, snapshot: &StepSnapshot) -> Duration {
        match self {
            PostDelay::Fixed(d) => *d,
            PostDelay::PerStep(f) => f(snapshot),
        }
    }
}

impl std::fmt::Debug for PostDelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostDelay::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            PostDelay::PerStep(_) => f.write_str("PerStep(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_after_repeats_last_value() {
        let p = RetryPolicy::new(5,
                                 vec![Duration::from_secs(2), Duration::from_secs(1)]);
        assert_eq!(p.delay_after(1), Duration::from_secs(2));
        assert_eq!(p.delay_after(2), Duration::from_secs(1));
        assert_eq!(p.delay_after(3), Duration::from_secs(1));
        assert_eq!(p.delay_after(9), Duration::from_secs(1));
    }

    #[test]
    fn empty_delays_mean_zero() {
        let p = RetryPolicy::new(3, vec![]);
        assert_eq!(p.delay_after(1), Duration::ZERO);
        assert_eq!(p.delay_after(3), Duration::ZERO);
    }

    #[test]
    fn max_attempts_clamped_to_one() {
        let p = RetryPolicy::new(0, vec![]);
        assert_eq!(p.max_attempts, 1);
    }
}
