//! Errores terminales de un step (simples por ahora).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Causa terminal de un step que no llegó a `Succeeded`.
///
/// Los fallos nunca cruzan la frontera cola/driver como panics: se exponen
/// a través de los callbacks del step, de los eventos del bus y del estado
/// terminal del propio step.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepError {
    /// La acción del step devolvió un error. No se reintenta.
    #[error("action failed: {0}")]
    ActionFailed(String),
    /// La condición no se cumplió dentro del presupuesto de tiempo del step.
    /// No se reintenta: representa una espera sin cota, no un error recuperable.
    #[error("condition did not become true within the step timeout")]
    ConditionTimeout,
    /// La condición no se cumplió dentro del número máximo de intentos.
    #[error("condition did not become true within {attempts} attempts")]
    RetriesExhausted { attempts: u32 },
    /// Cancelado por una operación de control externa (`stop`/`skip_current`).
    #[error("cancelled by an external control operation")]
    Cancelled,
}
