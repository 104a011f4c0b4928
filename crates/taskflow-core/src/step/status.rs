use serde::{Deserialize, Serialize};

/// Estado de un step en tiempo de ejecución.
///
/// Las transiciones válidas son:
/// - `Pending` -> `Running`
/// - `Running` -> `Succeeded` | `Failed` | `Cancelled` | `TimedOut`
/// - `Pending` -> `Cancelled` (el step fue descartado antes de arrancar)
///
/// Una vez terminal, el estado no cambia nunca. La cola es la única que
/// muta este estado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepState {
    /// El step espera su turno en la cola.
    Pending,
    /// El step arrancó: su acción corrió y su condición se sondea por tick.
    Running,
    /// La condición se cumplió (y el delay posterior, si había, venció).
    Succeeded,
    /// La acción falló o los reintentos se agotaron.
    Failed,
    /// Cancelado por `stop`/`skip_current`.
    Cancelled,
    /// La condición no se cumplió dentro del presupuesto de tiempo.
    TimedOut,
}

impl StepState {
    /// `true` para los estados de los que no se sale.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self,
                 StepState::Succeeded | StepState::Failed | StepState::Cancelled | StepState::TimedOut)
    }
}
