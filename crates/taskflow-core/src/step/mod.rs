//! Definiciones relacionadas a Steps.
//!
//! Un step es una unidad de trabajo contra un proceso externo que sólo se
//! puede observar sondeando. Este módulo define:
//! - `TaskStep`: el descriptor (acción, condición, políticas, registro).
//! - `StepAction` / `StepCondition`: las costuras que implementan closures
//!   o structs de captura explícita.
//! - `StepCtx`: lo que una acción/condición ve del motor.
//! - `RetryPolicy` / `PostDelay` / `StepState`.

pub mod context;
pub mod descriptor;
pub mod policy;
mod status;

pub use context::{StepAction, StepCondition, StepCtx};
pub use descriptor::{FailureHook, RetryExceededHook, StepSnapshot, TaskStep};
pub use policy::{PostDelay, RetryPolicy};
pub use status::StepState;
