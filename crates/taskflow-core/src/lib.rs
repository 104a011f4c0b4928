//! taskflow-core: cola de steps con avance cooperativo por ticks.
//!
//! Orquesta procedimientos largos contra un proceso externo que sólo se
//! puede observar sondeando: cada step lleva una condición de avance, una
//! acción opcional, política de reintentos/timeout, delay posterior y un
//! slot de metadata legible por steps posteriores. La cola es pasiva: un
//! driver externo la avanza una vez por tick.

pub mod driver;
pub mod engine;
pub mod errors;
pub mod event;
pub mod metadata;
pub mod step;
pub mod time;

pub use driver::TickDriver;
pub use engine::{QueueControl, RunState, TaskBuilder, TaskQueue};
pub use errors::StepError;
pub use event::{EventBus, InMemoryEventBus, QueueEvent, QueueEventKind};
pub use metadata::MetadataStore;
pub use step::{PostDelay, RetryPolicy, StepAction, StepCondition, StepCtx, StepSnapshot, StepState, TaskStep};
pub use time::{Clock, ManualClock, SystemClock};
