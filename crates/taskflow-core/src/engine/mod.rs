//! Motor de ejecución: la cola, su builder y el control externo.

mod builder;
mod core;

pub use self::builder::TaskBuilder;
pub use self::core::{QueueControl, RunState, TaskQueue};
