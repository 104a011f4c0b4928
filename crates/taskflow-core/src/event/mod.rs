//! Definiciones de eventos y trait EventBus.

mod bus;
mod types;

pub use bus::{EventBus, InMemoryEventBus, Subscriber};
pub use types::{QueueEvent, QueueEventKind};
