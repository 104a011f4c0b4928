//! taskflow-adapters: el proceso externo simulado y sus steps.
//!
//! La cola de `taskflow-core` es agnóstica del dominio; este crate aporta
//! el colaborador concreto contra el que se orquesta en tests y demos: una
//! sesión simulada con latencias y estado observable sólo por sondeo, más
//! los constructores de steps típicos (login, viaje, ventanas, clicks).

pub mod session;
pub mod steps;
pub mod throttle;

pub use session::{SessionConfig, SimSession};
pub use throttle::Throttle;
