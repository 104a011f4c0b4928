//! Proceso externo simulado.
//!
//! - Reproduce el tipo de colaborador que la cola orquesta en producción:
//!   estado observable sólo por sondeo, operaciones con latencia (ticks) y
//!   transiciones que ocurren solas entre un tick y otro.
//! - No accede a IO; sólo estructuras en memoria, deterministas.
//! - El handle es clonable: cada step captura su propia copia y todas
//!   apuntan al mismo estado (modelo single-thread, igual que el motor).

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Latencias del proceso simulado, en ticks del propio proceso.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Ticks entre pedir un login y tener al personaje dentro.
    pub login_latency: u64,
    /// Ticks entre pedir una ventana y que esté lista para interactuar.
    pub window_latency: u64,
    /// Unidades de distancia recorridas por tick de viaje.
    pub travel_speed: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { login_latency: 3,
               window_latency: 2,
               travel_speed: 2.0 }
    }
}

#[derive(Debug)]
struct SessionState {
    config: SessionConfig,
    tick: u64,
    roster: Vec<String>,
    character: Option<String>,
    pending_login: Option<(String, u64)>,
    busy_until: u64,
    open_window: Option<(String, u64)>,
    position: (f32, f32),
    destination: Option<(f32, f32)>,
    clicks: Vec<(String, String)>,
}

/// Handle clonable sobre el estado simulado.
#[derive(Debug, Clone)]
pub struct SimSession {
    inner: Rc<RefCell<SessionState>>,
}

impl SimSession {
    pub fn new(config: SessionConfig) -> Self {
        Self { inner: Rc::new(RefCell::new(SessionState { config,
                                                          tick: 0,
                                                          roster: Vec::new(),
                                                          character: None,
                                                          pending_login: None,
                                                          busy_until: 0,
                                                          open_window: None,
                                                          position: (0.0, 0.0),
                                                          destination: None,
                                                          clicks: Vec::new() })) }
    }

    /// Da de alta un personaje conocido por el proceso.
    pub fn register_character(&self, name: impl Into<String>) {
        self.inner.borrow_mut().roster.push(name.into());
    }

    /// Un tick del proceso externo: resuelve logins pendientes y avanza el
    /// viaje en curso. Corre a la cadencia del host, no de la cola.
    pub fn tick(&self) {
        let mut s = self.inner.borrow_mut();
        s.tick += 1;

        if let Some((name, ready_at)) = s.pending_login.clone() {
            if s.tick >= ready_at {
                s.character = Some(name);
                s.pending_login = None;
            }
        }

        if let Some((dx, dy)) = s.destination {
            let (px, py) = s.position;
            let (vx, vy) = (dx - px, dy - py);
            let dist = (vx * vx + vy * vy).sqrt();
            if dist <= s.config.travel_speed {
                s.position = (dx, dy);
                s.destination = None;
            } else {
                let step = s.config.travel_speed / dist;
                s.position = (px + vx * step, py + vy * step);
            }
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.inner.borrow().tick
    }

    // -- login -----------------------------------------------------------

    /// Pide el cambio de personaje. Deja al proceso ocupado hasta que el
    /// login resuelva.
    pub fn request_login(&self, name: &str) {
        let mut s = self.inner.borrow_mut();
        let ready_at = s.tick + s.config.login_latency;
        tracing::debug!(character = name, ready_at, "login requested");
        s.pending_login = Some((name.to_string(), ready_at));
        s.character = None;
        s.busy_until = s.busy_until.max(ready_at);
    }

    pub fn logged_in_as(&self, name: &str) -> bool {
        self.inner.borrow().character.as_deref() == Some(name)
    }

    /// Personajes que el proceso conoce. Lectura cara; los llamadores la
    /// estrangulan (ver `Throttle`).
    pub fn roster(&self) -> Vec<String> {
        self.inner.borrow().roster.clone()
    }

    // -- ocupación -------------------------------------------------------

    /// Ocupado: login en curso o viaje sin terminar. Ningún step debería
    /// interactuar mientras esto sea `true`.
    pub fn is_busy(&self) -> bool {
        let s = self.inner.borrow();
        s.tick < s.busy_until || s.pending_login.is_some() || s.destination.is_some()
    }

    // -- ventanas --------------------------------------------------------

    /// Pide abrir una ventana; estará lista `window_latency` ticks después.
    /// Reemplaza a la ventana anterior, si había.
    pub fn open_window(&self, name: &str) {
        let mut s = self.inner.borrow_mut();
        let ready_at = s.tick + s.config.window_latency;
        s.open_window = Some((name.to_string(), ready_at));
    }

    /// `true` cuando la ventana pedida existe y terminó de abrir.
    pub fn window_ready(&self, name: &str) -> bool {
        let s = self.inner.borrow();
        match &s.open_window {
            Some((open, ready_at)) => open == name && s.tick >= *ready_at,
            None => false,
        }
    }

    /// Dispara un botón de una ventana lista. Falla si la ventana no está.
    pub fn click(&self, window: &str, button: &str) -> anyhow::Result<()> {
        if !self.window_ready(window) {
            anyhow::bail!("window {window} is not ready");
        }
        tracing::debug!(window, button, "click fired");
        self.inner
            .borrow_mut()
            .clicks
            .push((window.to_string(), button.to_string()));
        Ok(())
    }

    /// Registro de clicks, en orden.
    pub fn clicks(&self) -> Vec<(String, String)> {
        self.inner.borrow().clicks.clone()
    }

    // -- movimiento ------------------------------------------------------

    pub fn move_to(&self, x: f32, y: f32) {
        self.inner.borrow_mut().destination = Some((x, y));
    }

    pub fn position(&self) -> (f32, f32) {
        self.inner.borrow().position
    }

    /// `true` si el avatar está a menos de `tolerance` del punto.
    pub fn near(&self, x: f32, y: f32, tolerance: f32) -> bool {
        let (px, py) = self.position();
        let (dx, dy) = (x - px, y - py);
        (dx * dx + dy * dy).sqrt() < tolerance
    }
}

impl Default for SimSession {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_resolves_after_latency() {
        let session = SimSession::default();
        session.register_character("Aria Moon");
        session.request_login("Aria Moon");
        assert!(!session.logged_in_as("Aria Moon"));
        assert!(session.is_busy());

        for _ in 0..3 {
            session.tick();
        }
        assert!(session.logged_in_as("Aria Moon"));
        assert!(!session.is_busy());
    }

    #[test]
    fn window_needs_latency_before_clicks() {
        let session = SimSession::default();
        session.open_window("MerchantShop");
        assert!(!session.window_ready("MerchantShop"));
        assert!(session.click("MerchantShop", "buy").is_err());

        session.tick();
        session.tick();
        assert!(session.window_ready("MerchantShop"));
        session.click("MerchantShop", "buy").unwrap();
        assert_eq!(session.clicks(), vec![("MerchantShop".to_string(), "buy".to_string())]);
    }

    #[test]
    fn travel_advances_per_tick_until_arrival() {
        let session = SimSession::default();
        session.move_to(0.0, 10.0);
        assert!(session.is_busy());
        for _ in 0..4 {
            session.tick();
        }
        assert!(session.is_busy(), "a 8 unidades todavía no llegó");
        session.tick();
        assert_eq!(session.position(), (0.0, 10.0));
        assert!(!session.is_busy());
        assert!(session.near(0.0, 10.0, 3.5));
    }
}
