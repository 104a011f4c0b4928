//! Constructores de steps contra una `SimSession`.
//!
//! Cada función devuelve el `TaskBuilder` ya cargado con la acción y la
//! condición del procedimiento; el llamador añade políticas (reintentos,
//! timeout, delay) según el escenario y lo encola. Los closures capturan
//! su propio handle de sesión: el estado capturado queda a la vista, step
//! por step.

use std::time::Duration;

use taskflow_core::{StepCtx, TaskBuilder};

use crate::session::SimSession;
use crate::throttle::Throttle;

/// Distancia a la que un objeto del mundo se considera alcanzado.
pub const REACH: f32 = 3.5;

/// Login de personaje: pide el cambio si hace falta y espera a que el
/// proceso lo confirme y se desocupe. El roster se consulta estrangulado,
/// como la lectura cara que es.
pub fn login_step(session: &SimSession, character: &str) -> TaskBuilder {
    let name = format!("login to {character}");

    let act_session = session.clone();
    let act_character = character.to_string();
    let mut roster = Throttle::new(Duration::from_millis(500));

    let cond_session = session.clone();
    let cond_character = character.to_string();

    TaskBuilder::create(name)
        .with_action(move |ctx: &mut StepCtx<'_>| -> anyhow::Result<()> {
            if act_session.logged_in_as(&act_character) {
                return Ok(());
            }
            let known = roster.poll(ctx.now(), || Some(act_session.roster()))
                              .unwrap_or_default();
            if !known.iter().any(|c| c == &act_character) {
                anyhow::bail!("unknown character: {act_character}");
            }
            act_session.request_login(&act_character);
            Ok(())
        })
        .with_condition(move |_ctx: &mut StepCtx<'_>| {
            cond_session.logged_in_as(&cond_character) && !cond_session.is_busy()
        })
}

/// Viaje del avatar hasta un punto: dispara el movimiento y espera la
/// llegada con el proceso desocupado. Deja la posición final en la
/// metadata del step, para steps posteriores que quieran volver.
pub fn travel_step(session: &SimSession, x: f32, y: f32) -> TaskBuilder {
    let act_session = session.clone();
    let cond_session = session.clone();

    TaskBuilder::create(format!("travel to ({x:.0}, {y:.0})"))
        .with_action(move |_ctx: &mut StepCtx<'_>| -> anyhow::Result<()> {
            if !act_session.near(x, y, REACH) {
                act_session.move_to(x, y);
            }
            Ok(())
        })
        .with_condition(move |ctx: &mut StepCtx<'_>| {
            if !cond_session.near(x, y, REACH) || cond_session.is_busy() {
                return false;
            }
            let (px, py) = cond_session.position();
            ctx.set_metadata_value(serde_json::json!({ "x": px, "y": py }));
            true
        })
}

/// Apertura de una ventana de UI: pide la apertura y sondea hasta que esté
/// lista. Candidata natural a `with_retries`: la petición a veces se pierde.
pub fn open_window_step(session: &SimSession, window: &str) -> TaskBuilder {
    let act_session = session.clone();
    let act_window = window.to_string();
    let cond_session = session.clone();
    let cond_window = window.to_string();

    TaskBuilder::create(format!("open {window}"))
        .with_action(move |_ctx: &mut StepCtx<'_>| -> anyhow::Result<()> {
            act_session.open_window(&act_window);
            Ok(())
        })
        .with_condition(move |_ctx: &mut StepCtx<'_>| cond_session.window_ready(&cond_window))
}

/// Click sobre un botón. El disparo vive en la condición: en cuanto la
/// ventana está lista se hace el click y el step queda listo en el mismo
/// sondeo.
pub fn click_step(session: &SimSession, window: &str, button: &str) -> TaskBuilder {
    let session = session.clone();
    let window_name = window.to_string();
    let button = button.to_string();

    TaskBuilder::create(format!("click {button} on {window}"))
        .with_condition(move |_ctx: &mut StepCtx<'_>| {
            if !session.window_ready(&window_name) {
                return false;
            }
            session.click(&window_name, &button).is_ok()
        })
}

/// Espera pura a que el proceso se desocupe ("waiting to be available").
pub fn wait_ready_step(session: &SimSession) -> TaskBuilder {
    let session = session.clone();
    TaskBuilder::create("wait until available").with_condition(move |_ctx: &mut StepCtx<'_>| !session.is_busy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskflow_core::{InMemoryEventBus, ManualClock, StepState, TaskQueue};

    fn manual_queue(name: &str) -> (TaskQueue<ManualClock>, ManualClock) {
        let clock = ManualClock::epoch();
        let queue = TaskQueue::with_parts(name, clock.clone(), InMemoryEventBus::new());
        (queue, clock)
    }

    #[test]
    fn login_step_fails_fast_on_unknown_character() {
        let session = SimSession::default();
        let (mut queue, clock) = manual_queue("login");
        login_step(&session, "Nobody").enqueue_to(&mut queue);

        queue.start();
        queue.advance();
        clock.advance(Duration::from_millis(100));

        let step = &queue.steps()[0];
        assert_eq!(step.state(), StepState::Failed);
        let err = step.error().expect("error terminal");
        assert!(err.to_string().contains("action failed"));
    }

    #[test]
    fn click_step_waits_for_the_window() {
        let session = SimSession::default();
        let (mut queue, clock) = manual_queue("click");
        click_step(&session, "SelectYesno", "confirm").enqueue_to(&mut queue);

        session.open_window("SelectYesno");
        queue.start();
        queue.advance();
        assert_eq!(queue.steps()[0].state(), StepState::Running);
        assert!(session.clicks().is_empty());

        session.tick();
        session.tick();
        clock.advance(Duration::from_millis(200));
        queue.advance();
        assert_eq!(queue.steps()[0].state(), StepState::Succeeded);
        assert_eq!(session.clicks().len(), 1);
    }
}
