use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use taskflow_core::{EventBus, InMemoryEventBus, ManualClock, QueueEventKind, RunState, StepCtx, StepState,
                    TaskBuilder, TaskQueue};

const TICK: Duration = Duration::from_millis(250);

fn manual_queue(name: &str) -> (TaskQueue<ManualClock>, ManualClock) {
    let clock = ManualClock::epoch();
    let queue = TaskQueue::with_parts(name, clock.clone(), InMemoryEventBus::new());
    (queue, clock)
}

fn tick(queue: &mut TaskQueue<ManualClock>, clock: &ManualClock) {
    queue.advance();
    clock.advance(TICK);
}

#[test]
fn drains_in_append_order_and_emits_one_task_started_per_step() {
    let (mut queue, clock) = manual_queue("lifecycle");
    for name in ["login", "travel", "interact"] {
        TaskBuilder::create(name).enqueue_to(&mut queue);
    }

    queue.start();
    for _ in 0..5 {
        tick(&mut queue, &clock);
    }

    assert_eq!(queue.run_state(), RunState::Idle);
    assert_eq!(queue.cursor(), None);
    assert!((queue.progress() - 1.0).abs() < f32::EPSILON);
    for step in queue.steps() {
        assert_eq!(step.state(), StepState::Succeeded);
    }

    let started: Vec<String> = queue.events()
                                    .into_iter()
                                    .filter_map(|e| match e.kind {
                                        QueueEventKind::TaskStarted { step_name, .. } => Some(step_name),
                                        _ => None,
                                    })
                                    .collect();
    assert_eq!(started, vec!["login", "travel", "interact"]);

    let stopped = queue.events()
                       .iter()
                       .filter(|e| matches!(e.kind, QueueEventKind::QueueStopped))
                       .count();
    assert_eq!(stopped, 1);
    assert!(queue.events()
                 .iter()
                 .any(|e| matches!(e.kind, QueueEventKind::QueueStarted)));
}

#[test]
fn condition_gates_advancement_until_ready() {
    let (mut queue, clock) = manual_queue("gated");
    let polls = Rc::new(Cell::new(0u32));
    let seen = polls.clone();
    TaskBuilder::create("wait for window").with_condition(move |_ctx: &mut StepCtx<'_>| {
                                              seen.set(seen.get() + 1);
                                              seen.get() >= 3
                                          })
                                          .enqueue_to(&mut queue);

    queue.start();
    tick(&mut queue, &clock);
    tick(&mut queue, &clock);
    let current = queue.current_step().expect("step en curso");
    assert_eq!(current.name(), "wait for window");
    assert_eq!(current.state(), StepState::Running);
    assert_eq!(current.attempt(), 1);

    tick(&mut queue, &clock);
    assert_eq!(queue.steps()[0].state(), StepState::Succeeded);
    assert_eq!(polls.get(), 3);
    assert_eq!(queue.run_state(), RunState::Idle);
    assert!(queue.current_step().is_none());
}

#[test]
fn stop_cancels_in_flight_step_and_resets_for_repopulation() {
    let (mut queue, clock) = manual_queue("stoppable");
    let cancelled = Rc::new(Cell::new(0u32));
    let hits = cancelled.clone();
    TaskBuilder::create("quick").enqueue_to(&mut queue);
    TaskBuilder::create("stuck").with_condition(|_ctx: &mut StepCtx<'_>| false)
                                .on_failed_or_cancelled(move |_step, _err, _ctrl| hits.set(hits.get() + 1))
                                .enqueue_to(&mut queue);

    queue.start();
    tick(&mut queue, &clock); // quick listo
    tick(&mut queue, &clock); // stuck arranca
    assert_eq!(queue.steps()[1].state(), StepState::Running);

    queue.stop();
    assert_eq!(queue.run_state(), RunState::Stopped);
    tick(&mut queue, &clock); // desmonte

    assert_eq!(queue.run_state(), RunState::Idle);
    assert_eq!(cancelled.get(), 1);
    assert!(queue.is_empty());
    assert_eq!(queue.cursor(), None);
    assert!(queue.events()
                 .iter()
                 .any(|e| matches!(e.kind, QueueEventKind::StepCancelled { ref step_name, .. } if step_name == "stuck")));

    // La cola quedó utilizable: se repuebla y arranca de nuevo.
    TaskBuilder::create("fresh").enqueue_to(&mut queue);
    queue.start();
    tick(&mut queue, &clock);
    assert_eq!(queue.steps()[0].state(), StepState::Succeeded);
    assert_eq!(queue.run_state(), RunState::Idle);
}

#[test]
fn skip_current_cancels_mid_retry_and_advances() {
    let (mut queue, clock) = manual_queue("skippable");
    TaskBuilder::create("never ready").with_condition(|_ctx: &mut StepCtx<'_>| false)
                                      .with_retries(10, [Duration::from_secs(5)])
                                      .enqueue_to(&mut queue);
    TaskBuilder::create("after").enqueue_to(&mut queue);

    queue.start();
    tick(&mut queue, &clock);
    tick(&mut queue, &clock);
    assert_eq!(queue.steps()[0].state(), StepState::Running);

    queue.skip_current();
    tick(&mut queue, &clock);

    // Cancelado de inmediato, sin esperar los 9 intentos restantes.
    assert_eq!(queue.steps()[0].state(), StepState::Cancelled);
    assert_eq!(queue.cursor(), Some(1));

    tick(&mut queue, &clock);
    assert_eq!(queue.steps()[1].state(), StepState::Succeeded);
    assert_eq!(queue.run_state(), RunState::Idle);
}

#[test]
fn paused_ticks_are_noops() {
    let (mut queue, clock) = manual_queue("pausable");
    let polls = Rc::new(Cell::new(0u32));
    let seen = polls.clone();
    TaskBuilder::create("slow").with_condition(move |_ctx: &mut StepCtx<'_>| {
                                   seen.set(seen.get() + 1);
                                   seen.get() >= 2
                               })
                               .enqueue_to(&mut queue);

    queue.start();
    tick(&mut queue, &clock);
    assert_eq!(polls.get(), 1);

    queue.pause();
    assert!(queue.is_paused());
    let events_before = queue.events().len();
    for _ in 0..5 {
        tick(&mut queue, &clock);
    }
    assert_eq!(polls.get(), 1, "la condición no se sondea en pausa");
    assert_eq!(queue.events().len(), events_before);
    assert_eq!(queue.steps()[0].state(), StepState::Running);

    queue.resume();
    tick(&mut queue, &clock);
    assert_eq!(queue.steps()[0].state(), StepState::Succeeded);
    assert_eq!(queue.run_state(), RunState::Idle);
}

#[test]
fn empty_queue_drains_on_first_tick() {
    let (mut queue, clock) = manual_queue("empty");
    queue.start();
    assert!(queue.is_running());
    tick(&mut queue, &clock);
    assert_eq!(queue.run_state(), RunState::Idle);
    assert!(queue.events()
                 .iter()
                 .any(|e| matches!(e.kind, QueueEventKind::QueueStopped)));
    // El bus expone el mismo log que `events()`.
    assert_eq!(queue.bus().list().len(), queue.events().len());
}

// Escenario de referencia: A siempre lista, B lista al segundo sondeo, C
// nunca lista con dos intentos. El handler de C pide skip para retomar el
// avance, como hacen los consumidores reales.
#[test]
fn mixed_scenario_reaches_expected_terminal_states() {
    let (mut queue, clock) = manual_queue("scenario");
    TaskBuilder::create("a").enqueue_to(&mut queue);

    let polls = Rc::new(Cell::new(0u32));
    let seen = polls.clone();
    TaskBuilder::create("b").with_condition(move |_ctx: &mut StepCtx<'_>| {
                                seen.set(seen.get() + 1);
                                seen.get() >= 2
                            })
                            .enqueue_to(&mut queue);

    let exceeded = Rc::new(Cell::new(0u32));
    let hits = exceeded.clone();
    TaskBuilder::create("c").with_condition(|_ctx: &mut StepCtx<'_>| false)
                            .with_retries(2, [])
                            .on_max_retries_exceeded(move |_step, ctrl| {
                                hits.set(hits.get() + 1);
                                ctrl.skip_current();
                            })
                            .enqueue_to(&mut queue);

    queue.start();
    for _ in 0..10 {
        tick(&mut queue, &clock);
    }

    assert_eq!(queue.steps()[0].state(), StepState::Succeeded);
    assert_eq!(queue.steps()[1].state(), StepState::Succeeded);
    assert_eq!(queue.steps()[2].state(), StepState::Failed);
    assert_eq!(queue.cursor(), None);
    assert!((queue.progress() - 1.0).abs() < f32::EPSILON);
    assert_eq!(exceeded.get(), 1);
    assert_eq!(queue.run_state(), RunState::Idle);
}
