use std::time::Duration;

use taskflow_core::{RunState, StepCtx, StepState, TaskBuilder, TaskQueue, TickDriver};

#[test]
fn run_until_idle_drains_a_ready_queue() {
    let mut queue = TaskQueue::new("driver");
    for name in ["a", "b", "c"] {
        TaskBuilder::create(name).enqueue_to(&mut queue);
    }

    queue.start();
    let driver = TickDriver::new(Duration::ZERO);
    let ticks = driver.run_until_idle(&mut queue);

    assert_eq!(queue.run_state(), RunState::Idle);
    assert_eq!(ticks, 3);
    for step in queue.steps() {
        assert_eq!(step.state(), StepState::Succeeded);
    }
}

#[test]
fn tick_n_respects_its_bound_on_a_stuck_queue() {
    let mut queue = TaskQueue::new("bounded");
    TaskBuilder::create("never").with_condition(|_ctx: &mut StepCtx<'_>| false)
                                .enqueue_to(&mut queue);

    queue.start();
    let driver = TickDriver::new(Duration::ZERO);
    let ticks = driver.tick_n(&mut queue, 5);

    assert_eq!(ticks, 5);
    assert_eq!(queue.run_state(), RunState::Running);
    assert_eq!(queue.steps()[0].state(), StepState::Running);
}

#[test]
fn driver_is_a_noop_on_an_unstarted_queue() {
    let mut queue = TaskQueue::new("idle");
    TaskBuilder::create("pending").enqueue_to(&mut queue);

    let driver = TickDriver::new(Duration::ZERO);
    assert_eq!(driver.run_until_idle(&mut queue), 0);
    assert_eq!(driver.tick_n(&mut queue, 3), 0);
    assert_eq!(queue.steps()[0].state(), StepState::Pending);
}
