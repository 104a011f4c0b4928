//! Demo de la cola contra la sesión simulada.
//!
//! Arma la cadena de compra (login, viaje, ventanas, clicks) y la avanza
//! con un bucle de ticks, imprimiendo los eventos del bus. El bucle juega
//! el papel del frame loop del host: sesión y cola avanzan entrelazadas.

use std::time::Duration;

use taskflow_adapters::steps::{click_step, login_step, open_window_step, travel_step, wait_ready_step};
use taskflow_adapters::SimSession;
use taskflow_core::{RunState, StepState, TaskBuilder, TaskQueue};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry().with(filter)
                                  .with(fmt::layer().with_writer(std::io::stderr).compact())
                                  .init();
}

fn usage() -> ! {
    eprintln!("Uso: taskflow run [--ticks <N>] [--interval-ms <M>] [--character <NOMBRE>]");
    eprintln!("  TASKFLOW_TICK_MS fija el intervalo por defecto (también vía .env)");
    std::process::exit(2);
}

fn main() {
    // Cargar .env si existe para obtener TASKFLOW_TICK_MS
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    if args.len() >= 2 && args[1] != "run" {
        usage();
    }

    let mut max_ticks: usize = 1000;
    let mut interval_ms: u64 = std::env::var("TASKFLOW_TICK_MS").ok()
                                                                .and_then(|v| v.parse().ok())
                                                                .unwrap_or(50);
    let mut character = "Aria Moon".to_string();

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--ticks" => {
                i += 1;
                match args.get(i).and_then(|v| v.parse().ok()) {
                    Some(n) => max_ticks = n,
                    None => usage(),
                }
            }
            "--interval-ms" => {
                i += 1;
                match args.get(i).and_then(|v| v.parse().ok()) {
                    Some(m) => interval_ms = m,
                    None => usage(),
                }
            }
            "--character" => {
                i += 1;
                match args.get(i) {
                    Some(name) => character = name.clone(),
                    None => usage(),
                }
            }
            _ => usage(),
        }
        i += 1;
    }

    let session = SimSession::default();
    session.register_character("Aria Moon");
    session.register_character("Bram Hollow");

    let mut queue = TaskQueue::new("purchase-demo");
    queue.subscribe(|ev| println!("[{:>3}] {:?}", ev.seq, ev.kind));

    // La cadena del proceso de compra: cada fallo salta al resto de la
    // cadena en lugar de dejar la cola estacionada.
    login_step(&session, &character).with_timeout(Duration::from_secs(30))
                                    .on_failed_or_cancelled(|step, err, ctrl| {
                                        tracing::warn!(step = %step.name, ?err, "login failed; skipping");
                                        ctrl.skip_current();
                                    })
                                    .enqueue_to(&mut queue);
    TaskBuilder::add_delay(&mut queue, Duration::from_millis(500));
    travel_step(&session, 6.0, 8.0).with_timeout(Duration::from_secs(15))
                                   .on_failed_or_cancelled(|_step, _err, ctrl| ctrl.skip_current())
                                   .enqueue_to(&mut queue);
    wait_ready_step(&session).enqueue_to(&mut queue);
    open_window_step(&session, "MerchantShop").with_retries(5, [Duration::from_secs(2), Duration::from_secs(1)])
                                              .on_max_retries_exceeded(|_step, ctrl| ctrl.skip_current())
                                              .enqueue_to(&mut queue);
    click_step(&session, "MerchantShop", "buy slot").enqueue_to(&mut queue);
    open_window_step(&session, "SelectYesno").enqueue_to(&mut queue);
    click_step(&session, "SelectYesno", "confirm").enqueue_to(&mut queue);

    queue.start();

    let interval = Duration::from_millis(interval_ms);
    let mut ticks = 0usize;
    while queue.run_state() != RunState::Idle && ticks < max_ticks {
        session.tick();
        queue.advance();
        ticks += 1;
        if queue.run_state() != RunState::Idle && !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    println!();
    println!("ticks: {ticks}  progreso: {:.0}%", queue.progress() * 100.0);
    let mut failed = false;
    for step in queue.steps() {
        println!("  {:<28} {:?}", step.name(), step.state());
        failed |= !matches!(step.state(), StepState::Succeeded);
    }
    if !session.clicks().is_empty() {
        println!("clicks: {:?}", session.clicks());
    }

    if queue.run_state() != RunState::Idle {
        eprintln!("la cola no terminó en {max_ticks} ticks");
        std::process::exit(4);
    }
    if failed {
        std::process::exit(1);
    }
}
