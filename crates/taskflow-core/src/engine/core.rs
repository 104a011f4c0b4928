//! Core TaskQueue implementation

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::event::{EventBus, InMemoryEventBus, QueueEvent, QueueEventKind, Subscriber};
use crate::errors::StepError;
use crate::metadata::MetadataStore;
use crate::step::{StepCtx, StepState, TaskStep};
use crate::time::{self, Clock, SystemClock};

/// Estado de ejecución de la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Sin run en curso. La cola puede poblarse y arrancarse.
    Idle,
    /// Un driver externo la avanza tick a tick.
    Running,
    /// Ticks suspendidos; cursor y step en vuelo intactos.
    Paused,
    /// `stop()` pedido; el próximo tick ejecuta el desmonte y vuelve a `Idle`.
    Stopped,
}

/// Peticiones de control que un callback de fallo puede dejar anotadas.
///
/// Los callbacks no reciben la cola (correría dentro de su propio tick);
/// reciben esto. Las peticiones se aplican al terminar el callback y toman
/// efecto en el próximo `advance()`, nunca a mitad de un callback.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueControl {
    pub(crate) stop: bool,
    pub(crate) skip: bool,
}

impl QueueControl {
    /// Pide detener el run completo.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    /// Pide cancelar el step actual y avanzar el cursor.
    pub fn skip_current(&mut self) {
        self.skip = true;
    }
}

/// Cola de steps con avance cooperativo por ticks.
///
/// La cola es pasiva: no posee hilo. Toda mutación ocurre dentro de
/// `advance()`, invocado por exactamente un driver externo, una vez por
/// tick, nunca reentrante. Los steps ejecutan estrictamente en orden de
/// encolado; no hay ejecución concurrente de dos steps.
///
/// Política documentada: un step que termina en `Failed` o `TimedOut` deja
/// la cola ESTACIONADA sobre él: el cursor no avanza y los ticks no hacen
/// nada hasta que un callback o un llamador externo pida `stop()` o
/// `skip_current()`. Es un punto de intervención manual deliberado.
pub struct TaskQueue<C: Clock = SystemClock, B: EventBus = InMemoryEventBus> {
    id: Uuid,
    name: String,
    steps: Vec<TaskStep>,
    cursor: usize,
    run_state: RunState,
    skip_requested: bool,
    metadata: MetadataStore,
    bus: B,
    clock: C,
}

impl TaskQueue<SystemClock, InMemoryEventBus> {
    /// Cola con reloj de sistema y bus in-memory.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_parts(name, SystemClock, InMemoryEventBus::new())
    }
}

impl<C: Clock, B: EventBus> TaskQueue<C, B> {
    /// Cola con reloj y bus provistos (tests: `ManualClock`).
    pub fn with_parts(name: impl Into<String>, clock: C, bus: B) -> Self {
        Self { id: Uuid::new_v4(),
               name: name.into(),
               steps: Vec::new(),
               cursor: 0,
               run_state: RunState::Idle,
               skip_requested: false,
               metadata: MetadataStore::new(),
               bus,
               clock }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.run_state == RunState::Running
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.run_state == RunState::Paused
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Steps del run actual (terminales incluidos). Vacío tras un `stop()`.
    pub fn steps(&self) -> &[TaskStep] {
        &self.steps
    }

    /// Índice del step actual, o `None` si la cola está ociosa o drenada.
    pub fn cursor(&self) -> Option<usize> {
        match self.run_state {
            RunState::Idle => None,
            _ => (self.cursor < self.steps.len()).then_some(self.cursor),
        }
    }

    /// Step actual, o `None` si la cola está ociosa o drenada.
    pub fn current_step(&self) -> Option<&TaskStep> {
        self.cursor().map(|i| &self.steps[i])
    }

    /// Fracción de avance: steps por delante del cursor / total. 1.0 al
    /// drenar. Se recalcula en cada consulta.
    pub fn progress(&self) -> f32 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.cursor.min(self.steps.len()) as f32 / self.steps.len() as f32
    }

    /// Metadata de la cola (lectura; la escritura ocurre vía `StepCtx`).
    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    /// Metadata del step `step_name`, deserializada a `T`.
    pub fn metadata_of<T: DeserializeOwned>(&self, step_name: &str) -> Option<T> {
        self.metadata.get(step_name)
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Eventos publicados hasta ahora (orden de publicación).
    pub fn events(&self) -> Vec<QueueEvent> {
        self.bus.list()
    }

    /// Registra un observador de eventos.
    pub fn subscribe(&mut self, subscriber: impl FnMut(&QueueEvent) + 'static) {
        self.bus.subscribe(Box::new(subscriber) as Subscriber);
    }

    /// Encola un step ya construido. Sólo el builder llega aquí: así el
    /// scheduler nunca observa steps a medio configurar.
    pub(crate) fn push_step(&mut self, step: TaskStep) {
        tracing::debug!(queue = %self.name, step = %step.name(), "step enqueued");
        self.steps.push(step);
    }

    // ------------------------------------------------------------------
    // Operaciones de control. Toman efecto al inicio del próximo tick.
    // ------------------------------------------------------------------

    /// `Idle` -> `Running`. En cualquier otro estado no hace nada.
    pub fn start(&mut self) {
        if self.run_state != RunState::Idle {
            return;
        }
        self.run_state = RunState::Running;
        let now = self.clock.now();
        self.publish(QueueEventKind::QueueStarted, now);
    }

    /// Termina el run: el próximo tick cancela el step en vuelo, descarta
    /// los no arrancados y deja la cola en `Idle`, lista para repoblarse.
    pub fn stop(&mut self) {
        if matches!(self.run_state, RunState::Running | RunState::Paused) {
            tracing::debug!(queue = %self.name, "stop requested");
            self.run_state = RunState::Stopped;
        }
    }

    /// Suspende los ticks sin perder cursor ni step en vuelo.
    pub fn pause(&mut self) {
        if self.run_state == RunState::Running {
            self.run_state = RunState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            self.run_state = RunState::Running;
        }
    }

    /// Fuerza el step actual a `Cancelled` y avanza el cursor en el próximo
    /// tick, ignorando reintentos y timeout pendientes. Sobre un step ya
    /// terminal (cola estacionada) sólo avanza el cursor.
    pub fn skip_current(&mut self) {
        if matches!(self.run_state, RunState::Running | RunState::Paused) {
            self.skip_requested = true;
        }
    }

    // ------------------------------------------------------------------
    // Avance por tick
    // ------------------------------------------------------------------

    /// Un tick del scheduler. Invocado por el driver externo; opera sólo
    /// sobre el step en el cursor.
    pub fn advance(&mut self) {
        match self.run_state {
            RunState::Stopped => {
                self.teardown();
                return;
            }
            RunState::Running => {}
            RunState::Idle | RunState::Paused => return,
        }

        let now = self.clock.now();

        if self.skip_requested {
            self.skip_requested = false;
            self.cancel_current(now);
            if self.run_state == RunState::Running {
                self.advance_cursor(now);
            }
            return;
        }

        if self.cursor >= self.steps.len() {
            self.finish(now);
            return;
        }

        if self.steps[self.cursor].state.is_terminal() {
            // Estacionada sobre un step fallido. Ver la nota de política
            // en el doc del tipo.
            return;
        }

        // Primer intento.
        if self.steps[self.cursor].state == StepState::Pending {
            let idx = self.cursor;
            {
                let step = &mut self.steps[idx];
                step.state = StepState::Running;
                step.started_at = Some(now);
                step.last_attempt_at = Some(now);
                step.attempt = 1;
            }
            let name = self.steps[idx].name().to_string();
            self.publish(QueueEventKind::TaskStarted { step_index: idx,
                                                       step_name: name },
                         now);
            if let Err(e) = self.run_action(now, false) {
                self.fail_current(StepError::ActionFailed(format!("{e:#}")), now);
                return;
            }
        }

        // Condición ya cumplida en un tick anterior: sólo queda esperar el
        // delay posterior. La condición no se vuelve a sondear.
        if let Some(met_at) = self.steps[self.cursor].condition_met_at {
            if self.post_delay_elapsed(met_at, now) {
                self.succeed_current(now);
            }
            return;
        }

        if self.poll_condition(now) {
            self.steps[self.cursor].condition_met_at = Some(now);
            if self.post_delay_elapsed(now, now) {
                self.succeed_current(now);
            }
            return;
        }

        // Condición falsa: primero el presupuesto de tiempo, después los
        // reintentos.
        let step = &self.steps[self.cursor];
        if let (Some(budget), Some(started)) = (step.timeout, step.started_at) {
            if time::elapsed(started, now, budget) {
                self.timeout_current(now);
                return;
            }
        }

        let Some(policy) = self.steps[self.cursor].retry.clone() else {
            // Sin política de reintentos: se sigue sondeando tick a tick,
            // acotado sólo por el timeout.
            return;
        };
        let step = &self.steps[self.cursor];
        let last = step.last_attempt_at.unwrap_or(now);
        if !time::elapsed(last, now, policy.delay_after(step.attempt)) {
            return;
        }
        if step.attempt >= policy.max_attempts {
            self.exhaust_current(now);
            return;
        }

        let idx = self.cursor;
        let attempt = {
            let step = &mut self.steps[idx];
            step.attempt += 1;
            step.last_attempt_at = Some(now);
            step.attempt
        };
        let name = self.steps[idx].name().to_string();
        self.publish(QueueEventKind::RetryScheduled { step_index: idx,
                                                      step_name: name,
                                                      attempt },
                     now);
        if let Err(e) = self.run_action(now, true) {
            self.fail_current(StepError::ActionFailed(format!("{e:#}")), now);
        }
    }

    // ------------------------------------------------------------------
    // Transiciones terminales del step actual
    // ------------------------------------------------------------------

    fn succeed_current(&mut self, now: DateTime<Utc>) {
        let idx = self.cursor;
        self.steps[idx].state = StepState::Succeeded;
        let name = self.steps[idx].name().to_string();
        self.publish(QueueEventKind::StepSucceeded { step_index: idx,
                                                     step_name: name },
                     now);
        self.advance_cursor(now);
    }

    fn fail_current(&mut self, error: StepError, now: DateTime<Utc>) {
        let idx = self.cursor;
        {
            let step = &mut self.steps[idx];
            step.state = StepState::Failed;
            step.error = Some(error.clone());
        }
        let ctrl = self.fire_failure_hook(Some(error.clone()));
        let name = self.steps[idx].name().to_string();
        self.publish(QueueEventKind::StepFailed { step_index: idx,
                                                  step_name: name,
                                                  error },
                     now);
        self.apply_control(ctrl);
    }

    fn exhaust_current(&mut self, now: DateTime<Utc>) {
        let idx = self.cursor;
        let error = StepError::RetriesExhausted { attempts: self.steps[idx].attempt };
        {
            let step = &mut self.steps[idx];
            step.state = StepState::Failed;
            step.error = Some(error.clone());
        }
        let first = self.fire_retries_exceeded_hook();
        let second = self.fire_failure_hook(Some(error.clone()));
        let name = self.steps[idx].name().to_string();
        self.publish(QueueEventKind::StepFailed { step_index: idx,
                                                  step_name: name,
                                                  error },
                     now);
        self.apply_control(first);
        self.apply_control(second);
    }

    fn timeout_current(&mut self, now: DateTime<Utc>) {
        let idx = self.cursor;
        {
            let step = &mut self.steps[idx];
            step.state = StepState::TimedOut;
            step.error = Some(StepError::ConditionTimeout);
        }
        let ctrl = self.fire_failure_hook(Some(StepError::ConditionTimeout));
        let name = self.steps[idx].name().to_string();
        self.publish(QueueEventKind::StepTimedOut { step_index: idx,
                                                    step_name: name },
                     now);
        self.apply_control(ctrl);
    }

    /// Cancela el step actual si todavía no es terminal. Sobre un step
    /// terminal no reescribe nada (los estados terminales son definitivos).
    fn cancel_current(&mut self, now: DateTime<Utc>) {
        let idx = self.cursor;
        if idx >= self.steps.len() || self.steps[idx].state.is_terminal() {
            return;
        }
        {
            let step = &mut self.steps[idx];
            step.state = StepState::Cancelled;
            step.error = Some(StepError::Cancelled);
        }
        let ctrl = self.fire_failure_hook(Some(StepError::Cancelled));
        let name = self.steps[idx].name().to_string();
        self.publish(QueueEventKind::StepCancelled { step_index: idx,
                                                     step_name: name },
                     now);
        self.apply_control(ctrl);
    }

    fn advance_cursor(&mut self, now: DateTime<Utc>) {
        self.cursor += 1;
        if self.cursor >= self.steps.len() {
            self.finish(now);
        }
    }

    /// Cola drenada: run terminado.
    fn finish(&mut self, now: DateTime<Utc>) {
        self.publish(QueueEventKind::QueueStopped, now);
        self.run_state = RunState::Idle;
    }

    /// Desmonte tras `stop()`: cancela el step en vuelo, descarta el resto
    /// y vuelve a `Idle`. La metadata sobrevive: las entradas de steps ya
    /// completados no se corrompen por un aborto posterior.
    fn teardown(&mut self) {
        let now = self.clock.now();
        if self.cursor < self.steps.len() && !self.steps[self.cursor].state.is_terminal() {
            let idx = self.cursor;
            {
                let step = &mut self.steps[idx];
                step.state = StepState::Cancelled;
                step.error = Some(StepError::Cancelled);
            }
            // Las peticiones de control se ignoran: ya nos estamos deteniendo.
            let _ = self.fire_failure_hook(Some(StepError::Cancelled));
            let name = self.steps[idx].name().to_string();
            self.publish(QueueEventKind::StepCancelled { step_index: idx,
                                                         step_name: name },
                         now);
        }
        self.steps.clear();
        self.cursor = 0;
        self.skip_requested = false;
        self.publish(QueueEventKind::QueueStopped, now);
        self.run_state = RunState::Idle;
    }

    // ------------------------------------------------------------------
    // Callbacks y helpers
    // ------------------------------------------------------------------

    fn fire_failure_hook(&mut self, error: Option<StepError>) -> QueueControl {
        let mut ctrl = QueueControl::default();
        let step = &mut self.steps[self.cursor];
        let snapshot = step.snapshot();
        if let Some(hook) = step.on_failed_or_cancelled.as_mut() {
            hook(&snapshot, error.as_ref(), &mut ctrl);
        }
        ctrl
    }

    fn fire_retries_exceeded_hook(&mut self) -> QueueControl {
        let mut ctrl = QueueControl::default();
        let step = &mut self.steps[self.cursor];
        let snapshot = step.snapshot();
        if let Some(hook) = step.on_max_retries_exceeded.as_mut() {
            hook(&snapshot, &mut ctrl);
        }
        ctrl
    }

    fn apply_control(&mut self, ctrl: QueueControl) {
        if ctrl.stop {
            self.stop();
        }
        if ctrl.skip {
            self.skip_current();
        }
    }

    /// Corre la acción que corresponde al intento actual. `is_retry` elige
    /// la acción de reintento cuando el step define una.
    fn run_action(&mut self, now: DateTime<Utc>, is_retry: bool) -> anyhow::Result<()> {
        let step = &mut self.steps[self.cursor];
        let name = step.name().to_string();
        let attempt = step.attempt;
        let started = step.started_at.unwrap_or(now);
        let slot = if is_retry && step.retry_action.is_some() {
            step.retry_action.as_mut()
        } else {
            step.action.as_mut()
        };
        let Some(action) = slot else {
            return Ok(());
        };
        let mut ctx = StepCtx::new(&name, attempt, started, now, &mut self.metadata);
        action.run(&mut ctx)
    }

    /// Sondea la condición del step actual; ausente equivale a `true`.
    fn poll_condition(&mut self, now: DateTime<Utc>) -> bool {
        let step = &mut self.steps[self.cursor];
        let name = step.name().to_string();
        let attempt = step.attempt;
        let started = step.started_at.unwrap_or(now);
        let Some(condition) = step.condition.as_mut() else {
            return true;
        };
        let mut ctx = StepCtx::new(&name, attempt, started, now, &mut self.metadata);
        condition.poll(&mut ctx)
    }

    fn post_delay_elapsed(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let step = &self.steps[self.cursor];
        match &step.post_delay {
            None => true,
            Some(pd) => time::elapsed(since, now, pd.resolve(&step.snapshot())),
        }
    }

    fn publish(&mut self, kind: QueueEventKind, now: DateTime<Utc>) {
        tracing::debug!(queue = %self.name, event = ?kind, "queue event");
        self.bus.publish(self.id, now, kind);
    }
}

impl<C: Clock, B: EventBus> std::fmt::Debug for TaskQueue<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
         .field("name", &self.name)
         .field("run_state", &self.run_state)
         .field("cursor", &self.cursor)
         .field("steps", &self.steps.len())
         .finish_non_exhaustive()
    }
}
