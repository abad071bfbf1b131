//! Live digital twin.
//!
//! Each twin is an actor: one tokio task owns the advancement loop and is the
//! only writer of the twin state. Control requests reach it over an mpsc
//! channel; readers copy from the shared state under a short read lock.

use super::disruption::{self, PendingRestoration};
use super::history::TwinHistory;
use super::types::{
    ScenarioConfig, ScenarioResult, TwinConfig, TwinData, TwinEvent, TwinEventKind, TwinStatus,
    TwinStatusSnapshot,
};
use crate::config::TwinSettings;
use crate::error::{Error, Result};
use crate::simulation::{ParameterMap, SimulationConfig, SimulationEngine, SimulationResult};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Control messages served by the twin task between steps
enum TwinCommand {
    Pause(oneshot::Sender<TwinStatus>),
    Resume(oneshot::Sender<TwinStatus>),
    UpdateParameters {
        values: ParameterMap,
        reply: oneshot::Sender<()>,
    },
    Stop,
}

/// Mutable twin state, written only by the twin task once started
#[derive(Debug)]
struct TwinState {
    status: TwinStatus,
    current_time: f64,
    uptime: f64,
    parameters: ParameterMap,
    current_metrics: ParameterMap,
    last_updated: DateTime<Utc>,
    last_error: Option<String>,
    history: TwinHistory,
    events: Vec<TwinEvent>,
}

impl TwinState {
    fn merge_parameters(&mut self, values: ParameterMap) {
        self.parameters
            .extend(values.iter().map(|(k, v)| (k.clone(), *v)));
        self.events.push(TwinEvent {
            timestamp: self.current_time,
            kind: TwinEventKind::ParameterChange { parameters: values },
        });
        self.last_updated = Utc::now();
    }
}

pub struct DigitalTwin {
    id: String,
    config: TwinConfig,
    created_at: DateTime<Utc>,
    engine: Arc<SimulationEngine>,
    settings: TwinSettings,
    real_step: Duration,
    state: Arc<RwLock<TwinState>>,
    commands: mpsc::Sender<TwinCommand>,
    /// Receiver parked here until `start` hands it to the twin task
    inbox: Mutex<Option<mpsc::Receiver<TwinCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DigitalTwin {
    /// Create a twin in `initializing`. The process type must be registered.
    pub fn new(
        id: String,
        config: TwinConfig,
        engine: Arc<SimulationEngine>,
        settings: TwinSettings,
    ) -> Result<Self> {
        if !engine.has_process_type(&config.process_type) {
            return Err(Error::UnknownProcessType(config.process_type.clone()));
        }
        config.validate()?;
        settings.validate()?;
        let real_step = config.real_step()?;

        let (commands, inbox) = mpsc::channel(settings.command_buffer.max(1));
        let now = Utc::now();
        let state = TwinState {
            status: TwinStatus::Initializing,
            current_time: 0.0,
            uptime: 0.0,
            parameters: config.parameters.clone(),
            current_metrics: ParameterMap::new(),
            last_updated: now,
            last_error: None,
            history: TwinHistory::new(settings.max_history_points),
            events: Vec::new(),
        };

        Ok(Self {
            id,
            config,
            created_at: now,
            engine,
            settings,
            real_step,
            state: Arc::new(RwLock::new(state)),
            commands,
            inbox: Mutex::new(Some(inbox)),
            task: Mutex::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn process_type(&self) -> &str {
        &self.config.process_type
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn status(&self) -> TwinStatus {
        self.state.read().await.status
    }

    /// Spawn the twin task. No-op when already started or terminal.
    pub async fn start(&self) {
        let mut task = self.task.lock().await;
        if task.is_some() {
            return;
        }
        let Some(inbox) = self.inbox.lock().await.take() else {
            return;
        };

        {
            let mut state = self.state.write().await;
            if state.status.is_terminal() {
                return;
            }
            state.status = TwinStatus::Running;
            state.last_updated = Utc::now();
        }

        let rng = match self.config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let actor = TwinActor {
            twin_id: self.id.clone(),
            process_type: self.config.process_type.clone(),
            time_step: self.config.time_step(),
            real_step: self.real_step,
            include_random_events: self.config.include_random_events,
            random_seed: self.config.random_seed,
            random_event_interval: self.settings.random_event_interval,
            engine: Arc::clone(&self.engine),
            state: Arc::clone(&self.state),
            inbox,
            rng,
            paused: false,
            step: 0,
            last_event_time: 0.0,
            restorations: Vec::new(),
        };
        *task = Some(tokio::spawn(actor.run()));

        info!(
            twin_id = %self.id,
            name = %self.config.name,
            process_type = %self.config.process_type,
            "Digital twin started"
        );
    }

    /// Stop the twin task and mark the twin terminated.
    ///
    /// Waits up to `stop_timeout` for the task to exit, then aborts it.
    pub async fn stop(&self) {
        let handle = self.task.lock().await.take();
        if let Some(mut handle) = handle {
            let commands = self.commands.clone();
            let graceful = timeout(self.settings.stop_timeout(), async {
                // Send fails only when the task already exited
                let _ = commands.send(TwinCommand::Stop).await;
                (&mut handle).await
            })
            .await;

            match graceful {
                Ok(Ok(())) => debug!(twin_id = %self.id, "Twin task exited"),
                Ok(Err(e)) => warn!(twin_id = %self.id, error = %e, "Twin task ended abnormally"),
                Err(_) => {
                    warn!(
                        twin_id = %self.id,
                        timeout_ms = self.settings.stop_timeout_ms,
                        "Twin task did not stop in time, aborting"
                    );
                    handle.abort();
                }
            }
        }
        self.inbox.lock().await.take();

        let mut state = self.state.write().await;
        if state.status != TwinStatus::Terminated {
            state.status = TwinStatus::Terminated;
            state.last_updated = Utc::now();
            info!(twin_id = %self.id, "Digital twin stopped");
        }
    }

    pub async fn pause(&self) -> Result<TwinStatusSnapshot> {
        if self.is_live().await {
            self.request(TwinCommand::Pause).await?;
        }
        Ok(self.get_status().await)
    }

    pub async fn resume(&self) -> Result<TwinStatusSnapshot> {
        if self.is_live().await {
            self.request(TwinCommand::Resume).await?;
        }
        Ok(self.get_status().await)
    }

    /// Merge new parameter values and record a `parameter_change` event
    pub async fn update_parameters(&self, values: ParameterMap) -> Result<TwinStatusSnapshot> {
        if self.is_started().await {
            self.request(|reply| TwinCommand::UpdateParameters { values, reply })
                .await?;
        } else {
            let mut state = self.state.write().await;
            if state.status.is_terminal() {
                return Err(self.unavailable(state.status));
            }
            state.merge_parameters(values);
        }
        Ok(self.get_status().await)
    }

    pub async fn get_status(&self) -> TwinStatusSnapshot {
        let state = self.state.read().await;
        TwinStatusSnapshot {
            id: self.id.clone(),
            name: self.config.name.clone(),
            process_type: self.config.process_type.clone(),
            description: self.config.description.clone(),
            created_at: self.created_at,
            status: state.status,
            current_time: state.current_time,
            uptime: state.uptime,
            current_parameters: state.parameters.clone(),
            current_metrics: state.current_metrics.clone(),
            last_updated: state.last_updated,
            last_error: state.last_error.clone(),
        }
    }

    /// History and events with `start <= t <= end` (defaults 0 and +inf)
    pub async fn get_data(&self, start: Option<f64>, end: Option<f64>) -> TwinData {
        let start_time = start.unwrap_or(0.0);
        let end_time = end.unwrap_or(f64::INFINITY);

        let state = self.state.read().await;
        let slice = state.history.slice(start_time, end_time);
        let events = state
            .events
            .iter()
            .filter(|e| e.timestamp >= start_time && e.timestamp <= end_time)
            .cloned()
            .collect();

        TwinData {
            twin_id: self.id.clone(),
            process_type: self.config.process_type.clone(),
            start_time,
            end_time,
            timestamps: slice.timestamps,
            parameters: slice.parameters,
            sensor_readings: slice.sensors,
            quality_metrics: slice.metrics,
            events,
        }
    }

    /// Run a what-if simulation from the current operating point.
    ///
    /// Works on a copy of the twin state; the twin itself is left untouched.
    pub async fn run_scenario(&self, scenario: ScenarioConfig) -> Result<ScenarioResult> {
        let started = std::time::Instant::now();

        let (mut parameters, baseline_metrics, current_time) = {
            let state = self.state.read().await;
            (
                state.parameters.clone(),
                state.current_metrics.clone(),
                state.current_time,
            )
        };
        parameters.extend(scenario.parameter_changes.iter().map(|(k, v)| (k.clone(), *v)));

        let config = SimulationConfig::new(self.config.process_type.clone(), scenario.duration, parameters)
            .with_seed(scenario.random_seed)
            .with_start_time(current_time);
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || engine.run_simulation(&config))
            .await
            .map_err(|e| Error::SimulationFailure(format!("scenario task failed: {}", e)))??;

        let scenario_metrics = ParameterMap::from([
            ("quality_score".to_string(), result.quality_score()),
            (
                "energy_consumption".to_string(),
                energy_per_hour(result.energy_consumption, scenario.duration),
            ),
            ("throughput".to_string(), result.throughput),
            ("defect_rate".to_string(), result.defect_rate),
        ]);
        let impact_analysis = scenario_metrics
            .iter()
            .map(|(name, value)| {
                let impact = match baseline_metrics.get(name) {
                    Some(&base) if base != 0.0 => (value - base) / base * 100.0,
                    _ => 0.0,
                };
                (name.clone(), impact)
            })
            .collect();

        info!(
            twin_id = %self.id,
            scenario = %scenario.name,
            duration = scenario.duration,
            "Scenario completed"
        );

        Ok(ScenarioResult {
            scenario_id: Uuid::now_v7().to_string(),
            twin_id: self.id.clone(),
            name: scenario.name,
            start_time: current_time,
            end_time: current_time + scenario.duration,
            parameter_changes: scenario.parameter_changes,
            baseline_metrics,
            scenario_metrics,
            impact_analysis,
            timestamps: result.timestamps,
            time_series_data: result.sensor_readings,
            execution_time: started.elapsed().as_secs_f64(),
        })
    }

    async fn is_started(&self) -> bool {
        self.task.lock().await.is_some()
    }

    /// Started and not yet stopped or failed
    async fn is_live(&self) -> bool {
        self.is_started().await && !self.status().await.is_terminal()
    }

    /// Send a command and wait for the twin task to acknowledge it
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> TwinCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(make(reply)).await.is_err() {
            return Err(self.unavailable(self.status().await));
        }
        match response.await {
            Ok(value) => Ok(value),
            Err(_) => Err(self.unavailable(self.status().await)),
        }
    }

    fn unavailable(&self, status: TwinStatus) -> Error {
        Error::TwinUnavailable(format!("twin {} is {}", self.id, status))
    }
}

/// Energy over a window expressed as a per-hour rate
fn energy_per_hour(energy: f64, duration: f64) -> f64 {
    energy / duration * 3600.0
}

/// Live metrics of one step: quality sub-metrics plus derived rates
fn step_metrics(result: &SimulationResult, time_step: f64) -> ParameterMap {
    let mut metrics = result.quality_metrics.clone();
    metrics.insert(
        "energy_consumption".to_string(),
        energy_per_hour(result.energy_consumption, time_step),
    );
    metrics.insert("throughput".to_string(), result.throughput);
    metrics.insert("defect_rate".to_string(), result.defect_rate);
    metrics
}

/// Advancement loop owned by the twin task
struct TwinActor {
    twin_id: String,
    process_type: String,
    /// Simulated seconds per step
    time_step: f64,
    real_step: Duration,
    include_random_events: bool,
    random_seed: Option<u64>,
    random_event_interval: f64,
    engine: Arc<SimulationEngine>,
    state: Arc<RwLock<TwinState>>,
    inbox: mpsc::Receiver<TwinCommand>,
    rng: StdRng,
    paused: bool,
    step: u64,
    last_event_time: f64,
    restorations: Vec<PendingRestoration>,
}

impl TwinActor {
    /// Run the loop; a panic anywhere in it leaves the twin in `error`
    async fn run(self) {
        let twin_id = self.twin_id.clone();
        let state = Arc::clone(&self.state);
        if let Err(panic) = AssertUnwindSafe(self.run_loop()).catch_unwind().await {
            let cause = Error::SimulationFailure(format!(
                "twin task panicked: {}",
                panic_message(panic.as_ref())
            ));
            mark_failed(&twin_id, &state, cause).await;
        }
    }

    async fn run_loop(mut self) {
        debug!(twin_id = %self.twin_id, time_step = self.time_step, "Twin loop started");

        loop {
            let iteration_start = Instant::now();

            if !self.paused {
                if let Err(e) = self.advance().await {
                    mark_failed(&self.twin_id, &self.state, e).await;
                    return;
                }
            }

            // Serve control messages until the step deadline
            let deadline = iteration_start + self.real_step;
            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => break,
                    command = self.inbox.recv() => match command {
                        Some(TwinCommand::Stop) | None => {
                            debug!(twin_id = %self.twin_id, "Twin loop stopping");
                            return;
                        }
                        Some(command) => self.handle(command).await,
                    }
                }
            }
        }
    }

    async fn handle(&mut self, command: TwinCommand) {
        match command {
            TwinCommand::Pause(reply) => {
                let status = self.set_paused(true).await;
                let _ = reply.send(status);
            }
            TwinCommand::Resume(reply) => {
                let status = self.set_paused(false).await;
                let _ = reply.send(status);
            }
            TwinCommand::UpdateParameters { values, reply } => {
                info!(twin_id = %self.twin_id, parameters = ?values, "Updating twin parameters");
                self.state.write().await.merge_parameters(values);
                let _ = reply.send(());
            }
            TwinCommand::Stop => {}
        }
    }

    async fn set_paused(&mut self, paused: bool) -> TwinStatus {
        let mut state = self.state.write().await;
        let (from, to) = if paused {
            (TwinStatus::Running, TwinStatus::Paused)
        } else {
            (TwinStatus::Paused, TwinStatus::Running)
        };
        if state.status == from {
            state.status = to;
            state.last_updated = Utc::now();
            self.paused = paused;
            info!(twin_id = %self.twin_id, status = %to, "Twin status changed");
        }
        state.status
    }

    /// Simulate one step and fold it into the twin state
    async fn advance(&mut self) -> Result<()> {
        let (parameters, start_time) = {
            let state = self.state.read().await;
            (state.parameters.clone(), state.current_time)
        };

        let seed = self.random_seed.map(|s| s.wrapping_add(self.step));
        let config = SimulationConfig::new(self.process_type.clone(), self.time_step, parameters)
            .with_seed(seed)
            .with_start_time(start_time);
        // Long steps generate many samples; keep them off the async workers
        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || engine.run_simulation(&config))
            .await
            .map_err(|e| Error::SimulationFailure(format!("simulation step failed: {}", e)))??;
        self.step += 1;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        state.current_time += self.time_step;
        state.uptime += self.time_step;
        state.current_metrics = step_metrics(&result, self.time_step);
        let now = state.current_time;

        let trimmed = state.history.record(
            now,
            &state.parameters,
            &result.latest_readings(),
            &state.current_metrics,
        );
        if trimmed {
            debug!(twin_id = %self.twin_id, kept = state.history.len(), "Trimmed twin history");
        }

        let parameters = &mut state.parameters;
        let events = &mut state.events;
        self.restorations.retain(|pending| {
            if now < pending.due_at {
                return true;
            }
            if let Some(event) = pending.apply(now, parameters) {
                events.push(event);
            }
            false
        });

        if self.include_random_events && now - self.last_event_time >= self.random_event_interval {
            let disruption =
                disruption::inject(&mut self.rng, now, &mut state.parameters, &mut state.current_metrics)?;
            info!(twin_id = %self.twin_id, event = ?disruption.event.kind, "Random event injected");
            state.events.push(disruption.event);
            if let Some(restoration) = disruption.restoration {
                disruption::schedule(&mut self.restorations, restoration);
            }
            self.last_event_time = now;
        }

        state.last_updated = Utc::now();

        if (now / 60.0).floor() > ((now - self.time_step) / 60.0).floor() {
            debug!(
                twin_id = %self.twin_id,
                current_time = now,
                quality = state.current_metrics.get("quality_score").copied().unwrap_or_default(),
                "Twin progress"
            );
        }
        Ok(())
    }

}

async fn mark_failed(twin_id: &str, state: &RwLock<TwinState>, e: Error) {
    error!(twin_id = %twin_id, error = %e, "Twin simulation failed");
    let mut state = state.write().await;
    state.status = TwinStatus::Error;
    state.last_error = Some(e.to_string());
    state.last_updated = Utc::now();
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown cause"
    }
}
