use super::monitor::collect_report;
use super::*;
use crate::config::{SimulationSettings, TwinSettings};
use crate::error::Error;
use crate::simulation::{
    ModelInput, ModelOutput, ParameterMap, ProcessModel, ProcessParameter, SimulationEngine,
};
use rand::rngs::StdRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn molding_params() -> ParameterMap {
    [
        ("temperature", 230.0),
        ("pressure", 100.0),
        ("cooling_time", 20.0),
        ("injection_speed", 80.0),
        ("mold_temperature", 50.0),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn quiet_config() -> TwinConfig {
    let mut config = TwinConfig::new("press-1", "injection_molding", molding_params());
    config.include_random_events = false;
    config.random_seed = Some(7);
    config
}

fn manager_with(settings: TwinSettings) -> DigitalTwinManager {
    DigitalTwinManager::new(Arc::new(SimulationEngine::default()), settings)
}

fn manager() -> DigitalTwinManager {
    manager_with(TwinSettings::default())
}

#[tokio::test(start_paused = true)]
async fn test_twin_advances_while_running() {
    let manager = manager();
    let created = manager.create_twin(quiet_config()).await.unwrap();
    assert_eq!(created.status, TwinStatus::Running);
    assert_eq!(created.name, "press-1");

    sleep(Duration::from_millis(2500)).await;

    let status = manager.get_status(&created.id).await.unwrap();
    assert_eq!(status.status, TwinStatus::Running);
    assert!(status.current_time >= 2.0);
    assert_eq!(status.uptime, status.current_time);

    let quality = status.current_metrics["quality_score"];
    assert!((0.0..=1.0).contains(&quality));
    assert!(status.current_metrics.contains_key("energy_consumption"));
    assert!(status.current_metrics.contains_key("throughput"));
    assert!(status.current_metrics.contains_key("defect_rate"));

    let data = manager.get_data(&created.id, None, None).await.unwrap();
    assert_eq!(data.timestamps.len() as f64, status.current_time);
    assert_eq!(data.sensor_readings["temperature"].len(), data.timestamps.len());
    assert_eq!(data.parameters["pressure"], vec![100.0; data.timestamps.len()]);

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_simulated_time() {
    let manager = manager();
    let id = manager.create_twin(quiet_config()).await.unwrap().id;

    sleep(Duration::from_millis(1500)).await;
    let paused = manager.pause(&id).await.unwrap();
    assert_eq!(paused.status, TwinStatus::Paused);

    sleep(Duration::from_secs(5)).await;
    let still = manager.get_status(&id).await.unwrap();
    assert_eq!(still.status, TwinStatus::Paused);
    assert_eq!(still.current_time, paused.current_time);

    let resumed = manager.resume(&id).await.unwrap();
    assert_eq!(resumed.status, TwinStatus::Running);

    sleep(Duration::from_millis(2500)).await;
    let after = manager.get_status(&id).await.unwrap();
    assert!(after.current_time > paused.current_time);

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_update_parameters_records_event() {
    let manager = manager();
    let id = manager.create_twin(quiet_config()).await.unwrap().id;
    sleep(Duration::from_millis(1500)).await;

    let mut change = ParameterMap::new();
    change.insert("pressure".to_string(), 120.0);
    let status = manager.update_parameters(&id, change).await.unwrap();
    assert_eq!(status.current_parameters["pressure"], 120.0);
    assert_eq!(status.current_parameters["temperature"], 230.0);

    sleep(Duration::from_secs(2)).await;
    let data = manager.get_data(&id, None, None).await.unwrap();
    let changes: Vec<&TwinEvent> = data
        .events
        .iter()
        .filter(|e| matches!(e.kind, TwinEventKind::ParameterChange { .. }))
        .collect();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].timestamp, status.current_time);
    assert_eq!(data.parameters["pressure"].last().copied(), Some(120.0));

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_terminal_and_idempotent() {
    let engine = Arc::new(SimulationEngine::default());
    let twin = DigitalTwin::new("t-1".to_string(), quiet_config(), engine, TwinSettings::default()).unwrap();
    assert_eq!(twin.status().await, TwinStatus::Initializing);

    twin.start().await;
    sleep(Duration::from_millis(1500)).await;

    twin.stop().await;
    assert_eq!(twin.status().await, TwinStatus::Terminated);
    let frozen = twin.get_status().await.current_time;

    twin.stop().await;
    twin.start().await;
    sleep(Duration::from_secs(3)).await;

    let status = twin.get_status().await;
    assert_eq!(status.status, TwinStatus::Terminated);
    assert_eq!(status.current_time, frozen);

    let err = twin.update_parameters(ParameterMap::new()).await.unwrap_err();
    assert!(matches!(err, Error::TwinUnavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn test_update_before_start_applies_directly() {
    let engine = Arc::new(SimulationEngine::default());
    let twin = DigitalTwin::new("t-2".to_string(), quiet_config(), engine, TwinSettings::default()).unwrap();

    let mut change = ParameterMap::new();
    change.insert("cooling_time".to_string(), 12.0);
    let status = twin.update_parameters(change).await.unwrap();
    assert_eq!(status.status, TwinStatus::Initializing);
    assert_eq!(status.current_parameters["cooling_time"], 12.0);

    // Pause is a no-op before start
    assert_eq!(twin.pause().await.unwrap().status, TwinStatus::Initializing);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_does_not_mutate_twin() {
    let manager = manager();
    let id = manager.create_twin(quiet_config()).await.unwrap().id;
    sleep(Duration::from_millis(1500)).await;

    manager.pause(&id).await.unwrap();
    let before = manager.get_status(&id).await.unwrap();
    let data_before = manager.get_data(&id, None, None).await.unwrap();
    assert!(!data_before.timestamps.is_empty());

    let mut changes = ParameterMap::new();
    changes.insert("temperature".to_string(), 220.0);
    changes.insert("pressure".to_string(), 120.0);
    let scenario = ScenarioConfig {
        name: "hotter".to_string(),
        parameter_changes: changes.clone(),
        duration: 30.0,
        random_seed: Some(3),
    };
    let result = manager.run_scenario(&id, scenario).await.unwrap();

    assert_eq!(result.twin_id, id);
    assert_eq!(result.parameter_changes, changes);
    assert_eq!(result.start_time, before.current_time);
    assert_eq!(result.end_time, before.current_time + 30.0);
    for metric in ["quality_score", "energy_consumption", "throughput", "defect_rate"] {
        assert!(result.scenario_metrics.contains_key(metric));
        assert!(result.impact_analysis.contains_key(metric));
    }
    assert!(result.scenario_metrics["quality_score"] > before.current_metrics["quality_score"]);
    assert!(result.impact_analysis["quality_score"] > 0.0);
    assert_eq!(result.time_series_data["temperature"].len(), result.timestamps.len());

    let after = manager.get_status(&id).await.unwrap();
    assert_eq!(after.current_parameters, before.current_parameters);
    assert_eq!(after.current_metrics, before.current_metrics);
    assert_eq!(after.current_time, before.current_time);
    // History, sensor series and events are untouched
    assert_eq!(manager.get_data(&id, None, None).await.unwrap(), data_before);

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_scenario_rejects_bad_duration() {
    let manager = manager();
    let id = manager.create_twin(quiet_config()).await.unwrap().id;

    let scenario = ScenarioConfig {
        name: "empty".to_string(),
        parameter_changes: ParameterMap::new(),
        duration: 0.0,
        random_seed: None,
    };
    assert!(matches!(
        manager.run_scenario(&id, scenario).await,
        Err(Error::InvalidConfig(_))
    ));

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_history_trimmed_in_lock_step() {
    let settings = TwinSettings {
        max_history_points: 10,
        ..TwinSettings::default()
    };
    let manager = manager_with(settings);

    let mut config = quiet_config();
    config.update_frequency = 10.0;
    config.speed_factor = 10.0;
    let id = manager.create_twin(config).await.unwrap().id;

    sleep(Duration::from_secs(3)).await;

    let data = manager.get_data(&id, None, None).await.unwrap();
    assert!(!data.timestamps.is_empty());
    assert!(data.timestamps.len() <= 10);
    for series in data
        .parameters
        .values()
        .chain(data.sensor_readings.values())
        .chain(data.quality_metrics.values())
    {
        assert_eq!(series.len(), data.timestamps.len());
    }

    let status = manager.get_status(&id).await.unwrap();
    assert!(status.current_time > 10.0);

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_get_data_window() {
    let manager = manager();
    let id = manager.create_twin(quiet_config()).await.unwrap().id;
    sleep(Duration::from_millis(5500)).await;

    let data = manager.get_data(&id, Some(2.0), Some(3.0)).await.unwrap();
    assert_eq!(data.timestamps, vec![2.0, 3.0]);
    assert_eq!(data.start_time, 2.0);
    assert_eq!(data.end_time, 3.0);

    let empty = manager.get_data(&id, Some(1000.0), None).await.unwrap();
    assert!(empty.timestamps.is_empty());
    assert!(empty.sensor_readings.values().all(|v| v.is_empty()));

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_random_events_injected() {
    let settings = TwinSettings {
        random_event_interval: 5.0,
        ..TwinSettings::default()
    };
    let manager = manager_with(settings);

    let mut config = quiet_config();
    config.include_random_events = true;
    let id = manager.create_twin(config).await.unwrap().id;

    sleep(Duration::from_millis(30_500)).await;

    let data = manager.get_data(&id, None, None).await.unwrap();
    let random: Vec<&TwinEvent> = data
        .events
        .iter()
        .filter(|e| matches!(e.kind, TwinEventKind::RandomEvent { .. }))
        .collect();
    assert!(random.len() >= 5);
    for pair in random.windows(2) {
        assert!(pair[1].timestamp - pair[0].timestamp >= 5.0);
    }

    manager.shutdown_all().await;
}

#[tokio::test(start_paused = true)]
async fn test_seeded_twins_reproduce() {
    let manager = manager();
    let a = manager.create_twin(quiet_config()).await.unwrap().id;
    let b = manager.create_twin(quiet_config()).await.unwrap().id;

    sleep(Duration::from_millis(5500)).await;
    manager.shutdown_all().await;

    let data_a = manager.get_data(&a, None, Some(5.0)).await.unwrap();
    let data_b = manager.get_data(&b, None, Some(5.0)).await.unwrap();
    assert_eq!(data_a.timestamps.len(), 5);
    assert_eq!(data_a.sensor_readings, data_b.sensor_readings);
    assert_eq!(data_a.quality_metrics, data_b.quality_metrics);
}

#[tokio::test(start_paused = true)]
async fn test_simulation_failure_sets_error() {
    let manager = manager();
    let mut config = quiet_config();
    config.parameters.insert("injection_speed".to_string(), -5.0);
    let id = manager.create_twin(config).await.unwrap().id;

    sleep(Duration::from_millis(100)).await;

    let status = manager.get_status(&id).await.unwrap();
    assert_eq!(status.status, TwinStatus::Error);
    assert!(status.last_error.unwrap().contains("injection_speed"));
    assert_eq!(status.current_time, 0.0);

    let err = manager.update_parameters(&id, ParameterMap::new()).await.unwrap_err();
    assert!(matches!(err, Error::TwinUnavailable(_)));
    assert_eq!(manager.pause(&id).await.unwrap().status, TwinStatus::Error);

    let report = collect_report(&manager).await;
    assert_eq!(report.errored, 1);

    manager.delete_twin(&id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_create_validation() {
    let manager = manager();

    let unknown = TwinConfig::new("w", "welding", ParameterMap::new());
    assert_eq!(
        manager.create_twin(unknown).await.unwrap_err(),
        Error::UnknownProcessType("welding".to_string())
    );

    let mut bad_frequency = quiet_config();
    bad_frequency.update_frequency = 0.0;
    assert!(matches!(
        manager.create_twin(bad_frequency).await,
        Err(Error::InvalidConfig(_))
    ));

    let mut bad_speed = quiet_config();
    bad_speed.speed_factor = -2.0;
    assert!(matches!(
        manager.create_twin(bad_speed).await,
        Err(Error::InvalidConfig(_))
    ));

    assert_eq!(manager.twin_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_twin_not_found() {
    let manager = manager();
    let expected = Error::NotFound {
        kind: "Digital twin",
        id: "missing".to_string(),
    };

    assert_eq!(manager.get_status("missing").await.unwrap_err(), expected);
    assert_eq!(manager.get_data("missing", None, None).await.unwrap_err(), expected);
    assert_eq!(manager.pause("missing").await.unwrap_err(), expected);
    assert_eq!(manager.delete_twin("missing").await.unwrap_err(), expected);
}

#[tokio::test(start_paused = true)]
async fn test_delete_and_list() {
    let manager = manager();
    let first = manager.create_twin(quiet_config()).await.unwrap().id;
    let mut second_config = quiet_config();
    second_config.name = "press-2".to_string();
    let second = manager.create_twin(second_config).await.unwrap().id;

    let listed = manager.list_twins().await;
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().any(|t| t.id == first));
    assert!(listed.iter().any(|t| t.id == second && t.name == "press-2"));

    manager.delete_twin(&first).await.unwrap();
    assert_eq!(manager.twin_count(), 1);
    assert!(matches!(
        manager.delete_twin(&first).await,
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        manager.get_status(&first).await,
        Err(Error::NotFound { .. })
    ));

    manager.shutdown_all().await;
    let report = collect_report(&manager).await;
    assert_eq!(report.twin_count, 1);
    assert_eq!(report.terminated, 1);
    assert_eq!(report.running, 0);
}

/// Model whose simulation always panics
struct PanickingModel;

impl ProcessModel for PanickingModel {
    fn name(&self) -> &str {
        "unstable_press"
    }

    fn parameters(&self) -> Vec<ProcessParameter> {
        Vec::new()
    }

    fn simulate(&self, _input: &ModelInput<'_>, _rng: &mut StdRng) -> crate::Result<ModelOutput> {
        panic!("sensor bus fault");
    }

    fn estimate_energy(&self, _parameters: &ParameterMap, _duration: f64) -> f64 {
        0.0
    }

    fn throughput(&self, _parameters: &ParameterMap) -> f64 {
        0.0
    }
}

#[tokio::test(start_paused = true)]
async fn test_panicking_model_sets_error() {
    let engine = Arc::new(SimulationEngine::default());
    engine.register(Arc::new(PanickingModel));
    let manager = DigitalTwinManager::new(Arc::clone(&engine), TwinSettings::default());

    let mut config = TwinConfig::new("press-x", "unstable_press", ParameterMap::new());
    config.include_random_events = false;
    let id = manager.create_twin(config).await.unwrap().id;

    sleep(Duration::from_secs(1)).await;

    let status = manager.get_status(&id).await.unwrap();
    assert_eq!(status.status, TwinStatus::Error);
    assert_eq!(status.current_time, 0.0);
    assert!(status.last_error.unwrap().contains("simulation step failed"));

    // The twin stays stoppable after its task died
    manager.delete_twin(&id).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_invalid_settings_rejected() {
    let manager = manager_with(TwinSettings {
        max_history_points: 1,
        ..TwinSettings::default()
    });
    assert!(matches!(
        manager.create_twin(quiet_config()).await,
        Err(Error::InvalidConfig(_))
    ));

    let engine = SimulationEngine::with_builtin_models(SimulationSettings { sample_interval: 0.0 });
    let manager = DigitalTwinManager::new(Arc::new(engine), TwinSettings::default());
    let id = manager.create_twin(quiet_config()).await.unwrap().id;
    sleep(Duration::from_secs(2)).await;

    let status = manager.get_status(&id).await.unwrap();
    assert_eq!(status.status, TwinStatus::Error);
    assert!(status.last_error.unwrap().contains("sample_interval"));
    manager.shutdown_all().await;
}
