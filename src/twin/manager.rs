use super::digital_twin::DigitalTwin;
use super::registry::{InMemoryTwinRegistry, TwinRegistry};
use super::types::{ScenarioConfig, ScenarioResult, TwinConfig, TwinData, TwinStatusSnapshot, TwinSummary};
use crate::config::TwinSettings;
use crate::error::{Error, Result};
use crate::simulation::{ParameterMap, SimulationEngine};
use futures::future::join_all;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Owns the live twins and routes requests to them by ID
pub struct DigitalTwinManager {
    engine: Arc<SimulationEngine>,
    registry: Arc<dyn TwinRegistry>,
    settings: TwinSettings,
}

impl DigitalTwinManager {
    pub fn new(engine: Arc<SimulationEngine>, settings: TwinSettings) -> Self {
        Self::with_registry(engine, Arc::new(InMemoryTwinRegistry::new()), settings)
    }

    pub fn with_registry(
        engine: Arc<SimulationEngine>,
        registry: Arc<dyn TwinRegistry>,
        settings: TwinSettings,
    ) -> Self {
        Self {
            engine,
            registry,
            settings,
        }
    }

    pub fn engine(&self) -> &Arc<SimulationEngine> {
        &self.engine
    }

    /// Create, start and register a twin. Returns its initial status.
    pub async fn create_twin(&self, config: TwinConfig) -> Result<TwinStatusSnapshot> {
        let id = Uuid::now_v7().to_string();
        let twin = Arc::new(DigitalTwin::new(
            id.clone(),
            config,
            Arc::clone(&self.engine),
            self.settings.clone(),
        )?);

        twin.start().await;
        self.registry.insert(Arc::clone(&twin));

        info!(
            twin_id = %id,
            name = %twin.name(),
            process_type = %twin.process_type(),
            total_twins = self.registry.len(),
            "Created digital twin"
        );
        Ok(twin.get_status().await)
    }

    pub async fn get_status(&self, id: &str) -> Result<TwinStatusSnapshot> {
        Ok(self.twin(id)?.get_status().await)
    }

    pub async fn get_data(&self, id: &str, start: Option<f64>, end: Option<f64>) -> Result<TwinData> {
        Ok(self.twin(id)?.get_data(start, end).await)
    }

    pub async fn update_parameters(&self, id: &str, values: ParameterMap) -> Result<TwinStatusSnapshot> {
        self.twin(id)?.update_parameters(values).await
    }

    pub async fn run_scenario(&self, id: &str, scenario: ScenarioConfig) -> Result<ScenarioResult> {
        self.twin(id)?.run_scenario(scenario).await
    }

    pub async fn pause(&self, id: &str) -> Result<TwinStatusSnapshot> {
        self.twin(id)?.pause().await
    }

    pub async fn resume(&self, id: &str) -> Result<TwinStatusSnapshot> {
        self.twin(id)?.resume().await
    }

    /// Summaries of every twin, oldest first
    pub async fn list_twins(&self) -> Vec<TwinSummary> {
        let twins = self.registry.all();
        let mut summaries = join_all(twins.iter().map(|twin| async move {
            TwinSummary {
                id: twin.id().to_string(),
                name: twin.name().to_string(),
                process_type: twin.process_type().to_string(),
                status: twin.status().await,
                created_at: twin.created_at(),
            }
        }))
        .await;
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        summaries
    }

    /// Stop the twin (bounded wait) and then remove it from the registry.
    /// A concurrent delete that loses the removal gets `NotFound`.
    pub async fn delete_twin(&self, id: &str) -> Result<()> {
        self.twin(id)?.stop().await;
        self.registry.remove(id).ok_or_else(|| Error::twin_not_found(id))?;
        info!(twin_id = %id, remaining = self.registry.len(), "Deleted digital twin");
        Ok(())
    }

    /// Stop every twin concurrently; twins stay registered as terminated
    pub async fn shutdown_all(&self) {
        let twins = self.registry.all();
        let count = twins.len();
        join_all(twins.iter().map(|twin| twin.stop())).await;
        info!(count, "All digital twins stopped");
    }

    pub fn twin_count(&self) -> usize {
        self.registry.len()
    }

    fn twin(&self, id: &str) -> Result<Arc<DigitalTwin>> {
        self.registry.get(id).ok_or_else(|| Error::twin_not_found(id))
    }
}
