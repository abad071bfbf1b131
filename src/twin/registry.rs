use super::digital_twin::DigitalTwin;
use dashmap::DashMap;
use std::sync::Arc;

/// Storage of live twins, keyed by twin ID
pub trait TwinRegistry: Send + Sync {
    fn insert(&self, twin: Arc<DigitalTwin>);

    fn get(&self, id: &str) -> Option<Arc<DigitalTwin>>;

    fn remove(&self, id: &str) -> Option<Arc<DigitalTwin>>;

    /// Every registered twin, in no particular order
    fn all(&self) -> Vec<Arc<DigitalTwin>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock-free in-process registry
#[derive(Default)]
pub struct InMemoryTwinRegistry {
    twins: DashMap<String, Arc<DigitalTwin>>,
}

impl InMemoryTwinRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TwinRegistry for InMemoryTwinRegistry {
    fn insert(&self, twin: Arc<DigitalTwin>) {
        self.twins.insert(twin.id().to_string(), twin);
    }

    fn get(&self, id: &str) -> Option<Arc<DigitalTwin>> {
        self.twins.get(id).map(|t| Arc::clone(t.value()))
    }

    fn remove(&self, id: &str) -> Option<Arc<DigitalTwin>> {
        self.twins.remove(id).map(|(_, twin)| twin)
    }

    fn all(&self) -> Vec<Arc<DigitalTwin>> {
        self.twins.iter().map(|t| Arc::clone(t.value())).collect()
    }

    fn len(&self) -> usize {
        self.twins.len()
    }
}
