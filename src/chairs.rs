use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Static treatment-chair descriptor. The engine only checks existence and
/// clinic membership; chair management lives elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentChair {
    pub id: Uuid,
    pub clinic_id: Uuid,
    pub label: String,
    pub active: bool,
}

#[async_trait]
pub trait ChairRegistry: Send + Sync {
    async fn get(&self, chair_id: Uuid) -> Option<TreatmentChair>;
}

/// In-memory registry used in tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryChairRegistry {
    chairs: Mutex<HashMap<Uuid, TreatmentChair>>,
}

impl InMemoryChairRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn register(&self, chair: TreatmentChair) {
        self.chairs.lock().await.insert(chair.id, chair);
    }
}

#[async_trait]
impl ChairRegistry for InMemoryChairRegistry {
    async fn get(&self, chair_id: Uuid) -> Option<TreatmentChair> {
        self.chairs.lock().await.get(&chair_id).cloned()
    }
}
