//! Named saga definitions, registered once and started by name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::step::StepDefinition;

/// A shared table of saga definitions keyed by name.
///
/// Registration is an upsert; re-registering a name replaces its step
/// list for future starts without affecting sagas already running.
#[derive(Clone, Default)]
pub struct SagaCatalog {
    entries: Arc<RwLock<HashMap<String, Arc<Vec<StepDefinition>>>>>,
}

impl SagaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: impl Into<String>, definitions: Vec<StepDefinition>) {
        self.entries
            .write()
            .await
            .insert(name.into(), Arc::new(definitions));
    }

    pub async fn get(&self, name: &str) -> Option<Arc<Vec<StepDefinition>>> {
        self.entries.read().await.get(name).cloned()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}
