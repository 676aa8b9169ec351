use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::error::Error;

/// Server-side session store attached to a request.
///
/// Keys are plain strings and values are JSON documents. `regenerate` must
/// issue a fresh session with no data, `save` must persist the current data.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Session: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn insert(&mut self, key: &str, value: Value);
    fn remove(&mut self, key: &str) -> Option<Value>;
    fn entries(&self) -> Map<String, Value>;
    async fn regenerate(&mut self) -> Result<(), Error>;
    async fn save(&mut self) -> Result<(), Error>;
}

/// In-process session, mostly useful for tests and single-node deployments.
#[derive(Clone, Debug)]
pub struct MemorySession {
    id: Uuid,
    data: Map<String, Value>,
    saves: usize,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            data: Map::new(),
            saves: 0,
        }
    }

    pub fn with_entries(data: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            data,
            saves: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn saves(&self) -> usize {
        self.saves
    }
}

#[async_trait]
impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        self.data.get(key).cloned()
    }

    fn insert(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    fn entries(&self) -> Map<String, Value> {
        self.data.clone()
    }

    async fn regenerate(&mut self) -> Result<(), Error> {
        let previous = self.id;
        self.id = Uuid::new_v4();
        self.data.clear();
        debug!("Session {previous} regenerated as {}", self.id);
        Ok(())
    }

    async fn save(&mut self) -> Result<(), Error> {
        self.saves += 1;
        Ok(())
    }
}
