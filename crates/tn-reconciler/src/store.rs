//! Manager-to-agent config distribution contract (spec §6): a durable,
//! labeled, addressable key/value store keyed by `(slice_id, node_name)`,
//! with change notifications. The repository binds this to Kubernetes
//! ConfigMaps; this crate only carries the trait contract plus an
//! in-memory implementation for tests and local runs.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tn_types::AgentConfig;
use tokio::sync::{watch, RwLock};

use crate::error::ReconcilerError;

#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn put(&self, slice_id: &str, node_name: &str, config: AgentConfig) -> Result<(), ReconcilerError>;
    async fn get(&self, slice_id: &str, node_name: &str) -> Result<Option<AgentConfig>, ReconcilerError>;
    async fn delete(&self, slice_id: &str, node_name: &str) -> Result<(), ReconcilerError>;
    /// Node names currently holding a published config for `slice_id`.
    async fn published_nodes(&self, slice_id: &str) -> Result<Vec<String>, ReconcilerError>;
    /// A receiver that ticks (carrying a monotonically increasing version)
    /// on every `put`/`delete` for `slice_id`. Created lazily on first watch.
    async fn watch(&self, slice_id: &str) -> Result<watch::Receiver<u64>, ReconcilerError>;
}

#[derive(Default)]
pub struct InMemoryConfigStore {
    entries: RwLock<HashMap<(String, String), AgentConfig>>,
    versions: RwLock<HashMap<String, watch::Sender<u64>>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn bump(&self, slice_id: &str) {
        let mut versions = self.versions.write().await;
        match versions.get(slice_id) {
            Some(tx) => {
                let next = *tx.borrow() + 1;
                let _ = tx.send(next);
            }
            None => {
                let (tx, _rx) = watch::channel(1);
                versions.insert(slice_id.to_string(), tx);
            }
        }
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn put(&self, slice_id: &str, node_name: &str, config: AgentConfig) -> Result<(), ReconcilerError> {
        self.entries
            .write()
            .await
            .insert((slice_id.to_string(), node_name.to_string()), config);
        self.bump(slice_id).await;
        Ok(())
    }

    async fn get(&self, slice_id: &str, node_name: &str) -> Result<Option<AgentConfig>, ReconcilerError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(slice_id.to_string(), node_name.to_string()))
            .cloned())
    }

    async fn delete(&self, slice_id: &str, node_name: &str) -> Result<(), ReconcilerError> {
        self.entries
            .write()
            .await
            .remove(&(slice_id.to_string(), node_name.to_string()));
        self.bump(slice_id).await;
        Ok(())
    }

    async fn published_nodes(&self, slice_id: &str) -> Result<Vec<String>, ReconcilerError> {
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|(sid, _)| sid == slice_id)
            .map(|(_, node)| node.clone())
            .collect())
    }

    async fn watch(&self, slice_id: &str) -> Result<watch::Receiver<u64>, ReconcilerError> {
        let mut versions = self.versions.write().await;
        let tx = versions
            .entry(slice_id.to_string())
            .or_insert_with(|| watch::channel(0).0);
        Ok(tx.subscribe())
    }
}

pub type SharedConfigStore = Arc<dyn ConfigStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use tn_types::AgentConfig;

    fn config(slice_id: &str, gen: u64) -> AgentConfig {
        AgentConfig {
            slice_id: slice_id.into(),
            generation: gen,
            vni: 100,
            tunnel_configs: vec![],
            shaping_rules: vec![],
            priority: 1,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = InMemoryConfigStore::new();
        store.put("s1", "node-a", config("s1", 1)).await.unwrap();
        let got = store.get("s1", "node-a").await.unwrap();
        assert_eq!(got.unwrap().generation, 1);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let store = InMemoryConfigStore::new();
        store.put("s1", "node-a", config("s1", 1)).await.unwrap();
        store.delete("s1", "node-a").await.unwrap();
        assert!(store.get("s1", "node-a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn published_nodes_filters_by_slice() {
        let store = InMemoryConfigStore::new();
        store.put("s1", "node-a", config("s1", 1)).await.unwrap();
        store.put("s2", "node-b", config("s2", 1)).await.unwrap();
        let nodes = store.published_nodes("s1").await.unwrap();
        assert_eq!(nodes, vec!["node-a".to_string()]);
    }

    #[tokio::test]
    async fn watch_ticks_on_put() {
        let store = InMemoryConfigStore::new();
        let mut rx = store.watch("s1").await.unwrap();
        store.put("s1", "node-a", config("s1", 1)).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
