use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use tokio::sync::RwLock;

/// In-memory map from sensor id to its display label.
///
/// Shared between reading queries so a sensor resolved once is not looked up
/// again.
#[derive(Clone, Default)]
pub struct SensorLabelCache {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl SensorLabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, sensor_id: impl Into<String>, label: impl Into<String>) {
        self.inner.write().await.insert(sensor_id.into(), label.into());
    }

    pub async fn get(&self, sensor_id: &str) -> Option<String> {
        self.inner.read().await.get(sensor_id).cloned()
    }

    /// Distinct ids from `sensor_ids` with no cached label, in order of first
    /// appearance.
    pub async fn missing<'a, I>(&self, sensor_ids: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known = self.inner.read().await;
        let mut seen = HashSet::new();
        sensor_ids
            .into_iter()
            .filter(|id| !known.contains_key(*id) && seen.insert(*id))
            .map(str::to_owned)
            .collect()
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get() {
        let cache = SensorLabelCache::new();
        cache.insert("s1", "Temperature Sensor").await;

        assert_eq!(cache.get("s1").await.as_deref(), Some("Temperature Sensor"));
        assert!(cache.get("s2").await.is_none());
    }

    #[tokio::test]
    async fn insert_overwrites() {
        let cache = SensorLabelCache::new();
        cache.insert("s1", "old").await;
        cache.insert("s1", "new").await;

        assert_eq!(cache.get("s1").await.as_deref(), Some("new"));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn missing_is_deduplicated_in_first_seen_order() {
        let cache = SensorLabelCache::new();
        cache.insert("s2", "Humidity Sensor").await;

        let missing = cache.missing(["s3", "s1", "s2", "s3", "s1"]).await;
        assert_eq!(missing, ["s3", "s1"]);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let a = SensorLabelCache::new();
        let b = a.clone();
        a.insert("s1", "On/Off Sensor").await;
        assert_eq!(b.get("s1").await.as_deref(), Some("On/Off Sensor"));
    }
}
