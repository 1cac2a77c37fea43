//! In-memory subscriber store for testing and offline mode

use async_trait::async_trait;
use feedwatch_domain::{
    DeliveryTarget, StatePatch, StoreError, Subscriber, SubscriberId, SubscriberStore,
    WatchConfig,
};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// In-memory subscriber store implementation; lists subscribers in id order
pub struct InMemorySubscriberStore {
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a store seeded with subscribers
    pub fn with_subscribers(subscribers: impl IntoIterator<Item = Subscriber>) -> Self {
        Self {
            subscribers: RwLock::new(
                subscribers
                    .into_iter()
                    .map(|s| (s.id.clone(), s))
                    .collect(),
            ),
        }
    }

    fn upsert(
        &self,
        id: &SubscriberId,
        update: impl FnOnce(&mut Subscriber),
    ) -> Result<(), StoreError> {
        let mut subscribers = self
            .subscribers
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let subscriber = subscribers
            .entry(id.clone())
            .or_insert_with(|| Subscriber::new(id.as_str()));
        update(subscriber);
        Ok(())
    }
}

impl Default for InMemorySubscriberStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn list_subscribers(&self) -> Result<Vec<Subscriber>, StoreError> {
        let subscribers = self
            .subscribers
            .read()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(subscribers.values().cloned().collect())
    }

    async fn update_subscriber_state(
        &self,
        id: &SubscriberId,
        patch: &StatePatch,
    ) -> Result<(), StoreError> {
        let mut subscribers = self
            .subscribers
            .write()
            .map_err(|e| StoreError::Database(e.to_string()))?;
        let subscriber = subscribers
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        patch.apply_to(&mut subscriber.state);
        Ok(())
    }

    async fn set_watch(&self, id: &SubscriberId, watch: &WatchConfig) -> Result<(), StoreError> {
        self.upsert(id, |s| s.replace_watch(watch.clone()))
    }

    async fn bind_delivery_target(
        &self,
        id: &SubscriberId,
        target: &DeliveryTarget,
    ) -> Result<(), StoreError> {
        self.upsert(id, |s| s.delivery_target = Some(target.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedwatch_domain::{DedupHistory, Item};
    use time::OffsetDateTime;

    #[tokio::test]
    async fn test_set_watch_and_bind_create_one_subscriber() {
        let store = InMemorySubscriberStore::new();
        let id = SubscriberId::new("u1");

        store
            .set_watch(&id, &WatchConfig::keywords(["bitcoin"]))
            .await
            .unwrap();
        store
            .bind_delivery_target(&id, &DeliveryTarget::new("42"))
            .await
            .unwrap();

        let subscribers = store.list_subscribers().await.unwrap();
        assert_eq!(subscribers.len(), 1);
        assert_eq!(subscribers[0].delivery_target, Some(DeliveryTarget::new("42")));
        assert_eq!(subscribers[0].watch, Some(WatchConfig::keywords(["bitcoin"])));
    }

    #[tokio::test]
    async fn test_update_state_applies_patch() {
        let store = InMemorySubscriberStore::with_subscribers([Subscriber::new("u1")]);
        let id = SubscriberId::new("u1");

        store
            .update_subscriber_state(
                &id,
                &StatePatch::notified(DedupHistory::from_ids(["a"]), OffsetDateTime::now_utc()),
            )
            .await
            .unwrap();

        let subscribers = store.list_subscribers().await.unwrap();
        assert!(subscribers[0].state.notified.seen("a"));
        assert!(subscribers[0].state.updated_at.is_some());
    }

    #[tokio::test]
    async fn test_changing_watch_resets_state() {
        let store = InMemorySubscriberStore::new();
        let id = SubscriberId::new("u1");

        store.set_watch(&id, &WatchConfig::follow("alice")).await.unwrap();
        store
            .update_subscriber_state(
                &id,
                &StatePatch::prior_snapshot(
                    vec![Item::account("a"), Item::account("b")],
                    OffsetDateTime::now_utc(),
                ),
            )
            .await
            .unwrap();

        store.set_watch(&id, &WatchConfig::follow("alice")).await.unwrap();
        assert_eq!(store.list_subscribers().await.unwrap()[0].state.prior_snapshot.len(), 2);

        store.set_watch(&id, &WatchConfig::follow("bob")).await.unwrap();
        let subscriber = store.list_subscribers().await.unwrap().remove(0);
        assert_eq!(subscriber.watch, Some(WatchConfig::follow("bob")));
        assert!(subscriber.state.prior_snapshot.is_empty());
        assert!(subscriber.state.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_subscriber() {
        let store = InMemorySubscriberStore::new();

        let result = store
            .update_subscriber_state(
                &SubscriberId::new("ghost"),
                &StatePatch::prior_snapshot(vec![], OffsetDateTime::now_utc()),
            )
            .await;

        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_id() {
        let store = InMemorySubscriberStore::with_subscribers([
            Subscriber::new("b"),
            Subscriber::new("a"),
        ]);

        let ids: Vec<_> = store
            .list_subscribers()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id.0)
            .collect();

        assert_eq!(ids, vec!["a", "b"]);
    }
}
