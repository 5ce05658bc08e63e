use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::{
    AuthProvider, DocRef, Document, DocumentStore, Query, StoreError, Subscription, User,
};

type Feed = mpsc::UnboundedSender<Result<Vec<Document>, StoreError>>;

#[derive(Default)]
struct Inner {
    collections: HashMap<String, BTreeMap<String, Value>>,
    subscribers: Vec<(Query, Feed)>,
    offline: bool,
}

impl Inner {
    fn run_query(&self, query: &Query) -> Vec<Document> {
        let mut docs: Vec<Document> = self
            .collections
            .get(&query.collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .filter(|(_, data)| query.matches(data))
            .map(|(id, data)| Document {
                reference: DocRef::new(query.collection.clone(), id.clone()),
                data: data.clone(),
            })
            .collect();
        query.sort(&mut docs);
        docs
    }

    /// Push fresh snapshots to live queries on `collection`, dropping closed feeds.
    fn notify(&mut self, collection: &str) {
        let subscribers = std::mem::take(&mut self.subscribers);
        let kept: Vec<(Query, Feed)> = subscribers
            .into_iter()
            .filter(|(query, feed)| {
                query.collection != collection || feed.send(Ok(self.run_query(query))).is_ok()
            })
            .collect();
        self.subscribers = kept;
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Unavailable("offline".to_string()))
        } else {
            Ok(())
        }
    }
}

/// Process-local document store with live queries.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    /// Simulate losing the connection. Live queries receive an error.
    pub fn set_offline(&self, offline: bool) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.offline = offline;
        if offline {
            inner.subscribers.retain(|(_, feed)| {
                feed.send(Err(StoreError::Unavailable("offline".to_string()))).is_ok()
            });
        }
        Ok(())
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().map(|inner| inner.subscribers.len()).unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, data: Value) -> Result<DocRef, StoreError> {
        let mut inner = self.lock()?;
        inner.check_online()?;
        let id = data
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let docs = inner.collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        docs.insert(id.clone(), data);
        inner.notify(collection);
        Ok(DocRef::new(collection, id))
    }

    async fn get(&self, reference: &DocRef) -> Result<Value, StoreError> {
        let inner = self.lock()?;
        inner.check_online()?;
        inner
            .collections
            .get(&reference.collection)
            .and_then(|docs| docs.get(&reference.id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(reference.id.clone()))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let inner = self.lock()?;
        inner.check_online()?;
        Ok(inner.run_query(query))
    }

    async fn update(&self, reference: &DocRef, partial: Value) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check_online()?;
        let doc = inner
            .collections
            .get_mut(&reference.collection)
            .and_then(|docs| docs.get_mut(&reference.id))
            .ok_or_else(|| StoreError::NotFound(reference.id.clone()))?;
        match partial {
            Value::Object(changes) if doc.is_object() => {
                if let Some(fields) = doc.as_object_mut() {
                    fields.extend(changes);
                }
            }
            other => *doc = other,
        }
        inner.notify(&reference.collection);
        Ok(())
    }

    async fn delete(&self, reference: &DocRef) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.check_online()?;
        inner
            .collections
            .get_mut(&reference.collection)
            .and_then(|docs| docs.remove(&reference.id))
            .ok_or_else(|| StoreError::NotFound(reference.id.clone()))?;
        inner.notify(&reference.collection);
        Ok(())
    }

    fn subscribe(&self, query: Query) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.lock() {
            Ok(mut inner) => {
                let initial = match inner.check_online() {
                    Ok(()) => Ok(inner.run_query(&query)),
                    Err(e) => Err(e),
                };
                if tx.send(initial).is_ok() {
                    inner.subscribers.push((query, tx));
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
            }
        }
        Subscription::new(rx)
    }
}

/// Auth provider holding the signed-in user in memory.
#[derive(Clone)]
pub struct MemoryAuth {
    state: Arc<watch::Sender<Option<User>>>,
}

impl Default for MemoryAuth {
    fn default() -> Self {
        Self {
            state: Arc::new(watch::Sender::new(None)),
        }
    }
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, user: User) {
        log::info!("Signed in as {}", user.uid);
        self.state.send_replace(Some(user));
    }
}

impl AuthProvider for MemoryAuth {
    fn current_user(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    fn on_auth_state_changed(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }

    async fn sign_out(&self) -> Result<(), StoreError> {
        self.state.send_replace(None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Direction, Filter};
    use crate::core::task::UserRole;
    use serde_json::json;

    #[tokio::test]
    async fn create_get_update_delete() {
        let store = MemoryStore::new();
        let doc = store
            .create("tasks", json!({"id": "t1", "title": "a", "status": "pending"}))
            .await
            .unwrap();
        assert_eq!(doc, DocRef::new("tasks", "t1"));

        store.update(&doc, json!({"status": "completed"})).await.unwrap();
        let data = store.get(&doc).await.unwrap();
        assert_eq!(data, json!({"id": "t1", "title": "a", "status": "completed"}));

        store.delete(&doc).await.unwrap();
        assert!(matches!(store.get(&doc).await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.delete(&doc).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn create_rejects_existing_id() {
        let store = MemoryStore::new();
        let doc = store.create("tasks", json!({"id": "t1", "title": "a"})).await.unwrap();
        assert!(matches!(
            store.create("tasks", json!({"id": "t1", "title": "b"})).await,
            Err(StoreError::AlreadyExists(id)) if id == "t1"
        ));
        assert_eq!(store.get(&doc).await.unwrap()["title"], "a");
        // Same id in another collection is a different document.
        assert!(store.create("archive", json!({"id": "t1"})).await.is_ok());
    }

    #[tokio::test]
    async fn create_without_id_generates_one() {
        let store = MemoryStore::new();
        let doc = store.create("notes", json!({"text": "x"})).await.unwrap();
        assert!(Uuid::parse_str(&doc.id).is_ok());
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let store = MemoryStore::new();
        for (id, n, owner) in [("a", 3, "ana"), ("b", 1, "ana"), ("c", 2, "ben")] {
            store
                .create("tasks", json!({"id": id, "n": n, "owner": owner}))
                .await
                .unwrap();
        }
        let query = Query::collection("tasks")
            .filter(Filter::eq("owner", "ana"))
            .order_by("n", Direction::Ascending);
        let ids: Vec<String> = store
            .query(&query)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.reference.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn subscription_receives_snapshots_until_dropped() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(Query::collection("tasks"));
        assert_eq!(sub.next().await.unwrap().unwrap().len(), 0);

        store.create("tasks", json!({"id": "t1"})).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap().len(), 1);

        // Writes to other collections do not wake this query.
        store.create("teams", json!({"id": "ops"})).await.unwrap();
        store.create("tasks", json!({"id": "t2"})).await.unwrap();
        assert_eq!(sub.next().await.unwrap().unwrap().len(), 2);

        drop(sub);
        store.create("tasks", json!({"id": "t3"})).await.unwrap();
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn offline_store_fails_calls_and_feeds() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe(Query::collection("tasks"));
        sub.next().await.unwrap().unwrap();

        store.set_offline(true).unwrap();
        assert!(matches!(sub.next().await, Some(Err(StoreError::Unavailable(_)))));
        assert!(matches!(
            store.create("tasks", json!({})).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_offline(false).unwrap();
        assert!(store.create("tasks", json!({})).await.is_ok());
    }

    #[tokio::test]
    async fn auth_state_changes_are_observable() {
        let auth = MemoryAuth::new();
        let mut changes = auth.on_auth_state_changed();
        assert!(auth.current_user().is_none());

        auth.sign_in(User {
            uid: "ana".into(),
            display_name: "Ana".into(),
            role: UserRole::Member,
            team: None,
        });
        changes.changed().await.unwrap();
        assert_eq!(changes.borrow().as_ref().map(|u| u.uid.as_str()), Some("ana"));

        auth.sign_out().await.unwrap();
        assert!(auth.current_user().is_none());
    }
}
