//! Hosted-backend seams: a document store with live queries and an
//! authentication provider. Implementations wrap the vendor SDK; the crate
//! ships an in-memory one.

pub mod memory;
pub mod service;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::core::task::UserRole;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("document already exists: {0}")]
    AlreadyExists(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("invalid document: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub reference: DocRef,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Top-level field equals value.
    Eq(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn matches(&self, data: &Value) -> bool {
        match self {
            Self::Eq(field, value) => data.get(field) == Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<(String, Direction)>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Sort documents by the ordering field. Documents missing the field sort first.
    pub fn sort(&self, docs: &mut [Document]) {
        if let Some((field, direction)) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.data.get(field), b.data.get(field));
                match direction {
                    Direction::Ascending => ord,
                    Direction::Descending => ord.reverse(),
                }
            });
        }
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// A live query. Each item is a full snapshot of the matching documents or
/// the error that interrupted the feed. Dropping it unsubscribes.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Result<Vec<Document>, StoreError>>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<Vec<Document>, StoreError>>) -> Self {
        Self { rx }
    }

    pub async fn next(&mut self) -> Option<Result<Vec<Document>, StoreError>> {
        self.rx.recv().await
    }
}

#[allow(async_fn_in_trait)]
pub trait DocumentStore {
    /// Store a new document. Its `id` field becomes the document id when
    /// present; an id already in the collection is rejected.
    async fn create(&self, collection: &str, data: Value) -> Result<DocRef, StoreError>;
    async fn get(&self, reference: &DocRef) -> Result<Value, StoreError>;
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;
    /// Shallow merge of the top-level fields in `partial`.
    async fn update(&self, reference: &DocRef, partial: Value) -> Result<(), StoreError>;
    async fn delete(&self, reference: &DocRef) -> Result<(), StoreError>;
    fn subscribe(&self, query: Query) -> Subscription;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub display_name: String,
    pub role: UserRole,
    pub team: Option<String>,
}

#[allow(async_fn_in_trait)]
pub trait AuthProvider {
    fn current_user(&self) -> Option<User>;
    fn on_auth_state_changed(&self) -> watch::Receiver<Option<User>>;
    async fn sign_out(&self) -> Result<(), StoreError>;
}
