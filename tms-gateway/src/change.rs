//! Realtime change feed boundary.

use ::async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tms_core::{EntityKind, GatewayResult, Timestamp};

/// Row-level operation reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOperation {
    Insert,
    Update,
    Delete,
}

/// One change pushed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub operation: ChangeOperation,
    /// New row for insert/update, old row (at least its id) for delete.
    pub payload: Value,
    pub commit_timestamp: Option<Timestamp>,
}

impl ChangeEvent {
    pub fn record_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }
}

/// Equality filter on one column, e.g. `startup_id = 's-1'`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedFilter {
    pub column: String,
    pub value: String,
}

impl FeedFilter {
    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Value) -> bool {
        match row.get(&self.column) {
            Some(Value::String(s)) => s == &self.value,
            Some(Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

/// Stream of changes for one subscription. Ends when the channel closes.
pub type ChangeStream = BoxStream<'static, GatewayResult<ChangeEvent>>;

#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, entity: EntityKind, filter: Option<FeedFilter>) -> GatewayResult<ChangeStream>;
}

#[async_trait]
impl<F: ChangeFeed + ?Sized> ChangeFeed for std::sync::Arc<F> {
    async fn subscribe(&self, entity: EntityKind, filter: Option<FeedFilter>) -> GatewayResult<ChangeStream> {
        (**self).subscribe(entity, filter).await
    }
}
