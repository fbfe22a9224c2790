//! In-memory backend for tests.
//!
//! `MockGateway` keeps one JSON table per entity kind, runs the standard
//! server procedures against it, records every call and can inject latency
//! and failures. Attach a `MockChangeFeed` to have every write echoed back
//! as a realtime change event.

use crate::change::{ChangeEvent, ChangeFeed, ChangeOperation, ChangeStream, FeedFilter};
use crate::gateway::{MutationGateway, UploadedFile};
use crate::procedures;
use ::async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tms_core::{EntityKind, GatewayError, GatewayResult, Reconcilable, Timestamp};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn timestamp_value(ts: Timestamp) -> Value {
    Value::String(ts.to_rfc3339())
}

// ============================================================================
// CALL LOG
// ============================================================================

/// One call made against the mock, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    UpdateFields { entity: EntityKind, id: String, fields: Value },
    Insert { entity: EntityKind, fields: Value },
    Procedure { name: String, args: Value },
    Upload { bucket: String, path: String },
    Fetch { entity: EntityKind, id: String },
    Delete { entity: EntityKind, id: String },
}

impl GatewayCall {
    /// Everything except reads.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, GatewayCall::Fetch { .. })
    }
}

// ============================================================================
// MOCK GATEWAY
// ============================================================================

#[derive(Default)]
struct MockState {
    tables: HashMap<EntityKind, BTreeMap<String, Value>>,
    files: HashMap<String, Vec<u8>>,
    calls: Vec<GatewayCall>,
    failures: VecDeque<GatewayError>,
    latency: Option<Duration>,
    last_timestamp: Option<Timestamp>,
}

impl MockState {
    /// Strictly increasing server clock.
    fn next_timestamp(&mut self) -> Timestamp {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + ChronoDuration::milliseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn row(&self, entity: EntityKind, id: &str) -> GatewayResult<&Map<String, Value>> {
        self.tables
            .get(&entity)
            .and_then(|table| table.get(id))
            .and_then(Value::as_object)
            .ok_or_else(|| GatewayError::NotFound {
                entity,
                id: id.to_string(),
            })
    }

    /// Apply `f` to one row and stamp `updated_at`.
    fn mutate<F>(&mut self, entity: EntityKind, id: &str, f: F) -> GatewayResult<Value>
    where
        F: FnOnce(&mut Map<String, Value>) -> GatewayResult<()>,
    {
        let ts = self.next_timestamp();
        let row = self
            .tables
            .entry(entity)
            .or_default()
            .get_mut(id)
            .ok_or_else(|| GatewayError::NotFound {
                entity,
                id: id.to_string(),
            })?;
        let obj = row.as_object_mut().ok_or_else(|| GatewayError::InvalidResponse {
            reason: format!("row {} in {} is not an object", id, entity),
        })?;
        f(obj)?;
        obj.insert("updated_at".to_string(), timestamp_value(ts));
        Ok(row.clone())
    }

    fn insert(&mut self, entity: EntityKind, fields: Value) -> GatewayResult<Value> {
        let Value::Object(mut obj) = fields else {
            return Err(GatewayError::Rejected {
                reason: "insert payload must be an object".to_string(),
            });
        };
        let ts = self.next_timestamp();
        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::now_v7().to_string());
        let table = self.tables.entry(entity).or_default();
        if table.contains_key(&id) {
            return Err(GatewayError::Rejected {
                reason: format!("duplicate key {} in {}", id, entity),
            });
        }
        obj.insert("id".to_string(), Value::String(id.clone()));
        obj.entry("created_at").or_insert_with(|| timestamp_value(ts));
        if entity == EntityKind::Message {
            obj.insert("sent_at".to_string(), timestamp_value(ts));
        } else {
            obj.insert("updated_at".to_string(), timestamp_value(ts));
        }
        let row = Value::Object(obj);
        table.insert(id, row.clone());
        Ok(row)
    }

    fn run_procedure(&mut self, name: &str, args: &Value) -> GatewayResult<(EntityKind, Value)> {
        let arg = |key: &str| -> GatewayResult<String> {
            args.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| GatewayError::Rejected {
                    reason: format!("{} requires argument '{}'", name, key),
                })
        };

        match name {
            procedures::APPROVE_DILIGENCE_REQUEST | procedures::REJECT_DILIGENCE_REQUEST => {
                let entity = EntityKind::Application;
                let id = arg("application_id")?;
                let next = if name == procedures::APPROVE_DILIGENCE_REQUEST {
                    "approved"
                } else {
                    "none"
                };
                let row = self.mutate(entity, &id, |row| {
                    expect_column(entity, &id, row, "status", &["pending"])?;
                    expect_column(entity, &id, row, "diligence_status", &["requested"])?;
                    row.insert("diligence_status".to_string(), json!(next));
                    Ok(())
                })?;
                Ok((entity, row))
            }
            procedures::ACCEPT_INVESTMENT_OFFER | procedures::ACCEPT_CO_INVESTMENT_OFFER => {
                let entity = if name == procedures::ACCEPT_INVESTMENT_OFFER {
                    EntityKind::InvestmentOffer
                } else {
                    EntityKind::CoInvestmentOffer
                };
                let id = arg("offer_id")?;
                let row = self.mutate(entity, &id, |row| {
                    expect_column(entity, &id, row, "stage", &["ready_for_review"])?;
                    if entity == EntityKind::CoInvestmentOffer {
                        for approver in ["investor_advisor", "lead_investor"] {
                            let status = row
                                .get("kind")
                                .and_then(|kind| kind.get("approvals"))
                                .and_then(|approvals| approvals.get(approver))
                                .and_then(Value::as_str)
                                .unwrap_or("pending");
                            if !matches!(status, "approved" | "not_required") {
                                return Err(GatewayError::Conflict {
                                    entity,
                                    id: id.clone(),
                                    reason: format!("{} approval is {}", approver, status),
                                });
                            }
                        }
                    }
                    row.insert("stage".to_string(), json!("accepted"));
                    row.insert("contact_details_revealed".to_string(), json!(true));
                    Ok(())
                })?;
                Ok((entity, row))
            }
            procedures::REJECT_INVESTMENT_OFFER | procedures::REJECT_CO_INVESTMENT_OFFER => {
                let entity = if name == procedures::REJECT_INVESTMENT_OFFER {
                    EntityKind::InvestmentOffer
                } else {
                    EntityKind::CoInvestmentOffer
                };
                let id = arg("offer_id")?;
                let row = self.mutate(entity, &id, |row| {
                    expect_column(
                        entity,
                        &id,
                        row,
                        "stage",
                        &["investor_advisor_review", "startup_advisor_review", "ready_for_review"],
                    )?;
                    row.insert("stage".to_string(), json!("rejected"));
                    Ok(())
                })?;
                Ok((entity, row))
            }
            procedures::ADVANCE_OFFER_STAGE => {
                let table = arg("table")?;
                let entity = EntityKind::from_table(&table).ok_or_else(|| GatewayError::Rejected {
                    reason: format!("unknown table {}", table),
                })?;
                let id = arg("offer_id")?;
                let row = self.mutate(entity, &id, |row| {
                    let stage = row.get("stage").and_then(Value::as_str).unwrap_or_default();
                    let next = match stage {
                        "investor_advisor_review" => "startup_advisor_review",
                        "startup_advisor_review" => "ready_for_review",
                        other => {
                            return Err(GatewayError::Conflict {
                                entity,
                                id: id.clone(),
                                reason: format!("stage is {}", other),
                            })
                        }
                    };
                    row.insert("stage".to_string(), json!(next));
                    Ok(())
                })?;
                Ok((entity, row))
            }
            procedures::APPROVE_CO_INVESTMENT | procedures::REJECT_CO_INVESTMENT => {
                let entity = EntityKind::CoInvestmentOffer;
                let id = arg("offer_id")?;
                let approver = arg("approver")?;
                let approve = name == procedures::APPROVE_CO_INVESTMENT;
                let row = self.mutate(entity, &id, |row| {
                    let pointer = format!("/kind/approvals/{}", approver);
                    let mut kind = row.get("kind").cloned().unwrap_or(Value::Null);
                    let slot = kind.pointer_mut(&pointer).ok_or_else(|| GatewayError::Rejected {
                        reason: format!("offer {} has no {} approval", id, approver),
                    })?;
                    if slot.as_str() != Some("pending") {
                        return Err(GatewayError::Conflict {
                            entity,
                            id: id.clone(),
                            reason: format!("{} approval is {}", approver, slot),
                        });
                    }
                    *slot = json!(if approve { "approved" } else { "rejected" });
                    row.insert("kind".to_string(), kind);
                    if !approve {
                        row.insert("stage".to_string(), json!("rejected"));
                    }
                    Ok(())
                })?;
                Ok((entity, row))
            }
            procedures::APPROVE_RECOGNITION_RECORD => {
                let entity = EntityKind::RecognitionRecord;
                let id = arg("record_id")?;
                let already = self
                    .row(entity, &id)?
                    .get("status")
                    .and_then(Value::as_str)
                    == Some("approved");
                if already {
                    let row = Value::Object(self.row(entity, &id)?.clone());
                    return Ok((entity, row));
                }
                let row = self.mutate(entity, &id, |row| {
                    row.insert("status".to_string(), json!("approved"));
                    Ok(())
                })?;
                Ok((entity, row))
            }
            other => Err(GatewayError::Rejected {
                reason: format!("unknown procedure {}", other),
            }),
        }
    }
}

fn expect_column(
    entity: EntityKind,
    id: &str,
    row: &Map<String, Value>,
    column: &str,
    allowed: &[&str],
) -> GatewayResult<()> {
    let actual = row.get(column).and_then(Value::as_str).unwrap_or("null");
    if allowed.contains(&actual) {
        return Ok(());
    }
    Err(GatewayError::Conflict {
        entity,
        id: id.to_string(),
        reason: format!("{} is {}, expected one of {:?}", column, actual, allowed),
    })
}

/// In-memory backend implementing [`MutationGateway`].
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
    feed: Option<MockChangeFeed>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo every write to `feed` as a change event.
    pub fn with_feed(feed: MockChangeFeed) -> Self {
        Self {
            state: Arc::default(),
            feed: Some(feed),
        }
    }

    /// Delay applied to every call after it is logged.
    pub fn set_latency(&self, latency: Duration) {
        lock(&self.state).latency = Some(latency);
    }

    /// Fail the next call with `err`. Queued failures are consumed in order.
    pub fn fail_next(&self, err: GatewayError) {
        lock(&self.state).failures.push_back(err);
    }

    /// Put a record straight into its table without logging a call.
    pub fn seed_record<R: Reconcilable>(&self, record: &R) -> GatewayResult<()> {
        let row = serde_json::to_value(record).map_err(|e| GatewayError::InvalidResponse {
            reason: e.to_string(),
        })?;
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::InvalidResponse {
                reason: "record has no id".to_string(),
            })?;
        lock(&self.state)
            .tables
            .entry(record.entity_kind())
            .or_default()
            .insert(id, row);
        Ok(())
    }

    /// Change a row behind the client's back, as another user would.
    pub fn modify_externally(&self, entity: EntityKind, id: &str, fields: Value) -> GatewayResult<Value> {
        let (row, ts) = {
            let mut state = lock(&self.state);
            let row = state.mutate(entity, id, |row| merge_fields(row, fields))?;
            (row, state.last_timestamp)
        };
        self.publish(entity, ChangeOperation::Update, row.clone(), ts);
        Ok(row)
    }

    pub fn row(&self, entity: EntityKind, id: &str) -> Option<Value> {
        lock(&self.state)
            .tables
            .get(&entity)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Decode a stored row.
    pub fn record<R: DeserializeOwned>(&self, entity: EntityKind, id: &str) -> Option<R> {
        self.row(entity, id)
            .and_then(|row| serde_json::from_value(row).ok())
    }

    pub fn row_count(&self, entity: EntityKind) -> usize {
        lock(&self.state).tables.get(&entity).map_or(0, BTreeMap::len)
    }

    pub fn file(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        lock(&self.state).files.get(&format!("{}/{}", bucket, path)).cloned()
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.state).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.state).calls.len()
    }

    pub fn mutation_count(&self) -> usize {
        lock(&self.state).calls.iter().filter(|c| c.is_mutation()).count()
    }

    pub fn procedure_calls(&self) -> Vec<String> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Procedure { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }

    /// Log the call, wait out the latency, then pop an injected failure if any.
    async fn begin(&self, call: GatewayCall) -> GatewayResult<()> {
        tracing::trace!(call = ?call, "mock gateway call");
        let latency = {
            let mut state = lock(&self.state);
            state.calls.push(call);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match lock(&self.state).failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn publish(&self, entity: EntityKind, operation: ChangeOperation, payload: Value, ts: Option<Timestamp>) {
        if let Some(feed) = &self.feed {
            feed.publish(ChangeEvent {
                entity,
                operation,
                payload,
                commit_timestamp: ts,
            });
        }
    }
}

fn merge_fields(row: &mut Map<String, Value>, fields: Value) -> GatewayResult<()> {
    let Value::Object(patch) = fields else {
        return Err(GatewayError::Rejected {
            reason: "patch must be an object".to_string(),
        });
    };
    for (column, value) in patch {
        row.insert(column, value);
    }
    Ok(())
}

#[async_trait]
impl MutationGateway for MockGateway {
    async fn update_fields(&self, entity: EntityKind, id: &str, fields: Value) -> GatewayResult<Value> {
        self.begin(GatewayCall::UpdateFields {
            entity,
            id: id.to_string(),
            fields: fields.clone(),
        })
        .await?;
        let (row, ts) = {
            let mut state = lock(&self.state);
            let row = state.mutate(entity, id, |row| merge_fields(row, fields))?;
            (row, state.last_timestamp)
        };
        self.publish(entity, ChangeOperation::Update, row.clone(), ts);
        Ok(row)
    }

    async fn insert_record(&self, entity: EntityKind, fields: Value) -> GatewayResult<Value> {
        self.begin(GatewayCall::Insert {
            entity,
            fields: fields.clone(),
        })
        .await?;
        let (row, ts) = {
            let mut state = lock(&self.state);
            let row = state.insert(entity, fields)?;
            (row, state.last_timestamp)
        };
        self.publish(entity, ChangeOperation::Insert, row.clone(), ts);
        Ok(row)
    }

    async fn call_procedure(&self, name: &str, args: Value) -> GatewayResult<Value> {
        self.begin(GatewayCall::Procedure {
            name: name.to_string(),
            args: args.clone(),
        })
        .await?;
        let (entity, row, ts) = {
            let mut state = lock(&self.state);
            let (entity, row) = state.run_procedure(name, &args)?;
            (entity, row, state.last_timestamp)
        };
        self.publish(entity, ChangeOperation::Update, row.clone(), ts);
        Ok(row)
    }

    async fn upload_file(&self, bucket: &str, path: &str, blob: Vec<u8>) -> GatewayResult<UploadedFile> {
        self.begin(GatewayCall::Upload {
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
        .await?;
        if blob.is_empty() {
            return Err(GatewayError::Storage {
                bucket: bucket.to_string(),
                reason: "empty file".to_string(),
            });
        }
        lock(&self.state).files.insert(format!("{}/{}", bucket, path), blob);
        Ok(UploadedFile {
            bucket: bucket.to_string(),
            path: path.to_string(),
            url: format!("mock://storage/{}/{}", bucket, path),
        })
    }

    async fn fetch_record(&self, entity: EntityKind, id: &str) -> GatewayResult<Option<Value>> {
        self.begin(GatewayCall::Fetch {
            entity,
            id: id.to_string(),
        })
        .await?;
        Ok(self.row(entity, id))
    }

    async fn delete_record(&self, entity: EntityKind, id: &str) -> GatewayResult<()> {
        self.begin(GatewayCall::Delete {
            entity,
            id: id.to_string(),
        })
        .await?;
        let (removed, ts) = {
            let mut state = lock(&self.state);
            let removed = state.tables.get_mut(&entity).and_then(|table| table.remove(id));
            let ts = state.next_timestamp();
            (removed, ts)
        };
        let removed = removed.ok_or_else(|| GatewayError::NotFound {
            entity,
            id: id.to_string(),
        })?;
        self.publish(entity, ChangeOperation::Delete, removed, Some(ts));
        Ok(())
    }
}

// ============================================================================
// MOCK CHANGE FEED
// ============================================================================

struct Subscriber {
    entity: EntityKind,
    filter: Option<FeedFilter>,
    tx: mpsc::UnboundedSender<GatewayResult<ChangeEvent>>,
}

impl Subscriber {
    fn wants(&self, event: &ChangeEvent) -> bool {
        self.entity == event.entity
            && self
                .filter
                .as_ref()
                .map_or(true, |filter| filter.matches(&event.payload))
    }
}

#[derive(Default)]
struct FeedState {
    subscribers: Vec<Subscriber>,
    refuse_next: usize,
    subscribe_attempts: usize,
}

/// In-memory change feed. Streams end when [`MockChangeFeed::disconnect_all`] is called.
#[derive(Clone, Default)]
pub struct MockChangeFeed {
    state: Arc<Mutex<FeedState>>,
}

impl MockChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every matching subscriber. Closed subscribers are dropped.
    pub fn publish(&self, event: ChangeEvent) {
        lock(&self.state).subscribers.retain(|sub| {
            if !sub.wants(&event) {
                return !sub.tx.is_closed();
            }
            sub.tx.send(Ok(event.clone())).is_ok()
        });
    }

    /// Push an error into every stream for `entity`.
    pub fn push_error(&self, entity: EntityKind, err: GatewayError) {
        lock(&self.state)
            .subscribers
            .retain(|sub| sub.entity != entity || sub.tx.send(Err(err.clone())).is_ok());
    }

    /// Close every open stream, as a dropped socket would.
    pub fn disconnect_all(&self) {
        lock(&self.state).subscribers.clear();
    }

    /// Refuse the next `n` subscribe calls.
    pub fn refuse_next_subscriptions(&self, n: usize) {
        lock(&self.state).refuse_next = n;
    }

    pub fn active_subscriptions(&self) -> usize {
        lock(&self.state)
            .subscribers
            .iter()
            .filter(|sub| !sub.tx.is_closed())
            .count()
    }

    pub fn subscribe_attempts(&self) -> usize {
        lock(&self.state).subscribe_attempts
    }
}

#[async_trait]
impl ChangeFeed for MockChangeFeed {
    async fn subscribe(&self, entity: EntityKind, filter: Option<FeedFilter>) -> GatewayResult<ChangeStream> {
        let mut state = lock(&self.state);
        state.subscribe_attempts += 1;
        if state.refuse_next > 0 {
            state.refuse_next -= 1;
            return Err(GatewayError::Subscription {
                entity,
                reason: "channel refused".to_string(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        state.subscribers.push(Subscriber { entity, filter, tx });
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

// ============================================================================
// TESTS
// ============================================================================
