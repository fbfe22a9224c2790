//! Remote mutation boundary.
//!
//! Every state change the dashboard makes goes through this trait. Rows are
//! exchanged as raw JSON; decoding into typed records is the caller's job.

use ::async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tms_core::{EntityKind, GatewayResult};

/// Bucket holding application agreements and contracts.
pub const DOCUMENT_BUCKET: &str = "startup-documents";

/// Result of a file upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub bucket: String,
    pub path: String,
    /// Public URL stored on the owning record.
    pub url: String,
}

/// Async gateway to the hosted backend.
#[async_trait]
pub trait MutationGateway: Send + Sync {
    /// Patch columns of one row and return the updated row.
    async fn update_fields(&self, entity: EntityKind, id: &str, fields: Value) -> GatewayResult<Value>;

    /// Set the `status` column, plus any extra columns, and return the updated row.
    async fn update_status(
        &self,
        entity: EntityKind,
        id: &str,
        status: &str,
        extra: Option<Value>,
    ) -> GatewayResult<Value> {
        let mut fields = match extra {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        fields.insert("status".to_string(), Value::String(status.to_string()));
        self.update_fields(entity, id, Value::Object(fields)).await
    }

    /// Insert a row and return it as stored (server id and timestamps filled in).
    async fn insert_record(&self, entity: EntityKind, fields: Value) -> GatewayResult<Value>;

    /// Invoke a named server procedure. See [`crate::procedures`].
    async fn call_procedure(&self, name: &str, args: Value) -> GatewayResult<Value>;

    async fn upload_file(&self, bucket: &str, path: &str, blob: Vec<u8>) -> GatewayResult<UploadedFile>;

    /// Read the authoritative copy of one row.
    async fn fetch_record(&self, entity: EntityKind, id: &str) -> GatewayResult<Option<Value>>;

    /// Hard-delete one row.
    async fn delete_record(&self, entity: EntityKind, id: &str) -> GatewayResult<()>;
}

#[async_trait]
impl<G: MutationGateway + ?Sized> MutationGateway for Arc<G> {
    async fn update_fields(&self, entity: EntityKind, id: &str, fields: Value) -> GatewayResult<Value> {
        (**self).update_fields(entity, id, fields).await
    }

    async fn update_status(
        &self,
        entity: EntityKind,
        id: &str,
        status: &str,
        extra: Option<Value>,
    ) -> GatewayResult<Value> {
        (**self).update_status(entity, id, status, extra).await
    }

    async fn insert_record(&self, entity: EntityKind, fields: Value) -> GatewayResult<Value> {
        (**self).insert_record(entity, fields).await
    }

    async fn call_procedure(&self, name: &str, args: Value) -> GatewayResult<Value> {
        (**self).call_procedure(name, args).await
    }

    async fn upload_file(&self, bucket: &str, path: &str, blob: Vec<u8>) -> GatewayResult<UploadedFile> {
        (**self).upload_file(bucket, path, blob).await
    }

    async fn fetch_record(&self, entity: EntityKind, id: &str) -> GatewayResult<Option<Value>> {
        (**self).fetch_record(entity, id).await
    }

    async fn delete_record(&self, entity: EntityKind, id: &str) -> GatewayResult<()> {
        (**self).delete_record(entity, id).await
    }
}
