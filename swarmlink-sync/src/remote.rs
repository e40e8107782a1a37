//! Remote tabular store: keyed collections, one table per category.
//!
//! The upsert adapter follows a list-then-write pattern: fetch the full
//! remote collection, map identifier → record handle, then update or create.
//! This is idempotent by construction but not a transaction — a concurrent
//! external writer can race the listing. The observable symptom is an
//! identifier that was expected remotely but is absent right before a
//! create, which is logged as a warning.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use swarmlink_core::{DispatchOutcome, Record, StoreConfig};

use crate::error::{http_err, SyncError};
use crate::retry::{outcome_from, RetryPolicy};

/// One record as held by the remote store: its opaque handle plus fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub handle: String,
    pub fields: Map<String, Value>,
}

/// Interface to a keyed remote collection. The daemon and the bulk
/// `pull`/`push` commands share implementations of this trait; tests use an
/// in-memory one.
pub trait RemoteTable: Send + Sync {
    fn list_all(&self, table: &str) -> Result<Vec<RemoteRecord>, SyncError>;
    fn create(&self, table: &str, fields: &Map<String, Value>) -> Result<String, SyncError>;
    fn update(&self, table: &str, handle: &str, fields: &Map<String, Value>)
        -> Result<(), SyncError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ListResponse {
    records: Vec<RecordPayload>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordPayload {
    id: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Airtable-style REST client over blocking HTTP.
pub struct HttpStore {
    agent: ureq::Agent,
    api_url: String,
    api_key: String,
    base_id: String,
}

impl HttpStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            agent: ureq::Agent::new(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            base_id: config.base_id.clone(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.api_url, self.base_id, table)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.api_key)
    }
}

impl RemoteTable for HttpStore {
    fn list_all(&self, table: &str) -> Result<Vec<RemoteRecord>, SyncError> {
        let url = self.table_url(table);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self
                .agent
                .get(&url)
                .set("Authorization", &self.auth());
            if let Some(cursor) = &offset {
                request = request.query("offset", cursor);
            }

            let page: ListResponse = request
                .call()
                .map_err(|e| http_err(format!("list {table}"), e))?
                .into_json()?;

            records.extend(page.records.into_iter().map(|r| RemoteRecord {
                handle: r.id,
                fields: r.fields,
            }));

            match page.offset {
                Some(cursor) => offset = Some(cursor),
                None => break,
            }
        }

        Ok(records)
    }

    fn create(&self, table: &str, fields: &Map<String, Value>) -> Result<String, SyncError> {
        let created: RecordPayload = self
            .agent
            .post(&self.table_url(table))
            .set("Authorization", &self.auth())
            .send_json(json!({ "fields": fields }))
            .map_err(|e| http_err(format!("create {table}"), e))?
            .into_json()?;
        Ok(created.id)
    }

    fn update(
        &self,
        table: &str,
        handle: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SyncError> {
        let url = format!("{}/{}", self.table_url(table), handle);
        self.agent
            .request("PATCH", &url)
            .set("Authorization", &self.auth())
            .send_json(json!({ "fields": fields }))
            .map_err(|e| http_err(format!("update {table}"), e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Upsert adapter
// ---------------------------------------------------------------------------

/// What an upsert did to the remote collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted {
    Created { handle: String },
    Updated { handle: String },
}

/// The remote-store sink: keyed upsert with retry.
pub struct UpsertSink {
    store: Arc<dyn RemoteTable>,
    policy: RetryPolicy,
}

impl UpsertSink {
    pub fn new(store: Arc<dyn RemoteTable>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Push one record, retrying the whole list+write unit on transient
    /// failure. `expected_existing` is true for Modified events, where the
    /// record should already be present remotely.
    pub fn push(&self, record: &Record, expected_existing: bool) -> DispatchOutcome {
        let result = self
            .policy
            .run("remote-store", || self.upsert_once(record, expected_existing))
            .map(|action| {
                tracing::info!(
                    category = %record.category,
                    record = %record.id,
                    action = ?action,
                    "remote store upsert",
                );
            });
        outcome_from(result)
    }

    fn upsert_once(
        &self,
        record: &Record,
        expected_existing: bool,
    ) -> Result<Upserted, SyncError> {
        let table = record.category.table_name();
        let id_field = record.category.id_field();

        let existing = self.store.list_all(table)?;
        let handles: HashMap<&str, &str> = existing
            .iter()
            .filter_map(|r| {
                r.fields
                    .get(id_field)
                    .and_then(Value::as_str)
                    .map(|id| (id, r.handle.as_str()))
            })
            .collect();

        match handles.get(record.id.0.as_str()) {
            Some(handle) => {
                self.store.update(table, handle, &record.fields)?;
                Ok(Upserted::Updated {
                    handle: (*handle).to_owned(),
                })
            }
            None => {
                if expected_existing {
                    // Symptom of the accepted list-then-upsert race: a
                    // modified record vanished from the listed collection.
                    tracing::warn!(
                        category = %record.category,
                        record = %record.id,
                        "expected identifier absent from remote listing; creating",
                    );
                }
                let handle = self.store.create(table, &record.fields)?;
                Ok(Upserted::Created { handle })
            }
        }
    }
}
