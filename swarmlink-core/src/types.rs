//! Domain types for the swarmlink record tree.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Record payloads are serializable/deserializable via serde + serde_json.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed identifier for a swarm (participant) record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SwarmId(pub String);

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SwarmId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SwarmId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed identifier for any record, regardless of category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Category table
// ---------------------------------------------------------------------------

/// The fixed set of record categories, one per watched subdirectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Message,
    News,
    Thought,
    Mission,
    Specification,
    Deliverable,
    Collaboration,
    Swarm,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Message,
        Category::News,
        Category::Thought,
        Category::Mission,
        Category::Specification,
        Category::Deliverable,
        Category::Collaboration,
        Category::Swarm,
    ];

    /// Directory name under `data/` holding this category's record files.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Message => "messages",
            Category::News => "news",
            Category::Thought => "thoughts",
            Category::Mission => "missions",
            Category::Specification => "specifications",
            Category::Deliverable => "deliverables",
            Category::Collaboration => "collaborations",
            Category::Swarm => "swarms",
        }
    }

    /// Table name in the remote store.
    pub fn table_name(self) -> &'static str {
        match self {
            Category::Message => "Messages",
            Category::News => "News",
            Category::Thought => "Thoughts",
            Category::Mission => "Missions",
            Category::Specification => "Specifications",
            Category::Deliverable => "Deliverables",
            Category::Collaboration => "Collaborations",
            Category::Swarm => "Swarms",
        }
    }

    /// The single identifier field every record of this category must carry.
    pub fn id_field(self) -> &'static str {
        match self {
            Category::Message => "messageId",
            Category::News => "newsId",
            Category::Thought => "thoughtId",
            Category::Mission => "missionId",
            Category::Specification => "specificationId",
            Category::Deliverable => "deliverableId",
            Category::Collaboration => "collaborationId",
            Category::Swarm => "swarmId",
        }
    }

    /// Whether a confirmed change in this category triggers a notification.
    /// Collaboration and swarm records are pushed to the remote store and
    /// published, but never announced.
    pub fn notifies(self) -> bool {
        !matches!(self, Category::Collaboration | Category::Swarm)
    }

    /// How long the stability detector may wait for a file of this category
    /// to settle. Large free-form payloads get the extended window.
    pub fn stability_timeout(self) -> Duration {
        match self {
            Category::Thought | Category::Specification | Category::Deliverable => {
                Duration::from_secs(10)
            }
            _ => Duration::from_secs(5),
        }
    }

    /// Reverse lookup from a directory name, e.g. `"missions"` → `Mission`.
    pub fn from_dir_name(dir: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.dir_name() == dir)
    }

    /// Suffix for per-category environment overrides, e.g. `MESSAGES`.
    pub fn env_suffix(self) -> String {
        self.dir_name().to_ascii_uppercase()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Message => write!(f, "message"),
            Category::News => write!(f, "news"),
            Category::Thought => write!(f, "thought"),
            Category::Mission => write!(f, "mission"),
            Category::Specification => write!(f, "specification"),
            Category::Deliverable => write!(f, "deliverable"),
            Category::Collaboration => write!(f, "collaboration"),
            Category::Swarm => write!(f, "swarm"),
        }
    }
}

// ---------------------------------------------------------------------------
// Change events
// ---------------------------------------------------------------------------

/// What kind of filesystem mutation was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
}

/// One observed filesystem mutation. Produced by the watch layer, consumed
/// once by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            observed_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A parsed record: its category, the identifier extracted from the
/// category's id field, and the full flat field map as stored on disk and
/// pushed to the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub category: Category,
    pub id: RecordId,
    pub fields: Map<String, Value>,
}

impl Record {
    /// Build a record from a parsed JSON value, enforcing the identifier
    /// invariant: the category's id field must be present and a non-empty
    /// string. Anything else is malformed input.
    pub fn from_value(category: Category, value: Value) -> Result<Record, CoreError> {
        let Value::Object(fields) = value else {
            return Err(CoreError::MissingIdentifier {
                category,
                field: category.id_field(),
            });
        };
        let id = fields
            .get(category.id_field())
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or(CoreError::MissingIdentifier {
                category,
                field: category.id_field(),
            })?
            .to_owned();
        Ok(Record {
            category,
            id: RecordId(id),
            fields,
        })
    }

    /// Deserialize a typed view of this record's fields.
    pub fn view<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
    }
}

/// A message between two swarms, optionally inside a collaboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: RecordId,
    pub sender_id: SwarmId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<SwarmId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaboration_id: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A news item published by a swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct News {
    pub news_id: RecordId,
    pub swarm_id: SwarmId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A free-form thought published by a swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thought {
    pub thought_id: RecordId,
    pub swarm_id: SwarmId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A mission led by a swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mission {
    pub mission_id: RecordId,
    pub lead_swarm_id: SwarmId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A specification produced within a collaboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Specification {
    pub specification_id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaboration_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A deliverable produced within a collaboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deliverable {
    pub deliverable_id: RecordId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collaboration_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A client/provider collaboration between two swarms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaboration {
    pub collaboration_id: RecordId,
    pub client_swarm_id: SwarmId,
    pub provider_swarm_id: SwarmId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_share: Option<f64>,
}

/// A participant swarm: notification address plus revenue attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Swarm {
    pub swarm_id: SwarmId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_chat_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue_share: Option<f64>,
    #[serde(default)]
    pub weekly_revenue: f64,
    #[serde(default)]
    pub total_revenue: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hot_wallet_public_key: Option<String>,
}

// ---------------------------------------------------------------------------
// Dispatch bookkeeping
// ---------------------------------------------------------------------------

/// Identity used to suppress duplicate dispatch of the same logical change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// Preferred form once a record identifier has been parsed.
    ById { category: Category, id: RecordId },
    /// Fallback form for content that never yields an identifier.
    ByContent { path: PathBuf, digest: String },
}

/// Per (event, sink) result. Logged, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Success,
    RetryableFailure(String),
    FatalFailure(String),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn newtype_display() {
        assert_eq!(SwarmId::from("kin").to_string(), "kin");
        assert_eq!(RecordId::from("m-01").to_string(), "m-01");
    }

    #[test]
    fn category_table_is_consistent() {
        for category in Category::ALL {
            assert_eq!(Category::from_dir_name(category.dir_name()), Some(category));
            assert!(category.id_field().ends_with("Id"));
        }
        assert_eq!(Category::from_dir_name("wallets"), None);
    }

    #[test]
    fn only_collaborations_and_swarms_stay_silent() {
        let silent: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|c| !c.notifies())
            .collect();
        assert_eq!(silent, vec![Category::Collaboration, Category::Swarm]);
    }

    #[test]
    fn large_payload_categories_get_extended_timeout() {
        assert_eq!(
            Category::Specification.stability_timeout(),
            Duration::from_secs(10)
        );
        assert_eq!(Category::Message.stability_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn record_from_value_extracts_identifier() {
        let record = Record::from_value(
            Category::Message,
            json!({"messageId": "m1", "senderId": "A", "content": "hi"}),
        )
        .expect("valid record");
        assert_eq!(record.id, RecordId::from("m1"));
        assert_eq!(record.fields["senderId"], json!("A"));
    }

    #[test]
    fn record_without_identifier_is_rejected() {
        let err = Record::from_value(
            Category::Message,
            json!({"senderId": "A", "content": "hi"}),
        )
        .expect_err("must reject");
        assert!(err.to_string().contains("messageId"));

        let err = Record::from_value(Category::Mission, json!({"missionId": ""}))
            .expect_err("empty id must reject");
        assert!(err.to_string().contains("missionId"));
    }

    #[test]
    fn typed_view_roundtrip() {
        let record = Record::from_value(
            Category::Collaboration,
            json!({
                "collaborationId": "c1",
                "clientSwarmId": "B",
                "providerSwarmId": "A",
                "status": "active",
                "price": 1000.0
            }),
        )
        .expect("valid record");
        let collab: Collaboration = record.view().expect("typed view");
        assert_eq!(collab.client_swarm_id, SwarmId::from("B"));
        assert_eq!(collab.price, Some(1000.0));
    }

    #[test]
    fn swarm_view_defaults_revenue_fields() {
        let record = Record::from_value(
            Category::Swarm,
            json!({"swarmId": "B", "telegramChatId": "chatB"}),
        )
        .expect("valid record");
        let swarm: Swarm = record.view().expect("typed view");
        assert_eq!(swarm.telegram_chat_id.as_deref(), Some("chatB"));
        assert_eq!(swarm.weekly_revenue, 0.0);
    }

    #[test]
    fn dedup_keys_compare_by_identity() {
        let a = DedupKey::ById {
            category: Category::Message,
            id: RecordId::from("m1"),
        };
        let b = DedupKey::ById {
            category: Category::Message,
            id: RecordId::from("m1"),
        };
        assert_eq!(a, b);
        let c = DedupKey::ById {
            category: Category::News,
            id: RecordId::from("m1"),
        };
        assert_ne!(a, c);
    }
}
