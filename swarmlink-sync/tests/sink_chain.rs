//! End-to-end sink behavior over the public API: resolve a recipient from a
//! collaboration chain on disk, format the notification, and upsert the same
//! record into an in-memory remote collection.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Map, Value};
use tempfile::TempDir;

use swarmlink_core::{store, Category, NotifyConfig, Record};
use swarmlink_sync::{
    format_notification, resolve, ChatAddress, Messenger, NotifySink, RemoteRecord, RemoteTable,
    RetryPolicy, SyncError, UpsertSink,
};

#[derive(Default)]
struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<RemoteRecord>>>,
    next: Mutex<u64>,
}

impl RemoteTable for MemoryStore {
    fn list_all(&self, table: &str) -> Result<Vec<RemoteRecord>, SyncError> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default())
    }

    fn create(&self, table: &str, fields: &Map<String, Value>) -> Result<String, SyncError> {
        let mut next = self.next.lock().unwrap();
        *next += 1;
        let handle = format!("rec{next:04}");
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_owned())
            .or_default()
            .push(RemoteRecord {
                handle: handle.clone(),
                fields: fields.clone(),
            });
        Ok(handle)
    }

    fn update(
        &self,
        table: &str,
        handle: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), SyncError> {
        let mut tables = self.tables.lock().unwrap();
        let records = tables.entry(table.to_owned()).or_default();
        let record = records
            .iter_mut()
            .find(|r| r.handle == handle)
            .ok_or(SyncError::Api {
                status: 404,
                context: format!("update {table}"),
                body: handle.to_owned(),
            })?;
        record.fields = fields.clone();
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(ChatAddress, String)>>,
}

impl Messenger for RecordingMessenger {
    fn send(&self, address: &ChatAddress, text: &str) -> Result<(), SyncError> {
        self.sent
            .lock()
            .unwrap()
            .push((address.clone(), text.to_owned()));
        Ok(())
    }
}

fn notify_config() -> NotifyConfig {
    NotifyConfig {
        api_url: "https://api.telegram.org".into(),
        default_bot_token: "shared".into(),
        main_chat_id: "main-chat".into(),
        category_tokens: HashMap::new(),
    }
}

fn fast_policy() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 2,
        base: Duration::from_millis(1),
        cap: Duration::from_millis(2),
    }
}

fn write_record(root: &Path, category: Category, name: &str, value: &Value) {
    let dir = store::category_dir_at(root, category);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join(format!("{name}.json")),
        serde_json::to_string(value).unwrap(),
    )
    .unwrap();
}

#[test]
fn message_resolves_through_collaboration_and_lands_in_both_sinks() {
    let tmp = TempDir::new().unwrap();
    write_record(
        tmp.path(),
        Category::Collaboration,
        "c1",
        &json!({"collaborationId": "c1", "clientSwarmId": "B", "providerSwarmId": "A"}),
    );
    write_record(
        tmp.path(),
        Category::Swarm,
        "B",
        &json!({"swarmId": "B", "telegramChatId": "chatB"}),
    );

    let record = Record::from_value(
        Category::Message,
        json!({
            "messageId": "m1",
            "senderId": "A",
            "collaborationId": "c1",
            "content": "delivery ready",
        }),
    )
    .unwrap();

    let address = resolve(tmp.path(), &notify_config(), &record);
    assert_eq!(address.chat_id, "chatB");

    let text = format_notification(&record);
    assert!(text.contains("delivery ready"));
    assert!(text.contains("A"), "sender appears in the message");

    let remote = Arc::new(MemoryStore::default());
    let upsert = UpsertSink::new(remote.clone(), fast_policy());
    assert!(upsert.push(&record, false).is_success());
    assert_eq!(remote.list_all("Messages").unwrap().len(), 1);

    let messenger = Arc::new(RecordingMessenger::default());
    let notify = NotifySink::new(messenger.clone(), fast_policy());
    assert!(notify.send(&address, &text).is_success());

    let sent = messenger.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0.chat_id, "chatB");
    assert_eq!(sent[0].0.bot_token, "shared");
}

#[test]
fn missing_chain_links_fall_back_to_the_main_chat() {
    let tmp = TempDir::new().unwrap();

    // Collaboration exists but its client swarm has no chat id.
    write_record(
        tmp.path(),
        Category::Collaboration,
        "c1",
        &json!({"collaborationId": "c1", "clientSwarmId": "B", "providerSwarmId": "A"}),
    );
    write_record(tmp.path(), Category::Swarm, "B", &json!({"swarmId": "B"}));

    let record = Record::from_value(
        Category::Message,
        json!({"messageId": "m1", "senderId": "A", "collaborationId": "c1", "content": "hi"}),
    )
    .unwrap();

    let address = resolve(tmp.path(), &notify_config(), &record);
    assert_eq!(address.chat_id, "main-chat");
}
