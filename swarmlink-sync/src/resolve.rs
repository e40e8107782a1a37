//! Recipient resolution: which chat a confirmed change is announced to.
//!
//! Every category has a resolution chain that ends at the configured main
//! chat, so resolution is total — a notification is never dropped for lack
//! of an address. The chain order for messages (collaboration → client
//! swarm before `receiverId`) is the intended contract; each broken link is
//! logged so the inferred business rule can be audited.

use std::path::Path;

use serde_json::Value;

use swarmlink_core::{store, Category, NotifyConfig, Record, SwarmId};

use crate::notify::ChatAddress;

/// Resolve the destination address for `record`.
pub fn resolve(root: &Path, notify: &NotifyConfig, record: &Record) -> ChatAddress {
    let chat_id = resolve_chat_id(root, record).unwrap_or_else(|| {
        tracing::debug!(
            category = %record.category,
            record = %record.id,
            "resolution chain exhausted, using main chat",
        );
        notify.main_chat_id.clone()
    });

    ChatAddress {
        bot_token: notify.bot_token_for(record.category).to_owned(),
        chat_id,
    }
}

fn resolve_chat_id(root: &Path, record: &Record) -> Option<String> {
    match record.category {
        Category::Message => via_collaboration(root, record)
            .or_else(|| via_swarm_field(root, record, "receiverId")),
        Category::News | Category::Thought => via_swarm_field(root, record, "swarmId"),
        Category::Mission => via_swarm_field(root, record, "leadSwarmId"),
        Category::Specification | Category::Deliverable => via_collaboration(root, record),
        // Silent categories still resolve (total contract), straight to main.
        Category::Collaboration | Category::Swarm => None,
    }
}

/// `collaborationId` → collaboration record → client swarm → chat id.
fn via_collaboration(root: &Path, record: &Record) -> Option<String> {
    let collaboration_id = record
        .fields
        .get("collaborationId")
        .and_then(Value::as_str)?;

    let collaboration = match store::load_collaboration_at(root, collaboration_id) {
        Ok(Some(collaboration)) => collaboration,
        Ok(None) => {
            tracing::debug!(
                record = %record.id,
                collaboration = collaboration_id,
                "collaboration record not found, falling back",
            );
            return None;
        }
        Err(err) => {
            tracing::warn!(
                record = %record.id,
                collaboration = collaboration_id,
                error = %err,
                "collaboration lookup failed, falling back",
            );
            return None;
        }
    };

    swarm_chat(root, &collaboration.client_swarm_id, &record.id.0)
}

/// `<field>` on the record → swarm record → chat id.
fn via_swarm_field(root: &Path, record: &Record, swarm_field: &str) -> Option<String> {
    let swarm_id = record.fields.get(swarm_field).and_then(Value::as_str)?;
    swarm_chat(root, &SwarmId::from(swarm_id), &record.id.0)
}

fn swarm_chat(root: &Path, swarm_id: &SwarmId, record_id: &str) -> Option<String> {
    match store::load_swarm_at(root, swarm_id) {
        Ok(Some(swarm)) => {
            if swarm.telegram_chat_id.is_none() {
                tracing::debug!(
                    record = record_id,
                    swarm = %swarm_id,
                    "swarm has no chat configured, falling back",
                );
            }
            swarm.telegram_chat_id
        }
        Ok(None) => {
            tracing::debug!(record = record_id, swarm = %swarm_id, "swarm record not found");
            None
        }
        Err(err) => {
            tracing::warn!(
                record = record_id,
                swarm = %swarm_id,
                error = %err,
                "swarm lookup failed, falling back",
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tempfile::TempDir;

    use swarmlink_core::store::category_dir_at;

    fn notify_config() -> NotifyConfig {
        NotifyConfig {
            api_url: "https://api.telegram.org".into(),
            default_bot_token: "shared".into(),
            main_chat_id: "main-chat".into(),
            category_tokens: [(Category::News, "news-token".to_owned())]
                .into_iter()
                .collect(),
        }
    }

    fn write_record(root: &Path, category: Category, name: &str, value: &Value) {
        let dir = category_dir_at(root, category);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{name}.json")),
            serde_json::to_string(value).unwrap(),
        )
        .unwrap();
    }

    fn message(value: Value) -> Record {
        Record::from_value(Category::Message, value).unwrap()
    }

    #[test]
    fn message_resolves_through_collaboration_to_client_chat() {
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

        let record = message(json!({
            "messageId": "m1", "senderId": "A", "collaborationId": "c1", "content": "hi"
        }));
        let address = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(address.chat_id, "chatB");
        assert_eq!(address.bot_token, "shared");
    }

    #[test]
    fn message_falls_back_to_main_when_chain_is_broken() {
        let tmp = TempDir::new().unwrap();
        write_record(
            tmp.path(),
            Category::Collaboration,
            "c1",
            &json!({"collaborationId": "c1", "clientSwarmId": "B", "providerSwarmId": "A"}),
        );
        // Swarm B exists but has no chat; message has no receiverId.
        write_record(tmp.path(), Category::Swarm, "B", &json!({"swarmId": "B"}));

        let record = message(json!({
            "messageId": "m1", "senderId": "A", "collaborationId": "c1", "content": "hi"
        }));
        let address = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(address.chat_id, "main-chat");
    }

    #[test]
    fn message_falls_back_to_receiver_before_main() {
        let tmp = TempDir::new().unwrap();
        // No collaboration record at all; receiver has a chat.
        write_record(
            tmp.path(),
            Category::Swarm,
            "R",
            &json!({"swarmId": "R", "telegramChatId": "chatR"}),
        );

        let record = message(json!({
            "messageId": "m1", "senderId": "A", "collaborationId": "missing",
            "receiverId": "R", "content": "hi"
        }));
        let address = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(address.chat_id, "chatR");
    }

    #[test]
    fn collaboration_chain_wins_over_receiver() {
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
        write_record(
            tmp.path(),
            Category::Swarm,
            "R",
            &json!({"swarmId": "R", "telegramChatId": "chatR"}),
        );

        let record = message(json!({
            "messageId": "m1", "senderId": "A", "collaborationId": "c1",
            "receiverId": "R", "content": "hi"
        }));
        let address = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(address.chat_id, "chatB", "collaboration chain takes priority");
    }

    #[test]
    fn news_resolves_origin_swarm_with_category_token() {
        let tmp = TempDir::new().unwrap();
        write_record(
            tmp.path(),
            Category::Swarm,
            "kin",
            &json!({"swarmId": "kin", "telegramChatId": "chat-kin"}),
        );

        let record = Record::from_value(
            Category::News,
            json!({"newsId": "n1", "swarmId": "kin", "content": "launch"}),
        )
        .unwrap();
        let address = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(address.chat_id, "chat-kin");
        assert_eq!(address.bot_token, "news-token");
    }

    #[test]
    fn mission_resolves_lead_swarm() {
        let tmp = TempDir::new().unwrap();
        write_record(
            tmp.path(),
            Category::Swarm,
            "lead",
            &json!({"swarmId": "lead", "telegramChatId": "chat-lead"}),
        );

        let record = Record::from_value(
            Category::Mission,
            json!({"missionId": "mi1", "leadSwarmId": "lead", "title": "t"}),
        )
        .unwrap();
        let address = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(address.chat_id, "chat-lead");
    }

    #[test]
    fn deliverable_resolves_through_collaboration() {
        let tmp = TempDir::new().unwrap();
        write_record(
            tmp.path(),
            Category::Collaboration,
            "c2",
            &json!({"collaborationId": "c2", "clientSwarmId": "B", "providerSwarmId": "A"}),
        );
        write_record(
            tmp.path(),
            Category::Swarm,
            "B",
            &json!({"swarmId": "B", "telegramChatId": "chatB"}),
        );

        let record = Record::from_value(
            Category::Deliverable,
            json!({"deliverableId": "d1", "collaborationId": "c2", "title": "final"}),
        )
        .unwrap();
        let address = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(address.chat_id, "chatB");
    }

    #[test]
    fn resolution_is_total_on_an_empty_tree() {
        let tmp = TempDir::new().unwrap();
        for category in Category::ALL {
            let record =
                Record::from_value(category, json!({ category.id_field(): "r1" })).unwrap();
            let address = resolve(tmp.path(), &notify_config(), &record);
            assert_eq!(address.chat_id, "main-chat", "{category}");
        }
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let tmp = TempDir::new().unwrap();
        let record = message(json!({"messageId": "m1", "senderId": "A", "content": "hi"}));
        let first = resolve(tmp.path(), &notify_config(), &record);
        let second = resolve(tmp.path(), &notify_config(), &record);
        assert_eq!(first, second);
    }
}
