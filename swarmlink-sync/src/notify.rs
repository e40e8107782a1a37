//! Notification transport and per-category message formatting.
//!
//! An address pairs a routing token (per-category bot credential, falling
//! back to the shared one) with a destination chat id. Formatting never
//! fails: fields that are missing render as placeholders rather than
//! aborting a send.

use std::sync::Arc;

use serde_json::{json, Value};

use swarmlink_core::{Category, DispatchOutcome, NotifyConfig, Record};

use crate::error::{http_err, SyncError};
use crate::retry::{outcome_from, RetryPolicy};

/// A fully-resolved notification destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAddress {
    pub bot_token: String,
    pub chat_id: String,
}

/// The one operation the core needs from the notification transport.
pub trait Messenger: Send + Sync {
    fn send(&self, address: &ChatAddress, text: &str) -> Result<(), SyncError>;
}

/// Telegram-style bot API over blocking HTTP.
pub struct TelegramMessenger {
    agent: ureq::Agent,
    api_url: String,
}

impl TelegramMessenger {
    pub fn new(config: &NotifyConfig) -> Self {
        Self {
            agent: ureq::Agent::new(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
        }
    }
}

impl Messenger for TelegramMessenger {
    fn send(&self, address: &ChatAddress, text: &str) -> Result<(), SyncError> {
        let url = format!("{}/bot{}/sendMessage", self.api_url, address.bot_token);
        self.agent
            .post(&url)
            .send_json(json!({ "chat_id": address.chat_id, "text": text }))
            .map_err(|e| http_err("sendMessage", e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

const EXCERPT_LIMIT: usize = 400;

fn field<'a>(record: &'a Record, name: &str) -> &'a str {
    record
        .fields
        .get(name)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_LIMIT {
        return text.to_owned();
    }
    let cut: String = text.chars().take(EXCERPT_LIMIT).collect();
    format!("{cut}…")
}

/// Build the category-specific notification text for a confirmed change.
pub fn format_notification(record: &Record) -> String {
    match record.category {
        Category::Message => format!(
            "📨 New message from {}\n\n{}",
            field(record, "senderId"),
            excerpt(field(record, "content")),
        ),
        Category::News => format!(
            "📰 News from {}\n\n{}",
            field(record, "swarmId"),
            excerpt(field(record, "content")),
        ),
        Category::Thought => format!(
            "💭 {} is thinking:\n\n{}",
            field(record, "swarmId"),
            excerpt(field(record, "content")),
        ),
        Category::Mission => format!(
            "🎯 Mission update: {} (lead: {})",
            field(record, "title"),
            field(record, "leadSwarmId"),
        ),
        Category::Specification => format!(
            "📋 Specification updated: {}",
            field(record, "title"),
        ),
        Category::Deliverable => format!(
            "📦 Deliverable ready: {}",
            field(record, "title"),
        ),
        Category::Collaboration => format!("🤝 Collaboration {} updated", record.id),
        Category::Swarm => format!("🐝 Swarm {} updated", record.id),
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// The notification sink: one formatted send to one resolved address,
/// with retry. Rate limiting happens upstream in the dispatcher.
pub struct NotifySink {
    messenger: Arc<dyn Messenger>,
    policy: RetryPolicy,
}

impl NotifySink {
    pub fn new(messenger: Arc<dyn Messenger>, policy: RetryPolicy) -> Self {
        Self { messenger, policy }
    }

    pub fn send(&self, address: &ChatAddress, text: &str) -> DispatchOutcome {
        let result = self
            .policy
            .run("notify", || self.messenger.send(address, text));
        outcome_from(result)
    }
}
