//! Environment configuration.
//!
//! The deployment keeps credentials in a `.env` file next to the data tree,
//! so [`Config::from_env`] loads dotenv before reading variables:
//!
//! ```text
//! SWARMLINK_DATA_ROOT      directory containing data/ (default ".")
//! STORE_API_URL            remote tabular store base URL (default Airtable v0)
//! STORE_API_KEY            remote store bearer token        (required)
//! STORE_BASE_ID            remote store base identifier     (required)
//! TELEGRAM_API_URL         bot API base URL (default api.telegram.org)
//! TELEGRAM_BOT_TOKEN       shared fallback bot credential   (required)
//! TELEGRAM_BOT_TOKEN_<DIR> per-category override, e.g. _MESSAGES (optional)
//! MAIN_TELEGRAM_CHAT_ID    final-fallback destination chat  (required)
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::CoreError;
use crate::types::Category;

pub const DEFAULT_STORE_API_URL: &str = "https://api.airtable.com/v0";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// Remote tabular store credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub api_url: String,
    pub api_key: String,
    pub base_id: String,
}

/// Notification transport credentials: one shared bot token, optional
/// per-category overrides, and the main chat used as the terminal fallback
/// destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyConfig {
    pub api_url: String,
    pub default_bot_token: String,
    pub main_chat_id: String,
    pub category_tokens: HashMap<Category, String>,
}

impl NotifyConfig {
    /// The routing token for a category: its override if configured,
    /// otherwise the shared fallback credential.
    pub fn bot_token_for(&self, category: Category) -> &str {
        self.category_tokens
            .get(&category)
            .map(String::as_str)
            .unwrap_or(&self.default_bot_token)
    }
}

/// Full process configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_root: PathBuf,
    pub store: StoreConfig,
    pub notify: NotifyConfig,
}

/// Resolve the data root alone. Control-surface commands (status, stop,
/// logs) need the root but not the remote credentials.
pub fn data_root_from_env() -> PathBuf {
    dotenv::dotenv().ok();
    std::env::var("SWARMLINK_DATA_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

impl Config {
    /// Load configuration from the environment (and `.env`, if present).
    pub fn from_env() -> Result<Config, CoreError> {
        let data_root = data_root_from_env();

        let store = StoreConfig {
            api_url: var_or("STORE_API_URL", DEFAULT_STORE_API_URL),
            api_key: required("STORE_API_KEY")?,
            base_id: required("STORE_BASE_ID")?,
        };

        let mut category_tokens = HashMap::new();
        for category in Category::ALL {
            let name = format!("TELEGRAM_BOT_TOKEN_{}", category.env_suffix());
            if let Ok(token) = std::env::var(&name) {
                if !token.is_empty() {
                    category_tokens.insert(category, token);
                }
            }
        }

        let notify = NotifyConfig {
            api_url: var_or("TELEGRAM_API_URL", DEFAULT_TELEGRAM_API_URL),
            default_bot_token: required("TELEGRAM_BOT_TOKEN")?,
            main_chat_id: required("MAIN_TELEGRAM_CHAT_ID")?,
            category_tokens,
        };

        Ok(Config {
            data_root,
            store,
            notify,
        })
    }
}

fn required(name: &'static str) -> Result<String, CoreError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(CoreError::ConfigVar { name }),
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notify_config() -> NotifyConfig {
        NotifyConfig {
            api_url: DEFAULT_TELEGRAM_API_URL.to_owned(),
            default_bot_token: "shared-token".to_owned(),
            main_chat_id: "main-chat".to_owned(),
            category_tokens: [(Category::Message, "messages-token".to_owned())]
                .into_iter()
                .collect(),
        }
    }

    #[test]
    fn bot_token_prefers_category_override() {
        let notify = notify_config();
        assert_eq!(notify.bot_token_for(Category::Message), "messages-token");
        assert_eq!(notify.bot_token_for(Category::News), "shared-token");
    }

    #[test]
    fn env_suffix_matches_directory_names() {
        assert_eq!(Category::Message.env_suffix(), "MESSAGES");
        assert_eq!(Category::Specification.env_suffix(), "SPECIFICATIONS");
    }
}
