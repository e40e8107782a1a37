//! Swarmlink core library — domain types, classification, local store,
//! configuration, errors.
//!
//! Public API surface:
//! - [`types`] — category table, record structs, dispatch bookkeeping
//! - [`classify`] — path → category classification
//! - [`store`] — the on-disk record tree
//! - [`config`] — environment configuration
//! - [`error`] — [`CoreError`]

pub mod classify;
pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::{data_root_from_env, Config, NotifyConfig, StoreConfig};
pub use error::CoreError;
pub use types::{
    Category, ChangeEvent, ChangeKind, Collaboration, DedupKey, Deliverable, DispatchOutcome,
    Message, Mission, News, Record, RecordId, Specification, Swarm, SwarmId, Thought,
};
