//! Sink adapters for the swarmlink fan-out engine.
//!
//! Three independent push targets share one retry policy shape:
//! - [`remote`] — keyed upsert into the remote tabular store
//! - [`vcs`] — version-control publish
//! - [`notify`] — notification transport + per-category formatting
//!
//! Plus [`resolve`], the total recipient-resolution chain, and [`retry`],
//! the attempt-with-backoff combinator all sinks consume.

pub mod error;
pub mod notify;
pub mod remote;
pub mod resolve;
pub mod retry;
pub mod vcs;

pub use error::SyncError;
pub use notify::{format_notification, ChatAddress, Messenger, NotifySink, TelegramMessenger};
pub use remote::{HttpStore, RemoteRecord, RemoteTable, UpsertSink, Upserted};
pub use resolve::resolve;
pub use retry::{outcome_from, RetryPolicy};
pub use vcs::{GitPublisher, Publisher, PublishSink};
