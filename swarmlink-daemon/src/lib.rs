//! Watcher runtime: change detection, dedup, and fan-out dispatch.

pub mod dispatch;
mod error;
pub mod ledger;
pub mod limiter;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
mod runtime;
pub mod stability;

pub use dispatch::{Dispatcher, SharedCounters, SinkCounters, SinkSet, Tuning};
pub use error::DaemonError;
pub use ledger::DedupLedger;
pub use limiter::RateLimiter;
pub use protocol::{
    request_status, request_stop, send_request, WatcherRequest, WatcherResponse,
};
pub use runtime::{run, start_blocking};
