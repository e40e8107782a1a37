//! Version-control publish: push the current record tree state.
//!
//! Not on the critical path for data correctness — only for replication
//! visibility — so failures are retried, logged, and otherwise ignored by
//! the dispatcher.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use swarmlink_core::DispatchOutcome;

use crate::error::SyncError;
use crate::retry::{outcome_from, RetryPolicy};

/// The single operation the core needs from version control.
pub trait Publisher: Send + Sync {
    fn publish(&self) -> Result<(), SyncError>;
}

/// Publishes by staging, committing, and pushing the repository at
/// `repo_root`. An empty working tree is not an error: the push still runs
/// so earlier commits reach the remote.
pub struct GitPublisher {
    repo_root: PathBuf,
}

impl GitPublisher {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }
}

impl Publisher for GitPublisher {
    fn publish(&self) -> Result<(), SyncError> {
        run_git(&self.repo_root, "add", &["add", "-A"])?;

        let status = run_git(&self.repo_root, "status", &["status", "--porcelain"])?;
        if status.trim().is_empty() {
            tracing::debug!("working tree clean, skipping commit");
        } else {
            run_git(
                &self.repo_root,
                "commit",
                &["commit", "-m", "sync: record tree update"],
            )?;
        }

        run_git(&self.repo_root, "push", &["push"])?;
        Ok(())
    }
}

fn run_git(root: &Path, op: &'static str, args: &[&str]) -> Result<String, SyncError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .map_err(|e| SyncError::Vcs {
            op,
            detail: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(SyncError::Vcs {
            op,
            detail: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// The VCS sink: publish with retry.
pub struct PublishSink {
    publisher: Arc<dyn Publisher>,
    policy: RetryPolicy,
}

impl PublishSink {
    pub fn new(publisher: Arc<dyn Publisher>, policy: RetryPolicy) -> Self {
        Self { publisher, policy }
    }

    pub fn push(&self) -> DispatchOutcome {
        let result = self.policy.run("vcs", || self.publisher.publish());
        outcome_from(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FlakyPublisher {
        calls: AtomicUsize,
        fail_first: usize,
    }

    impl Publisher for FlakyPublisher {
        fn publish(&self) -> Result<(), SyncError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_first {
                Err(SyncError::Vcs {
                    op: "push",
                    detail: "remote hung up".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(2),
        }
    }

    #[test]
    fn publish_recovers_from_transient_push_failure() {
        let publisher = Arc::new(FlakyPublisher {
            calls: AtomicUsize::new(0),
            fail_first: 2,
        });
        let sink = PublishSink::new(publisher.clone(), fast_policy());
        assert!(sink.push().is_success());
        assert_eq!(publisher.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn publish_reports_retryable_failure_when_exhausted() {
        let publisher = Arc::new(FlakyPublisher {
            calls: AtomicUsize::new(0),
            fail_first: usize::MAX,
        });
        let sink = PublishSink::new(publisher, fast_policy());
        match sink.push() {
            DispatchOutcome::RetryableFailure(reason) => {
                assert!(reason.contains("push"));
            }
            other => panic!("expected retryable failure, got {other:?}"),
        }
    }
}
