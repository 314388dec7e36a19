// Retention cleanup: delete every file in the repository root that is older
// than a maximum age.
//
// Each listed file gets its own task, but a semaphore caps how many of them
// talk to the server at once. A failure on one file is logged and counted,
// never propagated to the other files.

use crate::api::{ApiClient, DirectoryEntry, FileDetail};
use crate::config::{DEFAULT_CONCURRENCY, DEFAULT_MAX_AGE_DAYS};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{AcquireError, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

/// The remote operations cleanup needs. Implemented by `ApiClient`; tests
/// substitute an in-memory repository.
#[async_trait]
pub trait RemoteFiles: Send + Sync + 'static {
    async fn list_files(&self) -> Result<Vec<DirectoryEntry>>;
    async fn file_detail(&self, name: &str) -> Result<FileDetail>;
    async fn delete_file(&self, name: &str) -> Result<()>;
}

#[async_trait]
impl RemoteFiles for ApiClient {
    async fn list_files(&self) -> Result<Vec<DirectoryEntry>> {
        ApiClient::list_directory(self).await
    }

    async fn file_detail(&self, name: &str) -> Result<FileDetail> {
        ApiClient::file_detail(self, name).await
    }

    async fn delete_file(&self, name: &str) -> Result<()> {
        ApiClient::delete_file(self, name).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Files strictly older than this are deleted.
    pub max_age: TimeDelta,
    /// Upper bound on files being processed at the same time.
    pub concurrency: usize,
    pub dry_run: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        CleanupPolicy {
            max_age: TimeDelta::days(DEFAULT_MAX_AGE_DAYS),
            concurrency: DEFAULT_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Whether a file last modified at `modified_at` has outlived `max_age`.
/// A file exactly `max_age` old is kept.
pub fn file_ready_for_cleanup(max_age: TimeDelta, modified_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(modified_at) > max_age
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Kept,
    Deleted,
    WouldDelete,
    DetailFailed,
    DeleteFailed,
}

/// Tally of a finished cleanup run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub listed: usize,
    pub kept: usize,
    pub deleted: usize,
    pub would_delete: usize,
    pub detail_failures: usize,
    pub delete_failures: usize,
    pub task_failures: usize,
}

impl CleanupReport {
    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Kept => self.kept += 1,
            Outcome::Deleted => self.deleted += 1,
            Outcome::WouldDelete => self.would_delete += 1,
            Outcome::DetailFailed => self.detail_failures += 1,
            Outcome::DeleteFailed => self.delete_failures += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.detail_failures + self.delete_failures + self.task_failures
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files listed, {} deleted, {} kept",
            self.listed, self.deleted, self.kept
        )?;
        if self.would_delete > 0 {
            write!(f, ", {} would be deleted", self.would_delete)?;
        }
        if self.failures() > 0 {
            write!(f, ", {} failed", self.failures())?;
        }
        Ok(())
    }
}

/// Run the cleanup against the current time.
///
/// Only listing the directory can fail the run; everything after that is
/// isolated per file and reflected in the returned report.
pub async fn run_cleanup<R: RemoteFiles>(repo: Arc<R>, policy: &CleanupPolicy) -> Result<CleanupReport> {
    run_cleanup_at(repo, policy, Utc::now()).await
}

/// Like `run_cleanup`, with the age of every file measured against `now`.
pub async fn run_cleanup_at<R: RemoteFiles>(
    repo: Arc<R>,
    policy: &CleanupPolicy,
    now: DateTime<Utc>,
) -> Result<CleanupReport> {
    let files = repo.list_files().await?;
    let mut report = CleanupReport {
        listed: files.len(),
        ..Default::default()
    };
    info!(
        files = files.len(),
        max_concurrent = policy.concurrency,
        dry_run = policy.dry_run,
        "checking files for cleanup"
    );

    let semaphore = Arc::new(Semaphore::new(policy.concurrency.clamp(1, Semaphore::MAX_PERMITS)));
    let mut js: JoinSet<std::result::Result<Outcome, AcquireError>> = JoinSet::new();
    for entry in files {
        let repo = repo.clone();
        let semaphore = semaphore.clone();
        let policy = *policy;
        let span = info_span!("cleanup_file", name = %entry.name);
        js.spawn(
            async move {
                let _permit = semaphore.acquire_owned().await?;
                Ok(clean_one(repo.as_ref(), &entry, &policy, now).await)
            }
            .instrument(span),
        );
    }

    while let Some(joined) = js.join_next().await {
        match joined {
            Ok(Ok(outcome)) => report.record(outcome),
            Ok(Err(e)) => {
                warn!(error = %e, "cleanup task could not acquire a permit");
                report.task_failures += 1;
            }
            Err(e) => {
                warn!(error = %e, "cleanup task failed");
                report.task_failures += 1;
            }
        }
    }
    debug_assert!(js.is_empty());

    Ok(report)
}

async fn clean_one<R: RemoteFiles + ?Sized>(
    repo: &R,
    entry: &DirectoryEntry,
    policy: &CleanupPolicy,
    now: DateTime<Utc>,
) -> Outcome {
    let detail = match repo.file_detail(&entry.name).await {
        Ok(detail) => detail,
        Err(e) => {
            warn!(error = %e, "unable to get detail for file {}", entry.name);
            return Outcome::DetailFailed;
        }
    };

    if !file_ready_for_cleanup(policy.max_age, detail.modified_at, now) {
        debug!(modified_at = %detail.modified_at, "keeping file");
        return Outcome::Kept;
    }

    if policy.dry_run {
        info!("would delete file {} {:?}", entry.id, entry.name);
        return Outcome::WouldDelete;
    }

    info!("deleting file {} {:?}", entry.id, entry.name);
    match repo.delete_file(&detail.name).await {
        Ok(()) => Outcome::Deleted,
        Err(e) => {
            warn!(error = %e, "unable to delete file {}", detail.name);
            Outcome::DeleteFailed
        }
    }
}
