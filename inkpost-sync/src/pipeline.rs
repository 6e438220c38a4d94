//! The two user-facing flows: `commit` records staged changes, `push`
//! publishes them.

use std::path::PathBuf;

use chrono::Local;

use inkpost_core::{CacheError, Confirm, PendingChangeCache, PendingChangeSet};
use inkpost_detector::{detect, is_status_mixed, VersionControl};

use crate::error::SyncError;
use crate::publish::{DrainReport, Publisher};

/// Commit message used after a successful push.
pub const PUBLISH_MESSAGE: &str = "publish posts";

/// Prompt shown before a push.
pub const PULLED_QUESTION: &str = "Is the notes repository pulled to the latest revision?";

/// Local time in the `Mon, Jan 02 15:04` style.
pub fn default_commit_message() -> String {
    Local::now().format("%a, %b %d %H:%M").to_string()
}

/// Result of [`commit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitOutcome {
    /// The cache contents after the merge.
    pub pending: PendingChangeSet,
    pub message: String,
}

/// Detect staged content changes, fold them into the cache, and commit.
///
/// Refuses a mixed working tree before touching anything. The cache is only
/// written when `confirm` accepts the merged set.
pub fn commit(
    vc: &dyn VersionControl,
    cache: &PendingChangeCache,
    extensions: &[String],
    confirm: &mut dyn Confirm,
    message: Option<&str>,
) -> Result<CommitOutcome, SyncError> {
    if is_status_mixed(vc)? {
        return Err(SyncError::MixedStatus);
    }

    let detected = detect(vc, extensions)?;
    let merged = cache.merge(&detected)?;
    cache.persist(&merged, confirm).map_err(|e| match e {
        CacheError::Declined => SyncError::Declined,
        other => other.into(),
    })?;

    vc.add(&[cache.path().to_path_buf()])?;
    let message = match message.map(str::trim) {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => default_commit_message(),
    };
    vc.commit(&message)?;

    Ok(CommitOutcome {
        pending: merged,
        message,
    })
}

/// Publish everything pending, then commit the emptied cache and the
/// updated store.
///
/// `tracked` lists the files to stage afterwards (cache and database).
/// Nothing is committed when there was nothing to publish.
pub fn push(
    vc: &dyn VersionControl,
    publisher: &mut Publisher<'_>,
    tracked: &[PathBuf],
    confirm: &mut dyn Confirm,
) -> Result<DrainReport, SyncError> {
    if !confirm.confirm(PULLED_QUESTION) {
        return Err(SyncError::Declined);
    }

    let report = publisher.drain()?;
    if report.is_empty() {
        tracing::info!("nothing to publish");
        return Ok(report);
    }

    vc.add(tracked)?;
    vc.commit(PUBLISH_MESSAGE)?;
    Ok(report)
}
