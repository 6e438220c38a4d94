//! Draining the pending-change cache against the remote host.
//!
//! ## Phases
//!
//! `Idle → Validating → Publishing → Finalizing → Idle`, or `→ Aborted` from
//! any phase on a fatal error.
//!
//! 1. **Validating**: refuse on a mixed working tree, load the cache.
//! 2. **Publishing**: modified, then new, then deleted, then renamed. Each
//!    entry leaves the in-memory set once its remote call and store update
//!    both succeeded.
//! 3. **Finalizing**: clear the cache. An empty drain with no cache file
//!    leaves it absent.
//!
//! On a fatal error the unprocessed remainder is checkpointed back to the
//! cache. Store updates already applied stay applied.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use inkpost_core::config::DEFAULT_RATE_LIMIT_SECS;
use inkpost_core::{
    IdentifierStore, PendingChangeCache, PendingChangeSet, PostId, RelPath, RenamePair, StoreError,
};
use inkpost_detector::{is_status_mixed, VersionControl};

use crate::document::{Document, DocumentSource};
use crate::error::DrainError;
use crate::remote::{RemoteContentClient, RemoteError};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPhase {
    Idle,
    Validating,
    Publishing,
    Finalizing,
    Aborted,
}

impl fmt::Display for DrainPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            DrainPhase::Idle => "idle",
            DrainPhase::Validating => "validating",
            DrainPhase::Publishing => "publishing",
            DrainPhase::Finalizing => "finalizing",
            DrainPhase::Aborted => "aborted",
        })
    }
}

/// How long to wait after the host throttles a mutation. Retries never give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RATE_LIMIT_SECS),
        }
    }
}

/// What happened to one pending entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PublishOutcome {
    Created { path: RelPath, id: PostId },
    Updated { path: RelPath, id: PostId },
    /// The mapped post was gone remotely; a fresh one replaced it.
    Recreated { path: RelPath, old: PostId, id: PostId },
    Deleted { path: RelPath, id: PostId },
    /// The host refused the delete; the mapping was dropped anyway.
    DeleteRefused { path: RelPath, id: PostId, title: String },
    Skipped { path: RelPath, reason: String },
    Moved { from: RelPath, to: RelPath, id: PostId },
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishOutcome::Created { path, id } => write!(f, "created {path} as post {id}"),
            PublishOutcome::Updated { path, id } => write!(f, "updated post {id} from {path}"),
            PublishOutcome::Recreated { path, old, id } => {
                write!(f, "recreated {path} as post {id} (post {old} was gone)")
            }
            PublishOutcome::Deleted { path, id } => write!(f, "deleted post {id} ({path})"),
            PublishOutcome::DeleteRefused { path, id, title } => write!(
                f,
                "host refused to delete post {id} ({path}); remove '{title}' by hand"
            ),
            PublishOutcome::Skipped { path, reason } => write!(f, "skipped {path}: {reason}"),
            PublishOutcome::Moved { from, to, id } => write!(f, "moved post {id}: {from} -> {to}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub outcomes: Vec<PublishOutcome>,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn push(&mut self, outcome: PublishOutcome) {
        tracing::info!("{outcome}");
        self.outcomes.push(outcome);
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// One drain's worth of collaborators.
pub struct Publisher<'a> {
    vc: &'a dyn VersionControl,
    cache: &'a PendingChangeCache,
    store: &'a mut IdentifierStore,
    remote: &'a mut dyn RemoteContentClient,
    documents: &'a dyn DocumentSource,
    retry: RetryPolicy,
    phase: DrainPhase,
}

impl<'a> Publisher<'a> {
    pub fn new(
        vc: &'a dyn VersionControl,
        cache: &'a PendingChangeCache,
        store: &'a mut IdentifierStore,
        remote: &'a mut dyn RemoteContentClient,
        documents: &'a dyn DocumentSource,
    ) -> Self {
        Self {
            vc,
            cache,
            store,
            remote,
            documents,
            retry: RetryPolicy::default(),
            phase: DrainPhase::Idle,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn phase(&self) -> DrainPhase {
        self.phase
    }

    fn enter(&mut self, phase: DrainPhase) {
        tracing::debug!("drain phase: {} -> {phase}", self.phase);
        self.phase = phase;
    }

    /// Publish every pending change, then clear the cache.
    pub fn drain(&mut self) -> Result<DrainReport, DrainError> {
        self.enter(DrainPhase::Validating);
        let mut remaining = match self.validate() {
            Ok(set) => set,
            Err(e) => {
                self.enter(DrainPhase::Aborted);
                return Err(e);
            }
        };
        tracing::info!("publishing {} pending change(s)", remaining.len());
        let nothing_pending = remaining.is_empty();

        self.enter(DrainPhase::Publishing);
        let mut report = DrainReport::default();
        if let Err(e) = self.publish_all(&mut remaining, &mut report) {
            self.enter(DrainPhase::Aborted);
            if let Err(cache_err) = self.cache.checkpoint(&remaining) {
                tracing::warn!("could not checkpoint remaining changes: {cache_err}");
            }
            return Err(e);
        }

        self.enter(DrainPhase::Finalizing);
        if nothing_pending && !self.cache.path().exists() {
            // An absent cache is already empty.
            self.enter(DrainPhase::Idle);
            return Ok(report);
        }
        if let Err(e) = self.cache.clear() {
            self.enter(DrainPhase::Aborted);
            return Err(e.into());
        }
        self.enter(DrainPhase::Idle);
        Ok(report)
    }

    fn validate(&self) -> Result<PendingChangeSet, DrainError> {
        if is_status_mixed(self.vc)? {
            return Err(DrainError::MixedStatus);
        }
        Ok(self.cache.load()?)
    }

    fn publish_all(
        &mut self,
        remaining: &mut PendingChangeSet,
        report: &mut DrainReport,
    ) -> Result<(), DrainError> {
        while let Some(path) = remaining.modified.first().cloned() {
            report.push(self.publish(&path)?);
            remaining.modified.remove(0);
        }
        while let Some(path) = remaining.new.first().cloned() {
            report.push(self.publish(&path)?);
            remaining.new.remove(0);
        }
        while let Some(path) = remaining.deleted.first().cloned() {
            report.push(self.unpublish(&path)?);
            remaining.deleted.remove(0);
        }
        while let Some(pair) = remaining.renamed.first().cloned() {
            report.push(self.relocate(&pair)?);
            remaining.renamed.remove(0);
        }
        Ok(())
    }

    // -- modified / new ------------------------------------------------------

    fn publish(&mut self, path: &RelPath) -> Result<PublishOutcome, DrainError> {
        let doc = self.documents.load(path)?;

        if let Some(id) = self.store.lookup_id(path)? {
            return match self.update_remote(path, &id, &doc)? {
                None => {
                    self.store.update_by_path(&doc.record(path, &id))?;
                    Ok(PublishOutcome::Updated {
                        path: path.clone(),
                        id,
                    })
                }
                Some(fresh) => {
                    self.store.update_by_path(&doc.record(path, &fresh))?;
                    Ok(PublishOutcome::Recreated {
                        path: path.clone(),
                        old: id,
                        id: fresh,
                    })
                }
            };
        }

        if let Some(id) = self.adoptable_by_title(path, &doc.title)? {
            tracing::info!("{path}: matched post {id} by title '{}'", doc.title);
            return match self.update_remote(path, &id, &doc)? {
                None => {
                    self.store.update_by_identifier(&doc.record(path, &id))?;
                    Ok(PublishOutcome::Updated {
                        path: path.clone(),
                        id,
                    })
                }
                Some(fresh) => {
                    // Move the dead row here first so the fresh id replaces it.
                    self.store.update_by_identifier(&doc.record(path, &id))?;
                    self.store.update_by_path(&doc.record(path, &fresh))?;
                    Ok(PublishOutcome::Recreated {
                        path: path.clone(),
                        old: id,
                        id: fresh,
                    })
                }
            };
        }

        let id = self.create_remote(path, &doc)?;
        self.store.insert(&doc.record(path, &id))?;
        Ok(PublishOutcome::Created {
            path: path.clone(),
            id,
        })
    }

    /// A post published under `title` whose file has left the tree.
    ///
    /// A title match still backed by a document at its mapped path belongs
    /// to that document and is never taken over.
    fn adoptable_by_title(
        &self,
        path: &RelPath,
        title: &str,
    ) -> Result<Option<PostId>, DrainError> {
        let id = match self.store.lookup_id_by_title(title) {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(None),
            Err(StoreError::AmbiguousTitle { count, .. }) => {
                tracing::warn!("{path}: {count} posts share the title '{title}'; publishing as new");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        match self.store.path_for_id(&id)? {
            Some(owner) if owner != *path && self.documents.exists(&owner) => {
                tracing::info!("{path}: title '{title}' belongs to {owner}; publishing as new");
                Ok(None)
            }
            _ => Ok(Some(id)),
        }
    }

    /// Update `id` remotely. Returns the id of a replacement post when the
    /// host no longer has `id`.
    fn update_remote(
        &mut self,
        path: &RelPath,
        id: &PostId,
        doc: &Document,
    ) -> Result<Option<PostId>, DrainError> {
        let post = doc.to_post();
        match retrying(&mut *self.remote, &self.retry, path, |r| r.update(id, &post)) {
            Ok(_) => Ok(None),
            Err(RemoteError::NotFound(msg)) => {
                tracing::warn!("{path}: post {id} is gone remotely ({msg}); publishing a new one");
                self.create_remote(path, doc).map(Some)
            }
            Err(source) => Err(DrainError::Remote {
                path: path.clone(),
                source,
            }),
        }
    }

    fn create_remote(&mut self, path: &RelPath, doc: &Document) -> Result<PostId, DrainError> {
        let post = doc.to_post();
        retrying(&mut *self.remote, &self.retry, path, |r| r.create(&post)).map_err(|source| {
            DrainError::Remote {
                path: path.clone(),
                source,
            }
        })
    }

    // -- deleted ---------------------------------------------------------------

    fn unpublish(&mut self, path: &RelPath) -> Result<PublishOutcome, DrainError> {
        let Some(id) = self.store.lookup_id(path)? else {
            return Ok(PublishOutcome::Skipped {
                path: path.clone(),
                reason: "never published".to_string(),
            });
        };

        let refused = match retrying(&mut *self.remote, &self.retry, path, |r| r.delete(&id)) {
            Ok(true) => None,
            Ok(false) => Some("host answered false".to_string()),
            Err(e @ (RemoteError::Transport(_) | RemoteError::Protocol(_))) => {
                return Err(DrainError::Remote {
                    path: path.clone(),
                    source: e,
                })
            }
            Err(e) => Some(e.to_string()),
        };

        let outcome = match refused {
            None => PublishOutcome::Deleted {
                path: path.clone(),
                id: id.clone(),
            },
            Some(reason) => {
                let title = self.store.title_for_id(&id)?.unwrap_or_default();
                tracing::warn!("could not delete post {id} ({reason}); remove '{title}' manually");
                PublishOutcome::DeleteRefused {
                    path: path.clone(),
                    id: id.clone(),
                    title,
                }
            }
        };
        self.store.remove(path)?;
        Ok(outcome)
    }

    // -- renamed ---------------------------------------------------------------

    fn relocate(&mut self, pair: &RenamePair) -> Result<PublishOutcome, DrainError> {
        let RenamePair { from, to } = pair;
        let Some(id) = self.store.lookup_id(from)? else {
            tracing::info!("{from} was never published; publishing {to} instead");
            return self.publish(to);
        };

        let doc = self.documents.load(to)?;
        match self.update_remote(to, &id, &doc)? {
            None => {
                self.store.rename(from, to)?;
                self.store.update_by_identifier(&doc.record(to, &id))?;
                Ok(PublishOutcome::Moved {
                    from: from.clone(),
                    to: to.clone(),
                    id,
                })
            }
            Some(fresh) => {
                self.store.rename(from, to)?;
                self.store.update_by_path(&doc.record(to, &fresh))?;
                Ok(PublishOutcome::Recreated {
                    path: to.clone(),
                    old: id,
                    id: fresh,
                })
            }
        }
    }
}

/// Run `call` until it stops answering `RateLimited`, sleeping
/// `policy.interval` between attempts.
fn retrying<R, T>(
    remote: &mut R,
    policy: &RetryPolicy,
    path: &RelPath,
    mut call: impl FnMut(&mut R) -> Result<T, RemoteError>,
) -> Result<T, RemoteError>
where
    R: RemoteContentClient + ?Sized,
{
    let mut attempt = 0u32;
    loop {
        match call(remote) {
            Err(RemoteError::RateLimited(msg)) => {
                attempt += 1;
                tracing::warn!(
                    "{path}: host is rate limiting ({msg}); retry {attempt} in {}s",
                    policy.interval.as_secs()
                );
                std::thread::sleep(policy.interval);
            }
            other => return other,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
