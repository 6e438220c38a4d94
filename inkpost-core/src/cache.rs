//! Pending-change cache: the durable list of files awaiting publication.
//!
//! Persists a [`PendingChangeSet`] as a positional JSON array
//! `[modified, deleted, new, renamed]`. A missing file reads as the empty
//! set. Writes go to `<path>.tmp` and are renamed into place so a crash never
//! leaves a half-written cache.
//!
//! # Merge rules
//!
//! 1. Modified, deleted and new paths are appended if not already listed.
//! 2. A rename whose `from` is already pending as modified or new is folded
//!    into that category at its `to` path; otherwise it is kept as a rename.
//! 3. The five derived sets must stay pairwise disjoint; an overlap aborts
//!    the merge with a [`ConflictError`](crate::error::ConflictError).

use std::path::{Path, PathBuf};

use crate::confirm::Confirm;
use crate::error::{cache_io, CacheError};
use crate::types::{push_unique, PendingChangeSet, RelPath, RenamePair};

/// Handle on the cache file. Cheap to construct; all I/O happens per call.
#[derive(Debug, Clone)]
pub struct PendingChangeCache {
    path: PathBuf,
}

impl PendingChangeCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the pending set, or the empty set if the file does not exist.
    pub fn load(&self) -> Result<PendingChangeSet, CacheError> {
        if !self.path.exists() {
            return Ok(PendingChangeSet::default());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| cache_io(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(PendingChangeSet::default());
        }
        serde_json::from_str(&contents).map_err(|source| CacheError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    /// Load the cache and fold `detected` into it. Nothing is written.
    pub fn merge(&self, detected: &PendingChangeSet) -> Result<PendingChangeSet, CacheError> {
        let current = self.load()?;
        Ok(merge_changes(current, detected)?)
    }

    /// Write `set` after validating it and asking `confirm`.
    ///
    /// Declining returns [`CacheError::Declined`] and leaves the file untouched.
    pub fn persist(
        &self,
        set: &PendingChangeSet,
        confirm: &mut dyn Confirm,
    ) -> Result<(), CacheError> {
        set.check_disjoint()?;
        if !confirm.confirm(&summary(set)) {
            tracing::info!("pending changes not saved: declined");
            return Err(CacheError::Declined);
        }
        self.write(set)
    }

    /// Reset the cache to four empty lists.
    pub fn clear(&self) -> Result<(), CacheError> {
        self.write(&PendingChangeSet::default())
    }

    /// Write whatever is left of a drain without asking for confirmation.
    pub fn checkpoint(&self, remaining: &PendingChangeSet) -> Result<(), CacheError> {
        tracing::warn!(
            "checkpointing {} unpublished change(s) to {}",
            remaining.len(),
            self.path.display()
        );
        self.write(remaining)
    }

    fn write(&self, set: &PendingChangeSet) -> Result<(), CacheError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| cache_io(dir, e))?;
            }
        }
        let json = serde_json::to_string_pretty(set)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| cache_io(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(cache_io(&self.path, e));
        }
        tracing::debug!("wrote pending cache: {}", self.path.display());
        Ok(())
    }
}

/// Fold `detected` into `current` following the merge rules above.
pub fn merge_changes(
    mut current: PendingChangeSet,
    detected: &PendingChangeSet,
) -> Result<PendingChangeSet, crate::error::ConflictError> {
    for path in &detected.modified {
        push_unique(&mut current.modified, path.clone());
    }
    for path in &detected.deleted {
        push_unique(&mut current.deleted, path.clone());
    }
    for path in &detected.new {
        push_unique(&mut current.new, path.clone());
    }
    for pair in &detected.renamed {
        if move_within(&mut current.modified, pair) || move_within(&mut current.new, pair) {
            continue;
        }
        push_unique(&mut current.renamed, pair.clone());
    }

    current.check_disjoint()?;
    Ok(current)
}

/// If `pair.from` is listed, replace it with `pair.to`. Returns whether it was.
fn move_within(list: &mut Vec<RelPath>, pair: &RenamePair) -> bool {
    let Some(idx) = list.iter().position(|p| *p == pair.from) else {
        return false;
    };
    list.remove(idx);
    push_unique(list, pair.to.clone());
    tracing::debug!("folded rename {pair} into pending entry");
    true
}

/// Human-readable description of a set, used as the confirmation prompt.
pub fn summary(set: &PendingChangeSet) -> String {
    let mut out = String::from("Save pending changes?\n");
    for (kind, paths) in set.derived_sets() {
        let names: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
        out.push_str(&format!("  {kind:<11} {}\n", names.join(", ")));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::{AssumeNo, AssumeYes};
    use tempfile::TempDir;

    fn cache_in(tmp: &TempDir) -> PendingChangeCache {
        PendingChangeCache::new(tmp.path().join(".inkpost").join("pending.json"))
    }

    fn paths(items: &[&str]) -> Vec<RelPath> {
        items.iter().map(|p| RelPath::from(*p)).collect()
    }

    #[test]
    fn empty_set_when_file_missing() {
        let tmp = TempDir::new().unwrap();
        let set = cache_in(&tmp).load().unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn persist_then_load() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let set = PendingChangeSet {
            modified: paths(&["a.md"]),
            renamed: vec![RenamePair::new("c.md", "d.md")],
            ..Default::default()
        };
        cache.persist(&set, &mut AssumeYes).unwrap();
        assert_eq!(cache.load().unwrap(), set);
    }

    #[test]
    fn declined_persist_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let set = PendingChangeSet {
            new: paths(&["b.md"]),
            ..Default::default()
        };
        let err = cache.persist(&set, &mut AssumeNo).unwrap_err();
        assert!(matches!(err, CacheError::Declined));
        assert!(!cache.path().exists());
    }

    #[test]
    fn tmp_file_cleaned_up_after_write() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        cache.clear().unwrap();
        assert!(!cache.path().with_extension("json.tmp").exists());
        let raw = std::fs::read_to_string(cache.path()).unwrap();
        let compact: String = raw.split_whitespace().collect();
        assert_eq!(compact, "[[],[],[],[]]");
    }

    #[test]
    fn corrupt_cache_reports_path() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        std::fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        std::fs::write(cache.path(), r#"{"not":"an array"}"#).unwrap();
        let err = cache.load().unwrap_err();
        assert!(matches!(err, CacheError::Parse { .. }));
        assert!(err.to_string().contains("pending.json"));
    }

    #[test]
    fn merge_appends_without_duplicates() {
        let current = PendingChangeSet {
            modified: paths(&["a.md"]),
            ..Default::default()
        };
        let detected = PendingChangeSet {
            modified: paths(&["a.md", "b.md"]),
            ..Default::default()
        };
        let merged = merge_changes(current, &detected).unwrap();
        assert_eq!(merged.modified, paths(&["a.md", "b.md"]));
    }

    #[test]
    fn rename_of_modified_keeps_modified_at_destination() {
        let current = PendingChangeSet {
            modified: paths(&["a.md"]),
            ..Default::default()
        };
        let detected = PendingChangeSet {
            renamed: vec![RenamePair::new("a.md", "z.md")],
            ..Default::default()
        };
        let merged = merge_changes(current, &detected).unwrap();
        assert_eq!(merged.modified, paths(&["z.md"]));
        assert!(merged.renamed.is_empty());
    }

    #[test]
    fn merge_is_not_persisted_on_conflict() {
        let tmp = TempDir::new().unwrap();
        let cache = cache_in(&tmp);
        let set = PendingChangeSet {
            deleted: paths(&["gone.md"]),
            ..Default::default()
        };
        cache.persist(&set, &mut AssumeYes).unwrap();

        let detected = PendingChangeSet {
            new: paths(&["gone.md"]),
            ..Default::default()
        };
        let err = cache.merge(&detected).unwrap_err();
        assert!(matches!(err, CacheError::Conflict(_)));
        assert_eq!(cache.load().unwrap(), set);
    }

    #[test]
    fn summary_lists_every_category() {
        let set = PendingChangeSet {
            modified: paths(&["a.md"]),
            ..Default::default()
        };
        let text = summary(&set);
        for label in ["modified", "deleted", "new", "rename-from", "rename-to"] {
            assert!(text.contains(label), "missing {label} in {text}");
        }
        assert!(text.contains("a.md"));
    }
}
