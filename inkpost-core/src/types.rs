//! Domain types for pending changes and the post mapping.
//!
//! Paths are repository-relative, `/`-separated strings exactly as git
//! reports them; they are never resolved against the filesystem here.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConflictError, Overlap};

/// Weight assigned to a mapping record when the document does not set one.
pub const DEFAULT_WEIGHT: i64 = 5;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A repository-relative document path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelPath(pub String);

impl RelPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the final extension matches one of `extensions` (no leading dot,
    /// ASCII case-insensitive).
    pub fn has_extension(&self, extensions: &[String]) -> bool {
        let name = self.0.rsplit('/').next().unwrap_or(&self.0);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
            }
            _ => false,
        }
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for RelPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RelPath {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier assigned to a post by the remote host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

impl PostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<String> for PostId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PostId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Change categories
// ---------------------------------------------------------------------------

/// The four categories a staged change can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Modified,
    Deleted,
    New,
    Renamed,
}

impl ChangeKind {
    pub fn all() -> &'static [ChangeKind] {
        &[
            ChangeKind::Modified,
            ChangeKind::Deleted,
            ChangeKind::New,
            ChangeKind::Renamed,
        ]
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Modified => write!(f, "modified"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::New => write!(f, "new"),
            ChangeKind::Renamed => write!(f, "renamed"),
        }
    }
}

/// A single detected change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Modified(RelPath),
    Deleted(RelPath),
    New(RelPath),
    Renamed(RenamePair),
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Modified(_) => ChangeKind::Modified,
            Change::Deleted(_) => ChangeKind::Deleted,
            Change::New(_) => ChangeKind::New,
            Change::Renamed(_) => ChangeKind::Renamed,
        }
    }
}

/// A `(from, to)` rename, stored on disk as a two-element array.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(RelPath, RelPath)", into = "(RelPath, RelPath)")]
pub struct RenamePair {
    pub from: RelPath,
    pub to: RelPath,
}

impl RenamePair {
    pub fn new(from: impl Into<RelPath>, to: impl Into<RelPath>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl From<(RelPath, RelPath)> for RenamePair {
    fn from((from, to): (RelPath, RelPath)) -> Self {
        Self { from, to }
    }
}

impl From<RenamePair> for (RelPath, RelPath) {
    fn from(pair: RenamePair) -> Self {
        (pair.from, pair.to)
    }
}

impl fmt::Display for RenamePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// One of the five path sets derived from a [`PendingChangeSet`].
///
/// Renames contribute two sets, one per side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DerivedSet {
    Modified,
    Deleted,
    New,
    RenameFrom,
    RenameTo,
}

impl fmt::Display for DerivedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            DerivedSet::Modified => "modified",
            DerivedSet::Deleted => "deleted",
            DerivedSet::New => "new",
            DerivedSet::RenameFrom => "rename-from",
            DerivedSet::RenameTo => "rename-to",
        })
    }
}

// ---------------------------------------------------------------------------
// PendingChangeSet
// ---------------------------------------------------------------------------

type PendingRepr = (Vec<RelPath>, Vec<RelPath>, Vec<RelPath>, Vec<RenamePair>);

/// Files awaiting publication, partitioned by category.
///
/// Serialized positionally as `[modified, deleted, new, renamed]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "PendingRepr", into = "PendingRepr")]
pub struct PendingChangeSet {
    pub modified: Vec<RelPath>,
    pub deleted: Vec<RelPath>,
    pub new: Vec<RelPath>,
    pub renamed: Vec<RenamePair>,
}

impl From<PendingRepr> for PendingChangeSet {
    fn from((modified, deleted, new, renamed): PendingRepr) -> Self {
        Self {
            modified,
            deleted,
            new,
            renamed,
        }
    }
}

impl From<PendingChangeSet> for PendingRepr {
    fn from(set: PendingChangeSet) -> Self {
        (set.modified, set.deleted, set.new, set.renamed)
    }
}

impl PendingChangeSet {
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        self.modified.len() + self.deleted.len() + self.new.len() + self.renamed.len()
    }

    /// Build a set from individual changes, keeping first-seen order and
    /// dropping exact duplicates.
    pub fn from_changes(changes: impl IntoIterator<Item = Change>) -> Self {
        let mut set = Self::default();
        for change in changes {
            match change {
                Change::Modified(p) => push_unique(&mut set.modified, p),
                Change::Deleted(p) => push_unique(&mut set.deleted, p),
                Change::New(p) => push_unique(&mut set.new, p),
                Change::Renamed(pair) => push_unique(&mut set.renamed, pair),
            }
        }
        set
    }

    /// The five derived path sets, in a fixed order.
    pub fn derived_sets(&self) -> [(DerivedSet, BTreeSet<&RelPath>); 5] {
        [
            (DerivedSet::Modified, self.modified.iter().collect()),
            (DerivedSet::Deleted, self.deleted.iter().collect()),
            (DerivedSet::New, self.new.iter().collect()),
            (
                DerivedSet::RenameFrom,
                self.renamed.iter().map(|r| &r.from).collect(),
            ),
            (
                DerivedSet::RenameTo,
                self.renamed.iter().map(|r| &r.to).collect(),
            ),
        ]
    }

    /// Verify the five derived sets are pairwise disjoint.
    ///
    /// Every overlapping path is reported once per offending pair of sets.
    pub fn check_disjoint(&self) -> Result<(), ConflictError> {
        let sets = self.derived_sets();
        let mut overlaps = Vec::new();
        for (i, (left_kind, left)) in sets.iter().enumerate() {
            for (right_kind, right) in &sets[i + 1..] {
                for path in left.intersection(right) {
                    overlaps.push(Overlap {
                        path: (*path).clone(),
                        first: *left_kind,
                        second: *right_kind,
                    });
                }
            }
        }
        if overlaps.is_empty() {
            Ok(())
        } else {
            Err(ConflictError { overlaps })
        }
    }
}

pub(crate) fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

// ---------------------------------------------------------------------------
// MappingRecord
// ---------------------------------------------------------------------------

/// A row of the identifier store: one published document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRecord {
    pub path: RelPath,
    pub remote_id: PostId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: i64,
}

fn default_weight() -> i64 {
    DEFAULT_WEIGHT
}

impl MappingRecord {
    pub fn new(path: impl Into<RelPath>, remote_id: impl Into<PostId>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            remote_id: remote_id.into(),
            title: title.into(),
            date: None,
            tags: Vec::new(),
            weight: DEFAULT_WEIGHT,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
