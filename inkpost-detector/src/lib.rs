//! Working-tree change detection for `inkpost-detector`.
//!
//! [`status`] reads the two-character porcelain status of every path in the
//! notes repository and sorts *staged* changes into the four
//! [`ChangeKind`]s. The first status character is the staged (index) state,
//! the second the unstaged (work tree) state. Only staged changes are
//! published; [`is_status_mixed`] guards against paths that carry both.

mod git;

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use inkpost_core::{Change, ChangeKind, PendingChangeSet, RelPath, RenamePair};

pub use git::GitRepo;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One line of `git status --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    /// Index (staged) state, `' '` when clean.
    pub staged: char,
    /// Work tree (unstaged) state, `' '` when clean.
    pub unstaged: char,
    /// Current path; the destination for renames.
    pub path: RelPath,
    /// Source path of a rename or copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orig_path: Option<RelPath>,
}

/// Errors from change detection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("git is unavailable for '{root}': {reason}")]
    ToolUnavailable { root: PathBuf, reason: String },

    #[error("`{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unrecognized status line: {line:?}")]
    Parse { line: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The version-control operations the publish flow needs.
///
/// Every call is scoped to the repository root by the implementation; the
/// process working directory is never changed.
pub trait VersionControl {
    fn status_entries(&self) -> Result<Vec<StatusEntry>, DetectError>;
    fn add(&self, paths: &[PathBuf]) -> Result<(), DetectError>;
    fn commit(&self, message: &str) -> Result<(), DetectError>;
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

impl StatusEntry {
    /// Parse a porcelain v1 line: `XY PATH` or `XY ORIG -> PATH`.
    pub fn parse(line: &str) -> Result<Self, DetectError> {
        let (staged, unstaged, rest) = split_code(line)?;
        let mut entry = Self {
            staged,
            unstaged,
            path: unquote(rest),
            orig_path: None,
        };
        if entry.is_move() {
            if let Some((from, to)) = rest.split_once(" -> ") {
                entry.orig_path = Some(unquote(from));
                entry.path = unquote(to);
            }
        }
        Ok(entry)
    }

    /// A rename or copy, which carries a source path.
    pub fn is_move(&self) -> bool {
        matches!(self.staged, 'R' | 'C') || matches!(self.unstaged, 'R' | 'C')
    }

    /// The raw two-character code, e.g. `"AM"`.
    pub fn code(&self) -> String {
        [self.staged, self.unstaged].iter().collect()
    }

    pub fn is_untracked(&self) -> bool {
        self.staged == '?' && self.unstaged == '?'
    }

    /// Staged *and* unstaged at once (`MM`, `AM`, `RM`, ...).
    pub fn is_mixed(&self) -> bool {
        if self.is_untracked() || (self.staged == '!' && self.unstaged == '!') {
            return false;
        }
        self.staged != ' ' && self.unstaged != ' '
    }
}

/// `XY PATH` → (`X`, `Y`, `PATH`).
fn split_code(line: &str) -> Result<(char, char, &str), DetectError> {
    let parse_err = || DetectError::Parse {
        line: line.to_string(),
    };
    let mut chars = line.chars();
    let staged = chars.next().ok_or_else(parse_err)?;
    let unstaged = chars.next().ok_or_else(parse_err)?;
    if chars.next() != Some(' ') {
        return Err(parse_err());
    }
    let rest = chars.as_str();
    if rest.is_empty() {
        return Err(parse_err());
    }
    Ok((staged, unstaged, rest))
}

/// Undo git's C-style quoting of a path (`"a\"b.md"`, octal escapes).
fn unquote(raw: &str) -> RelPath {
    let raw = raw.trim();
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
    else {
        return RelPath::from(raw);
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        rest = tail;
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let Some((&esc, tail)) = rest.split_first() else {
            bytes.push(b'\\');
            break;
        };
        rest = tail;
        match esc {
            b'a' => bytes.push(0x07),
            b'b' => bytes.push(0x08),
            b't' => bytes.push(b'\t'),
            b'n' => bytes.push(b'\n'),
            b'v' => bytes.push(0x0b),
            b'f' => bytes.push(0x0c),
            b'r' => bytes.push(b'\r'),
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match rest.split_first() {
                        Some((&d, tail)) if (b'0'..=b'7').contains(&d) => {
                            value = value * 8 + u32::from(d - b'0');
                            rest = tail;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                bytes.push(u8::try_from(value).unwrap_or(u8::MAX));
            }
            other => bytes.push(other),
        }
    }
    RelPath::from(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse the full stdout of `git status --porcelain`, skipping blank lines.
pub fn parse_porcelain(stdout: &str) -> Result<Vec<StatusEntry>, DetectError> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(StatusEntry::parse)
        .collect()
}

/// Parse `git status --porcelain -z`: NUL-terminated records with verbatim
/// paths. A rename or copy record is followed by its source path.
pub fn parse_porcelain_z(stdout: &str) -> Result<Vec<StatusEntry>, DetectError> {
    let mut records = stdout.split('\0').filter(|r| !r.is_empty());
    let mut entries = Vec::new();
    while let Some(record) = records.next() {
        let (staged, unstaged, path) = split_code(record)?;
        let mut entry = StatusEntry {
            staged,
            unstaged,
            path: RelPath::from(path),
            orig_path: None,
        };
        if entry.is_move() {
            let from = records.next().ok_or_else(|| DetectError::Parse {
                line: record.to_string(),
            })?;
            entry.orig_path = Some(RelPath::from(from));
        }
        entries.push(entry);
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Sort entries of one kind, keeping only recognized content extensions.
///
/// A rename that crosses the extension boundary degrades to the side that
/// is still content: only the source is content → deletion of the source,
/// only the destination is content → a new file.
pub fn classify(entries: &[StatusEntry], kind: ChangeKind, extensions: &[String]) -> Vec<Change> {
    let mut out = Vec::new();
    for entry in entries {
        let change = match (kind, entry.staged) {
            (ChangeKind::Modified, 'M') => keep(&entry.path, extensions).map(Change::Modified),
            (ChangeKind::Deleted, 'D') => keep(&entry.path, extensions).map(Change::Deleted),
            (ChangeKind::New, 'A') => keep(&entry.path, extensions).map(Change::New),
            (_, 'R') => classify_rename(entry, kind, extensions),
            _ => None,
        };
        if let Some(change) = change {
            out.push(change);
        }
    }
    out
}

fn keep(path: &RelPath, extensions: &[String]) -> Option<RelPath> {
    if path.has_extension(extensions) {
        Some(path.clone())
    } else {
        tracing::debug!("ignoring non-content path: {path}");
        None
    }
}

fn classify_rename(entry: &StatusEntry, kind: ChangeKind, extensions: &[String]) -> Option<Change> {
    let from = entry.orig_path.as_ref()?;
    let to = &entry.path;
    let change = match (from.has_extension(extensions), to.has_extension(extensions)) {
        (true, true) => Change::Renamed(RenamePair {
            from: from.clone(),
            to: to.clone(),
        }),
        (true, false) => Change::Deleted(from.clone()),
        (false, true) => Change::New(to.clone()),
        (false, false) => return None,
    };
    (change.kind() == kind).then_some(change)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Staged changes of `kind` in the working tree.
pub fn status(
    vc: &dyn VersionControl,
    kind: ChangeKind,
    extensions: &[String],
) -> Result<Vec<Change>, DetectError> {
    let entries = vc.status_entries()?;
    Ok(classify(&entries, kind, extensions))
}

/// All staged changes, grouped into a [`PendingChangeSet`].
pub fn detect(vc: &dyn VersionControl, extensions: &[String]) -> Result<PendingChangeSet, DetectError> {
    let entries = vc.status_entries()?;
    let changes = ChangeKind::all()
        .iter()
        .flat_map(|kind| classify(&entries, *kind, extensions));
    let set = PendingChangeSet::from_changes(changes);
    tracing::info!("detected {} staged content change(s)", set.len());
    Ok(set)
}

/// True when any path is both staged and further modified in the work tree.
///
/// The user's intent is ambiguous for such paths, so publishing refuses to run.
pub fn is_status_mixed(vc: &dyn VersionControl) -> Result<bool, DetectError> {
    let entries = vc.status_entries()?;
    let mixed: Vec<_> = entries.iter().filter(|e| e.is_mixed()).collect();
    for entry in &mixed {
        tracing::warn!("mixed status {} for {}", entry.code(), entry.path);
    }
    Ok(!mixed.is_empty())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
