//! Read-only remote operations: downloading a post and listing recent ones.

use std::path::{Path, PathBuf};

use inkpost_core::{IdentifierStore, PostId};

use crate::error::{io_err, SyncError};
use crate::remote::{PostSummary, RemoteContentClient};

/// Resolve `query` to a post id: all-digit input is taken as an id as-is,
/// anything else is looked up as a title in the store.
pub fn resolve_post(store: &IdentifierStore, query: &str) -> Result<PostId, SyncError> {
    let query = query.trim();
    if !query.is_empty() && query.chars().all(|c| c.is_ascii_digit()) {
        return Ok(PostId::from(query));
    }
    store
        .lookup_id_by_title(query)?
        .ok_or_else(|| SyncError::UnknownPost {
            query: query.to_string(),
        })
}

/// Fetch a post's body and save it as `<dir>/<id>.md`.
pub fn download(
    store: &IdentifierStore,
    remote: &mut dyn RemoteContentClient,
    query: &str,
    dir: &Path,
) -> Result<PathBuf, SyncError> {
    let id = resolve_post(store, query)?;
    let post = remote.fetch(&id)?;
    let target = dir.join(format!("{id}.md"));
    atomic_write(&target, &post.body)?;
    tracing::info!("downloaded post {id} to {}", target.display());
    Ok(target)
}

pub fn recent(
    remote: &mut dyn RemoteContentClient,
    limit: usize,
) -> Result<Vec<PostSummary>, SyncError> {
    Ok(remote.list_recent(limit)?)
}

/// Write `content` to `<path>.inkpost.tmp`, then rename into place.
pub(crate) fn atomic_write(path: &Path, content: &str) -> Result<(), SyncError> {
    let tmp = PathBuf::from(format!("{}.inkpost.tmp", path.display()));
    atomic_write_with_tmp(path, content, &tmp)
}

fn atomic_write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    if let Some(tmp_parent) = tmp.parent() {
        std::fs::create_dir_all(tmp_parent).map_err(|e| io_err(tmp_parent, e))?;
    }
    std::fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;

    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }
    tracing::debug!("wrote: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkpost_core::MappingRecord;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn digits_are_ids_and_text_is_a_title() {
        let mut store = IdentifierStore::open_in_memory().unwrap();
        store
            .insert(&MappingRecord::new("a.md", "31", "Rust Notes"))
            .unwrap();

        assert_eq!(resolve_post(&store, "12944353").unwrap(), PostId::from("12944353"));
        assert_eq!(resolve_post(&store, "Rust Notes").unwrap(), PostId::from("31"));
        assert!(matches!(
            resolve_post(&store, "Nope"),
            Err(SyncError::UnknownPost { .. })
        ));
    }

    #[test]
    fn atomic_write_creates_parents_and_cleans_tmp() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bak").join("7.md");
        atomic_write(&path, "body").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "body");
        assert!(!PathBuf::from(format!("{}.inkpost.tmp", path.display())).exists());
    }

    #[test]
    #[cfg(unix)]
    fn rename_failure_leaves_original_and_cleans_tmp() {
        use std::os::unix::fs::PermissionsExt;

        let root = TempDir::new().unwrap();
        let readonly_dir = root.path().join("readonly");
        fs::create_dir_all(&readonly_dir).unwrap();
        let path = readonly_dir.join("7.md");
        fs::write(&path, "original").unwrap();

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o555);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        let tmp_dir = TempDir::new().unwrap();
        let tmp_path = tmp_dir.path().join("7.md.inkpost.tmp");
        let result = atomic_write_with_tmp(&path, "new", &tmp_path);

        let mut perms = fs::metadata(&readonly_dir).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&readonly_dir, perms).unwrap();

        // root ignores directory permissions; only check when the rename failed
        if result.is_err() {
            assert_eq!(fs::read_to_string(&path).unwrap(), "original");
            assert!(!tmp_path.exists(), "tmp file should be cleaned up");
        }
    }
}
