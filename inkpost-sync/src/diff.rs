//! Unified diff between a published post and its local document.

use similar::TextDiff;

use inkpost_core::{IdentifierStore, PostId, RelPath};

use crate::document::DocumentSource;
use crate::remote::RemoteContentClient;
use crate::SyncError;

/// Diff result for one mapped path. `unified_diff` is empty when the
/// remote body matches the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDiff {
    pub path: RelPath,
    pub id: PostId,
    pub unified_diff: String,
}

impl PostDiff {
    pub fn is_clean(&self) -> bool {
        self.unified_diff.is_empty()
    }
}

/// Compare the remote body of the post mapped to `path` with the local
/// document body. Nothing is written.
pub fn diff_post(
    store: &IdentifierStore,
    remote: &mut dyn RemoteContentClient,
    documents: &dyn DocumentSource,
    path: &RelPath,
) -> Result<PostDiff, SyncError> {
    let id = store
        .lookup_id(path)?
        .ok_or_else(|| SyncError::NotPublished { path: path.clone() })?;
    let published = normalize_line_endings(&remote.fetch(&id)?.body);
    let local = normalize_line_endings(&documents.load(path)?.body);

    let unified_diff = if published == local {
        String::new()
    } else {
        TextDiff::from_lines(&published, &local)
            .unified_diff()
            .header(&format!("a/post/{id}"), &format!("b/{path}"))
            .context_radius(3)
            .to_string()
    };

    Ok(PostDiff {
        path: path.clone(),
        id,
        unified_diff,
    })
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
