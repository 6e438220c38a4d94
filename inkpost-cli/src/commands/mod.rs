pub mod commit;
pub mod diff;
pub mod download;
pub mod push;
pub mod recent;
pub mod status;

use inkpost_core::{DerivedSet, PendingChangeSet};

/// One indented line per pending path, grouped by category.
pub(crate) fn print_pending(set: &PendingChangeSet) {
    if set.is_empty() {
        println!("  (no pending changes)");
        return;
    }
    for path in &set.modified {
        println!("  {:<11} {path}", DerivedSet::Modified);
    }
    for path in &set.new {
        println!("  {:<11} {path}", DerivedSet::New);
    }
    for path in &set.deleted {
        println!("  {:<11} {path}", DerivedSet::Deleted);
    }
    for pair in &set.renamed {
        println!("  {:<11} {pair}", "renamed");
    }
}
