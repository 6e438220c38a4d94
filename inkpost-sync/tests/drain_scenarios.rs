//! End-to-end drain behaviour against in-memory remote and version-control
//! doubles, with real documents, cache file and store.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use inkpost_core::{
    AssumeNo, AssumeYes, IdentifierStore, MappingRecord, PendingChangeCache, PendingChangeSet,
    PostId, RelPath, RenamePair,
};
use inkpost_detector::{parse_porcelain, DetectError, StatusEntry, VersionControl};
use inkpost_sync::{
    pipeline, DrainError, DrainReport, MarkdownDocuments, PostContent, PostSummary,
    PublishOutcome, Publisher, RemoteContentClient, RemoteError, RemotePost, RetryPolicy,
    SyncError,
};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeTree {
    status: &'static str,
    log: RefCell<Vec<String>>,
}

impl VersionControl for FakeTree {
    fn status_entries(&self) -> Result<Vec<StatusEntry>, DetectError> {
        parse_porcelain(self.status)
    }
    fn add(&self, paths: &[PathBuf]) -> Result<(), DetectError> {
        self.log.borrow_mut().push(format!("add {}", paths.len()));
        Ok(())
    }
    fn commit(&self, message: &str) -> Result<(), DetectError> {
        self.log.borrow_mut().push(format!("commit {message}"));
        Ok(())
    }
}

struct FakeRemote {
    next_id: u32,
    posts: BTreeMap<String, PostContent>,
    calls: Vec<String>,
    /// Throttle this many mutations before letting one through.
    rate_limited: u32,
    /// Titles the host rejects as malformed.
    rejected: Vec<String>,
    refuse_deletes: bool,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            next_id: 555,
            posts: BTreeMap::new(),
            calls: Vec::new(),
            rate_limited: 0,
            rejected: Vec::new(),
            refuse_deletes: false,
        }
    }
}

impl FakeRemote {
    fn with_post(mut self, id: &str, title: &str) -> Self {
        self.posts.insert(
            id.to_string(),
            PostContent {
                title: title.to_string(),
                ..PostContent::default()
            },
        );
        self
    }

    fn throttle(&mut self) -> Result<(), RemoteError> {
        if self.rate_limited > 0 {
            self.rate_limited -= 1;
            return Err(RemoteError::RateLimited("one post per 30s".into()));
        }
        Ok(())
    }

    fn check(&self, post: &PostContent) -> Result<(), RemoteError> {
        if self.rejected.contains(&post.title) {
            return Err(RemoteError::MalformedContent("bad markup".into()));
        }
        Ok(())
    }
}

impl RemoteContentClient for FakeRemote {
    fn create(&mut self, post: &PostContent) -> Result<PostId, RemoteError> {
        self.calls.push(format!("create {}", post.title));
        self.throttle()?;
        self.check(post)?;
        let id = self.next_id.to_string();
        self.next_id += 1;
        self.posts.insert(id.clone(), post.clone());
        Ok(PostId::from(id))
    }

    fn update(&mut self, id: &PostId, post: &PostContent) -> Result<bool, RemoteError> {
        self.calls.push(format!("update {id}"));
        self.throttle()?;
        self.check(post)?;
        match self.posts.get_mut(id.as_str()) {
            Some(existing) => {
                *existing = post.clone();
                Ok(true)
            }
            None => Err(RemoteError::NotFound(format!("no post {id}"))),
        }
    }

    fn delete(&mut self, id: &PostId) -> Result<bool, RemoteError> {
        self.calls.push(format!("delete {id}"));
        self.throttle()?;
        if self.refuse_deletes {
            return Err(RemoteError::NotFound("can not be deleted".into()));
        }
        Ok(self.posts.remove(id.as_str()).is_some())
    }

    fn fetch(&mut self, id: &PostId) -> Result<RemotePost, RemoteError> {
        let post = self
            .posts
            .get(id.as_str())
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        Ok(RemotePost {
            id: id.clone(),
            title: post.title.clone(),
            body: post.body.clone(),
            categories: post.categories.clone(),
            link: None,
            created: None,
        })
    }

    fn list_recent(&mut self, limit: usize) -> Result<Vec<PostSummary>, RemoteError> {
        Ok(self
            .posts
            .iter()
            .take(limit)
            .map(|(id, p)| PostSummary {
                id: PostId::from(id.as_str()),
                title: p.title.clone(),
                created: None,
                link: None,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    dir: TempDir,
    vc: FakeTree,
    cache: PendingChangeCache,
    store: IdentifierStore,
    remote: FakeRemote,
    docs: MarkdownDocuments,
}

fn fixture(remote: FakeRemote) -> Fixture {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().expect("tempdir");
    Fixture {
        cache: PendingChangeCache::new(dir.path().join(".inkpost").join("pending.json")),
        store: IdentifierStore::open_in_memory().expect("store"),
        docs: MarkdownDocuments::new(dir.path()),
        vc: FakeTree::default(),
        remote,
        dir,
    }
}

impl Fixture {
    fn write_doc(&self, rel: &str, title: &str, tags: &[&str]) {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        let body = format!(
            "---\ntitle: {title}\ntags: [{}]\n---\nbody of {rel}\n",
            tags.join(", ")
        );
        std::fs::write(path, body).expect("write doc");
    }

    fn map(&mut self, rel: &str, id: &str, title: &str) {
        self.store
            .insert(&MappingRecord::new(rel, id, title))
            .expect("seed mapping");
    }

    fn pend(&self, set: PendingChangeSet) {
        self.cache.persist(&set, &mut AssumeYes).expect("seed cache");
    }

    fn drain(&mut self) -> Result<DrainReport, DrainError> {
        Publisher::new(
            &self.vc,
            &self.cache,
            &mut self.store,
            &mut self.remote,
            &self.docs,
        )
        .with_retry(RetryPolicy {
            interval: Duration::ZERO,
        })
        .drain()
    }

    fn id_of(&self, rel: &str) -> Option<PostId> {
        self.store.lookup_id(&RelPath::from(rel)).expect("lookup")
    }
}

fn modified(paths: &[&str]) -> PendingChangeSet {
    PendingChangeSet {
        modified: paths.iter().map(|p| RelPath::from(*p)).collect(),
        ..PendingChangeSet::default()
    }
}

fn new(paths: &[&str]) -> PendingChangeSet {
    PendingChangeSet {
        new: paths.iter().map(|p| RelPath::from(*p)).collect(),
        ..PendingChangeSet::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn modified_entry_updates_post_and_refreshes_metadata() {
    let mut fx = fixture(FakeRemote::default().with_post("10", "Old"));
    fx.map("a.md", "10", "Old");
    fx.write_doc("a.md", "Fresh Title", &["rust", "cli"]);
    fx.pend(modified(&["a.md"]));

    let report = fx.drain().expect("drain");

    assert_eq!(
        report.outcomes,
        vec![PublishOutcome::Updated {
            path: RelPath::from("a.md"),
            id: PostId::from("10")
        }]
    );
    assert_eq!(fx.remote.calls, vec!["update 10"]);
    let row = fx.store.get(&RelPath::from("a.md")).expect("get").expect("row");
    assert_eq!(row.remote_id, PostId::from("10"));
    assert_eq!(row.title, "Fresh Title");
    assert_eq!(row.tags, vec!["rust", "cli"]);
    assert!(fx.cache.load().expect("load").is_empty());
}

#[test]
fn new_entry_creates_post_and_records_assigned_id() {
    let mut fx = fixture(FakeRemote::default());
    fx.write_doc("b.md", "B", &[]);
    fx.pend(new(&["b.md"]));

    fx.drain().expect("drain");

    assert_eq!(fx.id_of("b.md"), Some(PostId::from("555")));
    assert_eq!(fx.remote.calls, vec!["create B"]);
    assert!(fx.cache.load().expect("load").is_empty());
}

#[test]
fn rename_keeps_identifier() {
    let mut fx = fixture(FakeRemote::default().with_post("9", "C"));
    fx.map("c.md", "9", "C");
    fx.write_doc("d.md", "C", &[]);
    fx.pend(PendingChangeSet {
        renamed: vec![RenamePair::new("c.md", "d.md")],
        ..PendingChangeSet::default()
    });

    let report = fx.drain().expect("drain");

    assert_eq!(
        report.outcomes,
        vec![PublishOutcome::Moved {
            from: RelPath::from("c.md"),
            to: RelPath::from("d.md"),
            id: PostId::from("9")
        }]
    );
    assert_eq!(fx.id_of("d.md"), Some(PostId::from("9")));
    assert_eq!(fx.id_of("c.md"), None);
    assert_eq!(fx.remote.calls, vec!["update 9"]);
    assert_eq!(fx.store.list().expect("list").len(), 1);
}

#[test]
fn rename_without_mapping_publishes_destination() {
    let mut fx = fixture(FakeRemote::default());
    fx.write_doc("d.md", "D", &[]);
    fx.pend(PendingChangeSet {
        renamed: vec![RenamePair::new("c.md", "d.md")],
        ..PendingChangeSet::default()
    });

    fx.drain().expect("drain");

    assert_eq!(fx.id_of("d.md"), Some(PostId::from("555")));
    assert_eq!(fx.remote.calls, vec!["create D"]);
}

#[test]
fn rate_limit_then_success_makes_one_durable_post() {
    let mut fx = fixture(FakeRemote {
        rate_limited: 2,
        ..FakeRemote::default()
    });
    fx.write_doc("b.md", "B", &[]);
    fx.pend(new(&["b.md"]));

    fx.drain().expect("drain");

    assert_eq!(fx.remote.calls, vec!["create B", "create B", "create B"]);
    assert_eq!(fx.remote.posts.len(), 1);
    assert_eq!(fx.store.list().expect("list").len(), 1);
}

#[test]
fn malformed_content_aborts_and_checkpoints_remainder() {
    let mut fx = fixture(FakeRemote {
        rejected: vec!["Bad".to_string()],
        ..FakeRemote::default()
    });
    fx.write_doc("a.md", "A", &[]);
    fx.write_doc("bad.md", "Bad", &[]);
    fx.write_doc("c.md", "C", &[]);
    fx.pend(PendingChangeSet {
        new: vec![RelPath::from("a.md"), RelPath::from("bad.md"), RelPath::from("c.md")],
        deleted: vec![RelPath::from("gone.md")],
        ..PendingChangeSet::default()
    });

    let err = fx.drain().expect_err("malformed content is fatal");

    assert!(
        matches!(
            err,
            DrainError::Remote {
                source: RemoteError::MalformedContent(_),
                ..
            }
        ),
        "got: {err}"
    );
    // a.md was committed before the failure
    assert_eq!(fx.id_of("a.md"), Some(PostId::from("555")));
    assert_eq!(fx.id_of("bad.md"), None);
    let left = fx.cache.load().expect("load");
    assert_eq!(left.new, vec![RelPath::from("bad.md"), RelPath::from("c.md")]);
    assert_eq!(left.deleted, vec![RelPath::from("gone.md")]);
}

#[test]
fn empty_drain_makes_no_calls_and_leaves_empty_cache() {
    let mut fx = fixture(FakeRemote::default());
    fx.pend(PendingChangeSet::default());

    let report = fx.drain().expect("drain");

    assert!(report.is_empty());
    assert!(fx.remote.calls.is_empty());
    let raw = std::fs::read_to_string(fx.cache.path()).expect("cache written");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(value, serde_json::json!([[], [], [], []]));
}

#[test]
fn empty_drain_without_cache_file_creates_none() {
    let mut fx = fixture(FakeRemote::default());

    let report = fx.drain().expect("drain");

    assert!(report.is_empty());
    assert!(!fx.cache.path().exists());
}

#[test]
fn refused_delete_still_drops_mapping() {
    let mut fx = fixture(FakeRemote {
        refuse_deletes: true,
        ..FakeRemote::default()
    });
    fx.map("x.md", "7", "Stubborn");
    fx.pend(PendingChangeSet {
        deleted: vec![RelPath::from("x.md")],
        ..PendingChangeSet::default()
    });

    let report = fx.drain().expect("refusal is not fatal");

    assert_eq!(
        report.outcomes,
        vec![PublishOutcome::DeleteRefused {
            path: RelPath::from("x.md"),
            id: PostId::from("7"),
            title: "Stubborn".into()
        }]
    );
    assert_eq!(fx.id_of("x.md"), None);
}

#[test]
fn delete_of_unpublished_path_is_skipped() {
    let mut fx = fixture(FakeRemote::default());
    fx.pend(PendingChangeSet {
        deleted: vec![RelPath::from("never.md")],
        ..PendingChangeSet::default()
    });

    let report = fx.drain().expect("drain");

    assert!(matches!(report.outcomes[0], PublishOutcome::Skipped { .. }));
    assert!(fx.remote.calls.is_empty());
}

#[test]
fn dead_mapping_is_recreated() {
    let mut fx = fixture(FakeRemote::default());
    fx.map("a.md", "10", "A");
    fx.write_doc("a.md", "A", &[]);
    fx.pend(modified(&["a.md"]));

    let report = fx.drain().expect("drain");

    assert_eq!(
        report.outcomes,
        vec![PublishOutcome::Recreated {
            path: RelPath::from("a.md"),
            old: PostId::from("10"),
            id: PostId::from("555")
        }]
    );
    assert_eq!(fx.remote.calls, vec!["update 10", "create A"]);
    assert_eq!(fx.id_of("a.md"), Some(PostId::from("555")));
    assert_eq!(fx.store.list().expect("list").len(), 1);
}

#[test]
fn title_match_moves_mapping_to_new_path() {
    let mut fx = fixture(FakeRemote::default().with_post("42", "Moved Post"));
    fx.map("untracked/old.md", "42", "Moved Post");
    fx.write_doc("posts/new.md", "Moved Post", &[]);
    fx.pend(new(&["posts/new.md"]));

    fx.drain().expect("drain");

    assert_eq!(fx.remote.calls, vec!["update 42"]);
    assert_eq!(fx.id_of("posts/new.md"), Some(PostId::from("42")));
    assert_eq!(fx.id_of("untracked/old.md"), None);
}

#[test]
fn same_title_with_live_owner_publishes_separately() {
    let mut fx = fixture(FakeRemote::default().with_post("1", "index"));
    fx.map("a/index.md", "1", "index");
    std::fs::create_dir_all(fx.dir.path().join("a")).expect("mkdir a");
    std::fs::create_dir_all(fx.dir.path().join("b")).expect("mkdir b");
    std::fs::write(fx.dir.path().join("a/index.md"), "alpha\n").expect("write a");
    std::fs::write(fx.dir.path().join("b/index.md"), "beta\n").expect("write b");
    fx.pend(new(&["b/index.md"]));

    let report = fx.drain().expect("drain");

    assert_eq!(
        report.outcomes,
        vec![PublishOutcome::Created {
            path: RelPath::from("b/index.md"),
            id: PostId::from("555")
        }]
    );
    assert_eq!(fx.remote.calls, vec!["create index"]);
    assert_eq!(fx.id_of("a/index.md"), Some(PostId::from("1")));
    assert_eq!(fx.id_of("b/index.md"), Some(PostId::from("555")));
    assert_eq!(fx.remote.posts["1"].body, "");
}

#[test]
fn ambiguous_title_publishes_as_new() {
    let mut fx = fixture(FakeRemote::default());
    fx.map("old/one.md", "1", "Twin");
    fx.map("old/two.md", "2", "Twin");
    fx.write_doc("posts/three.md", "Twin", &[]);
    fx.pend(new(&["posts/three.md"]));

    fx.drain().expect("ambiguity is not fatal");

    assert_eq!(fx.remote.calls, vec!["create Twin"]);
    assert_eq!(fx.id_of("posts/three.md"), Some(PostId::from("555")));
    assert_eq!(fx.id_of("old/one.md"), Some(PostId::from("1")));
}

#[test]
fn mixed_tree_refuses_before_touching_anything() {
    let mut fx = fixture(FakeRemote::default());
    fx.vc.status = "AM b.md\n";
    fx.write_doc("b.md", "B", &[]);
    fx.pend(new(&["b.md"]));

    let err = fx.drain().expect_err("mixed");

    assert!(matches!(err, DrainError::MixedStatus));
    assert!(fx.remote.calls.is_empty());
    assert_eq!(fx.cache.load().expect("load"), new(&["b.md"]));
}

#[test]
fn modified_then_new_then_deleted_then_renamed() {
    let mut fx = fixture(
        FakeRemote::default()
            .with_post("1", "M")
            .with_post("2", "D")
            .with_post("3", "R"),
    );
    fx.map("m.md", "1", "M");
    fx.map("gone.md", "2", "D");
    fx.map("r.md", "3", "R");
    fx.write_doc("m.md", "M", &[]);
    fx.write_doc("n.md", "N", &[]);
    fx.write_doc("r2.md", "R", &[]);
    fx.pend(PendingChangeSet {
        modified: vec![RelPath::from("m.md")],
        deleted: vec![RelPath::from("gone.md")],
        new: vec![RelPath::from("n.md")],
        renamed: vec![RenamePair::new("r.md", "r2.md")],
    });

    fx.drain().expect("drain");

    assert_eq!(
        fx.remote.calls,
        vec!["update 1", "create N", "delete 2", "update 3"]
    );
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

#[test]
fn push_requires_pulled_confirmation() {
    let mut fx = fixture(FakeRemote::default());
    fx.write_doc("b.md", "B", &[]);
    fx.pend(new(&["b.md"]));

    let vc = FakeTree::default();
    let mut publisher = Publisher::new(&vc, &fx.cache, &mut fx.store, &mut fx.remote, &fx.docs);
    let err = pipeline::push(&vc, &mut publisher, &[], &mut AssumeNo).expect_err("declined");
    drop(publisher);

    assert!(matches!(err, SyncError::Declined));
    assert!(fx.remote.calls.is_empty());
    assert!(vc.log.borrow().is_empty());
}

#[test]
fn push_commits_cache_and_store_after_drain() {
    let mut fx = fixture(FakeRemote::default());
    fx.write_doc("b.md", "B", &[]);
    fx.pend(new(&["b.md"]));
    let tracked = vec![fx.cache.path().to_path_buf(), fx.dir.path().join("posts.db")];

    let vc = FakeTree::default();
    let mut publisher = Publisher::new(&vc, &fx.cache, &mut fx.store, &mut fx.remote, &fx.docs);
    let report = pipeline::push(&vc, &mut publisher, &tracked, &mut AssumeYes).expect("push");
    drop(publisher);

    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(*vc.log.borrow(), vec!["add 2", "commit publish posts"]);
}

#[test]
fn commit_merges_staged_changes_into_cache() {
    let fx = fixture(FakeRemote::default());
    fx.pend(new(&["draft.md"]));
    let vc = FakeTree {
        status: "M  a.md\nR  draft.md -> posts/final.md\nA  img.png\n",
        ..FakeTree::default()
    };

    let outcome = pipeline::commit(&vc, &fx.cache, &["md".to_string()], &mut AssumeYes, Some("notes"))
        .expect("commit");

    let expected = PendingChangeSet {
        modified: vec![RelPath::from("a.md")],
        new: vec![RelPath::from("posts/final.md")],
        ..PendingChangeSet::default()
    };
    assert_eq!(outcome.pending, expected);
    assert_eq!(fx.cache.load().expect("load"), expected);
    assert_eq!(*vc.log.borrow(), vec!["add 1", "commit notes"]);
}

#[test]
fn declined_commit_leaves_cache_alone() {
    let fx = fixture(FakeRemote::default());
    let vc = FakeTree {
        status: "A  a.md\n",
        ..FakeTree::default()
    };

    let err = pipeline::commit(&vc, &fx.cache, &["md".to_string()], &mut AssumeNo, None)
        .expect_err("declined");

    assert!(matches!(err, SyncError::Declined));
    assert!(!fx.cache.path().exists());
    assert!(vc.log.borrow().is_empty());
}

#[test]
fn commit_refuses_mixed_tree() {
    let fx = fixture(FakeRemote::default());
    let vc = FakeTree {
        status: "MM a.md\n",
        ..FakeTree::default()
    };
    let err = pipeline::commit(&vc, &fx.cache, &["md".to_string()], &mut AssumeYes, None)
        .expect_err("mixed");
    assert!(matches!(err, SyncError::MixedStatus));
}

// ---------------------------------------------------------------------------
// Download and diff
// ---------------------------------------------------------------------------

#[test]
fn download_by_title_writes_body_to_id_file() {
    let mut fx = fixture(FakeRemote::default());
    fx.remote.posts.insert(
        "31".into(),
        PostContent {
            title: "Rust Notes".into(),
            body: "remote body\n".into(),
            ..PostContent::default()
        },
    );
    fx.map("rust.md", "31", "Rust Notes");
    let out = fx.dir.path().join("bak");

    let path = inkpost_sync::download(&fx.store, &mut fx.remote, "Rust Notes", &out).expect("download");

    assert_eq!(path, out.join("31.md"));
    assert_eq!(std::fs::read_to_string(path).expect("read"), "remote body\n");
}

#[test]
fn diff_shows_local_edits_against_published_body() {
    let mut fx = fixture(FakeRemote::default());
    fx.write_doc("a.md", "A", &[]);
    fx.map("a.md", "1", "A");
    fx.remote.posts.insert(
        "1".into(),
        PostContent {
            title: "A".into(),
            body: "body of a.md\n".into(),
            ..PostContent::default()
        },
    );

    let clean = inkpost_sync::diff_post(&fx.store, &mut fx.remote, &fx.docs, &RelPath::from("a.md"))
        .expect("diff");
    assert!(clean.is_clean());

    std::fs::write(fx.dir.path().join("a.md"), "---\ntitle: A\n---\nbody of a.md\nmore\n").expect("edit");
    let dirty = inkpost_sync::diff_post(&fx.store, &mut fx.remote, &fx.docs, &RelPath::from("a.md"))
        .expect("diff");
    assert!(dirty.unified_diff.contains("--- a/post/1"));
    assert!(dirty.unified_diff.contains("+++ b/a.md"));
    assert!(dirty.unified_diff.contains("+more"));
}
