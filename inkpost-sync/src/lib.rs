//! # inkpost-sync
//!
//! Publishing pending changes to a MetaWeblog host.
//!
//! [`pipeline::commit`] records staged changes in the pending cache;
//! [`pipeline::push`] drains them through a [`Publisher`], which talks to a
//! [`RemoteContentClient`] (normally [`MetaWeblogClient`]) and keeps the
//! post identifier store in step.

pub mod diff;
pub mod document;
pub mod error;
pub mod fetch;
pub mod metaweblog;
pub mod pipeline;
pub mod publish;
pub mod remote;
pub mod xmlrpc;

pub use diff::{diff_post, PostDiff};
pub use document::{Document, DocumentSource, MarkdownDocuments};
pub use error::{DocumentError, DrainError, SyncError};
pub use fetch::{download, recent, resolve_post};
pub use metaweblog::{Credentials, MetaWeblogClient};
pub use pipeline::{commit, push, CommitOutcome};
pub use publish::{DrainPhase, DrainReport, PublishOutcome, Publisher, RetryPolicy};
pub use remote::{PostContent, PostSummary, RemoteContentClient, RemoteError, RemotePost};
