//! `git` subprocess wrapper.
//!
//! Every invocation passes the repository root through
//! [`Command::current_dir`]; nothing here touches the process-wide cwd.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{parse_porcelain_z, DetectError, StatusEntry, VersionControl};

/// A git work tree rooted at `root`.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fail with [`DetectError::ToolUnavailable`] unless `root` is inside a
    /// git work tree.
    pub fn ensure_available(&self) -> Result<(), DetectError> {
        let out = self.run(&["rev-parse", "--is-inside-work-tree"])?;
        if out.trim() == "true" {
            Ok(())
        } else {
            Err(self.unavailable("not inside a work tree"))
        }
    }

    /// Express `path` relative to the repository root when it lies inside it.
    pub fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }

    fn run(&self, args: &[&str]) -> Result<String, DetectError> {
        let command = format!("git {}", args.join(" "));
        tracing::debug!("running `{command}` in {}", self.root.display());

        let output = Command::new("git")
            .current_dir(&self.root)
            .args(args)
            .output()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    self.unavailable("git executable or repository directory not found")
                }
                _ => DetectError::Io(e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("not a git repository") {
                return Err(self.unavailable(&stderr));
            }
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Err(DetectError::CommandFailed {
                command,
                status: output.status.to_string(),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn unavailable(&self, reason: &str) -> DetectError {
        DetectError::ToolUnavailable {
            root: self.root.clone(),
            reason: reason.to_string(),
        }
    }
}

impl VersionControl for GitRepo {
    fn status_entries(&self) -> Result<Vec<StatusEntry>, DetectError> {
        let stdout = self.run(&["status", "--porcelain", "-z"])?;
        parse_porcelain_z(&stdout)
    }

    fn add(&self, paths: &[PathBuf]) -> Result<(), DetectError> {
        if paths.is_empty() {
            return Ok(());
        }
        let rel: Vec<String> = paths
            .iter()
            .map(|p| self.relative(p).to_string_lossy().into_owned())
            .collect();
        let mut args = vec!["add", "--"];
        args.extend(rel.iter().map(String::as_str));
        self.run(&args)?;
        tracing::info!("staged {}", rel.join(", "));
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<(), DetectError> {
        self.run(&["commit", "-m", message])?;
        tracing::info!("committed: {message}");
        Ok(())
    }
}
