//! Decides whether the checkout is stale and, if so, fast-forwards it.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use crate::error::{BenchError, Result};
use crate::types::RevisionPair;

// ---------------------------------------------------------------------------
// RevisionControl
// ---------------------------------------------------------------------------

pub trait RevisionControl {
    /// Refresh remote-tracking metadata without touching the working copy.
    fn fetch(&self) -> Result<()>;
    fn local_head(&self) -> Result<String>;
    fn remote_head(&self) -> Result<String>;
    /// Fast-forward the working copy to the remote revision.
    fn fast_forward(&self) -> Result<()>;
}

/// `git` in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
    remote: String,
    branch: Option<String>,
}

impl Git {
    /// Tracks `remote/branch`, or the current branch's upstream when
    /// `branch` is `None`.
    pub fn new(workdir: &Path, remote: impl Into<String>, branch: Option<String>) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
            remote: remote.into(),
            branch,
        }
    }

    fn remote_ref(&self) -> String {
        match &self.branch {
            Some(b) => format!("{}/{}", self.remote, b),
            None => "@{u}".to_string(),
        }
    }

    fn git(&self, step: &str, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| BenchError::Revision {
                step: step.to_string(),
                message: e.to_string(),
            })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BenchError::Revision {
                step: step.to_string(),
                message: stderr.trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn rev_parse(&self, step: &str, rev: &str) -> Result<String> {
        let out = self.git(step, &["rev-parse", "--verify", rev])?;
        parse_revision(step, &out)
    }
}

impl RevisionControl for Git {
    fn fetch(&self) -> Result<()> {
        self.git("fetch", &["fetch", "--quiet", &self.remote])?;
        Ok(())
    }

    fn local_head(&self) -> Result<String> {
        self.rev_parse("resolve local HEAD", "HEAD")
    }

    fn remote_head(&self) -> Result<String> {
        let r = self.remote_ref();
        self.rev_parse("resolve remote revision", &r)
    }

    fn fast_forward(&self) -> Result<()> {
        let mut args = vec!["pull", "--ff-only", "--quiet"];
        if let Some(b) = &self.branch {
            args.push(&self.remote);
            args.push(b);
        }
        self.git("pull", &args)?;
        Ok(())
    }
}

fn revision_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9a-f]{7,64}$").expect("valid regex"))
}

/// Accept only a bare object id; anything else means git answered with
/// something other than a revision and the cycle must not guess.
fn parse_revision(step: &str, raw: &str) -> Result<String> {
    let rev = raw.trim();
    if revision_regex().is_match(rev) {
        Ok(rev.to_string())
    } else {
        Err(BenchError::Revision {
            step: step.to_string(),
            message: format!("unexpected revision output '{rev}'"),
        })
    }
}

// ---------------------------------------------------------------------------
// SyncGate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncDecision {
    /// Local and remote match; nothing to do.
    UpToDate(RevisionPair),
    /// The working copy was fast-forwarded from `local` to `remote`.
    Updated(RevisionPair),
}

impl SyncDecision {
    pub fn proceed(&self) -> bool {
        matches!(self, SyncDecision::Updated(_))
    }

    pub fn revisions(&self) -> &RevisionPair {
        match self {
            SyncDecision::UpToDate(p) | SyncDecision::Updated(p) => p,
        }
    }
}

pub struct SyncGate {
    revisions: Box<dyn RevisionControl>,
}

impl SyncGate {
    pub fn new(revisions: Box<dyn RevisionControl>) -> Self {
        Self { revisions }
    }

    /// Fetch and resolve both revisions. Never mutates the working copy.
    pub fn status(&self) -> Result<RevisionPair> {
        self.revisions.fetch()?;
        let local = self.revisions.local_head()?;
        let remote = self.revisions.remote_head()?;
        Ok(RevisionPair { local, remote })
    }

    /// Fetch, compare, and fast-forward once if stale.
    pub fn sync(&self) -> Result<SyncDecision> {
        let pair = self.status()?;
        if pair.is_current() {
            tracing::info!(revision = %pair.local, "checkout is current");
            return Ok(SyncDecision::UpToDate(pair));
        }
        tracing::info!(local = %pair.local, remote = %pair.remote, "checkout is stale; fast-forwarding");
        self.revisions.fast_forward()?;
        Ok(SyncDecision::Updated(pair))
    }

    pub fn should_proceed(&self) -> Result<bool> {
        Ok(self.sync()?.proceed())
    }
}
