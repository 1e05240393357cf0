// ABOUTME: Collects the changed-file set from a git repository for impact analysis.
// ABOUTME: Supports staged, unstaged, and range diffs plus optional untracked files.
use std::collections::HashSet;
use std::path::PathBuf;

use git2::{Delta, DiffOptions, ErrorCode, Repository, RepositoryOpenFlags, StatusOptions, Tree};
use testscope_core::{Config, DiffMode};
use tracing::debug;

use crate::errors::{ChangeDetectionError, Result};

/// Discovers changed source files according to the configured diff mode.
pub struct ChangeDetector<'a> {
    config: &'a Config,
}

impl<'a> ChangeDetector<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    pub fn collect(&self) -> Result<Vec<PathBuf>> {
        let root = &self.config.root;
        let repo = Repository::open_ext(
            root,
            RepositoryOpenFlags::empty(),
            &[] as &[&std::ffi::OsStr],
        )
        .map_err(|_| ChangeDetectionError::RepoNotFound(root.display().to_string()))?;

        let mut relative: Vec<PathBuf> = Vec::new();
        let mut opts = DiffOptions::new();

        let diff = match self.config.diff.mode {
            DiffMode::Staged => {
                let head = head_tree(&repo)?;
                repo.diff_tree_to_index(head.as_ref(), None, Some(&mut opts))?
            }
            DiffMode::Unstaged => repo.diff_index_to_workdir(None, Some(&mut opts))?,
            DiffMode::Range => {
                let (Some(base), Some(head)) =
                    (&self.config.diff.base, &self.config.diff.head)
                else {
                    return Err(ChangeDetectionError::MissingRangeRevisions);
                };
                let base_tree = revision_tree(&repo, base)?;
                let head_tree = revision_tree(&repo, head)?;
                repo.diff_tree_to_tree(Some(&base_tree), Some(&head_tree), Some(&mut opts))?
            }
        };

        for delta in diff.deltas() {
            if !self.filter_allows(delta.status()) {
                continue;
            }
            if let Some(path) = delta.new_file().path() {
                relative.push(path.to_path_buf());
            }
        }

        if self.config.diff.include_untracked {
            let mut status_opts = StatusOptions::new();
            status_opts
                .include_untracked(true)
                .recurse_untracked_dirs(true)
                .include_ignored(false);
            let statuses = repo.statuses(Some(&mut status_opts))?;
            for entry in statuses.iter() {
                if !entry.status().is_wt_new() {
                    continue;
                }
                if let Some(path) = entry.path() {
                    relative.push(PathBuf::from(path));
                }
            }
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut changed: Vec<PathBuf> = Vec::new();
        for rel in relative {
            let path = root.join(&rel);
            if !seen.insert(path.clone()) {
                continue;
            }
            if !path.exists() {
                continue;
            }
            let matches_suffix = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .is_some_and(|name| {
                    self.config
                        .source_suffixes
                        .iter()
                        .any(|suffix| name.ends_with(suffix.as_str()))
                });
            if !matches_suffix {
                continue;
            }
            changed.push(path);
        }

        debug!("collected {} changed files", changed.len());
        Ok(changed)
    }

    /// Delta statuses pass through the configured `git diff --diff-filter`
    /// letters (A, C, D, M, R, T).
    fn filter_allows(&self, status: Delta) -> bool {
        let letter = match status {
            Delta::Added => 'A',
            Delta::Copied => 'C',
            Delta::Deleted => 'D',
            Delta::Modified => 'M',
            Delta::Renamed => 'R',
            Delta::Typechange => 'T',
            _ => return false,
        };
        self.config.diff.diff_filter.contains(letter)
    }
}

fn head_tree(repo: &Repository) -> Result<Option<Tree<'_>>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_tree()?)),
        // An unborn branch has no tree yet; every index entry is an addition.
        Err(e) if e.code() == ErrorCode::UnbornBranch || e.code() == ErrorCode::NotFound => {
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn revision_tree<'repo>(repo: &'repo Repository, revision: &str) -> Result<Tree<'repo>> {
    let commit = repo.revparse_single(revision)?.peel_to_commit()?;
    Ok(commit.tree()?)
}
