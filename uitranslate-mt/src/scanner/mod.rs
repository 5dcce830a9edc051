//! Repository scanning for string resource files
//!
//! A scan lists every file of a repository, selects resource files by glob
//! pattern (falling back to an exact file name), and returns their content
//! keyed by repository path. Files that cannot be fetched or decoded are
//! reported next to the results instead of failing the scan.

pub mod fs;
pub mod github;

pub use fs::FsScanner;
pub use github::{GithubConfig, GithubScanner};

use crate::error::{MtError, MtResult};
use async_trait::async_trait;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where Compose Multiplatform projects keep their default `strings.xml`
pub const DEFAULT_PATTERNS: [&str; 5] = [
    "*/src/commonMain/composeResources/values/strings.xml",
    "*/*/src/commonMain/composeResources/values/strings.xml",
    "feature/*/src/commonMain/composeResources/values/strings.xml",
    "feature/*/src/*/composeResources/values/strings.xml",
    "feature/*/src/*/resources/values/strings.xml",
];

pub const DEFAULT_FILENAME: &str = "strings.xml";

/// A GitHub repository named by URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    /// Branch taken from a `/tree/<branch>` URL
    pub branch: Option<String>,
}

impl RepoRef {
    /// Parse `https://github.com/owner/repo[/tree/branch/...]` or `owner/repo`
    pub fn parse(url: &str) -> MtResult<Self> {
        let url = url.trim();
        let (base, branch) = match url.split_once("/tree/") {
            Some((base, rest)) => {
                let branch = rest.split('/').next().filter(|b| !b.is_empty());
                (base, branch.map(str::to_string))
            }
            None => (url, None),
        };

        let base = base
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/');
        let segments: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();
        let [.., owner, name] = segments.as_slice() else {
            return Err(MtError::ScanError(format!(
                "Invalid repository URL '{}': expected owner/repo",
                url
            )));
        };
        let name = name.trim_end_matches(".git");
        if (segments.len() == 2 && owner.contains('.')) || name.is_empty() {
            return Err(MtError::ScanError(format!(
                "Invalid repository URL '{}': expected owner/repo",
                url
            )));
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            branch,
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.branch {
            Some(branch) => write!(f, "{}/{}@{}", self.owner, self.name, branch),
            None => write!(f, "{}/{}", self.owner, self.name),
        }
    }
}

/// Which files a scan selects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanRequest {
    /// Globs over repository paths; `*` stays inside one path segment
    pub patterns: Vec<String>,
    /// Exact file name searched at any depth when patterns find nothing
    pub filename: String,
    pub pattern_search: bool,
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            patterns: DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect(),
            filename: DEFAULT_FILENAME.to_string(),
            pattern_search: true,
        }
    }
}

impl ScanRequest {
    fn glob_set(&self) -> MtResult<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.patterns {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    MtError::ScanError(format!("Invalid pattern '{}': {}", pattern, e))
                })?;
            builder.add(glob);
        }
        builder
            .build()
            .map_err(|e| MtError::ScanError(format!("Failed to build pattern set: {}", e)))
    }

    /// Pick resource paths out of a repository listing
    ///
    /// Paths are `/`-separated and relative to the repository root. Pattern
    /// matches win; when there are none (or pattern search is off) every
    /// path whose file name equals `filename` is selected.
    pub fn select(&self, paths: &[String]) -> MtResult<Vec<String>> {
        if self.pattern_search && !self.patterns.is_empty() {
            let set = self.glob_set()?;
            let matched: Vec<String> = paths
                .iter()
                .filter(|path| set.is_match(path.as_str()))
                .cloned()
                .collect();
            if !matched.is_empty() {
                return Ok(matched);
            }
        }

        Ok(paths
            .iter()
            .filter(|path| path.rsplit('/').next() == Some(self.filename.as_str()))
            .cloned()
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFailure {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Path → raw file text
    pub files: IndexMap<String, String>,
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    pub fn record_failure(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(ScanFailure {
            path: path.into(),
            reason: reason.into(),
        });
    }
}

/// Source of resource files
#[async_trait]
pub trait RepositoryScanner: Send + Sync {
    /// Scan `repo` at `branch` (or the branch named in the reference, or the
    /// default branch)
    async fn scan(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        request: &ScanRequest,
    ) -> MtResult<ScanReport>;
}
