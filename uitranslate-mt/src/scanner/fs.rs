//! Local checkout scanner

use super::{RepoRef, RepositoryScanner, ScanReport, ScanRequest};
use crate::error::{MtError, MtResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directories never descended into
const SKIPPED_DIRS: [&str; 4] = [".git", "build", "node_modules", "target"];

/// Scans a repository already checked out on disk
///
/// The repository reference and branch are only used in logs; whatever is
/// checked out under `root` is scanned.
#[derive(Debug, Clone)]
pub struct FsScanner {
    root: PathBuf,
}

impl FsScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Root-relative, `/`-separated paths of every file under `root`
fn list_paths(root: &Path, report: &mut ScanReport) -> Vec<String> {
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !SKIPPED_DIRS.contains(&entry.file_name().to_string_lossy().as_ref())
        });

    let mut paths = Vec::new();
    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                if let Ok(relative) = entry.path().strip_prefix(root) {
                    let parts: Vec<_> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    paths.push(parts.join("/"));
                }
            }
            Ok(_) => {}
            Err(e) => {
                let path = e
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                warn!("Skipping unreadable entry {}: {}", path, e);
                report.record_failure(path, e.to_string());
            }
        }
    }
    paths
}

/// Walk and read on the calling thread
fn scan_dir(root: &Path, request: &ScanRequest) -> MtResult<ScanReport> {
    if !root.is_dir() {
        return Err(MtError::ScanError(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let mut report = ScanReport::default();
    let paths = list_paths(root, &mut report);
    for path in request.select(&paths)? {
        match std::fs::read_to_string(root.join(&path)) {
            Ok(content) => {
                report.files.insert(path, content);
            }
            Err(e) => {
                warn!("Skipping {}: {}", path, e);
                report.record_failure(path, e.to_string());
            }
        }
    }
    Ok(report)
}

#[async_trait]
impl RepositoryScanner for FsScanner {
    async fn scan(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        request: &ScanRequest,
    ) -> MtResult<ScanReport> {
        debug!(
            "Scanning {} ({}) from {}",
            repo,
            branch.unwrap_or("checked out branch"),
            self.root.display()
        );

        let root = self.root.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || scan_dir(&root, &request))
            .await
            .map_err(|e| MtError::ScanError(format!("Directory scan task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const XML: &str = r#"<resources><string name="ok">OK</string></resources>"#;

    fn write(root: &Path, relative: &str, content: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn repo() -> RepoRef {
        RepoRef::parse("owner/app").unwrap()
    }

    #[tokio::test]
    async fn test_pattern_matches_found() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "composeApp/src/commonMain/composeResources/values/strings.xml",
            XML.as_bytes(),
        );
        write(
            dir.path(),
            "feature/home/src/androidMain/resources/values/strings.xml",
            XML.as_bytes(),
        );
        write(dir.path(), "docs/strings.xml", XML.as_bytes());

        let report = FsScanner::new(dir.path())
            .scan(&repo(), None, &ScanRequest::default())
            .await
            .unwrap();

        assert_eq!(
            report.files.keys().collect::<Vec<_>>(),
            vec![
                "composeApp/src/commonMain/composeResources/values/strings.xml",
                "feature/home/src/androidMain/resources/values/strings.xml",
            ]
        );
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_filename_fallback_and_skipped_dirs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app/src/main/res/values/strings.xml", XML.as_bytes());
        write(dir.path(), "app/build/intermediates/strings.xml", XML.as_bytes());
        write(dir.path(), ".git/strings.xml", XML.as_bytes());

        let report = FsScanner::new(dir.path())
            .scan(&repo(), Some("main"), &ScanRequest::default())
            .await
            .unwrap();

        assert_eq!(
            report.files.keys().collect::<Vec<_>>(),
            vec!["app/src/main/res/values/strings.xml"]
        );
        assert_eq!(report.files["app/src/main/res/values/strings.xml"], XML);
    }

    #[tokio::test]
    async fn test_undecodable_file_does_not_abort_scan() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/strings.xml", XML.as_bytes());
        write(dir.path(), "b/strings.xml", &[0xff, 0xfe, 0x00, 0x3c]);

        let report = FsScanner::new(dir.path())
            .scan(&repo(), None, &ScanRequest::default())
            .await
            .unwrap();

        assert_eq!(report.files.keys().collect::<Vec<_>>(), vec!["a/strings.xml"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, "b/strings.xml");
    }

    #[tokio::test]
    async fn test_scan_from_spawned_task() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app/src/main/res/values/strings.xml", XML.as_bytes());
        let scanner = FsScanner::new(dir.path());

        let report = tokio::spawn(async move {
            scanner
                .scan(&repo(), None, &ScanRequest::default())
                .await
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(report.files.len(), 1);
    }

    #[test]
    fn test_scan_dir_runs_without_runtime() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a/strings.xml", XML.as_bytes());
        let report = scan_dir(dir.path(), &ScanRequest::default()).unwrap();
        assert_eq!(report.files.keys().collect::<Vec<_>>(), vec!["a/strings.xml"]);
    }

    #[tokio::test]
    async fn test_missing_root_is_error() {
        let dir = TempDir::new().unwrap();
        let result = FsScanner::new(dir.path().join("missing"))
            .scan(&repo(), None, &ScanRequest::default())
            .await;
        assert!(matches!(result, Err(MtError::ScanError(_))));
    }
}
