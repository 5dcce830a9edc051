//! GitHub REST API scanner

use super::{RepoRef, RepositoryScanner, ScanReport, ScanRequest};
use crate::error::{MtError, MtResult};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    /// Personal access token; empty means unauthenticated requests
    pub token: String,
    pub api_base: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: 30,
            user_agent: concat!("uitranslate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl GithubConfig {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for GithubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubConfig")
            .field("token", &if self.token.is_empty() { "<unset>" } else { "***" })
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct Tree {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

/// Scans repositories through the GitHub REST API
#[derive(Debug)]
pub struct GithubScanner {
    config: GithubConfig,
    client: reqwest::Client,
}

impl GithubScanner {
    pub fn new(config: GithubConfig) -> MtResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MtError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn api_url(&self, segments: &[&str]) -> MtResult<Url> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| MtError::ConfigError(format!("Invalid GitHub API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| MtError::ConfigError("GitHub API base cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> MtResult<T> {
        debug!("GET {}", url);
        let mut request = self
            .client
            .get(url.clone())
            .header("Accept", "application/vnd.github+json");
        if !self.config.token.is_empty() {
            request = request.bearer_auth(&self.config.token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("GitHub API returned {} for {}: {}", status, url.path(), body);
            return Err(if status.is_client_error() {
                MtError::ScanError(message)
            } else {
                MtError::NetworkError(message)
            });
        }
        Ok(response.json::<T>().await?)
    }

    async fn default_branch(&self, repo: &RepoRef) -> MtResult<String> {
        let url = self.api_url(&["repos", &repo.owner, &repo.name])?;
        let info: RepoInfo = self.get_json(url).await?;
        Ok(info.default_branch)
    }

    /// Every blob path on `branch`
    async fn list_paths(&self, repo: &RepoRef, branch: &str) -> MtResult<Vec<String>> {
        let mut url = self.api_url(&["repos", &repo.owner, &repo.name, "git", "trees", branch])?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let tree: Tree = self.get_json(url).await?;
        if tree.truncated {
            warn!(
                "Tree listing of {} was truncated by GitHub; some files may be missing",
                repo
            );
        }
        Ok(tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect())
    }

    async fn fetch_file(&self, repo: &RepoRef, branch: &str, path: &str) -> MtResult<String> {
        let mut segments = vec!["repos", repo.owner.as_str(), repo.name.as_str(), "contents"];
        segments.extend(path.split('/'));
        let mut url = self.api_url(&segments)?;
        url.query_pairs_mut().append_pair("ref", branch);

        let file: FileContent = self.get_json(url).await?;
        if file.encoding != "base64" {
            return Err(MtError::ScanError(format!(
                "Unsupported content encoding '{}'",
                file.encoding
            )));
        }
        decode_content(&file.content).map_err(MtError::ScanError)
    }
}

/// Decode a base64 contents payload (GitHub wraps it at 60 columns)
pub fn decode_content(encoded: &str) -> Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| format!("Invalid base64 content: {}", e))?;
    String::from_utf8(bytes).map_err(|e| format!("Content is not valid UTF-8: {}", e))
}

#[async_trait]
impl RepositoryScanner for GithubScanner {
    async fn scan(
        &self,
        repo: &RepoRef,
        branch: Option<&str>,
        request: &ScanRequest,
    ) -> MtResult<ScanReport> {
        let branch = match branch.or(repo.branch.as_deref()) {
            Some(branch) => branch.to_string(),
            None => self.default_branch(repo).await?,
        };
        info!("Scanning {} on branch {}", repo.full_name(), branch);

        let paths = self.list_paths(repo, &branch).await?;
        let selected = request.select(&paths)?;
        debug!("{} of {} paths selected", selected.len(), paths.len());

        let mut report = ScanReport::default();
        for path in selected {
            match self.fetch_file(repo, &branch, &path).await {
                Ok(content) => {
                    report.files.insert(path, content);
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path, e);
                    report.record_failure(path, e.to_string());
                }
            }
        }
        info!(
            "Found {} file(s) in {} ({} failed)",
            report.files.len(),
            repo.full_name(),
            report.failures.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scanner() -> GithubScanner {
        GithubScanner::new(GithubConfig::default()).unwrap()
    }

    #[test]
    fn test_decode_content_with_line_breaks() {
        let encoded = STANDARD.encode("<resources>\n  <string name=\"ok\">OK</string>\n</resources>");
        let wrapped: String = encoded
            .as_bytes()
            .chunks(60)
            .map(|chunk| format!("{}\n", std::str::from_utf8(chunk).unwrap()))
            .collect();
        assert_eq!(
            decode_content(&wrapped).unwrap(),
            "<resources>\n  <string name=\"ok\">OK</string>\n</resources>"
        );
    }

    #[test]
    fn test_decode_content_errors() {
        assert!(decode_content("!!!not base64!!!").unwrap_err().contains("base64"));
        let invalid_utf8 = STANDARD.encode([0xff, 0xfe, 0xfd]);
        assert!(decode_content(&invalid_utf8).unwrap_err().contains("UTF-8"));
    }

    #[test]
    fn test_api_url_escapes_segments() {
        let url = scanner()
            .api_url(&["repos", "owner", "repo", "contents", "res", "values fr", "strings.xml"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/owner/repo/contents/res/values%20fr/strings.xml"
        );
    }

    #[test]
    fn test_api_url_with_base_path() {
        let config = GithubConfig {
            api_base: "https://ghe.example.com/api/v3/".to_string(),
            ..GithubConfig::default()
        };
        let url = GithubScanner::new(config)
            .unwrap()
            .api_url(&["repos", "o", "r"])
            .unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/repos/o/r");
    }

    #[test]
    fn test_debug_masks_token() {
        let printed = format!("{:?}", GithubConfig::with_token("ghp_secret"));
        assert!(!printed.contains("ghp_secret"));
        assert!(printed.contains("***"));
    }

    #[test]
    fn test_tree_listing_keeps_blobs() {
        let tree: Tree = serde_json::from_str(
            r#"{"sha": "abc", "tree": [
                {"path": "app", "type": "tree"},
                {"path": "app/strings.xml", "type": "blob"}
            ], "truncated": false}"#,
        )
        .unwrap();
        let blobs: Vec<_> = tree
            .tree
            .into_iter()
            .filter(|entry| entry.kind == "blob")
            .map(|entry| entry.path)
            .collect();
        assert_eq!(blobs, vec!["app/strings.xml"]);
    }

    #[tokio::test]
    #[ignore] // Requires GITHUB_TOKEN and network access
    async fn test_live_scan() {
        let token = std::env::var("GITHUB_TOKEN").expect("GITHUB_TOKEN not set");
        let scanner = GithubScanner::new(GithubConfig::with_token(token)).unwrap();
        let repo = RepoRef::parse("https://github.com/openMF/mifos-mobile").unwrap();
        let report = scanner
            .scan(&repo, None, &ScanRequest::default())
            .await
            .unwrap();
        assert!(!report.files.is_empty());
    }
}
