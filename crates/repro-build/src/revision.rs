//! Revision to commit resolution
//!
//! A testcase names a commit position (a monotonically increasing integer).
//! Builds need a git sha, which is obtained either directly from the
//! commit-numbering service or, for projects pinned by a parent project's
//! `DEPS` manifest, by reading the pin at the parent's commit.

use crate::error::{BuildError, BuildResult};
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Commit-numbering service endpoint
const NUMBERING_ENDPOINT: &str = "https://cr-rev.appspot.com/_ah/api/crrev/v1/get_numbering";

/// Host serving pinned-dependency manifests
const MANIFEST_HOST: &str = "https://chromium.googlesource.com";

/// Numbering namespace: commit position on the default branch
const NUMBERING_TYPE: &str = "COMMIT_POSITION";
const NUMBERING_IDENTIFIER: &str = "refs/heads/master";

const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches the body of a URL as text
pub trait Fetcher {
    fn fetch(&self, url: &str) -> BuildResult<String>;
}

/// [`Fetcher`] backed by a blocking HTTP client
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> BuildResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| BuildError::resolution("<http client>", e))?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> BuildResult<String> {
        debug!(url, "fetching");
        let response = self.client.get(url).send().map_err(|e| {
            let reason = if e.is_timeout() {
                format!("request timeout after {} seconds", FETCH_TIMEOUT.as_secs())
            } else if e.is_connect() {
                format!("connection error: {}", e)
            } else {
                format!("network error: {}", e)
            };
            BuildError::resolution(url, reason)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BuildError::resolution(url, format!("HTTP {}", status)));
        }
        response.text().map_err(|e| BuildError::resolution(url, e))
    }
}

#[derive(Debug, Deserialize)]
struct Numbering {
    git_sha: Option<String>,
}

/// Numbering-service URL for `revision` in `repo` (e.g. `v8/v8`)
pub fn numbering_url(revision: u64, repo: &str) -> String {
    let params = [
        ("project", "chromium".to_string()),
        ("repo", repo.to_string()),
        ("number", revision.to_string()),
        ("numbering_type", NUMBERING_TYPE.to_string()),
        ("numbering_identifier", NUMBERING_IDENTIFIER.to_string()),
    ];
    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    format!("{}?{}", NUMBERING_ENDPOINT, query)
}

/// Resolve a commit position to its git sha through the numbering service
pub fn sha_from_revision(fetcher: &dyn Fetcher, revision: u64, repo: &str) -> BuildResult<String> {
    let url = numbering_url(revision, repo);
    let body = fetcher.fetch(&url)?;
    let numbering: Numbering =
        serde_json::from_str(&body).map_err(|e| BuildError::resolution(&url, e))?;
    numbering
        .git_sha
        .ok_or_else(|| BuildError::resolution(&url, "response has no git_sha field"))
}

/// `DEPS` manifest URL of `parent_repo` at `parent_sha`
pub fn deps_url(parent_repo: &str, parent_sha: &str) -> String {
    format!(
        "{}/{}.git/+/{}/DEPS?format=TEXT",
        MANIFEST_HOST, parent_repo, parent_sha
    )
}

/// Find the `'<component>_revision': '<sha>'` pin in decoded manifest text.
///
/// Only the first quoted token after the key is taken, so trailing commas
/// and comments on the line are ignored.
pub fn parse_pin(manifest: &str, component: &str) -> Option<String> {
    let key = format!("'{}_revision':", component);
    let line = manifest.lines().find(|line| line.contains(&key))?;
    let (_, value) = line.split_once(&key)?;
    let value = value.trim_start();
    let quote = value.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let (sha, _) = value[1..].split_once(quote)?;
    let sha = sha.trim();
    if !sha.is_empty() && sha.chars().all(|c| c.is_ascii_alphanumeric()) {
        Some(sha.to_string())
    } else {
        None
    }
}

/// Read the sha `parent_repo` pins `component` to at `parent_sha`
pub fn pinned_sha(
    fetcher: &dyn Fetcher,
    parent_repo: &str,
    parent_sha: &str,
    component: &str,
) -> BuildResult<String> {
    let url = deps_url(parent_repo, parent_sha);
    let body = fetcher.fetch(&url)?;
    let encoded: String = body.split_whitespace().collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| BuildError::resolution(&url, format!("manifest is not base64: {}", e)))?;
    let manifest = String::from_utf8_lossy(&decoded);
    parse_pin(&manifest, component).ok_or_else(|| {
        BuildError::resolution(&url, format!("no '{}_revision' pin in DEPS", component))
    })
}

/// How a project's revision becomes a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionStrategy {
    /// The revision is a commit position of `repo` itself
    Direct { repo: String },
    /// The revision is a commit position of `parent_repo`, whose DEPS pins `component`
    Pinned {
        parent_repo: String,
        component: String,
    },
}

impl RevisionStrategy {
    pub fn direct(repo: impl Into<String>) -> Self {
        Self::Direct { repo: repo.into() }
    }

    pub fn pinned(parent_repo: impl Into<String>, component: impl Into<String>) -> Self {
        Self::Pinned {
            parent_repo: parent_repo.into(),
            component: component.into(),
        }
    }

    /// Resolve `revision` to a git sha. Nothing is cached here.
    pub fn resolve(&self, fetcher: &dyn Fetcher, revision: u64) -> BuildResult<String> {
        match self {
            Self::Direct { repo } => sha_from_revision(fetcher, revision, repo),
            Self::Pinned {
                parent_repo,
                component,
            } => {
                let parent_sha = sha_from_revision(fetcher, revision, parent_repo)?;
                debug!(%parent_sha, component = component.as_str(), "reading pin");
                pinned_sha(fetcher, parent_repo, &parent_sha, component)
            }
        }
    }
}
