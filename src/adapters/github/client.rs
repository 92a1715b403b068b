//! GitHub HTTP client with rate limiting.
//!
//! Wraps the GitHub REST API v3 issue endpoints for one repository. A
//! `governor` quota keeps the client under the configured requests-per-hour
//! budget; every failure is mapped to a [`TrackerError`] so the retry layer
//! can tell transient failures from permanent ones.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use super::models::{AddLabelsRequest, CreateIssueRequest, GitHubErrorBody};
use crate::domain::errors::TrackerError;
use crate::domain::models::{ExternalIssue, ExternalIssueUpdate, ExternalPayload, GitHubConfig, IssueStateFilter};
use crate::domain::ports::IssueTracker;

/// Maximum page size accepted by the list endpoint.
const PAGE_SIZE: usize = 100;

/// HTTP client for the issues of a single GitHub repository.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: String,
    owner: String,
    repo: String,
    token: String,
    user_agent: String,
    limiter: Arc<DefaultDirectRateLimiter>,
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("base_url", &self.base_url)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Create a client with the default configuration.
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::with_config(&GitHubConfig::default(), token, owner, repo)
    }

    /// Create a client for `owner/repo` using `config`'s API root, quota and user agent.
    pub fn with_config(
        config: &GitHubConfig,
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
    ) -> Self {
        let per_hour = NonZeroU32::new(config.requests_per_hour).unwrap_or(NonZeroU32::MIN);
        Self {
            http: Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: token.into(),
            user_agent: config.user_agent.clone(),
            limiter: Arc::new(RateLimiter::direct(Quota::per_hour(per_hour))),
        }
    }

    /// Create a client reading the token from the configured environment variable.
    pub fn from_env(config: &GitHubConfig, owner: impl Into<String>, repo: impl Into<String>) -> Result<Self, String> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| format!("{} environment variable is not set", config.token_env))?;
        if token.is_empty() {
            return Err(format!("{} environment variable is empty", config.token_env));
        }
        Ok(Self::with_config(config, token, owner, repo))
    }

    /// Point the client at another API root (GitHub Enterprise or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build `<base>/repos/<owner>/<repo>/issues/<segments...>` with each
    /// segment percent-encoded.
    fn issues_url(&self, segments: &[&str]) -> Result<Url, TrackerError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| TrackerError::Network(format!("invalid API base URL {}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| TrackerError::Network(format!("API base URL {} cannot have a path", self.base_url)))?
            .pop_if_empty()
            .extend(["repos", self.owner.as_str(), self.repo.as_str(), "issues"])
            .extend(segments);
        Ok(url)
    }

    /// Wait for a quota cell and build an authorized request.
    async fn rate_limited_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.limiter.until_ready().await;
        self.http
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .header("User-Agent", &self.user_agent)
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response, TrackerError> {
        let resp = request
            .send()
            .await
            .map_err(|e| TrackerError::Network(format!("GitHub {operation} request failed: {e}")))?;

        if resp.status().is_success() {
            return Ok(resp);
        }
        Err(error_from_response(resp, operation).await)
    }

    async fn decode<T: DeserializeOwned>(resp: Response, operation: &str) -> Result<T, TrackerError> {
        resp.json::<T>()
            .await
            .map_err(|e| TrackerError::Decode(format!("GitHub {operation} parse failed: {e}")))
    }
}

/// Map a non-success response to a tracker error.
///
/// Primary rate limits arrive as 403 with `x-ratelimit-remaining: 0`,
/// secondary ones as 429; both are reported as `RateLimited`.
async fn error_from_response(resp: Response, operation: &str) -> TrackerError {
    let status = resp.status();
    let exhausted = resp
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GitHubErrorBody>(&text)
        .map(|b| b.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(text);

    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        return TrackerError::RateLimited(format!("GitHub {operation}: {message}"));
    }
    TrackerError::Http {
        status: status.as_u16(),
        message: format!("GitHub {operation}: {message}"),
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn create_issue(&self, payload: &ExternalPayload) -> Result<ExternalIssue, TrackerError> {
        let url = self.issues_url(&[])?;
        let request = self
            .rate_limited_request(Method::POST, url)
            .await
            .json(&CreateIssueRequest::from(payload));
        let resp = self.send(request, "create_issue").await?;
        Self::decode(resp, "create_issue").await
    }

    async fn update_issue(&self, number: u64, update: &ExternalIssueUpdate) -> Result<ExternalIssue, TrackerError> {
        let url = self.issues_url(&[&number.to_string()])?;
        let request = self.rate_limited_request(Method::PATCH, url).await.json(update);
        let resp = self.send(request, "update_issue").await?;
        Self::decode(resp, "update_issue").await
    }

    async fn get_issue(&self, number: u64) -> Result<ExternalIssue, TrackerError> {
        let url = self.issues_url(&[&number.to_string()])?;
        let request = self.rate_limited_request(Method::GET, url).await;
        let resp = self.send(request, "get_issue").await?;
        Self::decode(resp, "get_issue").await
    }

    async fn list_issues(&self, state: IssueStateFilter) -> Result<Vec<ExternalIssue>, TrackerError> {
        let mut issues = Vec::new();
        let mut page = 1usize;

        loop {
            let mut url = self.issues_url(&[])?;
            url.query_pairs_mut()
                .append_pair("state", state.as_str())
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let request = self.rate_limited_request(Method::GET, url).await;
            let resp = self.send(request, "list_issues").await?;
            let batch: Vec<ExternalIssue> = Self::decode(resp, "list_issues").await?;
            let fetched = batch.len();

            issues.extend(batch.into_iter().filter(|issue| !issue.is_pull_request()));

            if fetched < PAGE_SIZE {
                break;
            }
            page += 1;
        }

        tracing::debug!(
            owner = %self.owner,
            repo = %self.repo,
            count = issues.len(),
            pages = page,
            "listed GitHub issues"
        );
        Ok(issues)
    }

    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<(), TrackerError> {
        if labels.is_empty() {
            return Ok(());
        }
        let url = self.issues_url(&[&number.to_string(), "labels"])?;
        let body = AddLabelsRequest { labels: labels.to_vec() };
        let request = self.rate_limited_request(Method::POST, url).await.json(&body);
        self.send(request, "add_labels").await?;
        Ok(())
    }

    async fn remove_label(&self, number: u64, label: &str) -> Result<(), TrackerError> {
        let url = self.issues_url(&[&number.to_string(), "labels", label])?;
        let request = self.rate_limited_request(Method::DELETE, url).await;
        match self.send(request, "remove_label").await {
            Ok(_) | Err(TrackerError::Http { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
