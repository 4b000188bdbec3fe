use crate::configuration::GithubSettings;
use crate::domain::{RepoName, TrafficRecord};
use crate::error::TrafficError;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// An entry of the repository listing. GitHub sends many more fields; we only need the name.
/// GitHub documentation: https://docs.github.com/en/rest/repos/repos#list-repositories-for-a-user
#[derive(Deserialize)]
struct RepoSummary {
    name: String,
}

/// GitHub documentation: https://docs.github.com/en/rest/metrics/traffic#get-page-views
#[derive(Deserialize)]
struct ViewsResponse {
    #[serde(default)]
    views: Option<Vec<TrafficRecord>>,
}

pub struct GithubClient {
    http_client: Client,
    base_url: String,
    max_retries: u32,
    retry_backoff: Duration,
}

impl GithubClient {
    /// Every request made by this client carries `token` as a bearer credential.
    pub fn new(settings: &GithubSettings, token: SecretString) -> Result<Self, TrafficError> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|_| TrafficError::Auth("the access token is not a valid header value".into()))?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let http_client = Client::builder()
            .user_agent(&settings.user_agent)
            .default_headers(headers)
            .timeout(settings.timeout())
            .build()
            .map_err(|e| TrafficError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_owned(),
            max_retries: settings.max_retries,
            retry_backoff: settings.retry_backoff(),
        })
    }

    fn listing_url(&self, account: &str) -> String {
        format!("{}/users/{}/repos", self.base_url, account)
    }

    fn views_url(&self, account: &str, repo: &RepoName) -> String {
        format!(
            "{}/repos/{}/{}/traffic/views",
            self.base_url,
            account,
            repo.as_ref()
        )
    }

    /// Lists the repositories owned by `account`, in the order GitHub returns them.
    #[tracing::instrument(name = "Listing repositories", skip(self))]
    pub async fn list_repositories(&self, account: &str) -> Result<Vec<RepoName>, TrafficError> {
        let url = self.listing_url(account);
        let summaries: Vec<RepoSummary> = self.get_json(&url, listing_status_error).await?;
        tracing::info!("GitHub listed {} repositories", summaries.len());

        summaries
            .into_iter()
            .map(|summary| RepoName::parse(summary.name).map_err(TrafficError::InvalidResource))
            .collect()
    }

    /// Fetches the daily page views of one repository. A response without views is an empty series.
    #[tracing::instrument(name = "Fetching repository traffic", skip(self, repo), fields(repo = %repo))]
    pub async fn fetch_traffic(
        &self,
        account: &str,
        repo: &RepoName,
    ) -> Result<Vec<TrafficRecord>, TrafficError> {
        let url = self.views_url(account, repo);
        let response: ViewsResponse = self.get_json(&url, traffic_status_error).await?;
        Ok(response.views.unwrap_or_default())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        status_error: fn(StatusCode, &str) -> TrafficError,
    ) -> Result<T, TrafficError> {
        let mut attempt = 0;
        loop {
            match self.try_get_json(url, status_error).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    tracing::warn!(
                        "Attempt {} at {} failed ({}); retrying in {:?}",
                        attempt + 1,
                        url,
                        e,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn try_get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        status_error: fn(StatusCode, &str) -> TrafficError,
    ) -> Result<T, TrafficError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| TrafficError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, url));
        }

        response.json().await.map_err(|e| {
            TrafficError::Transport(format!("unexpected response body from {}: {}", url, e))
        })
    }
}

/// On the listing endpoint a 403 means the identity itself was refused.
fn listing_status_error(status: StatusCode, url: &str) -> TrafficError {
    let message = format!("{} returned {}", url, status);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TrafficError::Auth(message),
        StatusCode::NOT_FOUND => TrafficError::NotFound(message),
        _ => TrafficError::Transport(message),
    }
}

/// Traffic needs push access, so a 403 only concerns this one repository.
fn traffic_status_error(status: StatusCode, url: &str) -> TrafficError {
    let message = format!("{} returned {}", url, status);
    match status {
        StatusCode::UNAUTHORIZED => TrafficError::Auth(message),
        StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => TrafficError::NotFound(message),
        _ => TrafficError::Transport(message),
    }
}
