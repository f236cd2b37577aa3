use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;

use crate::error::ApiError;
use crate::models::{Release, RemoteEntry};
use crate::sync::RemoteSource;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// Coordinates of the repository holding shared templates and releases.
#[derive(Debug, Clone)]
pub struct RemoteRepo {
    pub owner: String,
    pub repo: String,
    /// Branch or tag the template directory is read from.
    pub reference: String,
    /// Directory inside the repository that holds template files.
    pub templates_path: String,
}

impl Default for RemoteRepo {
    fn default() -> Self {
        Self {
            owner: "Pitrick3141".to_string(),
            repo: "DontFDHere".to_string(),
            reference: "master".to_string(),
            templates_path: "FDTemplates".to_string(),
        }
    }
}

/// Responsible for all communication with the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    repo: RemoteRepo,
}

impl GithubClient {
    pub fn new(repo: RemoteRepo) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("keyplate-tui"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: GITHUB_API_BASE.to_string(),
            repo,
        })
    }

    /// Points the client at another API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn repo(&self) -> &RemoteRepo {
        &self.repo
    }

    /// Fetches metadata of the most recent published release.
    pub async fn latest_release(&self) -> Result<Release, ApiError> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.base_url, self.repo.owner, self.repo.repo
        );
        let bytes = self.get(&url).await?;
        decode(&url, &bytes)
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

impl RemoteSource for GithubClient {
    async fn list_templates(&self) -> Result<Vec<RemoteEntry>, ApiError> {
        let url = format!(
            "{}/repos/{}/{}/contents/{}?ref={}",
            self.base_url, self.repo.owner, self.repo.repo, self.repo.templates_path, self.repo.reference
        );
        let bytes = self.get(&url).await?;
        let entries: Vec<RemoteEntry> = decode(&url, &bytes)?;
        Ok(entries.into_iter().filter(|e| e.kind == "file").collect())
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.get(url).await
    }
}

fn decode<T: DeserializeOwned>(url: &str, bytes: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(bytes).map_err(|e| ApiError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn repo() -> RemoteRepo {
        RemoteRepo {
            owner: "owner".into(),
            repo: "templates".into(),
            reference: "main".into(),
            templates_path: "shared".into(),
        }
    }

    #[tokio::test]
    async fn listing_keeps_only_files() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/owner/templates/contents/shared")
            .match_query(Matcher::UrlEncoded("ref".into(), "main".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"name": "Daily.json", "sha": "abc", "size": 120, "download_url": "https://raw.example/Daily.json", "type": "file"},
                    {"name": "drafts", "sha": "def", "size": 0, "download_url": null, "type": "dir"}
                ]"#,
            )
            .create_async()
            .await;

        let client = GithubClient::new(repo()).unwrap().with_base_url(server.url());
        let entries = client.list_templates().await.unwrap();

        mock.assert_async().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].template_name(), "Daily");
        assert_eq!(entries[0].sha, "abc");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/owner/templates/contents/shared")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let client = GithubClient::new(repo()).unwrap().with_base_url(server.url());
        let err = client.list_templates().await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn file_bytes_are_returned_verbatim() {
        let mut server = Server::new_async().await;
        let body = "{\"name\": \"A\"}\n";
        let _mock = server
            .mock("GET", "/raw/A.json")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;

        let client = GithubClient::new(repo()).unwrap();
        let bytes = client
            .fetch_file(&format!("{}/raw/A.json", server.url()))
            .await
            .unwrap();
        assert_eq!(bytes, body.as_bytes());
    }

    #[tokio::test]
    async fn latest_release_is_decoded() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/owner/templates/releases/latest")
            .with_status(200)
            .with_body(
                r#"{"tag_name": "v1.4.0", "published_at": "2024-02-01T00:00:00Z", "body": "notes",
                    "html_url": "https://example.com/r", "assets": [{"name": "app.zip", "size": 2048, "browser_download_url": "https://example.com/app.zip"}]}"#,
            )
            .create_async()
            .await;

        let client = GithubClient::new(repo()).unwrap().with_base_url(server.url());
        let release = client.latest_release().await.unwrap();
        assert_eq!(release.tag_name, "v1.4.0");
        assert_eq!(release.assets[0].size, 2048);
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/owner/templates/releases/latest")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        let client = GithubClient::new(repo()).unwrap().with_base_url(server.url());
        assert!(matches!(
            client.latest_release().await,
            Err(ApiError::Decode { .. })
        ));
    }
}
