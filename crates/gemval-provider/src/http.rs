//! Thin reqwest wrapper shared by the GitHub and GitLab clients.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ProviderError;
use crate::Result;

const USER_AGENT: &str = concat!("gemval/", env!("CARGO_PKG_VERSION"));

/// Error bodies are cut to this many characters before landing in an error.
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlErrorMessage>>,
}

#[derive(Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

/// HTTP transport tagged with the provider name used in errors.
#[derive(Debug, Clone)]
pub(crate) struct HttpTransport {
    provider: &'static str,
    client: reqwest::Client,
}

impl HttpTransport {
    pub(crate) fn new(provider: &'static str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::from_reqwest(provider, e))?;
        Ok(Self { provider, client })
    }

    pub(crate) fn provider(&self) -> &'static str {
        self.provider
    }

    /// POST a GraphQL query and decode `data`.
    pub(crate) async fn graphql<T: DeserializeOwned>(
        &self,
        url: &str,
        authorization: &str,
        query: &str,
        variables: Value,
    ) -> Result<T> {
        debug!(provider = self.provider, url, "graphql query");
        let request = self
            .client
            .post(url)
            .header("Authorization", authorization)
            .json(&serde_json::json!({ "query": query, "variables": variables }));
        let response = self.send(request).await?;
        let body: GraphQlResponse<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;

        if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .into_iter()
                .map(|e| e.message)
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ProviderError::GraphQl {
                provider: self.provider,
                message,
            });
        }
        body.data.ok_or_else(|| ProviderError::GraphQl {
            provider: self.provider,
            message: "response has no data".to_string(),
        })
    }

    /// GET a JSON document, returning the headers alongside it.
    ///
    /// An empty 204 body decodes as JSON `null`.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<(T, HeaderMap)> {
        debug!(provider = self.provider, url, "GET json");
        let response = self.send(self.get(url, headers)).await?;
        let response_headers = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;
        let body = if bytes.is_empty() { &b"null"[..] } else { &bytes[..] };
        let value = serde_json::from_slice(body).map_err(|e| ProviderError::Decode {
            provider: self.provider,
            message: format!("{url}: {e}"),
        })?;
        Ok((value, response_headers))
    }

    /// GET raw bytes; 404 means absent.
    pub(crate) async fn get_optional_bytes(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<Option<Vec<u8>>> {
        debug!(provider = self.provider, url, "GET raw");
        let response = self
            .get(url, headers)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.check_status(response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;
        Ok(Some(bytes.to_vec()))
    }

    /// GET raw bytes; every non-success status is an error.
    pub(crate) async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!(provider = self.provider, url, "GET download");
        let response = self.send(self.get(url, &[])).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;
        Ok(bytes.to_vec())
    }

    fn get(&self, url: &str, headers: &[(&str, &str)]) -> RequestBuilder {
        headers
            .iter()
            .fold(self.client.get(url), |req, (k, v)| req.header(*k, *v))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(self.provider, e))?;
        self.check_status(response).await
    }

    async fn check_status(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ProviderError::Status {
            provider: self.provider,
            status: status.as_u16(),
            message: body.chars().take(ERROR_BODY_LIMIT).collect(),
        })
    }
}

fn last_page_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"[?&]page=(\d+)>; rel="last""#).expect("valid regex"))
}

/// Page number of the `rel="last"` entry of a `link` header.
pub(crate) fn last_page_from_link(link: &str) -> Option<u64> {
    last_page_regex()
        .captures(link)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Numeric header value such as GitLab's `X-Total`.
pub(crate) fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
