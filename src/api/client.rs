use color_eyre::{eyre::eyre, Result as EyreResult};
use reqwest::Method;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use url::Url;

use super::api_types::{applicant_total, ApiEnvelope, ApiPostingAttributes, ApiRecord};
use super::types::Posting;
use crate::error::{Result, SyncError};

/// Status and decoded JSON body of a backend call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
  pub status: u16,
  pub data: Value,
}

/// The single network operation the core depends on.
///
/// Implementations own timeouts and map non-2xx answers to
/// [`SyncError::Status`].
pub trait Transport: Clone + Send + Sync + 'static {
  fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> impl Future<Output = Result<ApiResponse>> + Send;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  base_url: Url,
  token: Option<String>,
}

impl HttpTransport {
  pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> EyreResult<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API url {}: {}", base_url, e))?;

    let client = reqwest::Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      base_url,
      token,
    })
  }

  fn endpoint(&self, path: &str) -> String {
    format!(
      "{}/{}",
      self.base_url.as_str().trim_end_matches('/'),
      path.trim_start_matches('/')
    )
  }
}

impl Transport for HttpTransport {
  fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> impl Future<Output = Result<ApiResponse>> + Send {
    let mut request = self.client.request(method.clone(), self.endpoint(path));
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }
    if let Some(body) = &body {
      request = request.json(body);
    }
    let path = path.to_string();

    async move {
      let response = request
        .send()
        .await
        .map_err(|e| SyncError::Network(e.to_string()))?;

      let status = response.status();
      tracing::debug!(method = %method, path = %path, status = status.as_u16(), "api response");

      if !status.is_success() {
        return Err(SyncError::Status {
          status: status.as_u16(),
          path,
        });
      }

      let text = response
        .text()
        .await
        .map_err(|e| SyncError::Network(e.to_string()))?;

      let data = if text.trim().is_empty() {
        Value::Null
      } else {
        serde_json::from_str(&text)?
      };

      Ok(ApiResponse {
        status: status.as_u16(),
        data,
      })
    }
  }
}

/// Job board API client
#[derive(Clone)]
pub struct ApiClient<T: Transport> {
  transport: T,
}

impl<T: Transport> ApiClient<T> {
  pub fn new(transport: T) -> Self {
    Self { transport }
  }

  /// Fetch one page of postings, newest first.
  pub async fn postings_page(&self, page: u32, page_size: u32) -> Result<Vec<Posting>> {
    let path = format!(
      "/jobs?populate=farm&sort=createdAt:desc&pagination[page]={}&pagination[pageSize]={}",
      page, page_size
    );

    let response = self.transport.request(Method::GET, &path, None).await?;
    let envelope: ApiEnvelope<Vec<ApiRecord<ApiPostingAttributes>>> =
      serde_json::from_value(response.data)?;

    Ok(
      envelope
        .data
        .into_iter()
        .map(ApiRecord::into_posting)
        .collect(),
    )
  }

  /// Get a single posting by id
  pub async fn posting(&self, id: &str) -> Result<Posting> {
    let path = format!("/jobs/{}?populate=farm", id);

    let response = self.transport.request(Method::GET, &path, None).await?;
    let envelope: ApiEnvelope<ApiRecord<ApiPostingAttributes>> =
      serde_json::from_value(response.data)?;

    Ok(envelope.data.into_posting())
  }

  /// Number of applications received for a posting
  pub async fn applicant_count(&self, posting_id: &str) -> Result<u64> {
    let path = format!(
      "/applications?filters[job][id][$eq]={}&pagination[pageSize]=1",
      posting_id
    );

    let response = self.transport.request(Method::GET, &path, None).await?;
    Ok(applicant_total(response.data)?)
  }

  /// Apply to a posting. Best effort: not queued or retried.
  pub async fn apply(&self, posting_id: &str) -> Result<()> {
    let job = match posting_id.parse::<u64>() {
      Ok(n) => json!(n),
      Err(_) => json!(posting_id),
    };
    let body = json!({ "data": { "job": job } });

    self
      .transport
      .request(Method::POST, "/applications", Some(body))
      .await?;

    Ok(())
  }
}
