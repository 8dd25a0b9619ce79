//! In-process transport for unit tests.

use reqwest::Method;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::{Arc, Mutex};

use super::client::{ApiResponse, Transport};
use crate::error::Result;

type Handler = dyn Fn(&Method, &str, Option<&Value>) -> Result<Value> + Send + Sync;

/// A recorded request
#[derive(Debug, Clone)]
pub struct Call {
  pub method: Method,
  pub path: String,
  pub body: Option<Value>,
}

/// Answers every request through a closure and records what was asked.
#[derive(Clone)]
pub struct MockTransport {
  handler: Arc<Handler>,
  calls: Arc<Mutex<Vec<Call>>>,
}

impl MockTransport {
  pub fn new<F>(handler: F) -> Self
  where
    F: Fn(&Method, &str, Option<&Value>) -> Result<Value> + Send + Sync + 'static,
  {
    Self {
      handler: Arc::new(handler),
      calls: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn count_matching(&self, fragment: &str) -> usize {
    self
      .calls()
      .iter()
      .filter(|call| call.path.contains(fragment))
      .count()
  }
}

impl Transport for MockTransport {
  fn request(
    &self,
    method: Method,
    path: &str,
    body: Option<Value>,
  ) -> impl Future<Output = Result<ApiResponse>> + Send {
    self.calls.lock().unwrap().push(Call {
      method: method.clone(),
      path: path.to_string(),
      body: body.clone(),
    });
    let result = (self.handler)(&method, path, body.as_ref());

    async move {
      tokio::task::yield_now().await;
      result.map(|data| ApiResponse { status: 200, data })
    }
  }
}

/// One backend posting record with a nested farm relation.
pub fn posting_json(
  id: &str,
  title: &str,
  created_at: &str,
  payment_type: &str,
  state: &str,
  duration: &str,
) -> Value {
  json!({
    "id": id,
    "attributes": {
      "title": title,
      "salary": 17,
      "paymentType": payment_type,
      "duration": duration,
      "description": format!("{} wanted", title),
      "skillRequirements": ["lifting"],
      "createdAt": created_at,
      "farm": {
        "data": {
          "id": 1,
          "attributes": { "name": "Green Acres", "city": "Salinas", "state": state }
        }
      }
    }
  })
}

/// A page of `count` postings with ids `first..first + count`, newest first.
pub fn page_json(first: usize, count: usize) -> Value {
  let data: Vec<Value> = (first..first + count)
    .map(|n| {
      // Later ids are older so the page arrives in feed order
      let created_at = chrono::DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z")
        .unwrap()
        .with_timezone(&chrono::Utc)
        - chrono::Duration::minutes(n as i64);
      posting_json(
        &n.to_string(),
        &format!("Job {}", n),
        &created_at.to_rfc3339(),
        "Hourly",
        "CA",
        "Seasonal",
      )
    })
    .collect();

  let total = data.len();
  json!({ "data": data, "meta": { "pagination": { "total": total } } })
}
