//! Serde-deserializable types matching backend responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeSet;

use super::types::{DurationType, PaymentType, Posting, PostingAttributes, StateCode};

// ============================================================================
// Envelope
// ============================================================================

/// `{ "data": ..., "meta": ... }`
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
  pub data: T,
  #[serde(default)]
  pub meta: ApiMeta,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiMeta {
  pub pagination: Option<ApiPagination>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiPagination {
  #[serde(default)]
  pub page: u32,
  #[serde(rename = "pageSize", default)]
  pub page_size: u32,
  #[serde(rename = "pageCount", default)]
  pub page_count: u32,
  #[serde(default)]
  pub total: u64,
}

/// `{ "id": 1, "attributes": { ... } }`
#[derive(Debug, Deserialize)]
pub struct ApiRecord<A> {
  #[serde(deserialize_with = "id_as_string")]
  pub id: String,
  pub attributes: A,
}

/// `{ "data": { "id": ..., "attributes": ... } }` or `{ "data": null }`
#[derive(Debug, Deserialize)]
pub struct ApiRelation<A> {
  pub data: Option<ApiRecord<A>>,
}

// ============================================================================
// Postings
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiPostingAttributes {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub salary: Option<Value>,
  #[serde(rename = "paymentType", default)]
  pub payment_type: Option<String>,
  #[serde(default)]
  pub duration: Option<String>,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(rename = "skillRequirements", default)]
  pub skill_requirements: Option<Value>,
  #[serde(rename = "createdAt")]
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub farm: Option<ApiRelation<ApiFarmAttributes>>,
  // Some endpoints flatten the farm into the posting
  #[serde(rename = "farmId", default, deserialize_with = "opt_id_as_string")]
  pub farm_id: Option<String>,
  #[serde(rename = "farmName", default)]
  pub farm_name: Option<String>,
  #[serde(rename = "farmCity", default)]
  pub farm_city: Option<String>,
  #[serde(rename = "farmState", default)]
  pub farm_state: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiFarmAttributes {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub city: Option<String>,
  #[serde(default)]
  pub state: Option<String>,
}

impl ApiRecord<ApiPostingAttributes> {
  pub fn into_posting(self) -> Posting {
    let attrs = self.attributes;
    let farm = attrs.farm.and_then(|relation| relation.data);
    let (farm_id, farm_attrs) = match farm {
      Some(record) => (Some(record.id), record.attributes),
      None => (None, ApiFarmAttributes::default()),
    };

    Posting {
      id: self.id,
      created_at: attrs.created_at,
      attributes: PostingAttributes {
        title: attrs.title,
        salary: attrs.salary.as_ref().and_then(salary_amount),
        payment_type: attrs
          .payment_type
          .as_deref()
          .map(PaymentType::from_label)
          .unwrap_or(PaymentType::Other),
        duration: attrs
          .duration
          .as_deref()
          .map(DurationType::from_label)
          .unwrap_or(DurationType::Other),
        description: attrs.description.unwrap_or_default(),
        skill_requirements: attrs
          .skill_requirements
          .as_ref()
          .map(skill_set)
          .unwrap_or_default(),
        farm_id: farm_id.or(attrs.farm_id),
        farm_name: farm_attrs.name.or(attrs.farm_name).unwrap_or_default(),
        farm_city: farm_attrs.city.or(attrs.farm_city).unwrap_or_default(),
        farm_state: farm_attrs
          .state
          .or(attrs.farm_state)
          .map(|s| StateCode::new(&s))
          .unwrap_or_default(),
      },
    }
  }
}

/// Accepts `15`, `15.5` and `"$15.50"`.
fn salary_amount(value: &Value) -> Option<f64> {
  match value {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => {
      let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
      cleaned.parse().ok()
    }
    _ => None,
  }
}

/// Accepts `["a", "b"]` and `"a, b"`.
fn skill_set(value: &Value) -> BTreeSet<String> {
  let raw: Vec<String> = match value {
    Value::Array(items) => items
      .iter()
      .filter_map(|v| v.as_str().map(String::from))
      .collect(),
    Value::String(s) => s.split(',').map(String::from).collect(),
    _ => Vec::new(),
  };

  raw
    .into_iter()
    .map(|s| s.trim().to_string())
    .filter(|s| !s.is_empty())
    .collect()
}

// ============================================================================
// Applications
// ============================================================================

/// Total from `meta.pagination.total`, falling back to the number of records.
pub fn applicant_total(body: Value) -> serde_json::Result<u64> {
  let envelope: ApiEnvelope<Vec<Value>> = serde_json::from_value(body)?;
  Ok(match envelope.meta.pagination {
    Some(pagination) => pagination.total,
    None => envelope.data.len() as u64,
  })
}

// ============================================================================
// Helpers
// ============================================================================

fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  match Value::deserialize(deserializer)? {
    Value::String(s) => Ok(s),
    Value::Number(n) => Ok(n.to_string()),
    other => Err(serde::de::Error::custom(format!(
      "expected string or number id, got {}",
      other
    ))),
  }
}

fn opt_id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(Value::Number(n)) => Ok(Some(n.to_string())),
    Some(other) => Err(serde::de::Error::custom(format!(
      "expected string or number id, got {}",
      other
    ))),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_nested_farm_relation() {
    let body = json!({
      "data": [{
        "id": 12,
        "attributes": {
          "title": "Apple Picker",
          "salary": 18.5,
          "paymentType": "Hourly",
          "duration": "Seasonal",
          "description": "Harvest season",
          "skillRequirements": ["ladder", " pruning ", ""],
          "createdAt": "2024-03-01T10:00:00.000Z",
          "farm": {
            "data": {
              "id": 3,
              "attributes": { "name": "Orchard Hill", "city": "Yakima", "state": "wa" }
            }
          }
        }
      }],
      "meta": { "pagination": { "page": 1, "pageSize": 20, "pageCount": 1, "total": 1 } }
    });

    let envelope: ApiEnvelope<Vec<ApiRecord<ApiPostingAttributes>>> =
      serde_json::from_value(body).unwrap();
    let posting = envelope.data.into_iter().next().unwrap().into_posting();

    assert_eq!(posting.id, "12");
    assert_eq!(posting.attributes.title, "Apple Picker");
    assert_eq!(posting.attributes.salary, Some(18.5));
    assert_eq!(posting.attributes.payment_type, PaymentType::Hourly);
    assert_eq!(posting.attributes.duration, DurationType::Seasonal);
    assert_eq!(posting.attributes.farm_id.as_deref(), Some("3"));
    assert_eq!(posting.attributes.farm_name, "Orchard Hill");
    assert_eq!(posting.attributes.farm_state, StateCode::new("WA"));
    assert_eq!(
      posting.attributes.skill_requirements,
      ["ladder", "pruning"]
        .iter()
        .map(|s| s.to_string())
        .collect::<BTreeSet<String>>()
    );
  }

  #[test]
  fn test_flattened_farm_fields_and_string_salary() {
    let body = json!({
      "id": "abc",
      "attributes": {
        "title": "Packer",
        "salary": "$1,200.00",
        "paymentType": "piece rate",
        "skillRequirements": "forklift, sorting",
        "createdAt": "2024-01-01T00:00:00Z",
        "farmId": 9,
        "farmName": "Valley Packing",
        "farmCity": "Fresno",
        "farmState": "CA"
      }
    });

    let record: ApiRecord<ApiPostingAttributes> = serde_json::from_value(body).unwrap();
    let posting = record.into_posting();

    assert_eq!(posting.attributes.salary, Some(1200.0));
    assert_eq!(posting.attributes.payment_type, PaymentType::PieceRate);
    assert_eq!(posting.attributes.duration, DurationType::Other);
    assert_eq!(posting.attributes.farm_id.as_deref(), Some("9"));
    assert_eq!(posting.attributes.farm_city, "Fresno");
    assert_eq!(posting.attributes.skill_requirements.len(), 2);
  }

  #[test]
  fn test_missing_created_at_is_rejected() {
    let body = json!({ "id": 1, "attributes": { "title": "No date" } });
    assert!(serde_json::from_value::<ApiRecord<ApiPostingAttributes>>(body).is_err());
  }

  #[test]
  fn test_applicant_total_prefers_meta() {
    let body = json!({
      "data": [{ "id": 1, "attributes": {} }],
      "meta": { "pagination": { "total": 14 } }
    });
    assert_eq!(applicant_total(body).unwrap(), 14);

    let body = json!({ "data": [{ "id": 1 }, { "id": 2 }] });
    assert_eq!(applicant_total(body).unwrap(), 2);

    let body = json!({ "data": [], "meta": { "pagination": { "total": 0 } } });
    assert_eq!(applicant_total(body).unwrap(), 0);

    assert!(applicant_total(json!({ "unexpected": true })).is_err());
  }
}
