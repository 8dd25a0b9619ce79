//! Domain types for the job board.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::feed::Chronological;

/// A job posting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
  pub id: String,
  pub created_at: DateTime<Utc>,
  pub attributes: PostingAttributes,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingAttributes {
  pub title: String,
  pub salary: Option<f64>,
  pub payment_type: PaymentType,
  pub duration: DurationType,
  pub description: String,
  pub skill_requirements: BTreeSet<String>,
  pub farm_id: Option<String>,
  pub farm_name: String,
  pub farm_city: String,
  pub farm_state: StateCode,
}

impl Chronological for Posting {
  fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }
}

/// How a posting pays
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PaymentType {
  Hourly,
  Salary,
  PieceRate,
  Other,
}

impl PaymentType {
  /// Lenient parse of backend labels ("Hourly", "piece rate", "PIECE-RATE").
  pub fn from_label(label: &str) -> Self {
    match normalize_label(label).as_str() {
      "hourly" => PaymentType::Hourly,
      "salary" | "salaried" => PaymentType::Salary,
      "piecerate" | "perpiece" | "piece" => PaymentType::PieceRate,
      _ => PaymentType::Other,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      PaymentType::Hourly => "Hourly",
      PaymentType::Salary => "Salary",
      PaymentType::PieceRate => "Piece Rate",
      PaymentType::Other => "Other",
    }
  }
}

impl fmt::Display for PaymentType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.label())
  }
}

impl FromStr for PaymentType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match PaymentType::from_label(s) {
      PaymentType::Other if normalize_label(s) != "other" => {
        Err(format!("unknown payment type: {}", s))
      }
      parsed => Ok(parsed),
    }
  }
}

/// How long a posting lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DurationType {
  Seasonal,
  FullTime,
  PartTime,
  Temporary,
  Other,
}

impl DurationType {
  pub fn from_label(label: &str) -> Self {
    match normalize_label(label).as_str() {
      "seasonal" => DurationType::Seasonal,
      "fulltime" | "permanent" => DurationType::FullTime,
      "parttime" => DurationType::PartTime,
      "temporary" | "temp" | "shortterm" => DurationType::Temporary,
      _ => DurationType::Other,
    }
  }

  pub fn label(&self) -> &'static str {
    match self {
      DurationType::Seasonal => "Seasonal",
      DurationType::FullTime => "Full Time",
      DurationType::PartTime => "Part Time",
      DurationType::Temporary => "Temporary",
      DurationType::Other => "Other",
    }
  }
}

impl fmt::Display for DurationType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(self.label())
  }
}

impl FromStr for DurationType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match DurationType::from_label(s) {
      DurationType::Other if normalize_label(s) != "other" => {
        Err(format!("unknown duration: {}", s))
      }
      parsed => Ok(parsed),
    }
  }
}

/// Region a farm is located in, e.g. "CA"
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateCode(String);

impl StateCode {
  pub fn new(code: &str) -> Self {
    Self(code.trim().to_uppercase())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

impl fmt::Display for StateCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.pad(&self.0)
  }
}

impl FromStr for StateCode {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let code = StateCode::new(s);
    if code.is_empty() {
      Err("state code must not be empty".to_string())
    } else {
      Ok(code)
    }
  }
}

/// Lowercase and strip separators so "Full-Time" and "full time" compare equal.
fn normalize_label(label: &str) -> String {
  label
    .chars()
    .filter(|c| !matches!(c, ' ' | '-' | '_'))
    .flat_map(char::to_lowercase)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_payment_type_labels() {
    assert_eq!(PaymentType::from_label("Hourly"), PaymentType::Hourly);
    assert_eq!(PaymentType::from_label("piece rate"), PaymentType::PieceRate);
    assert_eq!(PaymentType::from_label("PIECE-RATE"), PaymentType::PieceRate);
    assert_eq!(PaymentType::from_label("barter"), PaymentType::Other);
  }

  #[test]
  fn test_payment_type_from_str_rejects_unknown() {
    assert_eq!("salary".parse::<PaymentType>(), Ok(PaymentType::Salary));
    assert_eq!("other".parse::<PaymentType>(), Ok(PaymentType::Other));
    assert!("barter".parse::<PaymentType>().is_err());
  }

  #[test]
  fn test_duration_labels() {
    assert_eq!(DurationType::from_label("Full-Time"), DurationType::FullTime);
    assert_eq!(DurationType::from_label("part_time"), DurationType::PartTime);
    assert_eq!(DurationType::from_label("Seasonal"), DurationType::Seasonal);
    assert!("forever".parse::<DurationType>().is_err());
  }

  #[test]
  fn test_state_code_normalized() {
    assert_eq!(StateCode::new(" ca "), StateCode::new("CA"));
    assert_eq!(StateCode::new("wa").to_string(), "WA");
    assert!("  ".parse::<StateCode>().is_err());
  }
}
