//! Client-side filtering of the master collection.
//!
//! Filters never mutate or re-fetch: [`derive`] returns a borrowed view, so
//! clearing them restores the full feed immediately.

use std::collections::BTreeSet;

use crate::api::{DurationType, PaymentType, Posting, StateCode};

/// User-chosen constraints on the visible feed.
///
/// An empty set means "no restriction" for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
  pub compensation_types: BTreeSet<PaymentType>,
  pub state_types: BTreeSet<StateCode>,
  pub duration_types: BTreeSet<DurationType>,
  pub search_term: String,
}

impl FilterState {
  pub fn is_empty(&self) -> bool {
    self.compensation_types.is_empty()
      && self.state_types.is_empty()
      && self.duration_types.is_empty()
      && self.search_term.trim().is_empty()
  }

  /// Drop every constraint; the visible feed becomes the master collection.
  pub fn clear(&mut self) {
    *self = Self::default();
  }

  pub fn with_compensation(mut self, payment_type: PaymentType) -> Self {
    self.compensation_types.insert(payment_type);
    self
  }

  pub fn with_state(mut self, state: StateCode) -> Self {
    self.state_types.insert(state);
    self
  }

  pub fn with_duration(mut self, duration: DurationType) -> Self {
    self.duration_types.insert(duration);
    self
  }

  pub fn with_search(mut self, term: impl Into<String>) -> Self {
    self.search_term = term.into();
    self
  }

  /// Layers that constrain anything, in application order
  pub fn active_layers(&self) -> Vec<FilterLayer> {
    FilterLayer::ORDER
      .into_iter()
      .filter(|layer| layer.is_active(self))
      .collect()
  }
}

/// One predicate of the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterLayer {
  Compensation,
  Region,
  Duration,
  Search,
}

impl FilterLayer {
  /// Application order
  pub const ORDER: [FilterLayer; 4] = [
    FilterLayer::Compensation,
    FilterLayer::Region,
    FilterLayer::Duration,
    FilterLayer::Search,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      FilterLayer::Compensation => "Pay",
      FilterLayer::Region => "State",
      FilterLayer::Duration => "Duration",
      FilterLayer::Search => "Search",
    }
  }

  /// Whether this layer constrains anything under `filters`.
  ///
  /// The search term is matched with surrounding whitespace trimmed.
  pub fn is_active(&self, filters: &FilterState) -> bool {
    match self {
      FilterLayer::Compensation => !filters.compensation_types.is_empty(),
      FilterLayer::Region => !filters.state_types.is_empty(),
      FilterLayer::Duration => !filters.duration_types.is_empty(),
      FilterLayer::Search => !filters.search_term.trim().is_empty(),
    }
  }

  fn matches(&self, posting: &Posting, filters: &FilterState) -> bool {
    let attrs = &posting.attributes;
    match self {
      FilterLayer::Compensation => filters.compensation_types.contains(&attrs.payment_type),
      FilterLayer::Region => filters.state_types.contains(&attrs.farm_state),
      FilterLayer::Duration => filters.duration_types.contains(&attrs.duration),
      FilterLayer::Search => attrs
        .title
        .to_lowercase()
        .contains(&filters.search_term.trim().to_lowercase()),
    }
  }
}

/// The visible subsequence of `postings` under `filters`.
///
/// Order is preserved and nothing is re-sorted.
pub fn derive<'a>(postings: &'a [Posting], filters: &FilterState) -> Vec<&'a Posting> {
  let mut visible: Vec<&Posting> = postings.iter().collect();
  for layer in filters.active_layers() {
    visible.retain(|posting| layer.matches(posting, filters));
  }
  visible
}

/// Distinct regions present in the collection, sorted
pub fn available_states(postings: &[Posting]) -> Vec<StateCode> {
  postings
    .iter()
    .map(|p| p.attributes.farm_state.clone())
    .filter(|s| !s.is_empty())
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}

/// Distinct payment types present in the collection, sorted
pub fn available_payment_types(postings: &[Posting]) -> Vec<PaymentType> {
  postings
    .iter()
    .map(|p| p.attributes.payment_type)
    .collect::<BTreeSet<_>>()
    .into_iter()
    .collect()
}
