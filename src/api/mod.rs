mod api_types;
mod client;
#[cfg(test)]
pub(crate) mod mock;
mod types;

pub use api_types::applicant_total;
pub use client::{ApiClient, ApiResponse, HttpTransport, Transport};
pub use types::{DurationType, PaymentType, Posting, PostingAttributes, StateCode};
