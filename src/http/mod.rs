//! HTTP side of the sync layer
//!
//! - `client`: authenticated requests, cached reads, mutation invalidation
//! - `credential`: token storage and single-flight refresh
//! - `envelope`: response envelope interpretation

mod client;
mod credential;
mod envelope;

pub use client::{RequestClient, RequestOptions, UploadFile, DEFAULT_CACHE_TTL};
pub use credential::CredentialStore;
pub use envelope::{field_errors, interpret, ApiResponse};
