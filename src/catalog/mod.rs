//! Library catalog: domain types, the REST client and the cached store.

pub mod api_types;
pub mod cache;
pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod fake;
pub mod filter;
pub mod store;
pub mod types;
pub mod validation;

pub use client::{CatalogApi, CatalogClient};
pub use error::CatalogError;
pub use filter::{Availability, BookFilter, CatalogStats};
pub use store::CatalogStore;
pub use types::{Book, BookDraft, BookPatch, BorrowRecord, BorrowRequest, BorrowSummary};
pub use validation::{BookForm, BorrowForm, ValidationErrors};
