//! Serde types matching catalog service responses.
//!
//! The service is not consistent about field names across versions, so
//! these types accept both spellings and convert into the domain types,
//! which have a single canonical shape.

use serde::Deserialize;

use super::error::CatalogError;
use super::types::{Book, BorrowRecord, BorrowSummary};

/// Envelope wrapping every response body.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
  #[serde(default = "default_success")]
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  pub data: Option<T>,
}

fn default_success() -> bool {
  true
}

/// Some service versions send `_id`, some `id`, some both.
fn document_id(object_id: Option<String>, id: Option<String>) -> Option<String> {
  object_id.or(id).filter(|id| !id.is_empty())
}

// ============================================================================
// Books
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBook {
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub id: Option<String>,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub author: String,
  #[serde(default)]
  pub genre: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub isbn: String,
  #[serde(default)]
  pub copies: u32,
  /// Ignored on conversion; availability is derived from copies
  pub available: Option<bool>,
  pub availability: Option<bool>,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

impl TryFrom<ApiBook> for Book {
  type Error = CatalogError;

  fn try_from(api: ApiBook) -> Result<Self, Self::Error> {
    let id = document_id(api.object_id, api.id)
      .ok_or_else(|| CatalogError::Decode(format!("book {:?} has no id", api.title)))?;
    let claimed = api.available.or(api.availability);
    if claimed.is_some_and(|flag| flag != (api.copies > 0)) {
      tracing::debug!(%id, copies = api.copies, "server availability disagrees with copies");
    }
    let mut book = Book::new(
      id,
      super::types::BookDraft {
        title: api.title,
        author: api.author,
        genre: api.genre,
        description: api.description,
        isbn: api.isbn,
        copies: api.copies,
      },
    );
    book.created_at = api.created_at;
    book.updated_at = api.updated_at;
    Ok(book)
  }
}

// ============================================================================
// Borrows
// ============================================================================

/// The `book` field is an id, or the populated book document.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ApiBookRef {
  Id(String),
  Populated {
    #[serde(rename = "_id")]
    object_id: Option<String>,
    id: Option<String>,
  },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBorrowRecord {
  #[serde(rename = "_id")]
  pub object_id: Option<String>,
  pub id: Option<String>,
  pub book: ApiBookRef,
  #[serde(default)]
  pub quantity: u32,
  pub due_date: Option<String>,
}

impl From<ApiBorrowRecord> for BorrowRecord {
  fn from(api: ApiBorrowRecord) -> Self {
    BorrowRecord {
      id: document_id(api.object_id, api.id),
      book_id: match api.book {
        ApiBookRef::Id(id) => id,
        ApiBookRef::Populated { object_id, id } => {
          document_id(object_id, id).unwrap_or_default()
        }
      },
      quantity: api.quantity,
      due_date: api.due_date,
    }
  }
}

#[derive(Debug, Default, Deserialize)]
pub struct ApiSummaryBook {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub isbn: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBorrowSummary {
  #[serde(default)]
  pub book: ApiSummaryBook,
  #[serde(default)]
  pub total_quantity: u32,
}

impl From<ApiBorrowSummary> for BorrowSummary {
  fn from(api: ApiBorrowSummary) -> Self {
    BorrowSummary {
      position: 0,
      title: api.book.title,
      isbn: api.book.isbn,
      total_quantity: api.total_quantity,
    }
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Pull a human-readable message out of an error body.
///
/// Tries `message`, then `error` (string or object with `message`), then
/// falls back to the raw body if it is short plain text.
pub fn extract_error_message(body: &str) -> Option<String> {
  let value: serde_json::Value = match serde_json::from_str(body) {
    Ok(value) => value,
    Err(_) => {
      let trimmed = body.trim();
      return (!trimmed.is_empty() && trimmed.len() <= 200).then(|| trimmed.to_string());
    }
  };

  if let Some(message) = value.get("message").and_then(|v| v.as_str()) {
    return Some(message.to_string());
  }

  match value.get("error") {
    Some(serde_json::Value::String(s)) => Some(s.clone()),
    Some(obj) => obj
      .get("message")
      .and_then(|v| v.as_str())
      .map(str::to_string),
    None => None,
  }
}
