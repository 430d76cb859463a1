//! Caching implementations for catalog types.

use crate::cache::{Cacheable, Tag};

use super::types::{Book, BorrowSummary};

pub const BOOK: &str = "book";
pub const BORROW_SUMMARY: &str = "borrow_summary";

// ============================================================================
// Cacheable implementations
// ============================================================================

impl Cacheable for Book {
  fn cache_key(&self) -> String {
    self.id.clone()
  }

  fn entity_type() -> &'static str {
    BOOK
  }
}

impl Cacheable for BorrowSummary {
  fn cache_key(&self) -> String {
    self.position.to_string()
  }

  fn entity_type() -> &'static str {
    BORROW_SUMMARY
  }
}

// ============================================================================
// Tags
// ============================================================================

/// The cached book collection.
pub fn book_list() -> Tag {
  Tag::list(BOOK)
}

pub fn book(id: &str) -> Tag {
  Tag::id(BOOK, id)
}

/// The cached borrow-summary report.
pub fn summary_list() -> Tag {
  Tag::list(BORROW_SUMMARY)
}

/// Tags a successful write to book `id` invalidates.
pub fn book_write(id: &str) -> Vec<Tag> {
  vec![book(id), book_list()]
}

/// Tags a successful borrow of book `id` invalidates.
pub fn borrow_write(id: &str) -> Vec<Tag> {
  vec![book(id), book_list(), summary_list()]
}
