use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A book in the catalog.
///
/// `available` is derived from `copies` and is only ever changed together
/// with it, so `is_available() == (copies() > 0)` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
  pub id: String,
  pub title: String,
  pub author: String,
  pub genre: String,
  pub description: String,
  pub isbn: String,
  copies: u32,
  available: bool,
  pub created_at: Option<String>,
  pub updated_at: Option<String>,
}

impl Book {
  /// Build a book from a draft and a server-assigned id.
  pub fn new(id: impl Into<String>, draft: BookDraft) -> Self {
    let mut book = Self {
      id: id.into(),
      title: draft.title,
      author: draft.author,
      genre: draft.genre,
      description: draft.description,
      isbn: draft.isbn,
      copies: 0,
      available: false,
      created_at: None,
      updated_at: None,
    };
    book.set_copies(draft.copies);
    book
  }

  pub fn copies(&self) -> u32 {
    self.copies
  }

  pub fn is_available(&self) -> bool {
    self.available
  }

  pub fn set_copies(&mut self, copies: u32) {
    self.copies = copies;
    self.available = copies > 0;
  }

  /// Remove `quantity` copies if that many are on the shelf.
  ///
  /// Returns false and leaves the book untouched otherwise.
  pub fn take_copies(&mut self, quantity: u32) -> bool {
    match self.copies.checked_sub(quantity) {
      Some(left) => {
        self.set_copies(left);
        true
      }
      None => false,
    }
  }
}

/// Payload for creating a book. Availability is left to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookDraft {
  pub title: String,
  pub author: String,
  pub genre: String,
  pub description: String,
  pub isbn: String,
  pub copies: u32,
}

/// Partial update of a book. Only set fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookPatch {
  pub title: Option<String>,
  pub author: Option<String>,
  pub genre: Option<String>,
  pub description: Option<String>,
  pub isbn: Option<String>,
  pub copies: Option<u32>,
}

/// Wire body of a `PUT /books/{id}`; carries the derived flag with copies.
#[derive(Serialize)]
struct PatchBody<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  title: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  author: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  genre: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  description: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  isbn: Option<&'a str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  copies: Option<u32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  available: Option<bool>,
}

impl Serialize for BookPatch {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    PatchBody {
      title: self.title.as_deref(),
      author: self.author.as_deref(),
      genre: self.genre.as_deref(),
      description: self.description.as_deref(),
      isbn: self.isbn.as_deref(),
      copies: self.copies,
      available: self.copies.map(|c| c > 0),
    }
    .serialize(serializer)
  }
}

impl BookPatch {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }

  /// Apply the set fields to `book`.
  pub fn apply_to(&self, book: &mut Book) {
    if let Some(title) = &self.title {
      book.title = title.clone();
    }
    if let Some(author) = &self.author {
      book.author = author.clone();
    }
    if let Some(genre) = &self.genre {
      book.genre = genre.clone();
    }
    if let Some(description) = &self.description {
      book.description = description.clone();
    }
    if let Some(isbn) = &self.isbn {
      book.isbn = isbn.clone();
    }
    if let Some(copies) = self.copies {
      book.set_copies(copies);
    }
  }
}

/// Body of `POST /borrows`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
  /// Book id
  pub book: String,
  pub quantity: u32,
  pub due_date: NaiveDate,
}

/// A borrow transaction as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowRecord {
  pub id: Option<String>,
  pub book_id: String,
  pub quantity: u32,
  pub due_date: Option<String>,
}

/// Total quantity currently borrowed for one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowSummary {
  /// Row index in the report; rows carry no id of their own
  #[serde(default)]
  pub position: usize,
  pub title: String,
  pub isbn: String,
  pub total_quantity: u32,
}

/// Number report rows by their order, so equal titles or ISBNs stay apart.
pub fn number_rows(mut rows: Vec<BorrowSummary>) -> Vec<BorrowSummary> {
  for (position, row) in rows.iter_mut().enumerate() {
    row.position = position;
  }
  rows
}

/// Sum of `total_quantity` over a report.
pub fn total_borrowed(summaries: &[BorrowSummary]) -> u32 {
  summaries.iter().map(|s| s.total_quantity).sum()
}


#[cfg(test)]
mod tests {
  use super::fixtures::book;
  use super::*;

  #[test]
  fn test_availability_follows_copies() {
    let mut b = book("1", "Emma", 0);
    assert!(!b.is_available());

    b.set_copies(2);
    assert!(b.is_available());

    assert!(b.take_copies(2));
    assert_eq!(b.copies(), 0);
    assert!(!b.is_available());
  }

  #[test]
  fn test_take_copies_never_goes_negative() {
    let mut b = book("1", "Emma", 1);
    assert!(!b.take_copies(2));
    assert_eq!(b.copies(), 1);
    assert!(b.is_available());
  }

  #[test]
  fn test_patch_applies_only_set_fields() {
    let mut b = book("1", "Emma", 3);
    let patch = BookPatch {
      title: Some("Persuasion".to_string()),
      copies: Some(0),
      ..Default::default()
    };
    patch.apply_to(&mut b);

    assert_eq!(b.title, "Persuasion");
    assert_eq!(b.author, "Jane Austen");
    assert_eq!(b.copies(), 0);
    assert!(!b.is_available());
  }

  #[test]
  fn test_patch_body_carries_availability_with_copies() {
    let patch = BookPatch {
      copies: Some(4),
      ..Default::default()
    };
    let body = serde_json::to_value(&patch).unwrap();
    assert_eq!(body, serde_json::json!({"copies": 4, "available": true}));

    let patch = BookPatch {
      author: Some("Anon".to_string()),
      ..Default::default()
    };
    let body = serde_json::to_value(&patch).unwrap();
    assert_eq!(body, serde_json::json!({"author": "Anon"}));
  }

  #[test]
  fn test_borrow_request_body() {
    let request = BorrowRequest {
      book: "42".to_string(),
      quantity: 2,
      due_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
    };
    let body = serde_json::to_value(&request).unwrap();
    assert_eq!(
      body,
      serde_json::json!({"book": "42", "quantity": 2, "dueDate": "2025-03-01"})
    );
  }

  #[test]
  fn test_total_borrowed() {
    let report = vec![
      BorrowSummary {
        position: 0,
        title: "Emma".to_string(),
        isbn: "1".to_string(),
        total_quantity: 3,
      },
      BorrowSummary {
        position: 1,
        title: "Persuasion".to_string(),
        isbn: "2".to_string(),
        total_quantity: 4,
      },
    ];
    assert_eq!(total_borrowed(&report), 7);
    assert_eq!(total_borrowed(&[]), 0);
  }
}
