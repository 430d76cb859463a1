//! Client-side validation, run before anything is sent.
//!
//! Forms hold raw strings; parsing them yields either a typed payload or
//! the full list of field errors so every field can show its own message.

use std::fmt;

use chrono::NaiveDate;

use super::types::{Book, BookDraft, BookPatch, BorrowRequest};

/// Genres accepted when creating a book.
pub const GENRES: [&str; 6] = [
  "FICTION",
  "NON-FICTION",
  "SCIENCE",
  "HISTORY",
  "BIOGRAPHY",
  "FANTASY",
];

/// Upper bound on copies borrowed in one request.
pub const MAX_BORROW: u32 = 10;

/// Default loan period for new borrows.
pub const DEFAULT_LOAN_DAYS: i64 = 14;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
  pub field: &'static str,
  pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn single(field: &'static str, message: impl Into<String>) -> Self {
    let mut errors = Self::new();
    errors.push(field, message);
    errors
  }

  pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
    self.0.push(FieldError {
      field,
      message: message.into(),
    });
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// First message recorded for `field`.
  pub fn get(&self, field: &str) -> Option<&str> {
    self
      .0
      .iter()
      .find(|e| e.field == field)
      .map(|e| e.message.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
    self.0.iter()
  }

  fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
    if self.is_empty() {
      Ok(value)
    } else {
      Err(self)
    }
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let messages: Vec<&str> = self.0.iter().map(|e| e.message.as_str()).collect();
    write!(f, "{}", messages.join("; "))
  }
}

impl std::error::Error for ValidationErrors {}

// ============================================================================
// Field rules
// ============================================================================

fn check_len(
  errors: &mut ValidationErrors,
  field: &'static str,
  label: &str,
  value: &str,
  min: usize,
  max: usize,
) {
  let len = value.chars().count();
  if len < min {
    if min == 1 {
      errors.push(field, format!("{label} is required"));
    } else {
      errors.push(field, format!("{label} must be at least {min} characters"));
    }
  } else if len > max {
    errors.push(field, format!("{label} must be at most {max} characters"));
  }
}

fn check_copies(errors: &mut ValidationErrors, copies: u32, min: u32) {
  if copies < min {
    errors.push("copies", format!("Must have at least {min} copy"));
  } else if copies > 100 {
    errors.push("copies", "Cannot exceed 100 copies");
  }
}

fn check_genre_create(errors: &mut ValidationErrors, genre: &str) {
  if !GENRES.contains(&genre) {
    errors.push(
      "genre",
      format!("Genre must be one of {}", GENRES.join(", ")),
    );
  }
}

pub fn validate_draft(draft: &BookDraft) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::new();
  check_len(&mut errors, "title", "Title", &draft.title, 1, 100);
  check_len(&mut errors, "author", "Author", &draft.author, 1, 50);
  check_genre_create(&mut errors, &draft.genre);
  check_len(&mut errors, "description", "Description", &draft.description, 10, 500);
  check_len(&mut errors, "isbn", "ISBN", &draft.isbn, 10, 25);
  check_copies(&mut errors, draft.copies, 1);
  errors.into_result(())
}

/// Checks only the fields present in the patch.
pub fn validate_patch(patch: &BookPatch) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::new();
  if let Some(title) = &patch.title {
    check_len(&mut errors, "title", "Title", title, 1, 100);
  }
  if let Some(author) = &patch.author {
    check_len(&mut errors, "author", "Author", author, 1, 50);
  }
  if let Some(genre) = &patch.genre {
    check_len(&mut errors, "genre", "Genre", genre, 1, 30);
  }
  if let Some(description) = &patch.description {
    check_len(&mut errors, "description", "Description", description, 10, 500);
  }
  if let Some(isbn) = &patch.isbn {
    check_len(&mut errors, "isbn", "ISBN", isbn, 10, 25);
  }
  if let Some(copies) = patch.copies {
    check_copies(&mut errors, copies, 0);
  }
  errors.into_result(())
}

/// Most copies a single request may borrow, given what is on the shelf.
pub fn max_borrow(copies: u32) -> u32 {
  copies.min(MAX_BORROW)
}

/// `known_copies` is the cached copy count, when there is one.
pub fn validate_borrow(
  request: &BorrowRequest,
  known_copies: Option<u32>,
) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::new();
  if request.book.is_empty() {
    errors.push("book", "Book ID is required");
  }
  match known_copies {
    Some(0) => errors.push("quantity", "This book is out of stock"),
    Some(copies) if request.quantity > copies => errors.push(
      "quantity",
      format!("Only {copies} copies available"),
    ),
    _ => {}
  }
  if errors.get("quantity").is_none() {
    let max = known_copies.map_or(MAX_BORROW, max_borrow);
    if request.quantity < 1 {
      errors.push("quantity", "Quantity must be at least 1");
    } else if request.quantity > max {
      errors.push("quantity", format!("Cannot borrow more than {max} copies"));
    }
  }
  errors.into_result(())
}

// ============================================================================
// Raw form input
// ============================================================================

/// Raw field values of the create/edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookForm {
  pub title: String,
  pub author: String,
  pub genre: String,
  pub description: String,
  pub isbn: String,
  pub copies: String,
}

impl BookForm {
  pub fn from_book(book: &Book) -> Self {
    Self {
      title: book.title.clone(),
      author: book.author.clone(),
      genre: book.genre.clone(),
      description: book.description.clone(),
      isbn: book.isbn.clone(),
      copies: book.copies().to_string(),
    }
  }

  fn parse_copies(&self, errors: &mut ValidationErrors) -> Option<u32> {
    match self.copies.trim().parse::<u32>() {
      Ok(n) => Some(n),
      Err(_) => {
        errors.push("copies", "Copies must be a whole number");
        None
      }
    }
  }

  pub fn to_draft(&self) -> Result<BookDraft, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let copies = self.parse_copies(&mut errors);
    let draft = BookDraft {
      title: self.title.trim().to_string(),
      author: self.author.trim().to_string(),
      genre: self.genre.trim().to_uppercase(),
      description: self.description.trim().to_string(),
      isbn: self.isbn.trim().to_string(),
      copies: copies.unwrap_or(1),
    };
    if let Err(field_errors) = validate_draft(&draft) {
      for e in field_errors.0 {
        if copies.is_none() && e.field == "copies" {
          continue;
        }
        errors.0.push(e);
      }
    }
    errors.into_result(draft)
  }

  /// Patch holding only the fields that differ from `original`.
  pub fn to_patch(&self, original: &Book) -> Result<BookPatch, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let copies = self.parse_copies(&mut errors);

    let changed = |value: &str, current: &str| {
      let value = value.trim();
      (value != current).then(|| value.to_string())
    };

    let patch = BookPatch {
      title: changed(&self.title, &original.title),
      author: changed(&self.author, &original.author),
      genre: changed(&self.genre, &original.genre),
      description: changed(&self.description, &original.description),
      isbn: changed(&self.isbn, &original.isbn),
      copies: copies.filter(|&c| c != original.copies()),
    };
    if let Err(field_errors) = validate_patch(&patch) {
      errors.0.extend(field_errors.0);
    }
    errors.into_result(patch)
  }
}

/// Raw field values of the borrow form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowForm {
  pub quantity: String,
  pub due_date: String,
}

impl BorrowForm {
  pub fn new(today: NaiveDate) -> Self {
    let due = today + chrono::Duration::days(DEFAULT_LOAN_DAYS);
    Self {
      quantity: "1".to_string(),
      due_date: due.format(DATE_FORMAT).to_string(),
    }
  }

  /// Due dates before `today` are rejected.
  pub fn to_request(
    &self,
    book: &Book,
    today: NaiveDate,
  ) -> Result<BorrowRequest, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let quantity = match self.quantity.trim().parse::<u32>() {
      Ok(n) => Some(n),
      Err(_) => {
        errors.push("quantity", "Quantity must be a whole number");
        None
      }
    };

    let due_date = self.due_date.trim();
    let due_date = if due_date.is_empty() {
      errors.push("due_date", "Due date is required");
      None
    } else {
      match NaiveDate::parse_from_str(due_date, DATE_FORMAT) {
        Ok(date) if date < today => {
          errors.push("due_date", "Due date cannot be in the past");
          None
        }
        Ok(date) => Some(date),
        Err(_) => {
          errors.push("due_date", "Due date must be YYYY-MM-DD");
          None
        }
      }
    };

    match (quantity, due_date) {
      (Some(quantity), Some(due_date)) if errors.is_empty() => {
        let request = BorrowRequest {
          book: book.id.clone(),
          quantity,
          due_date,
        };
        validate_borrow(&request, Some(book.copies()))?;
        Ok(request)
      }
      _ => {
        if let Some(quantity) = quantity {
          let quantity_only = BorrowRequest {
            book: book.id.clone(),
            quantity,
            due_date: NaiveDate::MIN,
          };
          if let Err(more) = validate_borrow(&quantity_only, Some(book.copies())) {
            errors.0.extend(more.0);
          }
        }
        Err(errors)
      }
    }
  }
}
