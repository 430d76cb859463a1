//! In-memory catalog service for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::CatalogApi;
use super::error::{CatalogError, Result};
use super::types::{Book, BookDraft, BookPatch, BorrowRecord, BorrowRequest, BorrowSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
  /// Connection refused
  Down,
  /// Server answers 500
  Broken,
}

#[derive(Default)]
pub struct FakeCatalog {
  books: Mutex<Vec<Book>>,
  /// Report rows with the id of the book they aggregate
  summaries: Mutex<Vec<(String, BorrowSummary)>>,
  failure: Mutex<Option<Failure>>,
  next_id: AtomicUsize,
  pub list_calls: AtomicUsize,
  pub write_calls: AtomicUsize,
}

impl FakeCatalog {
  pub fn with_books(books: Vec<Book>) -> Self {
    let fake = Self::default();
    fake.next_id.store(100, Ordering::SeqCst);
    *fake.books.lock().unwrap() = books;
    fake
  }

  pub fn fail(&self, failure: Failure) {
    *self.failure.lock().unwrap() = Some(failure);
  }

  pub fn recover(&self) {
    *self.failure.lock().unwrap() = None;
  }

  pub fn book(&self, id: &str) -> Option<Book> {
    self.books.lock().unwrap().iter().find(|b| b.id == id).cloned()
  }

  fn check(&self) -> Result<()> {
    match *self.failure.lock().unwrap() {
      None => Ok(()),
      Some(Failure::Down) => Err(CatalogError::Transport("connection refused".to_string())),
      Some(Failure::Broken) => Err(CatalogError::Status {
        status: 500,
        message: "Internal Server Error".to_string(),
      }),
    }
  }

  fn write(&self) -> Result<()> {
    self.write_calls.fetch_add(1, Ordering::SeqCst);
    self.check()
  }
}

#[async_trait]
impl CatalogApi for FakeCatalog {
  async fn list_books(&self) -> Result<Vec<Book>> {
    self.list_calls.fetch_add(1, Ordering::SeqCst);
    self.check()?;
    Ok(self.books.lock().unwrap().clone())
  }

  async fn get_book(&self, id: &str) -> Result<Book> {
    self.check()?;
    self
      .book(id)
      .ok_or_else(|| CatalogError::NotFound(id.to_string()))
  }

  async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
    self.write()?;
    let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
    let book = Book::new(id, draft.clone());
    self.books.lock().unwrap().push(book.clone());
    Ok(book)
  }

  async fn update_book(&self, id: &str, patch: &BookPatch) -> Result<Option<Book>> {
    self.write()?;
    let mut books = self.books.lock().unwrap();
    let book = books
      .iter_mut()
      .find(|b| b.id == id)
      .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;
    patch.apply_to(book);
    Ok(Some(book.clone()))
  }

  async fn delete_book(&self, id: &str) -> Result<()> {
    self.write()?;
    self.books.lock().unwrap().retain(|b| b.id != id);
    Ok(())
  }

  async fn borrow_book(&self, request: &BorrowRequest) -> Result<BorrowRecord> {
    self.write()?;
    let mut books = self.books.lock().unwrap();
    let book = books
      .iter_mut()
      .find(|b| b.id == request.book)
      .ok_or_else(|| CatalogError::NotFound(request.book.clone()))?;
    if !book.take_copies(request.quantity) {
      return Err(CatalogError::Status {
        status: 400,
        message: "Not enough copies available".to_string(),
      });
    }

    let mut summaries = self.summaries.lock().unwrap();
    match summaries.iter_mut().find(|(id, _)| *id == book.id) {
      Some((_, row)) => row.total_quantity += request.quantity,
      None => summaries.push((
        book.id.clone(),
        BorrowSummary {
          position: 0,
          title: book.title.clone(),
          isbn: book.isbn.clone(),
          total_quantity: request.quantity,
        },
      )),
    }

    Ok(BorrowRecord {
      id: Some(format!("borrow-{}", self.next_id.fetch_add(1, Ordering::SeqCst))),
      book_id: request.book.clone(),
      quantity: request.quantity,
      due_date: Some(request.due_date.to_string()),
    })
  }

  async fn borrow_summary(&self) -> Result<Vec<BorrowSummary>> {
    self.check()?;
    let summaries = self.summaries.lock().unwrap();
    Ok(summaries.iter().map(|(_, row)| row.clone()).collect())
  }
}
