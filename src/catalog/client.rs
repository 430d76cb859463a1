use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use super::api_types::{
  extract_error_message, ApiBook, ApiBorrowRecord, ApiBorrowSummary, ApiResponse,
};
use super::error::{CatalogError, Result};
use super::types::{Book, BookDraft, BookPatch, BorrowRecord, BorrowRequest, BorrowSummary};

/// Operations offered by the remote catalog service.
#[async_trait]
pub trait CatalogApi: Send + Sync {
  async fn list_books(&self) -> Result<Vec<Book>>;
  async fn get_book(&self, id: &str) -> Result<Book>;
  async fn create_book(&self, draft: &BookDraft) -> Result<Book>;
  /// Returns the updated book when the server echoes it back
  async fn update_book(&self, id: &str, patch: &BookPatch) -> Result<Option<Book>>;
  async fn delete_book(&self, id: &str) -> Result<()>;
  async fn borrow_book(&self, request: &BorrowRequest) -> Result<BorrowRecord>;
  async fn borrow_summary(&self) -> Result<Vec<BorrowSummary>>;
}

/// HTTP client for the catalog REST service
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  base_url: Url,
}

impl CatalogClient {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
    let base_url = Url::parse(base_url)?;
    if base_url.cannot_be_a_base() {
      return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase.into());
    }

    let http = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("shelf/", env!("CARGO_PKG_VERSION")))
      .build()?;

    Ok(Self { http, base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Join path segments onto the base URL, percent-encoding each one.
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  async fn send<T, B>(&self, method: Method, url: Url, body: Option<&B>) -> Result<ApiResponse<T>>
  where
    T: DeserializeOwned,
    B: Serialize + ?Sized,
  {
    tracing::debug!(%method, %url, "request");

    let mut request = self.http.request(method.clone(), url.clone());
    if let Some(body) = body {
      request = request.json(body);
    }

    let response = request.send().await.map_err(|e| {
      tracing::warn!(%method, %url, error = %e, "request failed");
      CatalogError::from(e)
    })?;

    let status = response.status();
    let text = response.text().await?;
    tracing::debug!(%method, %url, status = status.as_u16(), bytes = text.len(), "response");

    decode_response(status, &text)
  }

  async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<ApiResponse<T>> {
    self.send::<T, ()>(Method::GET, url, None).await
  }
}

/// Decode a response body into the envelope, classifying failures.
pub(crate) fn decode_response<T: DeserializeOwned>(
  status: StatusCode,
  body: &str,
) -> Result<ApiResponse<T>> {
  if !status.is_success() {
    let message = extract_error_message(body)
      .or_else(|| status.canonical_reason().map(str::to_string))
      .unwrap_or_else(|| "request failed".to_string());
    return Err(CatalogError::Status {
      status: status.as_u16(),
      message,
    });
  }

  if body.trim().is_empty() {
    return Ok(ApiResponse {
      success: true,
      message: None,
      data: None,
    });
  }

  let envelope: ApiResponse<T> =
    serde_json::from_str(body).map_err(|e| CatalogError::Decode(e.to_string()))?;

  if !envelope.success {
    return Err(CatalogError::Rejected(
      envelope
        .message
        .unwrap_or_else(|| "request was rejected".to_string()),
    ));
  }

  Ok(envelope)
}

fn require_data<T>(envelope: ApiResponse<T>, what: &str) -> Result<T> {
  envelope
    .data
    .ok_or_else(|| CatalogError::Decode(format!("response has no {what}")))
}

#[async_trait]
impl CatalogApi for CatalogClient {
  async fn list_books(&self) -> Result<Vec<Book>> {
    let envelope = self.get::<Vec<ApiBook>>(self.endpoint(&["books"])).await?;
    let books = envelope.data.unwrap_or_default();
    books.into_iter().map(Book::try_from).collect()
  }

  async fn get_book(&self, id: &str) -> Result<Book> {
    match self.get::<ApiBook>(self.endpoint(&["books", id])).await {
      Ok(envelope) => require_data(envelope, "book")?.try_into(),
      Err(CatalogError::Status { status: 404, .. }) => Err(CatalogError::NotFound(id.to_string())),
      Err(e) => Err(e),
    }
  }

  async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
    let envelope = self
      .send::<ApiBook, _>(Method::POST, self.endpoint(&["books"]), Some(draft))
      .await?;
    require_data(envelope, "book")?.try_into()
  }

  async fn update_book(&self, id: &str, patch: &BookPatch) -> Result<Option<Book>> {
    let envelope = self
      .send::<ApiBook, _>(Method::PUT, self.endpoint(&["books", id]), Some(patch))
      .await?;
    envelope.data.map(Book::try_from).transpose()
  }

  async fn delete_book(&self, id: &str) -> Result<()> {
    self
      .send::<serde_json::Value, ()>(Method::DELETE, self.endpoint(&["books", id]), None)
      .await?;
    Ok(())
  }

  async fn borrow_book(&self, request: &BorrowRequest) -> Result<BorrowRecord> {
    let envelope = self
      .send::<ApiBorrowRecord, _>(Method::POST, self.endpoint(&["borrows"]), Some(request))
      .await?;
    Ok(match envelope.data {
      Some(record) => {
        let mut record = BorrowRecord::from(record);
        if record.book_id.is_empty() {
          record.book_id = request.book.clone();
        }
        record
      }
      None => BorrowRecord {
        id: None,
        book_id: request.book.clone(),
        quantity: request.quantity,
        due_date: Some(request.due_date.to_string()),
      },
    })
  }

  async fn borrow_summary(&self) -> Result<Vec<BorrowSummary>> {
    let envelope = self
      .get::<Vec<ApiBorrowSummary>>(self.endpoint(&["borrows"]))
      .await?;
    let rows = envelope.data.unwrap_or_default();
    Ok(rows.into_iter().map(BorrowSummary::from).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn client(base: &str) -> CatalogClient {
    CatalogClient::new(base, Duration::from_secs(1)).unwrap()
  }

  #[test]
  fn test_endpoint_joins_segments() {
    let c = client("http://localhost:5000/api");
    assert_eq!(
      c.endpoint(&["books"]).as_str(),
      "http://localhost:5000/api/books"
    );

    let c = client("http://localhost:5000/api/");
    assert_eq!(
      c.endpoint(&["books", "42"]).as_str(),
      "http://localhost:5000/api/books/42"
    );
  }

  #[test]
  fn test_endpoint_encodes_ids() {
    let c = client("http://localhost:5000/api");
    assert_eq!(
      c.endpoint(&["books", "a/b c"]).as_str(),
      "http://localhost:5000/api/books/a%2Fb%20c"
    );
  }

  #[test]
  fn test_rejects_unusable_base_url() {
    assert!(matches!(
      CatalogClient::new("not a url", Duration::from_secs(1)),
      Err(CatalogError::Url(_))
    ));
    assert!(CatalogClient::new("mailto:shelf@example.com", Duration::from_secs(1)).is_err());
  }

  #[test]
  fn test_decode_success() {
    let envelope: ApiResponse<Vec<ApiBook>> = decode_response(
      StatusCode::OK,
      r#"{"success":true,"message":"ok","data":[{"_id":"1","copies":1}]}"#,
    )
    .unwrap();
    assert_eq!(envelope.data.unwrap().len(), 1);
  }

  #[test]
  fn test_decode_status_error_uses_body_message() {
    let err = decode_response::<ApiBook>(
      StatusCode::BAD_REQUEST,
      r#"{"success":false,"message":"Not enough copies available"}"#,
    )
    .unwrap_err();
    match err {
      CatalogError::Status { status, message } => {
        assert_eq!(status, 400);
        assert_eq!(message, "Not enough copies available");
      }
      other => panic!("unexpected error: {other:?}"),
    }
  }

  #[test]
  fn test_decode_status_error_falls_back_to_reason() {
    let err = decode_response::<ApiBook>(StatusCode::INTERNAL_SERVER_ERROR, "").unwrap_err();
    assert_eq!(err.to_string(), "server returned 500: Internal Server Error");
  }

  #[test]
  fn test_decode_rejected_envelope() {
    let err =
      decode_response::<ApiBook>(StatusCode::OK, r#"{"success":false,"message":"duplicate isbn"}"#)
        .unwrap_err();
    assert!(matches!(err, CatalogError::Rejected(m) if m == "duplicate isbn"));
  }

  #[test]
  fn test_decode_malformed_body() {
    let err = decode_response::<ApiBook>(StatusCode::OK, "<html>").unwrap_err();
    assert!(matches!(err, CatalogError::Decode(_)));
  }

  #[test]
  fn test_decode_empty_body() {
    let envelope = decode_response::<serde_json::Value>(StatusCode::NO_CONTENT, "").unwrap();
    assert!(envelope.success);
    assert!(envelope.data.is_none());
  }

  #[tokio::test]
  async fn test_unreachable_service_is_transport_error() {
    // Port 9 (discard) on localhost is not expected to accept HTTP
    let c = client("http://127.0.0.1:9/api");
    let err = c.list_books().await.unwrap_err();
    assert!(err.is_transport(), "got {err:?}");
  }
}
