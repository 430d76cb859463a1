use chrono::{DateTime, Local, Utc};
use ratatui::prelude::Color;

use crate::catalog::Book;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a book's availability
pub fn availability_color(book: &Book) -> Color {
  match book.copies() {
    0 => Color::Red,
    1..=2 => Color::Yellow,
    _ => Color::Green,
  }
}

/// Label shown next to a book's copy count
pub fn availability_label(book: &Book) -> &'static str {
  if book.is_available() {
    "Available"
  } else {
    "Out of stock"
  }
}

/// Trim a server timestamp to its date part for display
pub fn short_date(timestamp: &str) -> &str {
  timestamp.split('T').next().unwrap_or(timestamp)
}

/// Title marker for cached data served while the service is unreachable
pub fn offline_marker(cached_at: DateTime<Utc>) -> String {
  format!(
    "[offline, last known data from {}] ",
    cached_at.with_timezone(&Local).format("%H:%M")
  )
}
