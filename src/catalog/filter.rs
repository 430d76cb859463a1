//! Client-side search and filtering over a fetched book list.

use super::types::Book;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Availability {
  #[default]
  All,
  Available,
  Unavailable,
}

impl Availability {
  pub fn label(&self) -> &'static str {
    match self {
      Availability::All => "All",
      Availability::Available => "Available",
      Availability::Unavailable => "Unavailable",
    }
  }

  /// Cycle All -> Available -> Unavailable -> All.
  pub fn next(self) -> Self {
    match self {
      Availability::All => Availability::Available,
      Availability::Available => Availability::Unavailable,
      Availability::Unavailable => Availability::All,
    }
  }

  pub fn matches(&self, book: &Book) -> bool {
    match self {
      Availability::All => true,
      Availability::Available => book.is_available(),
      Availability::Unavailable => !book.is_available(),
    }
  }

  pub fn from_label(label: &str) -> Option<Self> {
    [Self::All, Self::Available, Self::Unavailable]
      .into_iter()
      .find(|a| a.label() == label)
  }
}

/// Combined search text, genre and availability filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
  pub search: String,
  pub genre: Option<String>,
  pub availability: Availability,
}

impl BookFilter {
  pub fn is_empty(&self) -> bool {
    self.search.is_empty() && self.genre.is_none() && self.availability == Availability::All
  }

  /// Case-insensitive substring match over title, author and genre.
  pub fn matches_search(&self, book: &Book) -> bool {
    if self.search.is_empty() {
      return true;
    }
    let needle = self.search.to_lowercase();
    [&book.title, &book.author, &book.genre]
      .iter()
      .any(|field| field.to_lowercase().contains(&needle))
  }

  pub fn matches(&self, book: &Book) -> bool {
    self.matches_search(book)
      && self
        .genre
        .as_ref()
        .map_or(true, |genre| book.genre == *genre)
      && self.availability.matches(book)
  }

  pub fn apply<'a>(&self, books: &'a [Book]) -> Vec<&'a Book> {
    books.iter().filter(|b| self.matches(b)).collect()
  }
}

/// Counts shown above the book list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogStats {
  pub total: usize,
  pub available: usize,
  pub unavailable: usize,
}

impl CatalogStats {
  pub fn of<'a>(books: impl IntoIterator<Item = &'a Book>) -> Self {
    books.into_iter().fold(Self::default(), |mut stats, book| {
      stats.total += 1;
      if book.is_available() {
        stats.available += 1;
      } else {
        stats.unavailable += 1;
      }
      stats
    })
  }
}

/// Distinct genres in first-seen order.
pub fn genres(books: &[Book]) -> Vec<String> {
  let mut seen: Vec<String> = Vec::new();
  for book in books {
    if !book.genre.is_empty() && !seen.iter().any(|g| g == &book.genre) {
      seen.push(book.genre.clone());
    }
  }
  seen
}
