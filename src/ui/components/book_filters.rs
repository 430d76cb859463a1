use super::filter_source::FilterSource;
use crate::catalog::filter::genres;
use crate::catalog::{Availability, Book};

/// Field to filter books by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookFilterField {
  #[default]
  None,
  Genre,
  Availability,
}

impl BookFilterField {
  fn matches(&self, book: &Book, value: &Option<String>) -> bool {
    match (self, value) {
      (BookFilterField::None, _) => true,
      (BookFilterField::Genre, Some(genre)) => book.genre == *genre,
      (BookFilterField::Genre, None) => book.genre.is_empty(),
      (BookFilterField::Availability, value) => value
        .as_deref()
        .and_then(Availability::from_label)
        .unwrap_or_default()
        .matches(book),
    }
  }
}

impl FilterSource<Book> for BookFilterField {
  fn label(&self) -> &'static str {
    match self {
      BookFilterField::None => "None",
      BookFilterField::Genre => "Genre",
      BookFilterField::Availability => "Availability",
    }
  }

  fn unique_values(&self, items: &[Book]) -> Vec<Option<String>> {
    match self {
      BookFilterField::None => Vec::new(),
      BookFilterField::Genre => {
        let mut values: Vec<Option<String>> = Vec::new();
        if items.iter().any(|b| b.genre.is_empty()) {
          values.push(None);
        }
        let mut found = genres(items);
        found.sort();
        values.extend(found.into_iter().map(Some));
        values
      }
      // Fixed tabs so the partition is visible even when one side is empty
      BookFilterField::Availability => [Availability::Available, Availability::Unavailable]
        .iter()
        .map(|a| Some(a.label().to_string()))
        .collect(),
    }
  }

  fn filter<'a>(&self, items: &'a [Book], value: Option<&Option<String>>) -> Vec<&'a Book> {
    match value {
      None => items.iter().collect(), // "All" - no filtering
      Some(value) => items.iter().filter(|b| self.matches(b, value)).collect(),
    }
  }

  fn is_active(&self) -> bool {
    !matches!(self, BookFilterField::None)
  }

  fn all_variants() -> &'static [Self] {
    &[
      BookFilterField::None,
      BookFilterField::Genre,
      BookFilterField::Availability,
    ]
  }
}
