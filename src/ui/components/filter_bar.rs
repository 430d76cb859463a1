use super::filter_source::FilterSource;
use super::KeyResult;
use crate::ui::renderfns::truncate;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use std::marker::PhantomData;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterBarEvent {
  /// Another tab is selected; the parent re-applies its filter
  SelectionChanged,
}

/// One value of the filtered field and how many items carry it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Tab {
  value: Option<String>,
  count: usize,
}

/// Row of tabs, one per value of a single field, plus a leading "All".
///
/// The selection is remembered by value, so it survives the list being
/// refetched as long as some item still carries that value.
#[derive(Debug, Clone)]
pub struct FilterBar<F, T>
where
  F: FilterSource<T>,
{
  field: F,
  tabs: Vec<Tab>,
  /// Items in the last list shown, for the "All" tab
  total: usize,
  /// `None` is the "All" tab
  selected: Option<usize>,
  _items: PhantomData<T>,
}

impl<F, T> Default for FilterBar<F, T>
where
  F: FilterSource<T>,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<F, T> FilterBar<F, T>
where
  F: FilterSource<T>,
{
  pub fn new() -> Self {
    Self {
      field: F::default(),
      tabs: Vec::new(),
      total: 0,
      selected: None,
      _items: PhantomData,
    }
  }

  pub fn is_active(&self) -> bool {
    self.field.is_active() && !self.tabs.is_empty()
  }

  pub fn field(&self) -> F {
    self.field.clone()
  }

  /// Value of the selected tab; `None` while "All" is selected or the bar is hidden
  pub fn selected_value(&self) -> Option<&Option<String>> {
    if !self.is_active() {
      return None;
    }
    self
      .selected
      .and_then(|idx| self.tabs.get(idx))
      .map(|tab| &tab.value)
  }

  /// Move to the tab holding `value`, or "All" for `None` or an unknown value
  pub fn select_value(&mut self, value: Option<&str>) {
    self.selected = value.and_then(|v| self.position_of(&Some(v.to_string())));
  }

  /// Switch to `field`, building its tabs from `items`, with "All" selected
  pub fn show(&mut self, field: F, items: &[T]) {
    self.field = field;
    self.selected = None;
    self.rebuild(items);
  }

  /// Recount the tabs after the list changed.
  ///
  /// Returns `true` when the selected value no longer exists and the bar
  /// fell back to "All".
  pub fn refresh(&mut self, items: &[T]) -> bool {
    let previous = self.selected_value().cloned();
    self.rebuild(items);
    match previous {
      Some(value) => {
        self.selected = self.position_of(&value);
        self.selected.is_none()
      }
      None => false,
    }
  }

  pub fn clear(&mut self) {
    self.field = F::default();
    self.tabs.clear();
    self.total = 0;
    self.selected = None;
  }

  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FilterBarEvent> {
    if !self.is_active() {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::PageUp => self.step(false),
      KeyCode::PageDown => self.step(true),
      _ => return KeyResult::NotHandled,
    }
    KeyResult::Event(FilterBarEvent::SelectionChanged)
  }

  fn rebuild(&mut self, items: &[T]) {
    self.total = items.len();
    self.tabs = self
      .field
      .unique_values(items)
      .into_iter()
      .map(|value| Tab {
        count: self.field.filter(items, Some(&value)).len(),
        value,
      })
      .collect();
  }

  fn position_of(&self, value: &Option<String>) -> Option<usize> {
    self.tabs.iter().position(|tab| tab.value == *value)
  }

  /// All, then each tab in order, wrapping at both ends
  fn step(&mut self, forward: bool) {
    let last = self.tabs.len().saturating_sub(1);
    self.selected = match (self.selected, forward) {
      (None, true) => Some(0),
      (None, false) => Some(last),
      (Some(idx), true) if idx >= last => None,
      (Some(idx), true) => Some(idx + 1),
      (Some(0), false) => None,
      (Some(idx), false) => Some(idx - 1),
    };
  }

  pub fn render(&self, frame: &mut Frame, area: Rect) {
    if !self.is_active() {
      return;
    }

    let tab_style = |selected: bool| {
      if selected {
        Style::default().fg(Color::Black).bg(Color::Cyan)
      } else {
        Style::default().fg(Color::Gray)
      }
    };

    let mut spans = vec![
      Span::styled(
        format!("[{}] ", self.field.label()),
        Style::default().fg(Color::Yellow),
      ),
      Span::styled(
        format!(" All {} ", self.total),
        tab_style(self.selected.is_none()),
      ),
    ];

    for (idx, tab) in self.tabs.iter().enumerate() {
      spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
      let name = match &tab.value {
        Some(v) => truncate(v, 15),
        None => "(no genre)".to_string(),
      };
      spans.push(Span::styled(
        format!(" {} {} ", name, tab.count),
        tab_style(self.selected == Some(idx)),
      ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::types::fixtures::book;
  use crate::catalog::Book;
  use crate::ui::components::BookFilterField;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn books() -> Vec<Book> {
    vec![book("1", "Emma", 0), book("2", "Persuasion", 3)]
  }

  fn genre_shelf() -> Vec<Book> {
    let mut dune = book("3", "Dune", 2);
    dune.genre = "FANTASY".to_string();
    vec![book("1", "Emma", 0), book("2", "Persuasion", 3), dune]
  }

  fn visible_ids<'a>(bar: &FilterBar<BookFilterField, Book>, books: &'a [Book]) -> Vec<&'a str> {
    bar
      .field()
      .filter(books, bar.selected_value())
      .iter()
      .map(|b| b.id.as_str())
      .collect()
  }

  #[test]
  fn test_hidden_bar_passes_everything() {
    let mut bar: FilterBar<BookFilterField, Book> = FilterBar::new();
    let books = books();
    assert!(!bar.is_active());
    assert_eq!(visible_ids(&bar, &books), vec!["1", "2"]);
    assert_eq!(bar.handle_key(key(KeyCode::PageDown)), KeyResult::NotHandled);
  }

  #[test]
  fn test_tabs_count_their_books() {
    let books = genre_shelf();
    let mut bar: FilterBar<BookFilterField, Book> = FilterBar::new();
    bar.show(BookFilterField::Genre, &books);

    assert_eq!(bar.total, 3);
    let counts: Vec<_> = bar
      .tabs
      .iter()
      .map(|t| (t.value.as_deref(), t.count))
      .collect();
    assert_eq!(counts, vec![(Some("FANTASY"), 1), (Some("FICTION"), 2)]);
  }

  #[test]
  fn test_tabs_wrap_through_all() {
    let books = books();
    let mut bar: FilterBar<BookFilterField, Book> = FilterBar::new();
    bar.show(BookFilterField::Availability, &books);
    assert!(bar.is_active());

    bar.handle_key(key(KeyCode::PageDown));
    assert_eq!(visible_ids(&bar, &books), vec!["2"]);

    bar.handle_key(key(KeyCode::PageDown));
    assert_eq!(visible_ids(&bar, &books), vec!["1"]);

    bar.handle_key(key(KeyCode::PageDown));
    assert_eq!(bar.selected_value(), None);

    bar.handle_key(key(KeyCode::PageUp));
    assert_eq!(bar.selected_value(), Some(&Some("Unavailable".to_string())));
  }

  #[test]
  fn test_select_value() {
    let books = books();
    let mut bar: FilterBar<BookFilterField, Book> = FilterBar::new();
    bar.show(BookFilterField::Availability, &books);

    bar.select_value(Some("Unavailable"));
    assert_eq!(bar.selected_value(), Some(&Some("Unavailable".to_string())));
    bar.select_value(Some("Lost"));
    assert_eq!(bar.selected_value(), None);
  }

  #[test]
  fn test_refresh_follows_selected_value() {
    let mut books = genre_shelf();
    let mut bar: FilterBar<BookFilterField, Book> = FilterBar::new();
    bar.show(BookFilterField::Genre, &books);
    bar.select_value(Some("FICTION"));

    // A new genre sorts first; the selection stays on FICTION
    let mut cosmos = book("4", "Cosmos", 1);
    cosmos.genre = "SCIENCE".to_string();
    let mut atlas = book("5", "Atlas", 1);
    atlas.genre = "BIOGRAPHY".to_string();
    books.extend([cosmos, atlas]);
    assert!(!bar.refresh(&books));
    assert_eq!(bar.selected_value(), Some(&Some("FICTION".to_string())));

    // The last FICTION books are gone
    books.retain(|b| b.genre != "FICTION");
    assert!(bar.refresh(&books));
    assert_eq!(bar.selected_value(), None);
  }
}
