use crate::catalog::{Availability, Book, BookFilter, CatalogError, CatalogStats};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{
  BookFilterField, ConfirmDialog, ConfirmEvent, FilterBar, FilterBarEvent, FilterFieldPicker,
  FilterFieldPickerEvent, KeyResult, SearchEvent, SearchInput,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{availability_color, offline_marker, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::ViewContext;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

use super::{BookDetailView, BookFormView, BorrowFormView};

/// A delete waiting for confirmation
#[derive(Debug, Clone)]
struct PendingDelete {
  id: String,
  title: String,
}

/// Root view: the whole catalog with search and filters
pub struct BookListView {
  ctx: ViewContext,
  query: Query<Vec<Book>>,

  // UI state
  list_state: ListState,
  filter: BookFilter,

  // Components
  search: SearchInput,
  filter_bar: FilterBar<BookFilterField, Book>,
  field_picker: FilterFieldPicker<BookFilterField, Book>,
  confirm: ConfirmDialog<PendingDelete>,

  delete: Mutation<(), CatalogError>,
  deleting: Option<String>,
}

impl BookListView {
  pub fn new(ctx: ViewContext) -> Self {
    let mut query = ctx.book_list_query();

    // Start fetching immediately
    query.fetch();

    Self {
      ctx,
      query,
      list_state: ListState::default(),
      filter: BookFilter::default(),
      search: SearchInput::new(),
      filter_bar: FilterBar::new(),
      field_picker: FilterFieldPicker::new(),
      confirm: ConfirmDialog::new(),
      delete: Mutation::new(),
      deleting: None,
    }
  }

  fn books(&self) -> &[Book] {
    self.query.data().map(|b| b.as_slice()).unwrap_or(&[])
  }

  /// Books passing search and filters, in service order
  fn visible_books(&self) -> Vec<&Book> {
    self.filter.apply(self.books())
  }

  fn selected_book(&self) -> Option<&Book> {
    self
      .list_state
      .selected()
      .and_then(|idx| self.visible_books().get(idx).copied())
  }

  fn refresh_filter_values(&mut self) {
    let books = self.query.data().map(|b| b.as_slice()).unwrap_or(&[]);
    if self.filter_bar.refresh(books) {
      self.sync_from_filter_bar();
    }
  }

  /// Copy the filter bar's tab into the book filter
  fn sync_from_filter_bar(&mut self) {
    let value = self.filter_bar.selected_value().cloned().flatten();
    match self.filter_bar.field() {
      BookFilterField::Genre => self.filter.genre = value,
      BookFilterField::Availability => {
        self.filter.availability = value
          .as_deref()
          .and_then(Availability::from_label)
          .unwrap_or_default();
      }
      BookFilterField::None => {}
    }
    self.list_state.select(Some(0));
  }

  fn set_filter_field(&mut self, field: BookFilterField) {
    // The previous field stops filtering
    match self.filter_bar.field() {
      BookFilterField::Genre => self.filter.genre = None,
      BookFilterField::Availability => self.filter.availability = Availability::All,
      BookFilterField::None => {}
    }
    let books = self.query.data().map(|b| b.as_slice()).unwrap_or(&[]);
    self.filter_bar.show(field, books);
    self.list_state.select(Some(0));
  }

  fn cycle_availability(&mut self) {
    self.filter.availability = self.filter.availability.next();
    if self.filter_bar.field() == BookFilterField::Availability {
      let label = match self.filter.availability {
        Availability::All => None,
        other => Some(other.label()),
      };
      self.filter_bar.select_value(label);
    }
    self.list_state.select(Some(0));
  }

  fn clear_filters(&mut self) {
    self.search.clear();
    self.filter = BookFilter::default();
    self.filter_bar.clear();
    self.list_state.select(Some(0));
  }

  fn start_delete(&mut self, pending: PendingDelete) {
    let store = self.ctx.store.clone();
    let id = pending.id;
    self.deleting = Some(pending.title);
    self
      .delete
      .run(async move { store.delete_book(&id).await });
  }

  fn render_stats(&self, frame: &mut Frame, area: Rect) {
    let stats = CatalogStats::of(self.books());
    let mut spans = vec![
      Span::styled(" Total ", Style::default().fg(Color::DarkGray)),
      Span::styled(stats.total.to_string(), Style::default().fg(Color::White).bold()),
      Span::styled("  Available ", Style::default().fg(Color::DarkGray)),
      Span::styled(stats.available.to_string(), Style::default().fg(Color::Green).bold()),
      Span::styled("  Out of stock ", Style::default().fg(Color::DarkGray)),
      Span::styled(stats.unavailable.to_string(), Style::default().fg(Color::Red).bold()),
    ];

    if !self.filter.search.is_empty() {
      spans.push(Span::styled("   /", Style::default().fg(Color::Yellow)));
      spans.push(Span::styled(
        self.filter.search.clone(),
        Style::default().fg(Color::Yellow),
      ));
    }
    if self.filter.availability != Availability::All {
      spans.push(Span::styled(
        format!("   [{}]", self.filter.availability.label()),
        Style::default().fg(Color::Yellow),
      ));
    }
    if let Some(title) = &self.deleting {
      spans.push(Span::styled(
        format!("   deleting \"{}\"...", truncate(title, 30)),
        Style::default().fg(Color::DarkGray),
      ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
  }

  fn list_title(&self, len: usize) -> String {
    let mut title = match self.query.state() {
      QueryState::Loading | QueryState::Idle => " Books (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Books (error: {}) ", e),
      QueryState::Success(books) if len == books.len() => format!(" Books ({}) ", len),
      QueryState::Success(books) => format!(" Books ({} of {}) ", len, books.len()),
    };
    if let Some(error) = self.query.background_error() {
      title.push_str(&format!("[refresh failed: {}] ", truncate(error, 40)));
    } else if self.query.is_fetching() && self.query.is_success() {
      title.push_str("[refreshing] ");
    }
    if let Some(cached_at) = self.query.offline_since() {
      title.push_str(&offline_marker(cached_at));
    }
    title
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible_books().len();
    ensure_valid_selection(&mut self.list_state, len);
    let title = self.list_title(len);

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 && !self.query.is_loading() {
      let content = if self.query.is_error() {
        "Failed to load books. Press 'r' to retry."
      } else if self.books().is_empty() {
        "No books in the catalog. Press 'n' to add one."
      } else {
        "No books match the current search or filters. Press Esc to clear."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    // Collect items to avoid borrow conflict
    let items: Vec<ListItem> = self
      .visible_books()
      .iter()
      .map(|book| {
        let line = Line::from(vec![
          Span::styled(
            format!("{:<32}", truncate(&book.title, 32)),
            Style::default().fg(Color::Cyan),
          ),
          Span::raw(" "),
          Span::raw(format!("{:<22}", truncate(&book.author, 22))),
          Span::raw(" "),
          Span::styled(
            format!("{:<12}", truncate(&book.genre, 12)),
            Style::default().fg(Color::Magenta),
          ),
          Span::raw(" "),
          Span::styled(
            format!("{:>3} copies", book.copies()),
            Style::default().fg(availability_color(book)),
          ),
        ]);
        ListItem::new(line)
      })
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }
}

impl View for BookListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    // Overlays first, in stacking order
    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(pending)) => {
        self.start_delete(pending);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match self.field_picker.handle_key(key) {
      KeyResult::Event(FilterFieldPickerEvent::Selected(field)) => {
        self.set_filter_field(field);
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(query)) => {
        self.filter.search = query;
        self.list_state.select(Some(0));
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    if let KeyResult::Event(FilterBarEvent::SelectionChanged) = self.filter_bar.handle_key(key) {
      self.sync_from_filter_bar();
      return ViewAction::None;
    }

    // Normal mode key handling
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.list_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.list_state.select_last(),

      KeyCode::Char('f') => self.field_picker.show(&self.filter_bar.field()),
      KeyCode::Char('a') => self.cycle_availability(),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Esc => self.clear_filters(),

      KeyCode::Enter => {
        if let Some(book) = self.selected_book() {
          let view = BookDetailView::new(self.ctx.clone(), book.id.clone(), book.title.clone());
          return ViewAction::Push(Box::new(view));
        }
      }
      KeyCode::Char('n') => {
        return ViewAction::Push(Box::new(BookFormView::create(self.ctx.clone())));
      }
      KeyCode::Char('e') => {
        if let Some(book) = self.selected_book() {
          let view = BookFormView::edit(self.ctx.clone(), book.clone());
          return ViewAction::Push(Box::new(view));
        }
      }
      KeyCode::Char('b') => {
        if let Some(book) = self.selected_book() {
          if !book.is_available() {
            self.ctx.notifier.error(format!("\"{}\" is out of stock", book.title));
          } else {
            let view = BorrowFormView::new(self.ctx.clone(), book.clone());
            return ViewAction::Push(Box::new(view));
          }
        }
      }
      KeyCode::Char('d') => {
        if self.delete.is_pending() {
          self.ctx.notifier.info("A delete is already in progress");
        } else if let Some(book) = self.selected_book() {
          let pending = PendingDelete {
            id: book.id.clone(),
            title: book.title.clone(),
          };
          let message = format!("Delete \"{}\"? This cannot be undone.", book.title);
          self.confirm.show("Delete book", message, pending);
        }
      }

      KeyCode::Char('q') => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let show_filters = self.filter_bar.is_active();
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1),                      // Stats
        Constraint::Length(u16::from(show_filters)), // Filter tabs
        Constraint::Min(0),                         // List
      ])
      .split(area);

    self.render_stats(frame, chunks[0]);
    self.filter_bar.render(frame, chunks[1]);
    self.render_list(frame, chunks[2]);

    // Overlays on top
    self.search.render_overlay(frame, area);
    self.field_picker.render_overlay(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    if self.filter.is_empty() {
      "Books".to_string()
    } else {
      "Books [filtered]".to_string()
    }
  }

  fn context(&self) -> Option<String> {
    self.selected_book().map(|b| truncate(&b.title, 40))
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active() || self.field_picker.is_active() || self.confirm.is_active()
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.tick() {
      self.refresh_filter_values();
    }
    let len = self.visible_books().len();
    ensure_valid_selection(&mut self.list_state, len);

    if let Some(result) = self.delete.poll() {
      let title = self.deleting.take().unwrap_or_default();
      match result {
        Ok(()) => self.ctx.notifier.success(format!("Deleted \"{}\"", title)),
        Err(e) => self
          .ctx
          .notifier
          .error(format!("Failed to delete \"{}\": {}", title, e)),
      }
    }
    ViewAction::None
  }

  fn on_focus(&mut self) {
    self.query.on_focus();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("n", "new").with_priority(30),
      ShortcutInfo::new("e", "edit").with_priority(31),
      ShortcutInfo::new("b", "borrow").with_priority(32),
      ShortcutInfo::new("d", "delete").with_priority(33),
      ShortcutInfo::new("f", "filter by").with_priority(40),
      ShortcutInfo::new("a", self.filter.availability.next().label()).with_priority(41),
      ShortcutInfo::new("r", "refresh").with_priority(50),
    ];
    if self.filter_bar.is_active() {
      shortcuts.push(ShortcutInfo::new("PgUp/Dn", "filter tab").with_priority(42).when_active());
    }
    if !self.filter.is_empty() {
      shortcuts.push(ShortcutInfo::new("esc", "clear").with_priority(43).when_active());
    }
    shortcuts
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::types::fixtures::book;
  use crate::catalog::fake::Failure;
  use crate::ui::context::testing::{context, offline_context};
  use crate::ui::notification::Notification;
  use crossterm::event::KeyModifiers;
  use std::time::Duration;
  use tokio::sync::mpsc::UnboundedReceiver;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  async fn loaded_view(books: Vec<Book>) -> (BookListView, UnboundedReceiver<Notification>) {
    let (ctx, _fake, rx) = context(books);
    let mut view = BookListView::new(ctx);
    tokio::time::sleep(Duration::from_millis(20)).await;
    view.tick();
    (view, rx)
  }

  fn visible_ids(view: &BookListView) -> Vec<String> {
    view.visible_books().iter().map(|b| b.id.clone()).collect()
  }

  #[tokio::test]
  async fn test_availability_key_partitions_list() {
    let (mut view, _rx) = loaded_view(vec![book("1", "Emma", 0), book("2", "Persuasion", 3)]).await;
    assert_eq!(visible_ids(&view), vec!["1", "2"]);

    view.handle_key(key(KeyCode::Char('a')));
    assert_eq!(visible_ids(&view), vec!["2"]);

    view.handle_key(key(KeyCode::Char('a')));
    assert_eq!(visible_ids(&view), vec!["1"]);

    view.handle_key(key(KeyCode::Char('a')));
    assert_eq!(visible_ids(&view), vec!["1", "2"]);
  }

  #[tokio::test]
  async fn test_search_filters_while_typing() {
    let (mut view, _rx) = loaded_view(vec![book("1", "Emma", 1), book("2", "Persuasion", 3)]).await;

    view.handle_key(key(KeyCode::Char('/')));
    assert!(view.is_capturing_input());
    for c in "PERS".chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
    assert_eq!(visible_ids(&view), vec!["2"]);

    // Esc in the search box drops the query
    view.handle_key(key(KeyCode::Esc));
    assert_eq!(visible_ids(&view), vec!["1", "2"]);
  }

  #[tokio::test]
  async fn test_offline_data_is_marked() {
    let (ctx, fake, _rx) = offline_context(vec![book("1", "Emma", 1)]);
    let mut view = BookListView::new(ctx);
    tokio::time::sleep(Duration::from_millis(20)).await;
    view.tick();
    assert!(!view.list_title(1).contains("offline"));

    fake.fail(Failure::Down);
    view.handle_key(key(KeyCode::Char('r')));
    tokio::time::sleep(Duration::from_millis(20)).await;
    view.tick();
    assert_eq!(visible_ids(&view), vec!["1"]);
    assert!(view.list_title(1).contains("[offline, last known data from "));

    fake.recover();
    view.handle_key(key(KeyCode::Char('r')));
    tokio::time::sleep(Duration::from_millis(20)).await;
    view.tick();
    assert!(!view.list_title(1).contains("offline"));
  }

  #[tokio::test]
  async fn test_genre_filter_tabs() {
    let mut dune = book("2", "Dune", 3);
    dune.genre = "FANTASY".to_string();
    let (mut view, _rx) = loaded_view(vec![book("1", "Emma", 1), dune]).await;

    // f, down to Genre, Enter
    view.handle_key(key(KeyCode::Char('f')));
    view.handle_key(key(KeyCode::Char('j')));
    view.handle_key(key(KeyCode::Enter));
    assert!(view.filter_bar.is_active());

    view.handle_key(key(KeyCode::PageDown));
    assert_eq!(visible_ids(&view), vec!["2"]);
    view.handle_key(key(KeyCode::PageDown));
    assert_eq!(visible_ids(&view), vec!["1"]);

    view.handle_key(key(KeyCode::Esc));
    assert!(!view.filter_bar.is_active());
    assert_eq!(visible_ids(&view), vec!["1", "2"]);
  }

  #[tokio::test]
  async fn test_confirmed_delete_removes_book() {
    let (mut view, mut rx) =
      loaded_view(vec![book("1", "Emma", 1), book("2", "Persuasion", 3)]).await;

    view.handle_key(key(KeyCode::Char('d')));
    assert!(view.confirm.is_active());
    view.handle_key(key(KeyCode::Char('y')));

    tokio::time::sleep(Duration::from_millis(20)).await;
    view.tick();
    tokio::time::sleep(Duration::from_millis(20)).await;
    view.tick();

    assert_eq!(visible_ids(&view), vec!["2"]);
    let notification = rx.try_recv().unwrap();
    assert_eq!(notification.message, "Deleted \"Emma\"");
  }

  #[tokio::test]
  async fn test_borrow_out_of_stock_is_refused() {
    let (mut view, mut rx) = loaded_view(vec![book("1", "Emma", 0)]).await;
    assert!(matches!(view.handle_key(key(KeyCode::Char('b'))), ViewAction::None));
    assert_eq!(rx.try_recv().unwrap().message, "\"Emma\" is out of stock");
  }

  #[tokio::test]
  async fn test_enter_opens_detail() {
    let (mut view, _rx) = loaded_view(vec![book("1", "Emma", 1)]).await;
    assert!(matches!(view.handle_key(key(KeyCode::Enter)), ViewAction::Push(_)));
  }
}
