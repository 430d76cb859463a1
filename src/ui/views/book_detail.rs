use crate::catalog::{Book, CatalogError};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{ConfirmDialog, ConfirmEvent, KeyResult};
use crate::ui::renderfns::{
  availability_color, availability_label, offline_marker, short_date, truncate,
};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::ViewContext;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

use super::{BookFormView, BorrowFormView};

/// View for displaying a single book
pub struct BookDetailView {
  ctx: ViewContext,
  id: String,
  /// Title known when the view was opened, shown until data arrives
  title: String,
  query: Query<Option<Book>>,
  confirm: ConfirmDialog<()>,
  delete: Mutation<(), CatalogError>,
}

impl BookDetailView {
  pub fn new(ctx: ViewContext, id: String, title: String) -> Self {
    let mut query = ctx.book_query(&id);

    // Start fetching immediately
    query.fetch();

    Self {
      ctx,
      id,
      title,
      query,
      confirm: ConfirmDialog::new(),
      delete: Mutation::new(),
    }
  }

  fn book(&self) -> Option<&Book> {
    self.query.data().and_then(|b| b.as_ref())
  }

  fn is_missing(&self) -> bool {
    matches!(self.query.data(), Some(None))
  }

  fn field_line<'a>(label: &'a str, value: impl Into<Span<'a>>) -> Line<'a> {
    Line::from(vec![
      Span::styled(format!("{:>12}: ", label), Style::default().fg(Color::DarkGray)),
      value.into(),
    ])
  }

  fn detail_title(&self) -> String {
    let name = self.book().map(|b| b.title.as_str()).unwrap_or(&self.title);
    let mut title = match self.query.state() {
      QueryState::Loading | QueryState::Idle => format!(" {} (loading...) ", truncate(name, 50)),
      QueryState::Error(e) => format!(" {} (error: {}) ", truncate(name, 50), e),
      _ if self.delete.is_pending() => format!(" {} (deleting...) ", truncate(name, 50)),
      _ => format!(" {} ", truncate(name, 60)),
    };
    if let Some(cached_at) = self.query.offline_since() {
      title.push_str(&offline_marker(cached_at));
    }
    title
  }

  fn render_detail(&self, frame: &mut Frame, area: Rect) {
    let title = self.detail_title();

    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    // Show loading or error state
    if self.query.is_loading() {
      let paragraph =
        Paragraph::new("Loading book details...").style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, inner);
      return;
    }

    if let Some(error) = self.query.error() {
      let paragraph = Paragraph::new(format!("Error: {}\n\nPress 'r' to retry.", error))
        .style(Style::default().fg(Color::Red));
      frame.render_widget(paragraph, inner);
      return;
    }

    if self.is_missing() {
      let paragraph = Paragraph::new(
        "Book not found.\n\nIt may have been deleted. Press 'q' to go back to the list.",
      )
      .style(Style::default().fg(Color::Yellow));
      frame.render_widget(paragraph, inner);
      return;
    }

    let Some(book) = self.book() else {
      return;
    };

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(8), // Fields
        Constraint::Length(1), // Separator
        Constraint::Min(1),    // Description
      ])
      .split(inner);

    let availability = Span::styled(
      format!("{} ({} copies)", availability_label(book), book.copies()),
      Style::default().fg(availability_color(book)).bold(),
    );
    let mut fields = vec![
      Self::field_line("Title", Span::styled(book.title.as_str(), Style::default().bold())),
      Self::field_line("Author", book.author.as_str()),
      Self::field_line(
        "Genre",
        Span::styled(book.genre.as_str(), Style::default().fg(Color::Magenta)),
      ),
      Self::field_line("ISBN", book.isbn.as_str()),
      Self::field_line("Availability", availability),
    ];
    if let Some(created) = &book.created_at {
      fields.push(Self::field_line("Added", short_date(created)));
    }
    if let Some(updated) = &book.updated_at {
      fields.push(Self::field_line("Updated", short_date(updated)));
    }
    if let Some(error) = self.query.background_error() {
      fields.push(Line::from(Span::styled(
        format!("Showing last known data, refresh failed: {}", error),
        Style::default().fg(Color::Red),
      )));
    }
    frame.render_widget(Paragraph::new(fields), chunks[0]);

    // Separator
    let sep = Paragraph::new("─".repeat(chunks[1].width as usize))
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(sep, chunks[1]);

    let desc = if book.description.is_empty() {
      "No description"
    } else {
      book.description.as_str()
    };
    let desc_para = Paragraph::new(desc).wrap(Wrap { trim: true });
    frame.render_widget(desc_para, chunks[2]);
  }
}

impl View for BookDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(())) => {
        let store = self.ctx.store.clone();
        let id = self.id.clone();
        self.delete.run(async move { store.delete_book(&id).await });
        return ViewAction::None;
      }
      KeyResult::NotHandled => {}
      _ => return ViewAction::None,
    }

    match key.code {
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('e') => {
        if let Some(book) = self.book() {
          let view = BookFormView::edit(self.ctx.clone(), book.clone());
          return ViewAction::Push(Box::new(view));
        }
      }
      KeyCode::Char('b') => {
        if let Some(book) = self.book() {
          if !book.is_available() {
            self.ctx.notifier.error(format!("\"{}\" is out of stock", book.title));
          } else {
            let view = BorrowFormView::new(self.ctx.clone(), book.clone());
            return ViewAction::Push(Box::new(view));
          }
        }
      }
      KeyCode::Char('d') => {
        if let Some(book) = self.book() {
          if !self.delete.is_pending() {
            let message = format!("Delete \"{}\"? This cannot be undone.", book.title);
            self.confirm.show("Delete book", message, ());
          }
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_detail(frame, area);
    self.confirm.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    let name = self.book().map(|b| b.title.as_str()).unwrap_or(&self.title);
    truncate(name, 30)
  }

  fn context(&self) -> Option<String> {
    self.book().map(|b| format!("ISBN {}", b.isbn))
  }

  fn is_capturing_input(&self) -> bool {
    self.confirm.is_active()
  }

  fn tick(&mut self) -> ViewAction {
    self.query.tick();

    match self.delete.poll() {
      Some(Ok(())) => {
        let name = self.book().map(|b| b.title.clone()).unwrap_or_else(|| self.title.clone());
        self.ctx.notifier.success(format!("Deleted \"{}\"", name));
        ViewAction::Pop
      }
      Some(Err(e)) => {
        self.ctx.notifier.error(format!("Failed to delete book: {}", e));
        ViewAction::None
      }
      None => ViewAction::None,
    }
  }

  fn on_focus(&mut self) {
    self.query.on_focus();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(60),
    ];
    if self.book().is_some() {
      shortcuts.push(ShortcutInfo::new("e", "edit").with_priority(30));
      shortcuts.push(ShortcutInfo::new("b", "borrow").with_priority(31));
      shortcuts.push(ShortcutInfo::new("d", "delete").with_priority(32));
    }
    shortcuts
  }
}
