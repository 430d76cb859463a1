use crate::catalog::{Book, BookForm, CatalogError};
use crate::query::Mutation;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::renderfns::truncate;
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::ViewContext;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use super::BookDetailView;

const GENRE_HINT: &str = "FICTION, NON-FICTION, SCIENCE, HISTORY, BIOGRAPHY, FANTASY";

enum Mode {
  Create,
  Edit(Book),
}

/// Create or edit a book
pub struct BookFormView {
  ctx: ViewContext,
  mode: Mode,
  form: Form,
  /// `Some(book)` when a create finished, `None` for an update
  save: Mutation<Option<Book>, CatalogError>,
}

impl BookFormView {
  pub fn create(ctx: ViewContext) -> Self {
    let form = Self::build_form(BookForm {
      copies: "1".to_string(),
      ..Default::default()
    });
    Self {
      ctx,
      mode: Mode::Create,
      form,
      save: Mutation::new(),
    }
  }

  pub fn edit(ctx: ViewContext, book: Book) -> Self {
    let form = Self::build_form(BookForm::from_book(&book));
    Self {
      ctx,
      mode: Mode::Edit(book),
      form,
      save: Mutation::new(),
    }
  }

  fn build_form(values: BookForm) -> Form {
    Form::new()
      .field("title", "Title", values.title)
      .field("author", "Author", values.author)
      .field("genre", "Genre", values.genre)
      .hint(GENRE_HINT)
      .field("description", "Description", values.description)
      .hint("10-500 characters")
      .field("isbn", "ISBN", values.isbn)
      .field("copies", "Copies", values.copies)
      .hint("0-100")
  }

  fn values(&self) -> BookForm {
    BookForm {
      title: self.form.value("title").to_string(),
      author: self.form.value("author").to_string(),
      genre: self.form.value("genre").to_string(),
      description: self.form.value("description").to_string(),
      isbn: self.form.value("isbn").to_string(),
      copies: self.form.value("copies").to_string(),
    }
  }

  fn submit(&mut self) -> ViewAction {
    let values = self.values();
    let store = self.ctx.store.clone();

    match &self.mode {
      Mode::Create => match values.to_draft() {
        Ok(draft) => {
          self.form.clear_errors();
          self
            .save
            .run(async move { store.create_book(draft).await.map(Some) });
        }
        Err(errors) => self.form.set_errors(errors),
      },
      Mode::Edit(original) => match values.to_patch(original) {
        Ok(patch) if patch.is_empty() => {
          self.ctx.notifier.info("No changes");
          return ViewAction::Pop;
        }
        Ok(patch) => {
          self.form.clear_errors();
          let id = original.id.clone();
          self
            .save
            .run(async move { store.update_book(&id, patch).await.map(|_| None) });
        }
        Err(errors) => self.form.set_errors(errors),
      },
    }
    ViewAction::None
  }

  fn heading(&self) -> String {
    match &self.mode {
      Mode::Create => " New book ".to_string(),
      Mode::Edit(book) => format!(" Edit {} ", truncate(&book.title, 40)),
    }
  }
}

impl View for BookFormView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.save.is_pending() {
      return ViewAction::None;
    }
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted) => self.submit(),
      KeyResult::Event(FormEvent::Cancelled) => ViewAction::Pop,
      KeyResult::Handled | KeyResult::NotHandled => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let title = if self.save.is_pending() {
      format!("{}(saving...) ", self.heading())
    } else {
      self.heading()
    };
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(self.form.height()),
        Constraint::Length(1),
        Constraint::Min(0),
      ])
      .split(inner);

    self.form.render(frame, chunks[0], !self.save.is_pending());

    let help = Line::from(vec![
      Span::styled("<tab>", Style::default().fg(Color::Cyan)),
      Span::styled(" next field  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<ctrl-s>", Style::default().fg(Color::Cyan)),
      Span::styled(" save  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<esc>", Style::default().fg(Color::Cyan)),
      Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(help), chunks[2]);
  }

  fn breadcrumb_label(&self) -> String {
    match &self.mode {
      Mode::Create => "new book".to_string(),
      Mode::Edit(_) => "edit".to_string(),
    }
  }

  fn is_capturing_input(&self) -> bool {
    true
  }

  fn tick(&mut self) -> ViewAction {
    let Some(result) = self.save.poll() else {
      return ViewAction::None;
    };

    match (result, &self.mode) {
      (Ok(Some(book)), _) => {
        self
          .ctx
          .notifier
          .success(format!("Added \"{}\" to the catalog", book.title));
        let detail = BookDetailView::new(self.ctx.clone(), book.id.clone(), book.title);
        ViewAction::Replace(Box::new(detail))
      }
      (Ok(None), Mode::Edit(book)) => {
        self.ctx.notifier.success(format!("Updated \"{}\"", book.title));
        ViewAction::Pop
      }
      (Ok(None), Mode::Create) => ViewAction::Pop,
      (Err(CatalogError::Validation(errors)), _) => {
        self.form.set_errors(errors);
        ViewAction::None
      }
      (Err(e), Mode::Create) => {
        self.ctx.notifier.error(format!("Failed to create book: {}", e));
        ViewAction::None
      }
      (Err(e), Mode::Edit(_)) => {
        self.ctx.notifier.error(format!("Failed to update book: {}", e));
        ViewAction::None
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next").with_priority(10),
      ShortcutInfo::new("ctrl-s", "save").with_priority(20),
      ShortcutInfo::new("esc", "cancel").with_priority(30),
    ]
  }
}
