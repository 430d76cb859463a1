use crate::catalog::validation::max_borrow;
use crate::catalog::{Book, BorrowForm, BorrowRecord, CatalogError};
use crate::query::Mutation;
use crate::ui::components::{Form, FormEvent, KeyResult};
use crate::ui::renderfns::{availability_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::ViewContext;
use chrono::Local;
use crossterm::event::KeyEvent;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Borrow copies of one book
pub struct BorrowFormView {
  ctx: ViewContext,
  book: Book,
  form: Form,
  /// Shown under the quantity field
  quantity_hint: String,
  borrow: Mutation<BorrowRecord, CatalogError>,
}

impl BorrowFormView {
  pub fn new(ctx: ViewContext, book: Book) -> Self {
    let defaults = BorrowForm::new(Local::now().date_naive());
    let quantity_hint = format!("1-{} copies", max_borrow(book.copies()).max(1));
    let form = Form::new()
      .field("quantity", "Quantity", defaults.quantity)
      .hint(quantity_hint.clone())
      .field("due_date", "Due date", defaults.due_date)
      .hint("YYYY-MM-DD");
    Self {
      ctx,
      book,
      form,
      quantity_hint,
      borrow: Mutation::new(),
    }
  }

  fn submit(&mut self) {
    let values = BorrowForm {
      quantity: self.form.value("quantity").to_string(),
      due_date: self.form.value("due_date").to_string(),
    };
    match values.to_request(&self.book, Local::now().date_naive()) {
      Ok(request) => {
        self.form.clear_errors();
        let store = self.ctx.store.clone();
        self
          .borrow
          .run(async move { store.borrow_book(request).await });
      }
      Err(errors) => self.form.set_errors(errors),
    }
  }
}

impl View for BorrowFormView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.borrow.is_pending() {
      return ViewAction::None;
    }
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submitted) => {
        self.submit();
        ViewAction::None
      }
      KeyResult::Event(FormEvent::Cancelled) => ViewAction::Pop,
      KeyResult::Handled | KeyResult::NotHandled => ViewAction::None,
    }
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let mut title = format!(" Borrow {} ", truncate(&self.book.title, 40));
    if self.borrow.is_pending() {
      title.push_str("(borrowing...) ");
    }
    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(2),
        Constraint::Length(self.form.height()),
        Constraint::Length(1),
        Constraint::Min(0),
      ])
      .split(inner);

    let stock = Line::from(vec![
      Span::styled("On the shelf: ", Style::default().fg(Color::DarkGray)),
      Span::styled(
        self.book.copies().to_string(),
        Style::default().fg(availability_color(&self.book)).bold(),
      ),
      Span::styled(
        format!("   by {}", self.book.author),
        Style::default().fg(Color::DarkGray),
      ),
    ]);
    frame.render_widget(Paragraph::new(stock), chunks[0]);

    self.form.render(frame, chunks[1], !self.borrow.is_pending());

    let help = Line::from(vec![
      Span::styled("<enter>", Style::default().fg(Color::Cyan)),
      Span::styled(" next/borrow  ", Style::default().fg(Color::DarkGray)),
      Span::styled("<esc>", Style::default().fg(Color::Cyan)),
      Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(help), chunks[3]);
  }

  fn breadcrumb_label(&self) -> String {
    "borrow".to_string()
  }

  fn context(&self) -> Option<String> {
    Some(format!("{} ({})", truncate(&self.book.title, 30), self.quantity_hint))
  }

  fn is_capturing_input(&self) -> bool {
    true
  }

  fn tick(&mut self) -> ViewAction {
    match self.borrow.poll() {
      Some(Ok(record)) => {
        let noun = if record.quantity == 1 { "copy" } else { "copies" };
        self.ctx.notifier.success(format!(
          "Successfully borrowed {} {} of \"{}\"",
          record.quantity, noun, self.book.title
        ));
        ViewAction::Pop
      }
      Some(Err(CatalogError::Validation(errors))) => {
        self.form.set_errors(errors);
        ViewAction::None
      }
      Some(Err(e)) => {
        self.ctx.notifier.error(format!("Failed to borrow book: {}", e));
        ViewAction::None
      }
      None => ViewAction::None,
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next").with_priority(10),
      ShortcutInfo::new("ctrl-s", "borrow").with_priority(20),
      ShortcutInfo::new("esc", "cancel").with_priority(30),
    ]
  }
}
