use crate::catalog::types::total_borrowed;
use crate::catalog::BorrowSummary;
use crate::query::{Query, QueryState};
use crate::ui::renderfns::{offline_marker, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::ViewContext;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

/// Borrowed copies per book, refreshed in the background
pub struct BorrowSummaryView {
  query: Query<Vec<BorrowSummary>>,
  table_state: TableState,
}

impl BorrowSummaryView {
  pub fn new(ctx: ViewContext) -> Self {
    let mut query = ctx.summary_query();

    // Start fetching immediately
    query.fetch();

    Self {
      query,
      table_state: TableState::default(),
    }
  }

  fn rows(&self) -> &[BorrowSummary] {
    self.query.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  /// Keep the selection on a summary row, never the total row
  fn clamp_selection(&mut self) {
    let len = self.rows().len();
    match self.table_state.selected() {
      _ if len == 0 => self.table_state.select(None),
      Some(idx) if idx >= len => self.table_state.select(Some(len - 1)),
      None => self.table_state.select(Some(0)),
      _ => {}
    }
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.rows().len();
    if len == 0 {
      return;
    }
    let current = self.table_state.selected().unwrap_or(0) as i32;
    let next = (current + delta).clamp(0, len as i32 - 1);
    self.table_state.select(Some(next as usize));
  }

  fn table_title(&self) -> String {
    let len = self.rows().len();
    let mut title = match self.query.state() {
      QueryState::Loading | QueryState::Idle => " Borrowed books (loading...) ".to_string(),
      QueryState::Error(e) => format!(" Borrowed books (error: {}) ", truncate(e, 40)),
      QueryState::Success(_) if self.query.is_fetching() => {
        format!(" Borrowed books [{}] (refreshing...) ", len)
      }
      QueryState::Success(_) => format!(" Borrowed books [{}] ", len),
    };
    if let Some(cached_at) = self.query.offline_since() {
      title.push_str(&offline_marker(cached_at));
    }
    title
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let title = self.table_title();
    let rows = self.rows();
    let total = total_borrowed(rows);

    let block = Block::default()
      .title(title)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if rows.is_empty() {
      let message = if self.query.is_loading() {
        "Loading..."
      } else if self.query.is_error() {
        "Could not load the borrow summary. Press 'r' to retry."
      } else {
        "Nothing is borrowed right now"
      };
      let paragraph = Paragraph::new(message)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let header = Row::new(vec!["Title", "ISBN", "Borrowed"])
      .style(Style::default().fg(Color::Yellow).bold());

    let mut table_rows: Vec<Row> = rows
      .iter()
      .map(|s| {
        Row::new(vec![
          Cell::from(s.title.clone()),
          Cell::from(s.isbn.clone()).style(Style::default().fg(Color::DarkGray)),
          Cell::from(s.total_quantity.to_string()).style(Style::default().fg(Color::Cyan)),
        ])
      })
      .collect();
    table_rows.push(
      Row::new(vec![
        Cell::from("Total"),
        Cell::from(""),
        Cell::from(total.to_string()),
      ])
      .style(Style::default().bold())
      .top_margin(1),
    );

    let table = Table::new(
      table_rows,
      [
        Constraint::Min(20),
        Constraint::Length(26),
        Constraint::Length(9),
      ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

impl View for BorrowSummaryView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
      KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
      KeyCode::Char('r') => self.query.refetch(),
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.clamp_selection();
    self.render_table(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    "borrowed".to_string()
  }

  fn context(&self) -> Option<String> {
    self
      .query
      .data()
      .map(|rows| format!("{} copies out", total_borrowed(rows)))
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.tick() {
      self.clamp_selection();
    }
    ViewAction::None
  }

  fn on_focus(&mut self) {
    self.query.on_focus();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("j/k", "move").with_priority(20),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("q", "back").with_priority(60),
    ]
  }
}
