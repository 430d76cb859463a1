use super::KeyResult;
use crate::ui::centered_rect;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Events emitted by the confirm dialog that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmEvent<T> {
  /// User confirmed; carries the payload given to `show`
  Confirmed(T),
  /// Dialog dismissed
  Cancelled,
}

/// Yes/no dialog guarding a destructive action
#[derive(Debug, Clone)]
pub struct ConfirmDialog<T> {
  pending: Option<T>,
  title: String,
  message: String,
}

impl<T> Default for ConfirmDialog<T> {
  fn default() -> Self {
    Self {
      pending: None,
      title: String::new(),
      message: String::new(),
    }
  }
}

impl<T> ConfirmDialog<T> {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if dialog is currently shown
  pub fn is_active(&self) -> bool {
    self.pending.is_some()
  }

  /// Ask for confirmation of the action described by `payload`
  pub fn show(&mut self, title: impl Into<String>, message: impl Into<String>, payload: T) {
    self.title = title.into();
    self.message = message.into();
    self.pending = Some(payload);
  }

  pub fn hide(&mut self) {
    self.pending = None;
  }

  /// Handle a key event. While shown, every key is consumed.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ConfirmEvent<T>> {
    if self.pending.is_none() {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => match self.pending.take() {
        Some(payload) => KeyResult::Event(ConfirmEvent::Confirmed(payload)),
        None => KeyResult::Handled,
      },
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(ConfirmEvent::Cancelled)
      }
      _ => KeyResult::Handled,
    }
  }

  /// Render the dialog overlay if shown
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if self.pending.is_none() {
      return;
    }

    let overlay_area = centered_rect(area, 50, 6);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(format!(" {} ", self.title));

    let text = vec![
      Line::from(self.message.as_str()),
      Line::from(""),
      Line::from(vec![
        Span::styled("<y>", Style::default().fg(Color::Cyan)),
        Span::styled(" confirm   ", Style::default().fg(Color::DarkGray)),
        Span::styled("<n>", Style::default().fg(Color::Cyan)),
        Span::styled(" cancel", Style::default().fg(Color::DarkGray)),
      ]),
    ];

    let paragraph = Paragraph::new(text)
      .block(block)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, overlay_area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_confirm_returns_payload() {
    let mut dialog = ConfirmDialog::new();
    assert_eq!(dialog.handle_key(key(KeyCode::Char('y'))), KeyResult::NotHandled);

    dialog.show("Delete", "Delete \"Emma\"?", "42".to_string());
    assert_eq!(dialog.handle_key(key(KeyCode::Char('x'))), KeyResult::Handled);
    assert_eq!(
      dialog.handle_key(key(KeyCode::Char('y'))),
      KeyResult::Event(ConfirmEvent::Confirmed("42".to_string()))
    );
    assert!(!dialog.is_active());
  }

  #[test]
  fn test_cancel() {
    let mut dialog = ConfirmDialog::new();
    dialog.show("Delete", "Delete?", 1u8);
    assert_eq!(
      dialog.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(ConfirmEvent::Cancelled)
    );
    assert!(!dialog.is_active());
  }
}
