use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::catalog::ValidationErrors;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Events emitted by a form that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEvent {
  /// Enter on the last field or Ctrl-S anywhere
  Submitted,
  /// Esc pressed
  Cancelled,
}

#[derive(Debug, Clone)]
struct FormField {
  key: &'static str,
  label: &'static str,
  hint: Option<String>,
  input: TextInput,
}

/// Vertical list of labelled text fields with per-field error messages
#[derive(Debug, Clone, Default)]
pub struct Form {
  fields: Vec<FormField>,
  focused: usize,
  errors: ValidationErrors,
}

impl Form {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a field. `key` matches the field names used by validation errors.
  pub fn field(mut self, key: &'static str, label: &'static str, value: impl Into<String>) -> Self {
    self.fields.push(FormField {
      key,
      label,
      hint: None,
      input: TextInput::with_value(value),
    });
    self
  }

  /// Dimmed help text for the most recently added field
  pub fn hint(mut self, hint: impl Into<String>) -> Self {
    if let Some(field) = self.fields.last_mut() {
      field.hint = Some(hint.into());
    }
    self
  }

  /// Current raw value of field `key`, empty if there is no such field
  pub fn value(&self, key: &str) -> &str {
    self
      .fields
      .iter()
      .find(|f| f.key == key)
      .map(|f| f.input.value())
      .unwrap_or("")
  }

  pub fn focused_key(&self) -> Option<&'static str> {
    self.fields.get(self.focused).map(|f| f.key)
  }

  pub fn set_errors(&mut self, errors: ValidationErrors) {
    // Jump to the first field with a problem
    if let Some(idx) = self
      .fields
      .iter()
      .position(|f| errors.get(f.key).is_some())
    {
      self.focused = idx;
    }
    self.errors = errors;
  }

  pub fn clear_errors(&mut self) {
    self.errors = ValidationErrors::new();
  }

  pub fn errors(&self) -> &ValidationErrors {
    &self.errors
  }

  fn move_focus(&mut self, direction: i32) {
    if self.fields.is_empty() {
      return;
    }
    let len = self.fields.len();
    self.focused = if direction > 0 {
      (self.focused + 1) % len
    } else if self.focused == 0 {
      len - 1
    } else {
      self.focused - 1
    };
  }

  /// Handle a key event. Every key is consumed while the form is shown.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    match key.code {
      KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        return KeyResult::Event(FormEvent::Submitted);
      }
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(1);
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(-1);
        return KeyResult::Handled;
      }
      _ => {}
    }

    let Some(field) = self.fields.get_mut(self.focused) else {
      return KeyResult::NotHandled;
    };
    match field.input.handle_key(key) {
      InputResult::Cancelled => KeyResult::Event(FormEvent::Cancelled),
      InputResult::Submitted(_) => {
        if self.focused + 1 == self.fields.len() {
          KeyResult::Event(FormEvent::Submitted)
        } else {
          self.move_focus(1);
          KeyResult::Handled
        }
      }
      InputResult::Consumed | InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Rows the form needs: one per field plus one per error or hint line
  pub fn height(&self) -> u16 {
    self
      .fields
      .iter()
      .map(|f| {
        let extra = self.errors.get(f.key).is_some() || f.hint.is_some();
        1 + u16::from(extra)
      })
      .sum()
  }

  pub fn render(&self, frame: &mut Frame, area: Rect, enabled: bool) {
    let label_width = self
      .fields
      .iter()
      .map(|f| f.label.chars().count())
      .max()
      .unwrap_or(0)
      + 2;

    let mut lines: Vec<Line> = Vec::new();
    for (idx, field) in self.fields.iter().enumerate() {
      let focused = enabled && idx == self.focused;
      let label_style = if focused {
        Style::default().fg(Color::Yellow).bold()
      } else {
        Style::default().fg(Color::Gray)
      };

      let mut spans = vec![Span::styled(
        format!("{:>width$}: ", field.label, width = label_width),
        label_style,
      )];
      if focused {
        let (before, after) = field.input.split_at_cursor();
        spans.push(Span::raw(before.to_string()));
        spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        spans.push(Span::raw(after.to_string()));
      } else {
        spans.push(Span::styled(
          field.input.value().to_string(),
          Style::default().fg(Color::White),
        ));
      }
      lines.push(Line::from(spans));

      let indent = " ".repeat(label_width + 2);
      if let Some(error) = self.errors.get(field.key) {
        lines.push(Line::from(Span::styled(
          format!("{}{}", indent, error),
          Style::default().fg(Color::Red),
        )));
      } else if let Some(hint) = &field.hint {
        lines.push(Line::from(Span::styled(
          format!("{}{}", indent, hint),
          Style::default().fg(Color::DarkGray),
        )));
      }
    }

    frame.render_widget(Paragraph::new(lines), area);
  }
}
