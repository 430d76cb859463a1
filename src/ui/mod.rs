pub mod components;
pub mod context;
pub mod notification;
pub mod renderfns;
pub mod view;
pub mod views;

use ratatui::prelude::*;
use ratatui::widgets::ListState;

pub use context::ViewContext;
pub use view::{ShortcutInfo, View, ViewAction};

/// Screen areas: header line, content, footer line
pub struct ScreenLayout {
  pub header: Rect,
  pub content: Rect,
  pub footer: Rect,
}

pub fn layout(area: Rect) -> ScreenLayout {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Main content
      Constraint::Length(1), // Footer
    ])
    .split(area);
  ScreenLayout {
    header: chunks[0],
    content: chunks[1],
    footer: chunks[2],
  }
}

/// Keep a list selection inside `0..len`, selecting the first row when the
/// list becomes non-empty
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(idx) if idx >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}

/// Rectangle of at most `width` x `height` centered in `area`
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
  let width = width.min(area.width);
  let height = height.min(area.height);
  Rect::new(
    area.x + (area.width - width) / 2,
    area.y + (area.height - height) / 2,
    width,
    height,
  )
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_ensure_valid_selection() {
    let mut state = ListState::default();
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(0));

    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));

    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }

  #[test]
  fn test_centered_rect_fits_area() {
    let area = Rect::new(0, 0, 40, 10);
    assert_eq!(centered_rect(area, 20, 4), Rect::new(10, 3, 20, 4));
    assert_eq!(centered_rect(area, 100, 100), area);
  }

  #[test]
  fn test_layout_reserves_header_and_footer() {
    let screen = layout(Rect::new(0, 0, 80, 24));
    assert_eq!(screen.header.height, 1);
    assert_eq!(screen.footer.height, 1);
    assert_eq!(screen.content.height, 22);
    assert_eq!(screen.footer.y, 23);
  }
}
