use crate::commands::CommandKind;
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::ui::components::{CommandEvent, CommandInput, KeyResult};
use crate::ui::context::Store;
use crate::ui::notification::{NotificationArea, Notifier};
use crate::ui::renderfns::{draw_footer, draw_header};
use crate::ui::views::{BookFormView, BookListView, BorrowSummaryView};
use crate::ui::{self, View, ViewAction, ViewContext};
use color_eyre::Result;
use crossterm::event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;

const TICK_RATE: Duration = Duration::from_millis(250);

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// `:` command line, owned here so every view gets it
  command_input: CommandInput,

  notifications: NotificationArea,

  /// Shared handles new views are built from
  ctx: ViewContext,

  /// Header title
  title: String,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  pub fn new(config: &Config, store: Store) -> Self {
    let (notifier, notification_rx) = Notifier::channel();
    let ctx = ViewContext::new(store, notifier, config);
    let root: Box<dyn View> = Box::new(BookListView::new(ctx.clone()));

    Self {
      view_stack: vec![root],
      command_input: CommandInput::new(),
      notifications: NotificationArea::new(notification_rx, config.notification_timeout()),
      ctx,
      title: config.display_title(),
      should_quit: false,
    }
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    tracing::info!("ui started");

    let result = self.main_loop(&mut terminal, &mut events).await;

    // Cleanup terminal, even when the loop failed
    let _ = stdout().execute(DisableFocusChange);
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    tracing::info!("ui stopped");

    result
  }

  async fn main_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break,
      }
    }
    Ok(())
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::FocusGained => {
        if let Some(view) = self.view_stack.last_mut() {
          view.on_focus();
        }
      }
      Event::Tick => self.tick(),
    }
  }

  /// Drive every view's queries; only the top view may navigate.
  fn tick(&mut self) {
    let top = self.view_stack.len().saturating_sub(1);
    let mut action = ViewAction::None;
    for (idx, view) in self.view_stack.iter_mut().enumerate() {
      let result = view.tick();
      if idx == top {
        action = result;
      }
    }
    self.apply(action);
    self.notifications.tick();
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    let capturing = self
      .view_stack
      .last()
      .is_some_and(|view| view.is_capturing_input());

    if !capturing || self.command_input.is_active() {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Run(kind)) => {
          self.run_command(kind);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(input)) => {
          self.ctx.notifier.error(format!("Unknown command: {}", input));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    if key.code == KeyCode::Esc && self.notifications.current().is_some() && !capturing {
      self.notifications.dismiss();
    }

    let action = match self.view_stack.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn run_command(&mut self, kind: CommandKind) {
    tracing::debug!(?kind, "command");
    match kind {
      CommandKind::Books => self.replace_root(Box::new(BookListView::new(self.ctx.clone()))),
      CommandKind::Summary => {
        self.replace_root(Box::new(BorrowSummaryView::new(self.ctx.clone())))
      }
      CommandKind::Add => {
        self
          .view_stack
          .push(Box::new(BookFormView::create(self.ctx.clone())));
      }
      CommandKind::Quit => self.should_quit = true,
    }
  }

  fn replace_root(&mut self, view: Box<dyn View>) {
    self.view_stack.truncate(1);
    match self.view_stack.first_mut() {
      Some(root) => *root = view,
      None => self.view_stack.push(view),
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Replace(view) => match self.view_stack.last_mut() {
        Some(top) => *top = view,
        None => self.view_stack.push(view),
      },
    }
  }

  fn breadcrumbs(&self) -> Vec<String> {
    self
      .view_stack
      .iter()
      .map(|v| v.breadcrumb_label())
      .collect()
  }

  fn draw(&mut self, frame: &mut Frame) {
    let screen = ui::layout(frame.area());
    let breadcrumbs = self.breadcrumbs();
    let online = self.ctx.store.is_online();

    if let Some(view) = self.view_stack.last_mut() {
      let context = view.context();
      draw_header(
        frame,
        screen.header,
        &self.title,
        context.as_deref(),
        &view.shortcuts(),
        online,
      );
      view.render(frame, screen.content);
    }

    self.command_input.render_overlay(frame, screen.content);
    draw_footer(frame, screen.footer, &breadcrumbs, self.notifications.current());
  }
}
