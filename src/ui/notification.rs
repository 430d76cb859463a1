//! Transient messages shown in the footer.

use std::time::{Duration, Instant};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
  Success,
  Error,
  Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub kind: NotificationKind,
  pub message: String,
}

/// Cloneable handle views use to post notifications
#[derive(Debug, Clone)]
pub struct Notifier {
  tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  fn send(&self, kind: NotificationKind, message: impl Into<String>) {
    // App gone means we are shutting down
    let _ = self.tx.send(Notification {
      kind,
      message: message.into(),
    });
  }

  pub fn success(&self, message: impl Into<String>) {
    self.send(NotificationKind::Success, message);
  }

  pub fn error(&self, message: impl Into<String>) {
    self.send(NotificationKind::Error, message);
  }

  pub fn info(&self, message: impl Into<String>) {
    self.send(NotificationKind::Info, message);
  }
}

/// Holds the notification on screen and expires it.
#[derive(Debug)]
pub struct NotificationArea {
  rx: mpsc::UnboundedReceiver<Notification>,
  current: Option<(Notification, Instant)>,
  timeout: Duration,
}

impl NotificationArea {
  pub fn new(rx: mpsc::UnboundedReceiver<Notification>, timeout: Duration) -> Self {
    Self {
      rx,
      current: None,
      timeout,
    }
  }

  /// Show the newest pending notification and drop expired ones.
  ///
  /// Returns `true` if what is displayed changed.
  pub fn tick(&mut self) -> bool {
    let mut changed = false;
    while let Ok(notification) = self.rx.try_recv() {
      self.current = Some((notification, Instant::now()));
      changed = true;
    }
    if let Some((_, shown_at)) = &self.current {
      if shown_at.elapsed() >= self.timeout {
        self.current = None;
        changed = true;
      }
    }
    changed
  }

  pub fn current(&self) -> Option<&Notification> {
    self.current.as_ref().map(|(n, _)| n)
  }

  pub fn dismiss(&mut self) {
    self.current = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_latest_notification_wins() {
    let (notifier, rx) = Notifier::channel();
    let mut area = NotificationArea::new(rx, Duration::from_secs(60));

    notifier.info("loading");
    notifier.success("Book created");
    assert!(area.tick());

    let current = area.current().unwrap();
    assert_eq!(current.kind, NotificationKind::Success);
    assert_eq!(current.message, "Book created");
  }

  #[test]
  fn test_notification_expires() {
    let (notifier, rx) = Notifier::channel();
    let mut area = NotificationArea::new(rx, Duration::ZERO);

    notifier.error("Failed to delete book");
    area.tick();
    assert!(area.current().is_none());
  }

  #[test]
  fn test_tick_without_messages_is_unchanged() {
    let (_notifier, rx) = Notifier::channel();
    let mut area = NotificationArea::new(rx, Duration::from_secs(4));
    assert!(!area.tick());
    assert!(area.current().is_none());
  }
}
