//! Port for talking back to whoever drives the workspace.
//!
//! Operations never return failures to the user directly: they report them
//! once through [`UserInteraction::notify`]. Destructive operations ask for
//! explicit agreement through [`UserInteraction::confirm`] first.

use std::fmt;
use std::sync::Mutex;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    /// Something completed.
    Success,
    /// Something failed and nothing changed.
    Error,
}

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: NotificationLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Notification {
    /// A success message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    /// A failure message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.level {
            NotificationLevel::Success => write!(f, "{}", self.message),
            NotificationLevel::Error => write!(f, "error: {}", self.message),
        }
    }
}

/// Outbound channel to the person operating the desk.
#[cfg_attr(test, mockall::automock)]
pub trait UserInteraction: Send + Sync {
    /// Show a message.
    fn notify(&self, notification: Notification);

    /// Ask a yes/no question; `true` only on explicit agreement.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Fixture implementation that records notifications and answers every
/// confirmation with a fixed reply.
#[derive(Debug, Default)]
pub struct FixtureUserInteraction {
    approve: bool,
    seen: Mutex<Vec<Notification>>,
    prompts: Mutex<Vec<String>>,
}

impl FixtureUserInteraction {
    /// A fixture that agrees to every confirmation.
    #[must_use]
    pub fn approving() -> Self {
        Self {
            approve: true,
            ..Self::default()
        }
    }

    /// A fixture that declines every confirmation.
    #[must_use]
    pub fn declining() -> Self {
        Self::default()
    }

    /// Notifications received so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.seen
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Confirmation prompts received so far.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// The most recent error message, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.notifications()
            .into_iter()
            .rev()
            .find(|notification| notification.level == NotificationLevel::Error)
            .map(|notification| notification.message)
    }
}

impl UserInteraction for FixtureUserInteraction {
    fn notify(&self, notification: Notification) {
        if let Ok(mut guard) = self.seen.lock() {
            guard.push(notification);
        }
    }

    fn confirm(&self, prompt: &str) -> bool {
        if let Ok(mut guard) = self.prompts.lock() {
            guard.push(prompt.to_owned());
        }
        self.approve
    }
}
