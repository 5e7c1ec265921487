//! # Notifications
//!
//! User-facing outcome messages. The core only produces them; the caller
//! decides how they surface (log line, toast, banner).

use crate::{AttendanceStatus, ClassId, RollbookError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Failure,
}

/// One outcome message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    /// "Marked Present for Ada Byron"
    #[must_use]
    pub fn marked(status: AttendanceStatus, student_name: &str) -> Self {
        Self::success(format!("Marked {} for {}", status, student_name))
    }

    #[must_use]
    pub fn submitted(class: &ClassId, date: NaiveDate, defaulted: usize) -> Self {
        Self::success(format!(
            "Attendance submitted for {} on {} ({} marked absent by default)",
            class, date, defaulted
        ))
    }

    #[must_use]
    pub fn unlocked(class: &ClassId, date: NaiveDate) -> Self {
        Self::success(format!("Attendance reopened for {} on {}", class, date))
    }

    /// The error's display text, e.g. "Attendance can only be taken for the current day".
    #[must_use]
    pub fn failed(error: &RollbookError) -> Self {
        Self {
            level: NotificationLevel::Failure,
            message: error.to_string(),
        }
    }

    fn success(message: String) -> Self {
        Self {
            level: NotificationLevel::Success,
            message,
        }
    }
}

/// Receiver of outcome messages.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Sink that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    received: Mutex<Vec<Notification>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far, oldest first.
    #[must_use]
    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl NotificationSink for CollectingSink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut guard) = self.received.lock() {
            guard.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_ui_wording() {
        assert_eq!(
            Notification::marked(AttendanceStatus::Present, "Ada Byron").message,
            "Marked Present for Ada Byron"
        );
        let date = NaiveDate::from_ymd_opt(2024, 1, 8).expect("date");
        let err = RollbookError::DateConstraintViolated { date, today: date };
        let failed = Notification::failed(&err);
        assert_eq!(failed.level, NotificationLevel::Failure);
        assert_eq!(
            failed.message,
            "Attendance can only be taken for the current day"
        );
    }

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.notify(Notification::marked(AttendanceStatus::Late, "A"));
        sink.notify(Notification::marked(AttendanceStatus::Absent, "B"));
        let messages: Vec<_> = sink.received().into_iter().map(|n| n.message).collect();
        assert_eq!(messages, vec!["Marked Late for A", "Marked Absent for B"]);
    }
}
