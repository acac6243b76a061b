//! Notification send log model.

use serde::Serialize;
use sqlx::FromRow;

use dunlin_core::types::{DbId, Timestamp};

/// How a notification came to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Sent by the scheduled staging engine.
    Automatic,
    /// Sent by an operator through the manual path.
    Manual,
    /// Written by the system to record an action (e.g. manual mark-paid).
    System,
}

impl NotificationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationMode::Automatic => "automatic",
            NotificationMode::Manual => "manual",
            NotificationMode::System => "system",
        }
    }
}

/// A row from the `notification_logs` table. Immutable once written.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NotificationLog {
    pub id: DbId,
    pub tenant_id: DbId,
    pub invoice_number: String,
    pub client_id: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub stage: String,
    pub mode: String,
    pub sent_at: Timestamp,
}

/// DTO for appending a log row.
#[derive(Debug, Clone)]
pub struct NewNotificationLog {
    pub invoice_number: String,
    pub client_id: Option<String>,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub stage: String,
    pub mode: NotificationMode,
}
