//! Per-tenant run schedule model and validation.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use dunlin_core::types::{DbId, Timestamp};

/// A row from the `tenant_schedules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TenantSchedule {
    pub id: DbId,
    pub tenant_id: DbId,

    pub sync_hour: i32,
    pub sync_minute: i32,
    pub sync_enabled: bool,

    pub mail_hour: i32,
    pub mail_minute: i32,
    pub mail_enabled: bool,

    pub lead_days: i32,
    pub auto_close_final_stage: bool,

    pub updated_at: Timestamp,
}

/// DTO for patching a schedule. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleChanges {
    pub sync_hour: Option<i32>,
    pub sync_minute: Option<i32>,
    pub sync_enabled: Option<bool>,
    pub mail_hour: Option<i32>,
    pub mail_minute: Option<i32>,
    pub mail_enabled: Option<bool>,
    pub lead_days: Option<i32>,
    pub auto_close_final_stage: Option<bool>,
}

/// Schedule field validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("hour out of range: {0}")]
    HourOutOfRange(i32),

    #[error("minute out of range: {0}")]
    MinuteOutOfRange(i32),

    #[error("lead_days out of range: {0} (expected 1..=30)")]
    LeadDaysOutOfRange(i32),
}

impl ScheduleChanges {
    /// Validate every field that is present.
    ///
    /// The database CHECK constraints back this up; validating here turns
    /// bad input into a typed error instead of a constraint violation.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for hour in [self.sync_hour, self.mail_hour].into_iter().flatten() {
            if !(0..=23).contains(&hour) {
                return Err(ScheduleError::HourOutOfRange(hour));
            }
        }
        for minute in [self.sync_minute, self.mail_minute].into_iter().flatten() {
            if !(0..=59).contains(&minute) {
                return Err(ScheduleError::MinuteOutOfRange(minute));
            }
        }
        if let Some(days) = self.lead_days {
            if !(1..=30).contains(&days) {
                return Err(ScheduleError::LeadDaysOutOfRange(days));
            }
        }
        Ok(())
    }
}
