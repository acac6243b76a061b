//! Per-tenant stage offset model.

use serde::Serialize;
use sqlx::FromRow;

use dunlin_core::stage::Stage;
use dunlin_core::types::{DbId, Timestamp};

/// A row from the `stage_schedules` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StageSchedule {
    pub id: DbId,
    pub tenant_id: DbId,
    pub stage: String,
    pub offset_days: i32,
    pub updated_at: Timestamp,
}

impl StageSchedule {
    /// Parsed stage key. Normalization guarantees canonical values.
    pub fn stage(&self) -> Option<Stage> {
        Stage::from_key(&self.stage)
    }
}
