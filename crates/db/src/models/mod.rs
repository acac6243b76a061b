//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A create DTO for inserts
//! - An update DTO (all `Option` fields) where the entity is mutable

pub mod case;
pub mod invoice;
pub mod notification_log;
pub mod schedule;
pub mod stage_schedule;
pub mod sync_run;
pub mod tenant;
