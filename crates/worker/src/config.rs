//! Worker configuration loaded from environment variables.

use std::time::Duration;

/// Runtime settings for the worker process.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Postgres connection string.
    pub database_url: String,
    /// How often the dispatcher re-reads the schedule table.
    pub refresh_interval: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default |
    /// |-------------------------|---------|
    /// | `DATABASE_URL`          | —       |
    /// | `SCHEDULE_REFRESH_SECS` | `60`    |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let refresh_secs: u64 = std::env::var("SCHEDULE_REFRESH_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("SCHEDULE_REFRESH_SECS must be a valid u64");

        Self {
            database_url,
            refresh_interval: Duration::from_secs(refresh_secs),
        }
    }
}
