//! Staged notification engine.
//!
//! Walks a tenant's active-case invoices once per scheduled run and sends
//! the escalation stage whose offset matches today's distance from each
//! invoice's due date. The send log doubles as the dedup record, so a
//! stage goes out at most once per invoice no matter how often staging
//! runs. Templates and SMTP delivery are collaborators behind traits.

pub mod error;
pub mod mailer;
pub mod manual;
pub mod preview;
pub mod staging;
pub mod templates;

pub use error::StagingError;
pub use mailer::{DeliveryError, Mailer, SmtpMailer};
pub use manual::{send_manual_notification, ManualOutcome};
pub use preview::{preview_staging, DuplicateOffset, InvoicePreview, StagingPreview};
pub use staging::{run_staging, StagingSummary};
pub use templates::{RenderedEmail, StageTemplates, TemplateData, TemplateEngine};
