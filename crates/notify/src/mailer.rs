//! SMTP delivery of notification emails.
//!
//! [`SmtpMailer`] wraps the `lettre` async SMTP transport, one instance
//! per tenant since every tenant brings their own relay. Staging and the
//! manual path talk to the [`Mailer`] trait so tests can record sends
//! instead of opening sockets.

use std::time::Duration;

use async_trait::async_trait;

use dunlin_core::tenant::TenantId;
use dunlin_db::models::tenant::Tenant;

/// Delivery attempts per recipient before giving up on this run.
const MAX_ATTEMPTS: u32 = 3;

/// Pause between attempts.
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Error type for a single delivery attempt.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("email build error: {0}")]
    Build(String),
}

/// Sends one rendered email to one recipient.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError>;
}

/// Per-tenant SMTP relay (STARTTLS).
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    from: String,
    tenant: TenantId,
}

impl SmtpMailer {
    /// Build a mailer from a tenant's relay settings.
    ///
    /// Returns `None` when the configuration is incomplete, signalling
    /// that mail runs for this tenant should be skipped.
    pub fn for_tenant(tenant: &Tenant) -> Option<Self> {
        if !tenant.smtp_configured() {
            return None;
        }
        Some(Self {
            host: tenant.smtp_host.clone()?,
            port: u16::try_from(tenant.smtp_port).ok()?,
            username: tenant.smtp_username.clone(),
            password: tenant.smtp_password.clone(),
            from: tenant.smtp_from.clone()?,
            tenant: tenant.tenant_id(),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, html_body: &str) -> Result<(), DeliveryError> {
        use lettre::{
            message::header::ContentType, transport::smtp::authentication::Credentials,
            AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
        };

        let email = Message::builder()
            .from(self.from.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())
            .map_err(|e| DeliveryError::Build(e.to_string()))?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)?.port(self.port);

        if let (Some(user), Some(pass)) = (&self.username, &self.password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        transport_builder.build().send(email).await?;

        tracing::info!(tenant_id = self.tenant.as_i64(), to, subject, "Notification email sent");
        Ok(())
    }
}

/// Deliver to one recipient with retry.
///
/// Retries up to [`MAX_ATTEMPTS`] times with a fixed pause before giving
/// up. Returns `Ok(())` on the first successful attempt.
pub async fn send_with_retry(
    mailer: &dyn Mailer,
    to: &str,
    subject: &str,
    html_body: &str,
) -> Result<(), DeliveryError> {
    let mut attempt = 1;
    loop {
        match mailer.send(to, subject, html_body).await {
            Ok(()) => return Ok(()),
            Err(e) if attempt < MAX_ATTEMPTS => {
                tracing::warn!(attempt, to, error = %e, "Delivery attempt failed, retrying");
                attempt += 1;
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                tracing::error!(to, error = %e, "Delivery failed after all retries");
                return Err(e);
            }
        }
    }
}
