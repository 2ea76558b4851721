//! Outgoing mail
//!
//! `Mailer` is the transport seam: `SmtpMailer` talks to the configured
//! relay, `MemoryMailer` keeps messages in memory for tests and local runs.
//! `MailService` renders the plain-text templates under `templates/mail`
//! with tera. The first rendered line is the subject, the rest the body.

use crate::config::{MailConfig, SiteConfig};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tera::{Context as TeraContext, Tera};
use tokio::sync::Mutex;

const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

const TEMPLATES: &[(&str, &str)] = &[
    ("estimation.txt", include_str!("../../templates/mail/estimation.txt")),
    ("contact.txt", include_str!("../../templates/mail/contact.txt")),
    ("review_invitation.txt", include_str!("../../templates/mail/review_invitation.txt")),
    ("review_submitted.txt", include_str!("../../templates/mail/review_submitted.txt")),
];

/// A rendered plain-text message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub reply_to: Option<String>,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// SMTP transport built once from configuration
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Port 465 uses implicit TLS, local hosts plain SMTP, anything else STARTTLS.
    pub fn from_config(config: &MailConfig) -> Result<Self> {
        let host = config.smtp_host.trim();
        let builder = if matches!(host, "localhost" | "127.0.0.1" | "::1") {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
        } else if config.smtp_port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
        };

        let mut builder = builder.port(config.smtp_port).timeout(Some(SMTP_TIMEOUT));
        if !config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ));
        }

        let from = format!("{} <{}>", config.from_name, config.from)
            .parse::<Mailbox>()
            .map_err(|e| anyhow!("Invalid sender address '{}': {}", config.from, e))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e| anyhow!("Invalid recipient '{}': {}", mail.to, e))?;
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN);
        if let Some(reply_to) = mail.reply_to {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|e| anyhow!("Invalid reply-to '{}': {}", reply_to, e))?;
            builder = builder.reply_to(reply_to);
        }
        let message = builder
            .body(mail.body)
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;
        Ok(())
    }
}

/// Records messages instead of sending them. Can be told to fail.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: std::sync::atomic::AtomicBool,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let mailer = Self::default();
        mailer.set_failing(true);
        mailer
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(anyhow!("Mail delivery failed"));
        }
        tracing::debug!(to = %mail.to, subject = %mail.subject, "mail captured");
        self.sent.lock().await.push(mail);
        Ok(())
    }
}

/// Mailer used when no SMTP host is configured
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        tracing::warn!(to = %mail.to, subject = %mail.subject, "mail not sent: SMTP is not configured");
        Err(anyhow!("Mail delivery is not configured"))
    }
}

/// Pick the transport for a configuration
pub fn create_mailer(config: &MailConfig) -> Result<Arc<dyn Mailer>> {
    if config.is_configured() {
        Ok(Arc::new(SmtpMailer::from_config(config)?))
    } else {
        Ok(Arc::new(DisabledMailer))
    }
}

pub struct MailService {
    mailer: Arc<dyn Mailer>,
    tera: Tera,
    notify_to: String,
    site_name: String,
}

impl MailService {
    pub fn new(mailer: Arc<dyn Mailer>, mail: &MailConfig, site: &SiteConfig) -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())
            .context("Failed to load mail templates")?;

        let notify_to = if mail.notify_to.trim().is_empty() {
            site.contact_email.trim().to_string()
        } else {
            mail.notify_to.trim().to_string()
        };

        Ok(Self {
            mailer,
            tera,
            notify_to,
            site_name: site.name.clone(),
        })
    }

    /// Render a template into `(subject, body)`
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<(String, String)> {
        let mut context = context.clone();
        context.insert("site_name", &self.site_name);
        let rendered = self
            .tera
            .render(template, &context)
            .with_context(|| format!("Failed to render mail template {}", template))?;
        let (subject, body) = rendered.split_once('\n').unwrap_or((rendered.as_str(), ""));
        Ok((subject.trim().to_string(), body.trim_start_matches('\n').to_string()))
    }

    /// Send a rendered template to the agency inbox
    pub async fn notify_agency(
        &self,
        template: &str,
        context: &TeraContext,
        reply_to: Option<&str>,
    ) -> Result<()> {
        if self.notify_to.is_empty() {
            return Err(anyhow!("No notification address configured"));
        }
        let to = self.notify_to.clone();
        self.send_template(&to, template, context, reply_to).await
    }

    /// Send a rendered template to an arbitrary address
    pub async fn send_template(
        &self,
        to: &str,
        template: &str,
        context: &TeraContext,
        reply_to: Option<&str>,
    ) -> Result<()> {
        let (subject, body) = self.render(template, context)?;
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                reply_to: reply_to.map(str::to_string),
                subject,
                body,
            })
            .await
    }
}
