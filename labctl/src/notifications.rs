//! Booking lifecycle notifications.
//!
//! Dispatched after the triggering transaction has committed; delivery is
//! best-effort and failures are logged, never surfaced to the caller.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    config::{Config, EmailTransportConfig},
    db::models::slots::Slot,
    errors::Error,
};

/// A committed booking state transition worth telling someone about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingEvent {
    Requested,
    Approved,
    Rejected,
    Canceled,
}

impl BookingEvent {
    fn subject(&self) -> &'static str {
        match self {
            BookingEvent::Requested => "Booking request received",
            BookingEvent::Approved => "Booking approved",
            BookingEvent::Rejected => "Booking rejected",
            BookingEvent::Canceled => "Booking canceled",
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            BookingEvent::Requested => "requested",
            BookingEvent::Approved => "approved",
            BookingEvent::Rejected => "rejected",
            BookingEvent::Canceled => "canceled",
        }
    }
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

struct EmailNotifier {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
    manager_email: Option<String>,
}

/// Post-commit notification dispatcher. Disabled configurations still accept
/// dispatch calls and only log the event.
pub struct Notifier {
    inner: Option<EmailNotifier>,
}

impl Notifier {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let notif_config = &config.notifications;
        if !notif_config.enabled {
            return Ok(Self { inner: None });
        }

        let transport = match &notif_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            inner: Some(EmailNotifier {
                transport,
                from_email: notif_config.from_email.clone(),
                from_name: notif_config.from_name.clone(),
                manager_email: notif_config.manager_email.clone(),
            }),
        })
    }

    /// Fire-and-forget: any delivery failure is logged and swallowed. The
    /// triggering operation has already committed by the time this runs.
    pub async fn dispatch(&self, event: BookingEvent, slot: &Slot) {
        let Some(inner) = &self.inner else {
            tracing::debug!(slot_id = %slot.id, event = ?event, "Notifications disabled, skipping dispatch");
            return;
        };

        if let Err(e) = inner.send_event(event, slot).await {
            tracing::warn!(
                slot_id = %slot.id,
                event = ?event,
                error = %e,
                "Failed to deliver booking notification"
            );
        } else {
            tracing::info!(slot_id = %slot.id, event = ?event, "Dispatched booking notification");
        }
    }
}

impl EmailNotifier {
    async fn send_event(&self, event: BookingEvent, slot: &Slot) -> Result<(), Error> {
        let mut recipients: Vec<&str> = Vec::new();
        if let Some(email) = slot.user_email.as_deref() {
            recipients.push(email);
        }
        // Managers hear about fresh requests so they can approve or reject
        if event == BookingEvent::Requested
            && let Some(manager) = self.manager_email.as_deref()
        {
            recipients.push(manager);
        }

        let body = format!(
            "Your booking for {} from {} to {} has been {}.\n",
            slot.booking_date,
            slot.start_time,
            slot.end_time,
            event.verb()
        );

        for recipient in recipients {
            self.send_email(recipient, event.subject(), &body).await?;
        }
        Ok(())
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NotificationsConfig;

    fn file_config(dir: &std::path::Path) -> Config {
        Config {
            notifications: NotificationsConfig {
                enabled: true,
                transport: EmailTransportConfig::File {
                    path: dir.to_string_lossy().to_string(),
                },
                ..NotificationsConfig::default()
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn notifier_creation_with_file_transport() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = Notifier::new(&file_config(dir.path()));
        assert!(notifier.is_ok());
        assert!(notifier.unwrap().inner.is_some());
    }

    #[tokio::test]
    async fn disabled_notifier_has_no_transport() {
        let notifier = Notifier::new(&Config::default()).unwrap();
        assert!(notifier.inner.is_none());
    }
}
