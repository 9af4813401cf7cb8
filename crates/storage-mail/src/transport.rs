//! Cached SMTP transport (spec §9 "global transporter cache → explicit
//! `EmailTransport` handle"). The underlying `lettre` client is rebuilt only
//! when the configured settings actually change; everyday sends reuse the
//! cached, connection-pooled transport.

use crate::error::{MailError, Result};
use crate::settings::SmtpSettings;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::RwLock;

struct CachedTransport {
    fingerprint: u64,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

/// Email transport for invitation and password-reset notifications. Safe to
/// share across the whole process behind an `Arc`; rebuilding the
/// `lettre` client is serialized under a single lock, which is fine since it
/// only happens on a settings change, not per-send.
#[derive(Default)]
pub struct EmailTransport {
    cached: RwLock<Option<CachedTransport>>,
}

impl EmailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn transport_for(&self, settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let fingerprint = settings.fingerprint();
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.fingerprint == fingerprint {
                return Ok(cached.transport.clone());
            }
        }

        let built = build_transport(settings)?;
        *self.cached.write().await = Some(CachedTransport {
            fingerprint,
            transport: built.clone(),
        });
        Ok(built)
    }

    /// Send a plain-text message. Subject/body are already-rendered strings;
    /// the template layer that produces them is out of this crate's scope
    /// (spec §1 non-goals) — callers pass finished text.
    pub async fn send(
        &self,
        settings: &SmtpSettings,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<()> {
        let transport = self.transport_for(settings).await?;
        let from: Mailbox = match &settings.from_name {
            Some(name) => format!("{name} <{}>", settings.from_address),
            None => settings.from_address.clone(),
        }
        .parse()
        .map_err(|e| MailError::Build(format!("invalid from address: {e}")))?;
        let to: Mailbox = to
            .parse()
            .map_err(|e| MailError::Build(format!("invalid recipient address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| MailError::Build(e.to_string()))?;

        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| MailError::Send(e.to_string()))
    }

    /// Verify the configured settings by attempting a connection, without
    /// sending anything (`POST /settings/smtp/test`).
    pub async fn test_connection(&self, settings: &SmtpSettings) -> Result<()> {
        let transport = self.transport_for(settings).await?;
        transport
            .test_connection()
            .await
            .map_err(|e| MailError::Transport(e.to_string()))
            .and_then(|ok| {
                if ok {
                    Ok(())
                } else {
                    Err(MailError::Transport("server refused connection".to_string()))
                }
            })
    }
}

fn build_transport(settings: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
    let creds = Credentials::new(settings.username.clone(), settings.password.clone());
    let builder = if settings.use_tls {
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
    } else {
        AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.host)
    };
    Ok(builder.port(settings.port).credentials(creds).build())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "bot@example.com".to_string(),
            password: "secret".to_string(),
            from_address: "bot@example.com".to_string(),
            from_name: Some("Storage Service".to_string()),
            use_tls: true,
        }
    }

    #[tokio::test]
    async fn builds_transport_without_network() {
        assert!(build_transport(&settings()).is_ok());
    }

    #[tokio::test]
    async fn caches_transport_across_calls() {
        let email = EmailTransport::new();
        email.transport_for(&settings()).await.unwrap();
        assert!(email.cached.read().await.is_some());
        let first_fingerprint = email.cached.read().await.as_ref().unwrap().fingerprint;
        email.transport_for(&settings()).await.unwrap();
        assert_eq!(email.cached.read().await.as_ref().unwrap().fingerprint, first_fingerprint);
    }

    #[tokio::test]
    async fn rebuilds_on_settings_change() {
        let email = EmailTransport::new();
        email.transport_for(&settings()).await.unwrap();
        let mut changed = settings();
        changed.host = "smtp2.example.com".to_string();
        email.transport_for(&changed).await.unwrap();
        assert_eq!(email.cached.read().await.as_ref().unwrap().fingerprint, changed.fingerprint());
    }
}
