//! SMTP configuration shape. Persisted as JSON under the `smtp` key in the
//! metadata store's settings bag (spec §3 "Setting"); `storage-meta::settings`
//! owns the read/write, this crate only owns the shape and what to do with it.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// SMTP connection and sender configuration, as stored in `settings.smtp`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub from_address: String,
    #[serde(default)]
    pub from_name: Option<String>,
    #[serde(default = "default_true")]
    pub use_tls: bool,
}

fn default_true() -> bool {
    true
}

impl SmtpSettings {
    /// A stable fingerprint of this configuration, used as the transport
    /// cache key so a settings change invalidates the cached connection
    /// (spec §9 "global transporter cache → explicit `EmailTransport` handle
    /// whose settings hash is the cache key").
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(password: &str) -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "bot@example.com".to_string(),
            password: password.to_string(),
            from_address: "bot@example.com".to_string(),
            from_name: Some("Storage Service".to_string()),
            use_tls: true,
        }
    }

    #[test]
    fn fingerprint_changes_with_settings() {
        assert_ne!(settings("a").fingerprint(), settings("b").fingerprint());
    }

    #[test]
    fn fingerprint_is_stable() {
        assert_eq!(settings("a").fingerprint(), settings("a").fingerprint());
    }
}
