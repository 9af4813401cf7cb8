//! Per-user quota admission and the system-wide free-space probe (spec §4.4).

use crate::error::CoreError;
use storage_meta::models::{Role, User};
use std::path::Path;

/// Gates uploads against a user's quota; also backs the admin
/// raise/lower-quota validation rules.
#[derive(Clone)]
pub struct QuotaAccountant {
    storage_root: std::path::PathBuf,
}

impl QuotaAccountant {
    pub fn new(storage_root: impl Into<std::path::PathBuf>) -> Self {
        Self { storage_root: storage_root.into() }
    }

    /// Admission rule (spec §4.4): owners are always admitted; quota 0 means
    /// unlimited; otherwise `used_bytes + additional` must not exceed `quota_bytes`.
    pub fn admit(&self, user: &User, additional_bytes: i64) -> Result<(), CoreError> {
        if user.has_room_for(additional_bytes) {
            Ok(())
        } else {
            Err(CoreError::QuotaExceeded)
        }
    }

    /// Free bytes available on the filesystem hosting the blob store root,
    /// reported alongside per-user usage; advisory only, never gates uploads.
    pub fn free_space_bytes(&self) -> Result<u64, CoreError> {
        free_space(&self.storage_root)
    }

    /// Validate an admin-issued quota change (spec §4.4): cannot drop below
    /// current usage, cannot raise above `used_bytes + free_space`.
    pub fn validate_quota_change(&self, user: &User, new_quota_bytes: i64) -> Result<(), CoreError> {
        if new_quota_bytes < 0 {
            return Err(CoreError::Validation("quota must not be negative".to_string()));
        }
        if new_quota_bytes == 0 {
            // Unlimited is always an allowed destination.
            return Ok(());
        }
        if new_quota_bytes < user.used_bytes {
            return Err(CoreError::Validation(
                "quota cannot be set below the user's current usage".to_string(),
            ));
        }
        let free = self.free_space_bytes()? as i64;
        if new_quota_bytes > user.used_bytes.saturating_add(free) {
            return Err(CoreError::Validation(
                "quota exceeds available storage".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a size delta bypasses quota accounting entirely (dedup link
    /// to an already-present blob): the caller already knows it's a dedup
    /// link, this just documents the rule from spec §4.4 in one place.
    pub fn dedup_link_is_free(role: Role) -> bool {
        let _ = role;
        true
    }
}

fn free_space(path: &Path) -> Result<u64, CoreError> {
    fs2::available_space(path).map_err(|e| CoreError::Unavailable(format!("free-space probe failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(used: i64, quota: i64, role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test".to_string(),
            email: "t@example.com".to_string(),
            password_hash: String::new(),
            role,
            used_bytes: used,
            quota_bytes: quota,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn owner_always_admitted() {
        let acc = QuotaAccountant::new(std::env::temp_dir());
        let u = user(1_000_000, 1_000, Role::Owner);
        assert!(acc.admit(&u, 999_999).is_ok());
    }

    #[test]
    fn unlimited_quota_admits_anything() {
        let acc = QuotaAccountant::new(std::env::temp_dir());
        let u = user(0, 0, Role::User);
        assert!(acc.admit(&u, i64::MAX / 2).is_ok());
    }

    #[test]
    fn boundary_exact_fit_admitted() {
        let acc = QuotaAccountant::new(std::env::temp_dir());
        let u = user(1_048_570, 1_048_576, Role::User);
        assert!(acc.admit(&u, 6).is_ok());
        assert!(acc.admit(&u, 7).is_err());
    }

    #[test]
    fn quota_change_rejects_below_used() {
        let acc = QuotaAccountant::new(std::env::temp_dir());
        let u = user(1_000, 2_000, Role::User);
        assert!(acc.validate_quota_change(&u, 500).is_err());
    }

    #[test]
    fn quota_change_allows_unlimited() {
        let acc = QuotaAccountant::new(std::env::temp_dir());
        let u = user(1_000, 2_000, Role::User);
        assert!(acc.validate_quota_change(&u, 0).is_ok());
    }
}
