//! Field protection: strips automated writes to user-locked fields.

use crate::types::{FieldProtection, ProtectedField, RecordUpdate};

pub struct ProtectionGate;

impl ProtectionGate {
    /// Remove every proposed change whose field is locked in `protection`.
    ///
    /// A proposed protection value that would clear an already-set flag is
    /// dropped as well; only explicit user action may unlock a field.
    pub fn filter_writable(proposed: RecordUpdate, protection: &FieldProtection) -> RecordUpdate {
        let mut allowed = proposed;

        if allowed.description.is_some() && protection.is_locked(ProtectedField::Description) {
            tracing::debug!("dropping description write: field is protected");
            allowed.description = None;
        }
        if allowed.live_demo_url.is_some() && protection.is_locked(ProtectedField::LiveDemoUrl) {
            tracing::debug!("dropping liveDemoUrl write: field is protected");
            allowed.live_demo_url = None;
        }
        if allowed.skill_ids.is_some() && protection.is_locked(ProtectedField::Skills) {
            tracing::debug!("dropping skills write: field is protected");
            allowed.skill_ids = None;
        }
        if allowed.experience_ids.is_some() && protection.is_locked(ProtectedField::Experiences) {
            tracing::debug!("dropping experiences write: field is protected");
            allowed.experience_ids = None;
        }
        if let Some(next) = allowed.protection {
            if !protection.is_preserved_by(&next) {
                tracing::debug!("dropping protection write: would unlock a field");
                allowed.protection = None;
            }
        }

        allowed
    }
}
