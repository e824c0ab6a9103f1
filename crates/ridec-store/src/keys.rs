//! Storage keys owned by RIDEC

/// Full record list
pub const RECORDS: &str = "ridecs";

/// Notification log
pub const NOTIFICATIONS: &str = "ridec_notifications";

/// Area name -> collapsed flag
pub const AREA_COLLAPSED: &str = "ridec_area_collapsed";

/// Authenticated session
pub const SESSION: &str = "ridec_session";

const INTEGRATION_PREFIX: &str = "ridec_integration_";

/// Per-system integration configuration key.
///
/// System names are lowercased and anything outside `[a-z0-9_-]` becomes `_`.
pub fn integration_key(system: &str) -> String {
    let normalized: String = system
        .trim()
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", INTEGRATION_PREFIX, normalized)
}

/// Whether a key belongs to RIDEC (used by `reset`)
pub fn is_owned(key: &str) -> bool {
    matches!(key, RECORDS | NOTIFICATIONS | AREA_COLLAPSED | SESSION)
        || key.starts_with(INTEGRATION_PREFIX)
}
