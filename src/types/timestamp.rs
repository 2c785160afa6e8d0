use chrono::{DateTime, Utc};

#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Next `updated` value for an entity last touched at `previous`. Never moves backwards,
/// even if the wall clock does.
#[must_use]
pub fn refreshed(previous: DateTime<Utc>) -> DateTime<Utc> {
    now().max(previous)
}
