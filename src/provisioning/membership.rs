use chrono::{DateTime, Months, Utc};

/// New expiry when a membership is activated or extended by `months`.
///
/// Time still left on an unexpired membership is kept; an expired or missing one starts
/// from `now`. Month arithmetic clamps to the last day of shorter months.
pub fn extended_expiry(
    current: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    months: u32,
) -> DateTime<Utc> {
    let base = match current {
        Some(expiry) if expiry > now => expiry,
        _ => now,
    };
    base.checked_add_months(Months::new(months)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}
