//! Row-level input for bulk user creation: one account per row, each with its own profile
//! and optional curriculum track.

use serde::{Deserialize, Serialize};

use super::batch::{BatchRequest, ItemOverride, MissingPolicy, TargetConfig};
use super::identifier::Identifier;
use super::service::{Certification, Entitlement, RecordAttributes, TrackSource};

pub const BULK_UPLOAD_SOURCE: &str = "bulk_upload";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRow {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Free text such as `BDA-CP`, `scp` or `CP track`
    #[serde(default)]
    pub certification_track: Option<String>,
}

impl UserRow {
    pub fn track(&self) -> Option<Certification> {
        self.certification_track.as_deref().and_then(normalize_track)
    }

    fn attributes(&self) -> RecordAttributes {
        RecordAttributes {
            full_name: Some(self.full_name.trim().to_string()).filter(|n| !n.is_empty()),
            phone: non_empty(&self.phone),
            country: non_empty(&self.country).map(|c| c.to_uppercase()),
            language: non_empty(&self.language).map(|l| l.to_lowercase()),
            role: Some("individual".to_string()),
            source: Some(BULK_UPLOAD_SOURCE.to_string()),
            ..RecordAttributes::default()
        }
    }

    /// Row data layered over the batch target. Curriculum access is granted only when
    /// content activation is on and the row names a track.
    pub fn to_override(&self, activate_content: bool, duration_months: u32) -> ItemOverride {
        let mut entitlements = Vec::new();
        if activate_content {
            if let Some(certification) = self.track() {
                entitlements.push(Entitlement::CurriculumAccess {
                    track: TrackSource::Fixed { certification },
                    language: non_empty(&self.language).unwrap_or_else(|| "en".to_string()),
                    duration_months,
                });
            }
        }
        ItemOverride {
            attributes: Some(self.attributes()),
            entitlements,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `SCP` anywhere wins over `CP`; anything else names no track
pub fn normalize_track(value: &str) -> Option<Certification> {
    let normalized: String = value
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_uppercase() || *c == '-')
        .collect();
    if normalized.contains("SCP") {
        Some(Certification::Scp)
    } else if normalized.contains("CP") {
        Some(Certification::Cp)
    } else {
        None
    }
}

/// Batch request creating one standalone account per row
pub fn user_rows_request(
    rows: &[UserRow],
    activate_content: bool,
    duration_months: u32,
) -> BatchRequest {
    let raw_input = rows
        .iter()
        .map(|row| row.email.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let target = TargetConfig {
        attributes: RecordAttributes {
            role: Some("individual".to_string()),
            source: Some(BULK_UPLOAD_SOURCE.to_string()),
            ..RecordAttributes::default()
        },
        on_missing: MissingPolicy::Create,
        ..TargetConfig::default()
    };

    rows.iter().fold(BatchRequest::new(raw_input, target), |request, row| {
        match Identifier::parse(&row.email) {
            Some(identifier) => {
                let item = row.to_override(activate_content, duration_months);
                request.with_override(identifier, item)
            }
            None => request,
        }
    })
}

/// Parse a CSV upload with a header row. Recognised columns: `full_name`/`name`, `email`,
/// `phone`, `country`/`country_code`, `language`/`lang`, `certification_track`/`track`/
/// `certification`. Unknown columns are ignored.
pub fn parse_user_csv(content: &str) -> Vec<UserRow> {
    let mut lines = content
        .trim_start_matches('\u{feff}')
        .lines()
        .filter(|line| !line.trim().is_empty());

    let header: Vec<String> = match lines.next() {
        Some(line) => split_csv_line(line)
            .iter()
            .map(|h| h.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("_"))
            .collect(),
        None => return Vec::new(),
    };

    lines
        .map(|line| {
            let values = split_csv_line(line);
            let mut row = UserRow::default();
            for (key, value) in header.iter().zip(values.iter()) {
                let value = value.trim();
                match key.as_str() {
                    "full_name" | "name" => row.full_name = value.to_string(),
                    "email" => {
                        row.email = value.split_whitespace().collect::<String>().to_lowercase()
                    }
                    "phone" => row.phone = Some(value.to_string()),
                    "country" | "country_code" => row.country = Some(value.to_uppercase()),
                    "certification_track" | "track" | "certification" => {
                        row.certification_track = Some(value.to_string())
                    }
                    "language" | "lang" => {
                        let language = if value.eq_ignore_ascii_case("ar") { "AR" } else { "EN" };
                        row.language = Some(language.to_string());
                    }
                    _ => {}
                }
            }
            row
        })
        .collect()
}

/// Split one CSV line on commas outside double quotes; `""` inside quotes is a literal quote
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
