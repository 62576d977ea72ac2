use serde::Serialize;
use std::collections::HashSet;

use super::error::ProvisioningError;
use super::identifier::Identifier;

const SEPARATORS: &[char] = &['\n', '\r', ',', ';'];

/// Parse result including what was dropped, for previews
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParseReport {
    pub identifiers: Vec<Identifier>,
    /// Non-empty tokens that failed the shape check
    pub rejected: Vec<String>,
    /// Tokens that normalized to an identifier seen earlier in the input
    pub duplicates: Vec<String>,
}

impl ParseReport {
    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty()
    }
}

/// Split free-form input into a deduplicated, order-preserving list of identifiers.
///
/// Fails with a validation error when nothing usable remains, before any remote call is made.
pub fn parse_identifiers(raw: &str) -> Result<Vec<Identifier>, ProvisioningError> {
    let report = parse_with_report(raw);
    if report.is_empty() {
        return Err(ProvisioningError::Validation(
            "no valid identifiers in input".to_string(),
        ));
    }
    Ok(report.identifiers)
}

pub fn parse_with_report(raw: &str) -> ParseReport {
    let mut report = ParseReport::default();
    let mut seen = HashSet::new();

    for token in raw.split(SEPARATORS) {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        match Identifier::parse(token) {
            Some(id) => {
                if seen.insert(id.clone()) {
                    report.identifiers.push(id);
                } else {
                    report.duplicates.push(token.to_string());
                }
            }
            None => report.rejected.push(token.to_string()),
        }
    }

    report
}
