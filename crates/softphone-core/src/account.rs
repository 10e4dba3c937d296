//! Caller ids available to the logged-in extension

use serde::{Deserialize, Serialize};

const CALLER_ID_FEATURE: &str = "CallerId";

/// One phone number record of the extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PhoneNumberRecord {
    pub phone_number: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Numbers the phone may present on outbound calls, primary first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallerIds {
    primary: Option<String>,
    numbers: Vec<String>,
}

impl CallerIds {
    /// Build the list from the extension's number records
    ///
    /// The primary number comes first; other numbers follow only if they carry
    /// the `CallerId` feature. Leading `+` is dropped from every number.
    pub fn from_records(records: &[PhoneNumberRecord]) -> Self {
        let primary = records
            .iter()
            .find(|r| r.primary)
            .map(|r| trim_plus(&r.phone_number))
            .filter(|n| !n.is_empty());

        let mut numbers: Vec<String> = primary.iter().cloned().collect();
        numbers.extend(
            records
                .iter()
                .filter(|r| !r.primary)
                .filter(|r| r.features.iter().any(|f| f == CALLER_ID_FEATURE))
                .map(|r| trim_plus(&r.phone_number)),
        );

        Self { primary, numbers }
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    /// Caller id used when the user did not pick one
    pub fn default_caller_id(&self) -> Option<&str> {
        self.numbers.first().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.numbers.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }
}

fn trim_plus(number: &str) -> String {
    number.strip_prefix('+').unwrap_or(number).to_string()
}
