//! Field value checks and composite field values

use crate::core::error::{QueryRunnerError, QueryRunnerResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

/// Whether `email` looks like a deliverable address
pub fn is_valid_email(email: &str) -> bool {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap()
    });
    regex.is_match(email)
}

/// Parse `value` as a UUID or fail with `InvalidInput`
pub fn assert_is_valid_uuid(value: &str) -> QueryRunnerResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| QueryRunnerError::invalid_input(format!("Value '{}' is not a valid UUID", value)))
}

/// Value of an `EMAILS` composite field
///
/// The first address of the edited list is the primary one; the rest are
/// stored as additional emails. An empty list persists an empty primary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailsValue {
    #[serde(default)]
    pub primary_email: String,

    #[serde(default)]
    pub additional_emails: Vec<String>,
}

impl EmailsValue {
    /// Build from an ordered list of addresses
    pub fn from_list(emails: Vec<String>) -> Self {
        let mut emails = emails.into_iter();
        Self {
            primary_email: emails.next().unwrap_or_default(),
            additional_emails: emails.collect(),
        }
    }

    /// Ordered list view, primary first, empty primary skipped
    pub fn to_list(&self) -> Vec<String> {
        std::iter::once(&self.primary_email)
            .filter(|e| !e.is_empty())
            .chain(self.additional_emails.iter())
            .cloned()
            .collect()
    }

    /// Whether the entry at `index` of [`to_list`](Self::to_list) is marked
    /// as primary; a single address is not flagged.
    pub fn is_primary(&self, index: usize) -> bool {
        index == 0 && self.to_list().len() > 1
    }

    /// Promote the entry at `index` to primary
    pub fn set_primary(&self, index: usize) -> Self {
        let mut list = self.to_list();
        if index < list.len() {
            let email = list.remove(index);
            list.insert(0, email);
        }
        Self::from_list(list)
    }

    /// Remove the entry at `index`
    pub fn remove(&self, index: usize) -> Self {
        let mut list = self.to_list();
        if index < list.len() {
            list.remove(index);
        }
        Self::from_list(list)
    }

    /// Every non-empty address must be a valid email
    pub fn validate(&self) -> Result<(), String> {
        match self
            .to_list()
            .into_iter()
            .find(|email| !is_valid_email(email))
        {
            Some(invalid) => Err(format!("'{}' is not a valid email", invalid)),
            None => Ok(()),
        }
    }
}

/// Validate a raw JSON `EMAILS` value
pub fn validate_emails_value(field: &str, value: &Value) -> QueryRunnerResult<()> {
    if value.is_null() {
        return Ok(());
    }
    let emails: EmailsValue = serde_json::from_value(value.clone()).map_err(|e| {
        QueryRunnerError::invalid_input(format!("Invalid value for '{}': {}", field, e))
    })?;
    emails
        .validate()
        .map_err(|message| QueryRunnerError::invalid_input(format!("{}: {}", field, message)))
}
