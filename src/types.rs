//! Core data types for enrich-rs
//!
//! This module contains the values that flow through the pipeline:
//!
//! - [`Identifier`] - Opaque token read from the source
//! - [`Category`] - Normalized classification value returned by the lookup service
//! - [`LookupResult`] - An identifier paired with its category
//! - [`FailedLookup`] - An identifier whose lookup could not be completed

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category written when the service has no value for an identifier
pub const NULL_MARKER: &str = "\\N";

/// Category written for failed lookups under [`crate::config::FailurePolicy::Marker`]
pub const FAILURE_MARKER: &str = "\\F";

/// Literal the lookup service uses for "not available"
pub const NOT_AVAILABLE: &str = "N/A";

/// Field separator for persisted records
pub const FIELD_SEPARATOR: char = '\t';

/// Opaque identifier read from the input source
///
/// Uniqueness within a run is not assumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Create a new identifier
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Normalized category value
///
/// Always constructed through [`Category::normalize`] (or the marker
/// constructors), so a `Category` never contains a quote, a tab or a line
/// break, and is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Normalize a raw service value
    ///
    /// Quote characters are removed and tabs or line breaks become spaces,
    /// so a category always fits in one record field. An absent, empty, or
    /// `N/A` value becomes [`NULL_MARKER`]. No other character is altered.
    pub fn normalize(raw: Option<&str>) -> Self {
        let stripped: String = raw
            .unwrap_or_default()
            .chars()
            .filter(|c| *c != '"')
            .map(|c| match c {
                '\t' | '\n' | '\r' => ' ',
                other => other,
            })
            .collect();
        if stripped.is_empty() || stripped == NOT_AVAILABLE {
            Self::null()
        } else {
            Self(stripped)
        }
    }

    /// The null-marker category
    pub fn null() -> Self {
        Self(NULL_MARKER.to_string())
    }

    /// The failure-marker category
    pub fn failure() -> Self {
        Self(FAILURE_MARKER.to_string())
    }

    /// Whether this is the null marker
    pub fn is_null(&self) -> bool {
        self.0 == NULL_MARKER
    }

    /// Get the category as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Successful lookup: an identifier and its normalized category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupResult {
    pub identifier: Identifier,
    pub category: Category,
}

impl LookupResult {
    /// Create a new lookup result
    pub fn new(identifier: Identifier, category: Category) -> Self {
        Self {
            identifier,
            category,
        }
    }

    /// Render as `<Identifier><TAB><Category>` (without line terminator)
    pub fn to_line(&self) -> String {
        format!("{}{}{}", self.identifier, FIELD_SEPARATOR, self.category)
    }
}

/// A lookup that failed permanently (or exhausted its retries)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedLookup {
    pub identifier: Identifier,
    /// Human readable reason, single line
    pub reason: String,
    /// Number of attempts made before giving up
    pub attempts: u32,
}

impl FailedLookup {
    /// Render as `<Identifier><TAB><reason>` (without line terminator)
    pub fn to_line(&self) -> String {
        let reason = self.reason.replace(['\t', '\n', '\r'], " ");
        format!("{}{}{}", self.identifier, FIELD_SEPARATOR, reason)
    }
}
