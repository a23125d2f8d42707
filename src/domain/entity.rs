//! Entity records reconciled across locale passes
//!
//! An [`EntityRecord`] is created on first sighting in any listing pass,
//! receives names from later passes and from backfill, and finally carries
//! the ordered detail sub-records fetched during enrichment.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::locale::Locale;

/// Prefix of the placeholder written when a name cannot be resolved
pub const SENTINEL_PREFIX: &str = "N/A";

/// Build the sentinel for an unresolved name, e.g. `N/A (Alice)`
pub fn sentinel_name(reference: &str) -> String {
    format!("{SENTINEL_PREFIX} ({reference})")
}

/// One optional name per locale
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleNames {
    #[serde(rename = "name_en", default)]
    en: Option<String>,
    #[serde(rename = "name_be", default)]
    be: Option<String>,
    #[serde(rename = "name_ru", default)]
    ru: Option<String>,
}

impl LocaleNames {
    pub fn get(&self, locale: Locale) -> Option<&str> {
        self.slot(locale).as_deref()
    }

    pub fn set(&mut self, locale: Locale, name: impl Into<String>) {
        *self.slot_mut(locale) = Some(name.into());
    }

    pub fn is_set(&self, locale: Locale) -> bool {
        self.slot(locale).is_some()
    }

    pub fn is_complete(&self) -> bool {
        Locale::ALL.iter().all(|l| self.is_set(*l))
    }

    /// Locales still unset, in pass order
    pub fn missing(&self) -> Vec<Locale> {
        Locale::ALL.into_iter().filter(|l| !self.is_set(*l)).collect()
    }

    /// Field-wise union: names set in `other` fill or replace ours, unset ones never clear
    pub fn union_with(&mut self, other: &LocaleNames) {
        for locale in Locale::ALL {
            if let Some(name) = other.get(locale) {
                self.set(locale, name);
            }
        }
    }

    fn slot(&self, locale: Locale) -> &Option<String> {
        match locale {
            Locale::En => &self.en,
            Locale::Be => &self.be,
            Locale::Ru => &self.ru,
        }
    }

    fn slot_mut(&mut self, locale: Locale) -> &mut Option<String> {
        match locale {
            Locale::En => &mut self.en,
            Locale::Be => &mut self.be,
            Locale::Ru => &mut self.ru,
        }
    }
}

/// Opaque sub-record fetched from an entity's detail page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailRecord {
    pub identifier: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
}

impl DetailRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            title: None,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The unit of reconciliation, keyed by its canonical URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub identifier: String,
    #[serde(flatten)]
    pub names: LocaleNames,
    #[serde(default)]
    pub details: Vec<DetailRecord>,
    /// Set when enrichment gave up; `details` then holds the last partial attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_error: Option<String>,
}

impl EntityRecord {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            names: LocaleNames::default(),
            details: Vec::new(),
            enrichment_error: None,
        }
    }

    /// Record seen for the first time in `locale`'s listing
    pub fn from_stub(stub: &EntityStub) -> Self {
        let record = Self::new(stub.identifier.clone());
        match &stub.name {
            Some(name) => record.with_name(stub.locale, name.clone()),
            None => record,
        }
    }

    pub fn with_name(mut self, locale: Locale, name: impl Into<String>) -> Self {
        self.names.set(locale, name);
        self
    }

    pub fn name(&self, locale: Locale) -> Option<&str> {
        self.names.get(locale)
    }

    /// Name shown in progress logs
    pub fn display_name(&self) -> &str {
        Locale::ALL
            .iter()
            .find_map(|l| self.names.get(*l))
            .unwrap_or(self.identifier.as_str())
    }

    pub fn is_partial(&self) -> bool {
        self.enrichment_error.is_some()
    }

    /// Flat field map used by tabular sinks
    pub fn to_row(&self) -> IndexMap<String, String> {
        let mut row = IndexMap::new();
        row.insert("identifier".to_string(), self.identifier.clone());
        for locale in Locale::ALL {
            row.insert(
                locale.field_name().to_string(),
                self.names.get(locale).unwrap_or_default().to_string(),
            );
        }
        let details = serde_json::to_string(&self.details).unwrap_or_else(|_| "[]".to_string());
        row.insert("details".to_string(), details);
        row.insert(
            "enrichment_error".to_string(),
            self.enrichment_error.clone().unwrap_or_default(),
        );
        row
    }
}

impl fmt::Display for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.identifier)
    }
}

/// Minimal (identifier, name) pair extracted from one listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityStub {
    pub identifier: String,
    pub locale: Locale,
    pub name: Option<String>,
}

impl EntityStub {
    pub fn new(identifier: impl Into<String>, locale: Locale, name: Option<String>) -> Self {
        Self {
            identifier: identifier.into(),
            locale,
            name,
        }
    }
}

/// Rendered listing page after one scroll step
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub locale: Locale,
    pub cursor: i64,
    pub scroll_offset: f64,
    pub reached_bottom: bool,
    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_union_never_clears() {
        let mut names = LocaleNames::default();
        names.set(Locale::En, "Alice");

        let mut other = LocaleNames::default();
        other.set(Locale::Ru, "Алиса");
        names.union_with(&other);

        assert_eq!(names.get(Locale::En), Some("Alice"));
        assert_eq!(names.get(Locale::Ru), Some("Алиса"));
        assert_eq!(names.missing(), vec![Locale::Be]);
        assert!(!names.is_complete());
    }

    #[test]
    fn record_serializes_flat_names() {
        let record = EntityRecord::new("https://example.org/names/x")
            .with_name(Locale::En, "Alice");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["identifier"], "https://example.org/names/x");
        assert_eq!(value["name_en"], "Alice");
        assert!(value["name_be"].is_null());
        assert!(value.get("enrichment_error").is_none());

        let back: EntityRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn missing_name_keys_deserialize_as_unset() {
        let json = r#"{"identifier": "/names/y", "name_en": "Bob"}"#;
        let record: EntityRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name(Locale::En), Some("Bob"));
        assert_eq!(record.name(Locale::Ru), None);
        assert!(record.details.is_empty());
    }

    #[test]
    fn row_has_fixed_column_order() {
        let record = EntityRecord::new("/names/z").with_name(Locale::Be, "Зміцер");
        let columns: Vec<_> = record.to_row().keys().cloned().collect();
        assert_eq!(
            columns,
            ["identifier", "name_en", "name_be", "name_ru", "details", "enrichment_error"]
        );
    }

    #[test]
    fn sentinel_format() {
        assert_eq!(sentinel_name("Alice"), "N/A (Alice)");
    }
}
