use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Language variant of the directory site
///
/// Every listing is crawled once per locale, in [`Locale::ALL`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    Be,
    Ru,
}

impl Locale {
    /// Pass order; also the order in which missing names are backfilled
    pub const ALL: [Locale; 3] = [Locale::En, Locale::Be, Locale::Ru];

    /// Locale whose name is used as the sentinel reference
    pub const DEFAULT: Locale = Locale::En;

    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Be => "be",
            Self::Ru => "ru",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Be => "Belarusian",
            Self::Ru => "Russian",
        }
    }

    /// Path prefix the site uses for this locale (empty for the default)
    pub fn path_prefix(self) -> &'static str {
        match self {
            Self::En => "",
            Self::Be => "/be",
            Self::Ru => "/ru",
        }
    }

    /// Listing root for this locale, e.g. `https://site` -> `https://site/be`
    pub fn listing_url(self, base_url: &str) -> String {
        format!("{}{}", base_url.trim_end_matches('/'), self.path_prefix())
    }

    /// Move an entity URL under this locale, inserting the prefix before
    /// `entity_path` (`https://site/names/x` -> `https://site/be/names/x`)
    pub fn localize_url(self, identifier: &str, entity_path: &str) -> String {
        if self.path_prefix().is_empty() {
            return identifier.to_string();
        }
        let localized = format!("{}{}", self.path_prefix(), entity_path);
        identifier.replacen(entity_path, &localized, 1)
    }

    /// Column name used in flat output rows
    pub fn field_name(self) -> &'static str {
        match self {
            Self::En => "name_en",
            Self::Be => "name_be",
            Self::Ru => "name_ru",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "be" => Ok(Self::Be),
            "ru" => Ok(Self::Ru),
            other => Err(format!("unknown locale '{other}'")),
        }
    }
}
