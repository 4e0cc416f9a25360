//! Display language preference and the labels the CLI prints.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::storage::{keys, Storage};

/// A supported display language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    #[default]
    En,
    /// Arabic.
    Ar,
}

impl Language {
    /// The stored language code.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ar => "ar",
        }
    }

    /// Whether text runs right to left.
    #[must_use]
    pub fn is_rtl(self) -> bool {
        matches!(self, Self::Ar)
    }

    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::En => EN,
            Self::Ar => AR,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ar" => Ok(Self::Ar),
            other => Err(Error::ConfigValidation {
                message: format!("unsupported language '{other}', expected 'en' or 'ar'"),
            }),
        }
    }
}

const EN: &[(&str, &str)] = &[
    ("appName", "NutriSnap"),
    ("todaysProgress", "Today's Progress"),
    ("todaysFood", "Today's Food"),
    ("calories", "Calories"),
    ("protein", "Protein"),
    ("goal", "Goal"),
    ("history", "History"),
    ("noFoodLogged", "No food logged today."),
    ("noFoodsFound", "No foods found matching"),
    ("noLocalFoodsFound", "No local foods found matching"),
    ("noHistory", "No history for this period."),
    ("signedInAs", "Signed in as"),
    ("notSignedIn", "Not signed in"),
    ("lastSync", "Last sync"),
];

const AR: &[(&str, &str)] = &[
    ("appName", "نوتري سناب"),
    ("todaysProgress", "تقدم اليوم"),
    ("todaysFood", "طعام اليوم"),
    ("calories", "السعرات"),
    ("protein", "البروتين"),
    ("goal", "الهدف"),
    ("history", "التاريخ"),
    ("noFoodLogged", "لم يتم تسجيل أي طعام اليوم."),
    ("noFoodsFound", "لم يتم العثور على أطعمة تطابق"),
    ("noLocalFoodsFound", "لم يتم العثور على أطعمة محلية تطابق"),
];

fn lookup(language: Language, key: &str) -> Option<&'static str> {
    language
        .table()
        .iter()
        .find(|(k, _)| *k == key)
        .map(|&(_, text)| text)
}

/// The label for `key` in `language`, falling back to English and then to
/// the key itself.
#[must_use]
pub fn translate(language: Language, key: &str) -> String {
    lookup(language, key)
        .or_else(|| lookup(Language::En, key))
        .unwrap_or(key)
        .to_string()
}

/// The persisted language preference.
#[derive(Debug)]
pub struct LanguageSettings {
    storage: Arc<Storage>,
    current: Language,
}

impl LanguageSettings {
    /// Load the stored preference. Missing or unknown values mean English.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be read.
    pub fn load(storage: Arc<Storage>) -> Result<Self> {
        let current = match storage.get_item(keys::LANGUAGE)? {
            Some(code) => code.parse().unwrap_or_else(|_| {
                warn!("Ignoring unknown stored language '{}'", code);
                Language::default()
            }),
            None => Language::default(),
        };
        Ok(Self { storage, current })
    }

    /// The current language.
    #[must_use]
    pub fn current(&self) -> Language {
        self.current
    }

    /// Switch language and persist the choice.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store cannot be written.
    pub fn set(&mut self, language: Language) -> Result<()> {
        self.storage.set_item(keys::LANGUAGE, language.code())?;
        self.current = language;
        info!("Language set to {}", language);
        Ok(())
    }

    /// Whether the current language runs right to left.
    #[must_use]
    pub fn is_rtl(&self) -> bool {
        self.current.is_rtl()
    }

    /// [`translate`] in the current language.
    #[must_use]
    pub fn t(&self, key: &str) -> String {
        translate(self.current, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> Arc<Storage> {
        Arc::new(Storage::open_in_memory().unwrap())
    }

    #[test]
    fn test_language_parse() {
        assert_eq!("ar".parse::<Language>().unwrap(), Language::Ar);
        assert_eq!(" EN ".parse::<Language>().unwrap(), Language::En);
        assert!("fr".parse::<Language>().is_err());
    }

    #[test]
    fn test_is_rtl() {
        assert!(Language::Ar.is_rtl());
        assert!(!Language::En.is_rtl());
    }

    #[test]
    fn test_translate_fallbacks() {
        assert_eq!(translate(Language::Ar, "protein"), "البروتين");
        assert_eq!(translate(Language::Ar, "lastSync"), "Last sync");
        assert_eq!(translate(Language::En, "missingKey"), "missingKey");
    }

    #[test]
    fn test_every_arabic_key_has_english() {
        for (key, _) in AR {
            assert!(lookup(Language::En, key).is_some(), "{key} missing in en");
        }
    }

    #[test]
    fn test_settings_default_and_persist() {
        let storage = storage();
        let mut settings = LanguageSettings::load(storage.clone()).unwrap();
        assert_eq!(settings.current(), Language::En);

        settings.set(Language::Ar).unwrap();
        assert!(settings.is_rtl());
        assert_eq!(storage.get_item(keys::LANGUAGE).unwrap().as_deref(), Some("ar"));

        let reloaded = LanguageSettings::load(storage).unwrap();
        assert_eq!(reloaded.current(), Language::Ar);
        assert_eq!(reloaded.t("calories"), "السعرات");
    }

    #[test]
    fn test_unknown_stored_language_ignored() {
        let storage = storage();
        storage.set_item(keys::LANGUAGE, "klingon").unwrap();
        let settings = LanguageSettings::load(storage).unwrap();
        assert_eq!(settings.current(), Language::En);
    }
}
