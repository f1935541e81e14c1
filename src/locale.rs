//! UI strings in English, Turkish and Russian.

use log::debug;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    En,
    Tr,
    Ru,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Tr, Language::En, Language::Ru];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Tr => "tr",
            Language::Ru => "ru",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Language::En),
            "tr" => Some(Language::Tr),
            "ru" => Some(Language::Ru),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocaleError {
    #[error("unsupported language '{0}' (expected one of: tr, en, ru)")]
    Unsupported(String),
}

const FALLBACK: Language = Language::En;
/// Used when the system reports no locale at all.
const NO_LOCALE_DEFAULT: Language = Language::Tr;

fn table(lang: Language) -> &'static [(&'static str, &'static str)] {
    match lang {
        Language::En => &[
            ("catalogs", "Catalogs"),
            ("printed", "Printed"),
            ("embroidered", "Embroidered"),
            ("lace", "Lace"),
            ("product_catalog", "Product Catalog"),
            ("back", "Back"),
        ],
        Language::Tr => &[
            ("catalogs", "Kataloglar"),
            ("printed", "Baskılı"),
            ("embroidered", "Nakışlı"),
            ("lace", "Dantelli"),
            ("product_catalog", "Ürün Kataloğu"),
            ("back", "Geri"),
        ],
        Language::Ru => &[
            ("catalogs", "Каталоги"),
            ("printed", "С принтом"),
            ("embroidered", "С вышивкой"),
            ("lace", "Кружевные"),
            ("product_catalog", "Каталог товаров"),
            ("back", "Назад"),
        ],
    }
}

fn lookup(lang: Language, key: &str) -> Option<&'static str> {
    table(lang).iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

#[derive(Debug, Clone)]
pub struct Locale {
    language: Language,
}

impl Locale {
    pub fn new(language: Language) -> Self {
        Self { language }
    }

    /// Saved choice first, then the system locale.
    pub fn detect(saved: Option<&str>) -> Self {
        if let Some(lang) = saved.and_then(Language::from_code) {
            return Self::new(lang);
        }
        let system = ["LC_ALL", "LC_MESSAGES", "LANG"]
            .iter()
            .filter_map(|v| std::env::var(v).ok())
            .find(|v| !v.is_empty());
        Self::new(language_from_posix(system.as_deref()))
    }

    pub fn current_language(&self) -> Language {
        self.language
    }

    pub fn set_language(&mut self, code: &str) -> Result<(), LocaleError> {
        let lang =
            Language::from_code(code).ok_or_else(|| LocaleError::Unsupported(code.to_string()))?;
        debug!("locale: {} -> {}", self.language, lang);
        self.language = lang;
        Ok(())
    }

    /// Current language, then English, then the key itself.
    pub fn translate(&self, key: &str) -> String {
        lookup(self.language, key)
            .or_else(|| lookup(FALLBACK, key))
            .unwrap_or(key)
            .to_string()
    }
}

/// `tr_TR.UTF-8` -> Tr. No locale, or `C`/`POSIX`, means the app default;
/// an unsupported language falls back to English.
fn language_from_posix(value: Option<&str>) -> Language {
    let Some(value) = value else {
        return NO_LOCALE_DEFAULT;
    };
    let code = value
        .split(['_', '.', '@', '-'])
        .next()
        .unwrap_or_default();
    if code.is_empty() || code == "C" || code == "POSIX" {
        return NO_LOCALE_DEFAULT;
    }
    Language::from_code(code).unwrap_or(FALLBACK)
}
