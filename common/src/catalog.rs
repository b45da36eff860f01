use serde::{Deserialize, Serialize};

use crate::error::{AppError, Res};

const EMBEDDED_CATALOG: &str = include_str!("../data/languages.json");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Language {
    pub code: String,
    pub name: String,
    pub native_name: String,
    pub flag: String,
}

/// Reference list of languages offered for exchange.
///
/// Loaded once at start-up and shared read-only through app data.
#[derive(Debug, Clone)]
pub struct LanguageCatalog {
    languages: Vec<Language>,
}

impl LanguageCatalog {
    pub fn embedded() -> Res<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    pub fn from_file(path: &str) -> Res<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Internal(format!("Failed to read language catalog {}: {}", path, e))
        })?;
        Self::from_json(&raw)
    }

    /// Loads `path` when given, the embedded catalog otherwise.
    pub fn load(path: Option<&str>) -> Res<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Self::embedded(),
        }
    }

    pub fn from_json(raw: &str) -> Res<Self> {
        let languages: Vec<Language> = serde_json::from_str(raw)?;
        if languages.is_empty() {
            return Err(AppError::Internal("Language catalog is empty".to_string()));
        }
        Ok(LanguageCatalog { languages })
    }

    pub fn all(&self) -> &[Language] {
        &self.languages
    }

    pub fn get(&self, code: &str) -> Option<&Language> {
        self.languages
            .iter()
            .find(|l| l.code.eq_ignore_ascii_case(code))
    }
}
