//! Session state: the one value that outlives a session is the locale preference.
//!
//! Components that need the locale receive the [`Session`] explicitly; nothing
//! reads or writes the preference behind their back.

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use firminia_proto::{ConfigurationPayload, Locale};
use tracing::{info, warn};

use crate::PreferenceError;

/// Client-local key/value storage for preferences.
pub trait PreferenceStore: Send {
    fn load_locale(&self) -> Result<Option<Locale>, PreferenceError>;
    fn save_locale(&mut self, locale: Locale) -> Result<(), PreferenceError>;
}

/// On-disk layout of `preferences.json`
#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct Preferences {
    /// Kept as a raw string so an unknown code falls back instead of failing the load
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locale: Option<String>,
}

/// Preferences stored as JSON in the client home directory.
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read(&self) -> Result<Preferences, PreferenceError> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let data = fs::read_to_string(&self.path).map_err(|source| PreferenceError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl PreferenceStore for FilePreferences {
    fn load_locale(&self) -> Result<Option<Locale>, PreferenceError> {
        let Some(code) = self.read()?.locale else {
            return Ok(None);
        };
        match code.parse() {
            Ok(locale) => Ok(Some(locale)),
            Err(e) => {
                warn!(error = %e, "ignoring stored locale");
                Ok(None)
            }
        }
    }

    fn save_locale(&mut self, locale: Locale) -> Result<(), PreferenceError> {
        // a file that does not parse is left alone rather than overwritten
        let mut prefs = self.read()?;
        prefs.locale = Some(locale.code().to_string());
        let data = serde_json::to_string_pretty(&prefs)?;
        fs::write(&self.path, data).map_err(|source| PreferenceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// In-memory store. Clones share the stored value.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    locale: Arc<Mutex<Option<Locale>>>,
}

impl MemoryPreferences {
    pub fn with_locale(locale: Locale) -> Self {
        Self {
            locale: Arc::new(Mutex::new(Some(locale))),
        }
    }

    pub fn stored(&self) -> Option<Locale> {
        *self.locale.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load_locale(&self) -> Result<Option<Locale>, PreferenceError> {
        Ok(self.stored())
    }

    fn save_locale(&mut self, locale: Locale) -> Result<(), PreferenceError> {
        *self.locale.lock().unwrap_or_else(|e| e.into_inner()) = Some(locale);
        Ok(())
    }
}

pub struct Session {
    locale: Locale,
    store: Box<dyn PreferenceStore>,
}

impl Session {
    /// Loads the persisted locale, or persists and uses English when there is none.
    pub fn load(mut store: Box<dyn PreferenceStore>) -> Result<Self, PreferenceError> {
        let locale = match store.load_locale()? {
            Some(locale) => locale,
            None => {
                let locale = Locale::default();
                store.save_locale(locale)?;
                locale
            }
        };
        info!(%locale, "session loaded");
        Ok(Self { locale, store })
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn set_locale(&mut self, locale: Locale) -> Result<(), PreferenceError> {
        self.store.save_locale(locale)?;
        self.locale = locale;
        info!(%locale, "locale changed");
        Ok(())
    }

    /// An empty form in the session locale, with the usual port and polling interval.
    pub fn blank_payload(&self) -> ConfigurationPayload {
        ConfigurationPayload {
            ssid: String::new(),
            password: String::new(),
            server: String::new(),
            port: "443".to_string(),
            token: String::new(),
            user: String::new(),
            interval: "3".to_string(),
            language: self.locale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_english_and_persists_it() {
        let store = MemoryPreferences::default();
        let session = Session::load(Box::new(store.clone())).unwrap();
        assert_eq!(session.locale(), Locale::English);
        assert_eq!(store.stored(), Some(Locale::English));
    }

    #[test]
    fn keeps_stored_locale() {
        let store = MemoryPreferences::with_locale(Locale::Italian);
        let session = Session::load(Box::new(store)).unwrap();
        assert_eq!(session.locale(), Locale::Italian);
        assert_eq!(session.blank_payload().language, Locale::Italian);
    }

    #[test]
    fn set_locale_persists() {
        let store = MemoryPreferences::default();
        let mut session = Session::load(Box::new(store.clone())).unwrap();
        session.set_locale(Locale::French).unwrap();
        assert_eq!(session.locale(), Locale::French);
        assert_eq!(store.stored(), Some(Locale::French));
    }
}
