use std::fmt;
use std::str::FromStr;

/// Languages supported by the device firmware.
///
/// The client stores the locale by code ("en"), the device receives it by index ("0").
/// Deserializing accepts either form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
}

impl Locale {
    pub const ALL: [Locale; 4] = [
        Locale::English,
        Locale::Italian,
        Locale::Spanish,
        Locale::French,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Italian => "it",
            Locale::Spanish => "es",
            Locale::French => "fr",
        }
    }

    /// Index sent to the device in the `language` field.
    pub fn wire_index(&self) -> &'static str {
        match self {
            Locale::English => "0",
            Locale::Italian => "1",
            Locale::Spanish => "2",
            Locale::French => "3",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Locale::English => "English",
            Locale::Italian => "Italiano",
            Locale::Spanish => "Español",
            Locale::French => "Français",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown locale: {0:?} (expected one of en, it, es, fr or 0..3)")]
pub struct ParseLocaleError(pub String);

impl FromStr for Locale {
    type Err = ParseLocaleError;

    /// Accepts either the locale code or the wire index.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Locale::ALL
            .into_iter()
            .find(|l| l.code().eq_ignore_ascii_case(s) || l.wire_index() == s)
            .ok_or_else(|| ParseLocaleError(s.to_string()))
    }
}

impl<'de> serde::Deserialize<'de> for Locale {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::Locale;

    #[test]
    fn parses_code_and_index() {
        assert_eq!("it".parse::<Locale>().unwrap(), Locale::Italian);
        assert_eq!("FR".parse::<Locale>().unwrap(), Locale::French);
        assert_eq!("2".parse::<Locale>().unwrap(), Locale::Spanish);
        assert_eq!("0".parse::<Locale>().unwrap(), Locale::English);
        assert!("de".parse::<Locale>().is_err());
        assert!("4".parse::<Locale>().is_err());
    }

    #[test]
    fn serializes_by_code() {
        assert_eq!(serde_json::to_string(&Locale::Spanish).unwrap(), "\"es\"");
        let l: Locale = serde_json::from_str("\"fr\"").unwrap();
        assert_eq!(l, Locale::French);
    }

    #[test]
    fn deserializes_wire_index() {
        let l: Locale = serde_json::from_str("\"0\"").unwrap();
        assert_eq!(l, Locale::English);
        let l: Locale = serde_json::from_str("\"3\"").unwrap();
        assert_eq!(l, Locale::French);
        assert!(serde_json::from_str::<Locale>("\"de\"").is_err());
    }
}
