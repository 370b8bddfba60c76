//! Configuration form files
//!
//! ```json
//! {
//!   "ssid": "Home",
//!   "password": "secret",
//!   "server": "sign.example.com",
//!   "port": "443",
//!   "token": "abc123",
//!   "user": "alice",
//!   "interval": "5",
//!   "language": "it"
//! }
//! ```
//!
//! `port`, `interval` and `language` may be left out.

use std::path::Path;

use firminia_proto::{ConfigurationPayload, Locale};

fn default_port() -> String {
    "443".to_string()
}

fn default_interval() -> String {
    "3".to_string()
}

#[derive(Debug, serde::Deserialize)]
struct FormFile {
    ssid: String,
    #[serde(default)]
    password: String,
    server: String,
    #[serde(default = "default_port")]
    port: String,
    #[serde(default)]
    token: String,
    #[serde(default)]
    user: String,
    #[serde(default = "default_interval")]
    interval: String,
    language: Option<Locale>,
}

/// Parses a form, using `locale` when the file does not name a language.
pub fn parse_form(json: &str, locale: Locale) -> Result<ConfigurationPayload, serde_json::Error> {
    let form: FormFile = serde_json::from_str(json)?;
    Ok(ConfigurationPayload {
        ssid: form.ssid,
        password: form.password,
        server: form.server,
        port: form.port,
        token: form.token,
        user: form.user,
        interval: form.interval,
        language: form.language.unwrap_or(locale),
    })
}

pub fn read_form(
    path: &Path,
    locale: Locale,
) -> Result<ConfigurationPayload, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    let payload = parse_form(&content, locale)
        .map_err(|e| format!("invalid form file {}: {e}", path.display()))?;
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let p = parse_form(
            r#"{"ssid":"Home","server":"sign.example.com"}"#,
            Locale::Spanish,
        )
        .unwrap();
        assert_eq!(p.port, "443");
        assert_eq!(p.interval, "3");
        assert_eq!(p.language, Locale::Spanish);
        assert!(p.password.is_empty());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn explicit_language_wins() {
        let p = parse_form(
            r#"{"ssid":"Home","server":"s.example.com","language":"fr"}"#,
            Locale::English,
        )
        .unwrap();
        assert_eq!(p.language, Locale::French);
    }

    #[test]
    fn language_accepts_wire_index() {
        let p = parse_form(
            r#"{"ssid":"Home","server":"s.example.com","language":"0"}"#,
            Locale::Spanish,
        )
        .unwrap();
        assert_eq!(p.language, Locale::English);

        let p = parse_form(
            r#"{"ssid":"Home","server":"s.example.com","language":"3"}"#,
            Locale::Spanish,
        )
        .unwrap();
        assert_eq!(p.language, Locale::French);
    }

    #[test]
    fn ssid_is_required() {
        assert!(parse_form(r#"{"server":"s.example.com"}"#, Locale::English).is_err());
    }

    #[test]
    fn reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("firminia.json");
        std::fs::write(&path, r#"{"ssid":"Home","server":"s.example.com","interval":"10"}"#)
            .unwrap();
        let p = read_form(&path, Locale::Italian).unwrap();
        assert_eq!(p.interval_ms().unwrap(), 600_000);

        assert!(read_form(&dir.path().join("missing.json"), Locale::Italian).is_err());
    }
}
