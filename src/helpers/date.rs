//! Date helper functions

use chrono::{DateTime, FixedOffset, Locale, Utc};
use chrono_tz::Tz;

use crate::config::SiteConfig;
use crate::error::{BlogError, Result};

/// Localized publication date formatting
#[derive(Debug, Clone)]
pub struct DateFormatter {
    /// chrono format string converted from the configured pattern
    format: String,
    locale: Locale,
    timezone: Tz,
}

impl DateFormatter {
    /// Create a formatter from a date-fns style pattern, locale tag and IANA zone
    pub fn new(pattern: &str, locale: &str, timezone: &str) -> Result<Self> {
        let locale = parse_locale(locale)
            .ok_or_else(|| BlogError::Config(format!("unsupported locale: {}", locale)))?;
        let timezone = if timezone.is_empty() {
            Tz::UTC
        } else {
            timezone
                .parse::<Tz>()
                .map_err(|e| BlogError::Config(format!("invalid timezone {}: {}", timezone, e)))?
        };

        Ok(Self {
            format: date_fns_to_chrono_format(pattern),
            locale,
            timezone,
        })
    }

    /// Create a formatter from the site configuration
    pub fn from_config(config: &SiteConfig) -> Result<Self> {
        Self::new(&config.date_format, &config.locale, &config.timezone)
    }

    /// Format an instant in the configured zone and locale
    pub fn format(&self, date: &DateTime<Utc>) -> String {
        date.with_timezone(&self.timezone)
            .format_localized(&self.format, self.locale)
            .to_string()
    }
}

/// Parse an API timestamp such as `2021-03-25T19:25:28+0000`
pub fn parse_api_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::<FixedOffset>::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z"))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Format a date in ISO 8601 / XML format
pub fn date_xml(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Map a locale tag (`pt-BR`, `pt_BR`, `en`) onto a chrono locale
fn parse_locale(tag: &str) -> Option<Locale> {
    let locale = match tag.replace('-', "_").as_str() {
        "pt_BR" | "pt_br" => Locale::pt_BR,
        "pt_PT" | "pt_pt" | "pt" => Locale::pt_PT,
        "en_US" | "en_us" | "en" => Locale::en_US,
        "en_GB" | "en_gb" => Locale::en_GB,
        "es_ES" | "es_es" | "es" => Locale::es_ES,
        "fr_FR" | "fr_fr" | "fr" => Locale::fr_FR,
        "de_DE" | "de_de" | "de" => Locale::de_DE,
        "it_IT" | "it_it" | "it" => Locale::it_IT,
        "ja_JP" | "ja_jp" | "ja" => Locale::ja_JP,
        "zh_CN" | "zh_cn" | "zh" => Locale::zh_CN,
        "POSIX" | "C" => Locale::POSIX,
        _ => return None,
    };
    Some(locale)
}

/// Convert a date-fns format pattern to a chrono format string
fn date_fns_to_chrono_format(format: &str) -> String {
    // Longest tokens first within each unit
    let replacements = [
        // Year
        ("yyyy", "%Y"),
        ("yy", "%y"),
        // Month
        ("MMMM", "%B"),
        ("MMM", "%b"),
        ("MM", "%m"),
        // Day of month
        ("dd", "%d"),
        // Day of week
        ("EEEE", "%A"),
        ("EEE", "%a"),
        // Hour
        ("HH", "%H"),
        ("hh", "%I"),
        // Minute
        ("mm", "%M"),
        // Second
        ("ss", "%S"),
    ];

    let mut result = format.to_string();

    for (from, to) in replacements {
        result = result.replace(from, to);
    }

    result
}
