use crate::error::ScanError;
use crate::language;
use serde::{Deserialize, Serialize};

pub const DEFAULT_VOCABULARY_LIMIT: usize = 20_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Locale used when none is declared or discovered in markup.
    pub locale: String,
    pub vocabulary_limit: usize,
    pub replacements: Replacements,
    pub sanitize_allowed_tags: Vec<String>,
    pub num_threads: usize,
    /// Category chosen when two categories score exactly the same.
    pub default_category: String,
    pub spam_category: String,
    pub language_detection: bool,
    pub language_detection_min_length: usize,
    pub similarity_threshold: f64,
    pub homograph_threshold: f64,
    pub homograph_cache_limit: Option<usize>,
    pub duplicate_ham_tokens: bool,
    /// Replace every token with a truncated SHA-256 digest before classifying.
    pub hash_tokens: bool,
    pub macro_detection: bool,
    /// Heuristic score at which a message is reported as arbitrary spam.
    pub arbitrary_threshold: u32,
    pub whitelist_requests: String,
    pub debug: bool,
}

/// Placeholder tokens substituted for matched entities before tokenizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Replacements {
    pub email: String,
    pub url: String,
    pub number: String,
    pub currency: String,
}

impl Replacements {
    pub fn all(&self) -> [&str; 4] {
        [&self.email, &self.url, &self.number, &self.currency]
    }

    pub fn contains(&self, token: &str) -> bool {
        self.all().contains(&token)
    }
}

impl Default for Replacements {
    fn default() -> Self {
        Self {
            email: "email_wqpxkzrlvn".to_string(),
            url: "url_hjtmbcqzoa".to_string(),
            number: "number_ysdfkgvuie".to_string(),
            currency: "currency_lrnqwptzxj".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            locale: "en".to_string(),
            vocabulary_limit: DEFAULT_VOCABULARY_LIMIT,
            replacements: Replacements::default(),
            sanitize_allowed_tags: default_allowed_tags(),
            num_threads: num_cpus::get(),
            default_category: "ham".to_string(),
            spam_category: "spam".to_string(),
            language_detection: false,
            language_detection_min_length: 100,
            similarity_threshold: 0.8,
            homograph_threshold: 0.6,
            homograph_cache_limit: None,
            duplicate_ham_tokens: true,
            hash_tokens: false,
            macro_detection: true,
            arbitrary_threshold: 5,
            whitelist_requests: "https://github.com/spam-sentinel/spam-sentinel/issues".to_string(),
            debug: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        let locale = language::parse_locale(&self.locale);
        if !language::is_known_locale(&locale) {
            return Err(ScanError::Configuration(format!(
                "locale of {} was not valid according to locales list",
                self.locale
            )));
        }

        if self.vocabulary_limit == 0 {
            return Err(ScanError::Configuration(
                "vocabulary_limit must be a positive integer".to_string(),
            ));
        }

        if self.num_threads == 0 {
            return Err(ScanError::Configuration(
                "num_threads must be a positive integer".to_string(),
            ));
        }

        // Placeholders must survive the number/url passes and the word splitter
        // intact, so they are restricted to letters and underscores.
        let names = ["email", "url", "number", "currency"];
        for (name, value) in names.iter().zip(self.replacements.all()) {
            if value.is_empty() {
                return Err(ScanError::Configuration(format!(
                    "replacement for \"{name}\" missing"
                )));
            }
            if !value.chars().all(|c| c.is_ascii_lowercase() || c == '_') {
                return Err(ScanError::Configuration(format!(
                    "replacement for \"{name}\" may only contain lowercase letters and underscores: {value}"
                )));
            }
        }

        let mut unique = self.replacements.all().to_vec();
        unique.sort_unstable();
        unique.dedup();
        if unique.len() != 4 {
            return Err(ScanError::Configuration(
                "replacements must be distinct".to_string(),
            ));
        }

        if self.default_category.is_empty() || self.spam_category.is_empty() {
            return Err(ScanError::Configuration(
                "category names must not be empty".to_string(),
            ));
        }

        for (name, value) in [
            ("similarity_threshold", self.similarity_threshold),
            ("homograph_threshold", self.homograph_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ScanError::Configuration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.arbitrary_threshold == 0 {
            return Err(ScanError::Configuration(
                "arbitrary_threshold must be a positive integer".to_string(),
            ));
        }

        if self.homograph_cache_limit == Some(0) {
            return Err(ScanError::Configuration(
                "homograph_cache_limit must be positive when set".to_string(),
            ));
        }

        Ok(())
    }

    /// The default locale reduced to its primary subtag.
    pub fn default_locale(&self) -> String {
        language::parse_locale(&self.locale)
    }
}

fn default_allowed_tags() -> Vec<String> {
    [
        // sectioning and block content
        "address", "article", "aside", "footer", "header", "h1", "h2", "h3", "h4", "h5", "h6",
        "hgroup", "nav", "section", "blockquote", "dd", "div", "dl", "dt", "figcaption",
        "figure", "hr", "li", "main", "ol", "p", "pre", "ul",
        // inline text semantics
        "a", "abbr", "b", "bdi", "bdo", "br", "cite", "code", "data", "dfn", "em", "i", "kbd",
        "mark", "q", "rp", "rt", "rtc", "ruby", "s", "samp", "span", "strong", "sub", "sup",
        "time", "u", "var", "wbr",
        // edits and tables
        "del", "ins", "caption", "col", "colgroup", "table", "tbody", "td", "tfoot", "th",
        "thead", "tr",
        // interactive, no form elements
        "details", "dialog", "menu", "summary",
        // obsolete but common in mail
        "center", "marquee", "strike",
    ]
    .iter()
    .map(|tag| tag.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_locale(), "en");
        assert!(config.num_threads >= 1);
    }

    #[test]
    fn test_invalid_locale_rejected() {
        let config = Config {
            locale: "xx-YY".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ScanError::Configuration(_))
        ));
    }

    #[test]
    fn test_region_locale_accepted() {
        let config = Config {
            locale: "en-US".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert_eq!(config.default_locale(), "en");
    }

    #[test]
    fn test_zero_limits_rejected() {
        let config = Config {
            vocabulary_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            num_threads: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            arbitrary_threshold: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_replacements_must_be_letters() {
        let mut config = Config::default();
        config.replacements.number = "number_123".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.replacements.url = String::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.replacements.url = config.replacements.email.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let path = path.to_str().unwrap();

        let config = Config {
            locale: "fr".to_string(),
            vocabulary_limit: 500,
            ..Default::default()
        };
        config.to_file(path).unwrap();

        let loaded = Config::from_file(path).unwrap();
        assert_eq!(loaded.locale, "fr");
        assert_eq!(loaded.vocabulary_limit, 500);
        assert_eq!(loaded.replacements, config.replacements);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("locale: de\nnum_threads: 2\n").unwrap();
        assert_eq!(config.locale, "de");
        assert_eq!(config.num_threads, 2);
        assert_eq!(config.vocabulary_limit, DEFAULT_VOCABULARY_LIMIT);
        assert!(config.validate().is_ok());
    }
}
