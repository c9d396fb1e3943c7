use crate::config::Config;
use crate::error::ScanError;
use crate::language;
use crate::normalization::Normalizer;
use crate::stopwords;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use sha2::{Digest, Sha256};

/// Snowball algorithm per locale. `None` means the locale is kept unstemmed;
/// locales missing from the table fall back to English.
static STEMMER_MAP: &[(&str, Option<Algorithm>)] = &[
    ("ar", Some(Algorithm::Arabic)),
    ("da", Some(Algorithm::Danish)),
    ("de", Some(Algorithm::German)),
    ("el", Some(Algorithm::Greek)),
    ("en", Some(Algorithm::English)),
    ("es", Some(Algorithm::Spanish)),
    ("fi", Some(Algorithm::Finnish)),
    ("fr", Some(Algorithm::French)),
    ("hu", Some(Algorithm::Hungarian)),
    ("it", Some(Algorithm::Italian)),
    ("nb", Some(Algorithm::Norwegian)),
    ("nl", Some(Algorithm::Dutch)),
    ("nn", Some(Algorithm::Norwegian)),
    ("no", Some(Algorithm::Norwegian)),
    ("pt", Some(Algorithm::Portuguese)),
    ("ro", Some(Algorithm::Romanian)),
    ("ru", Some(Algorithm::Russian)),
    ("sv", Some(Algorithm::Swedish)),
    ("ta", Some(Algorithm::Tamil)),
    ("tr", Some(Algorithm::Turkish)),
    ("he", None),
    ("hi", None),
    ("ja", None),
    ("ko", None),
    ("pl", None),
    ("th", None),
    ("uk", None),
    ("vi", None),
    ("zh", None),
];

pub fn stemmer_for(locale: &str) -> Option<Algorithm> {
    STEMMER_MAP
        .iter()
        .find(|(code, _)| *code == locale)
        .map(|(_, algorithm)| *algorithm)
        .unwrap_or(Some(Algorithm::English))
}

lazy_static! {
    static ref CONTRACTIONS: Vec<(Regex, &'static str)> = [
        (r"\bwon't\b", "will not"),
        (r"\bcan't\b", "can not"),
        (r"\bshan't\b", "shall not"),
        (r"\bain't\b", "is not"),
        (r"\blet's\b", "let us"),
        (r"\b(it|he|she|that|what|where|there|here|who|how)'s\b", "$1 is"),
        (r"n't\b", " not"),
        (r"'re\b", " are"),
        (r"'ve\b", " have"),
        (r"'ll\b", " will"),
        (r"'d\b", " would"),
        (r"'m\b", " am"),
    ]
    .into_iter()
    .map(|(pattern, expansion)| (Regex::new(pattern).unwrap(), expansion))
    .collect();
}

/// First 16 hex digits of the token's SHA-256 digest.
pub fn hash_token(token: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(token.as_bytes()));
    digest[..16].to_string()
}

fn expand_contractions(text: &str) -> String {
    let mut result = text.replace(['’', '‘'], "'");
    for (pattern, expansion) in CONTRACTIONS.iter() {
        result = pattern.replace_all(&result, *expansion).into_owned();
    }
    result
}

/// Turns subject lines, plain bodies and HTML bodies into classifier tokens.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    normalizer: Normalizer,
    default_locale: String,
    language_detection: bool,
    language_detection_min_length: usize,
    hash_tokens: bool,
}

impl Tokenizer {
    pub fn new(config: &Config) -> Result<Self, ScanError> {
        config.validate()?;

        Ok(Self {
            normalizer: Normalizer::new(&config.sanitize_allowed_tags, &config.replacements)?,
            default_locale: config.default_locale(),
            language_detection: config.language_detection,
            language_detection_min_length: config.language_detection_min_length,
            hash_tokens: config.hash_tokens,
        })
    }

    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    pub fn tokenize(&self, text: &str, declared_locale: Option<&str>, is_markup: bool) -> Vec<String> {
        let visible = self.normalizer.visible_text(text, is_markup);
        let locale = self.resolve_locale(text, &visible, declared_locale, is_markup);

        let substituted = self.normalizer.substitute(&visible);
        let mut lowered = substituted.to_lowercase();
        if locale == "en" {
            lowered = expand_contractions(&lowered);
        }

        let stemmer = stemmer_for(&locale).map(Stemmer::create);
        let replacements = self.normalizer.replacements();

        lowered
            .split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|word| !word.is_empty())
            .filter_map(|word| {
                if replacements.contains(word) {
                    return Some(word.to_string());
                }
                if stopwords::is_stopword(&locale, word) {
                    return None;
                }
                Some(match &stemmer {
                    Some(stemmer) => stemmer.stem(word).into_owned(),
                    None => word.to_string(),
                })
            })
            .map(|token| {
                if self.hash_tokens {
                    hash_token(&token)
                } else {
                    token
                }
            })
            .collect()
    }

    fn resolve_locale(
        &self,
        raw: &str,
        visible: &str,
        declared_locale: Option<&str>,
        is_markup: bool,
    ) -> String {
        let candidate = declared_locale
            .map(str::to_string)
            .or_else(|| is_markup.then(|| language::discover_markup_locale(raw)).flatten());

        let mut locale = match candidate {
            Some(candidate) => {
                let parsed = language::parse_locale(&candidate);
                if language::is_known_locale(&parsed) {
                    parsed
                } else {
                    log::debug!(
                        "Locale {candidate} is not valid, using default {}",
                        self.default_locale
                    );
                    self.default_locale.clone()
                }
            }
            None => self.default_locale.clone(),
        };

        // Declared locales are attacker controlled; trust the content when it
        // is long enough to judge.
        if self.language_detection {
            if let Some(detected) = language::detect_locale(visible, self.language_detection_min_length) {
                if detected != locale {
                    log::debug!("Detected locale {detected} overrides {locale}");
                }
                locale = detected;
            }
        }

        locale
    }
}
