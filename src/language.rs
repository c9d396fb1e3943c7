use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use whatlang::{detect, Lang};

pub const MIN_LANGUAGE_CONFIDENCE: f64 = 0.5;

lazy_static! {
    static ref KNOWN_LOCALES: HashSet<&'static str> = [
        "aa", "ab", "ae", "af", "ak", "am", "an", "ar", "as", "av", "ay", "az", "ba", "be",
        "bg", "bh", "bi", "bm", "bn", "bo", "br", "bs", "ca", "ce", "ch", "co", "cr", "cs",
        "cu", "cv", "cy", "da", "de", "dv", "dz", "ee", "el", "en", "eo", "es", "et", "eu",
        "fa", "ff", "fi", "fj", "fo", "fr", "fy", "ga", "gd", "gl", "gn", "gu", "gv", "ha",
        "he", "hi", "ho", "hr", "ht", "hu", "hy", "hz", "ia", "id", "ie", "ig", "ii", "ik",
        "io", "is", "it", "iu", "ja", "jv", "ka", "kg", "ki", "kj", "kk", "kl", "km", "kn",
        "ko", "kr", "ks", "ku", "kv", "kw", "ky", "la", "lb", "lg", "li", "ln", "lo", "lt",
        "lu", "lv", "mg", "mh", "mi", "mk", "ml", "mn", "mr", "ms", "mt", "my", "na", "nb",
        "nd", "ne", "ng", "nl", "nn", "no", "nr", "nv", "ny", "oc", "oj", "om", "or", "os",
        "pa", "pi", "pl", "ps", "pt", "qu", "rm", "rn", "ro", "ru", "rw", "sa", "sc", "sd",
        "se", "sg", "si", "sk", "sl", "sm", "sn", "so", "sq", "sr", "ss", "st", "su", "sv",
        "sw", "ta", "te", "tg", "th", "ti", "tk", "tl", "tn", "to", "tr", "ts", "tt", "tw",
        "ty", "ug", "uk", "ur", "uz", "ve", "vi", "vo", "wa", "wo", "xh", "yi", "yo", "za",
        "zh", "zu",
    ]
    .into_iter()
    .collect();
    static ref META_CONTENT_LANGUAGE: Regex = Regex::new(
        r#"(?is)<meta\b[^>]*http-equiv\s*=\s*["']?content-language["']?[^>]*>"#
    )
    .unwrap();
    static ref META_CONTENT_ATTR: Regex =
        Regex::new(r#"(?i)\bcontent\s*=\s*["']?([^"'\s>]+)"#).unwrap();
    static ref HTML_LANG: Regex =
        Regex::new(r#"(?is)<html\b[^>]*?\blang\s*=\s*["']?([^"'\s>]+)"#).unwrap();
}

/// Reduce a locale tag such as `en-US` or `en_US` to its lower-cased primary subtag.
pub fn parse_locale(locale: &str) -> String {
    locale
        .trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

pub fn is_known_locale(locale: &str) -> bool {
    KNOWN_LOCALES.contains(locale)
}

/// Locale declared by the markup itself: a `Content-Language` meta tag wins
/// over the root element's `lang` attribute.
pub fn discover_markup_locale(html: &str) -> Option<String> {
    let from_meta = META_CONTENT_LANGUAGE
        .find(html)
        .and_then(|tag| META_CONTENT_ATTR.captures(tag.as_str()))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string());

    from_meta.or_else(|| {
        HTML_LANG
            .captures(html)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Statistical language guess for texts long enough to be trusted.
///
/// Returns the ISO 639-1 code when the detector is at least
/// [`MIN_LANGUAGE_CONFIDENCE`] sure and the language has a two-letter code.
pub fn detect_locale(text: &str, min_length: usize) -> Option<String> {
    if text.chars().count() < min_length {
        return None;
    }

    let info = detect(text)?;
    if info.confidence() < MIN_LANGUAGE_CONFIDENCE {
        log::debug!(
            "Language guess {:?} discarded, confidence {:.2}",
            info.lang(),
            info.confidence()
        );
        return None;
    }

    iso_639_1(info.lang()).map(str::to_string)
}

fn iso_639_1(lang: Lang) -> Option<&'static str> {
    Some(match lang {
        Lang::Epo => "eo",
        Lang::Eng => "en",
        Lang::Rus => "ru",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Por => "pt",
        Lang::Ita => "it",
        Lang::Ben => "bn",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ukr => "uk",
        Lang::Kat => "ka",
        Lang::Ara => "ar",
        Lang::Hin => "hi",
        Lang::Jpn => "ja",
        Lang::Heb => "he",
        Lang::Yid => "yi",
        Lang::Pol => "pl",
        Lang::Amh => "am",
        Lang::Jav => "jv",
        Lang::Kor => "ko",
        Lang::Nob => "nb",
        Lang::Dan => "da",
        Lang::Swe => "sv",
        Lang::Fin => "fi",
        Lang::Tur => "tr",
        Lang::Nld => "nl",
        Lang::Hun => "hu",
        Lang::Ces => "cs",
        Lang::Ell => "el",
        Lang::Bul => "bg",
        Lang::Bel => "be",
        Lang::Mar => "mr",
        Lang::Kan => "kn",
        Lang::Ron => "ro",
        Lang::Slv => "sl",
        Lang::Hrv => "hr",
        Lang::Srp => "sr",
        Lang::Mkd => "mk",
        Lang::Lit => "lt",
        Lang::Lav => "lv",
        Lang::Est => "et",
        Lang::Tam => "ta",
        Lang::Vie => "vi",
        Lang::Urd => "ur",
        Lang::Tha => "th",
        Lang::Guj => "gu",
        Lang::Uzb => "uz",
        Lang::Pan => "pa",
        Lang::Aze => "az",
        Lang::Ind => "id",
        Lang::Tel => "te",
        Lang::Pes => "fa",
        Lang::Mal => "ml",
        Lang::Ori => "or",
        Lang::Mya => "my",
        Lang::Nep => "ne",
        Lang::Sin => "si",
        Lang::Khm => "km",
        Lang::Tuk => "tk",
        Lang::Aka => "ak",
        Lang::Zul => "zu",
        Lang::Sna => "sn",
        Lang::Afr => "af",
        Lang::Lat => "la",
        Lang::Slk => "sk",
        Lang::Cat => "ca",
        Lang::Tgl => "tl",
        Lang::Hye => "hy",
    })
}

/// Writing systems tracked when looking for mixed-script hostnames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Script {
    Latin,
    Cyrillic,
    Greek,
    Cjk,
    Hebrew,
    Arabic,
}

impl Script {
    pub fn of(c: char) -> Option<Script> {
        match c {
            'a'..='z' | 'A'..='Z' => Some(Script::Latin),
            '\u{0400}'..='\u{04FF}' => Some(Script::Cyrillic),
            '\u{0370}'..='\u{03FF}' => Some(Script::Greek),
            '\u{4E00}'..='\u{9FFF}' => Some(Script::Cjk),
            '\u{0590}'..='\u{05FF}' => Some(Script::Hebrew),
            '\u{0600}'..='\u{06FF}' => Some(Script::Arabic),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Script::Latin => "Latin",
            Script::Cyrillic => "Cyrillic",
            Script::Greek => "Greek",
            Script::Cjk => "CJK",
            Script::Hebrew => "Hebrew",
            Script::Arabic => "Arabic",
        }
    }
}

pub fn scripts_in(text: &str) -> BTreeSet<Script> {
    text.chars().filter_map(Script::of).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locale() {
        assert_eq!(parse_locale("en-US"), "en");
        assert_eq!(parse_locale("en_US"), "en");
        assert_eq!(parse_locale(" FR "), "fr");
        assert_eq!(parse_locale("pt-BR"), "pt");
        assert_eq!(parse_locale(""), "");
    }

    #[test]
    fn test_known_locales() {
        assert!(is_known_locale("en"));
        assert!(is_known_locale("zh"));
        assert!(!is_known_locale("xx"));
        assert!(!is_known_locale(""));
    }

    #[test]
    fn test_meta_content_language_wins() {
        let html = r#"<html lang="de"><head><meta http-equiv="Content-Language" content="fr-FR"></head><body>x</body></html>"#;
        assert_eq!(discover_markup_locale(html), Some("fr-FR".to_string()));
    }

    #[test]
    fn test_html_lang_attribute() {
        let html = r#"<!doctype html><HTML class="x" LANG='es'><body>hola</body></HTML>"#;
        assert_eq!(discover_markup_locale(html), Some("es".to_string()));
        assert_eq!(discover_markup_locale("<p>no hints</p>"), None);
    }

    #[test]
    fn test_detect_locale_requires_length() {
        assert_eq!(detect_locale("Bonjour", 100), None);

        let text = "Ceci est un texte suffisamment long pour que la détection de la langue \
                    fonctionne correctement, avec des mots français très courants et variés.";
        assert_eq!(detect_locale(text, 50), Some("fr".to_string()));
    }

    #[test]
    fn test_script_buckets() {
        assert_eq!(Script::of('a'), Some(Script::Latin));
        assert_eq!(Script::of('а'), Some(Script::Cyrillic)); // Cyrillic а
        assert_eq!(Script::of('ο'), Some(Script::Greek)); // Greek omicron
        assert_eq!(Script::of('中'), Some(Script::Cjk));
        assert_eq!(Script::of('ש'), Some(Script::Hebrew));
        assert_eq!(Script::of('م'), Some(Script::Arabic));
        assert_eq!(Script::of('1'), None);
        assert_eq!(Script::of('-'), None);
    }

    #[test]
    fn test_scripts_in_mixed_text() {
        let scripts = scripts_in("pаypal"); // Cyrillic а
        assert!(scripts.contains(&Script::Latin));
        assert!(scripts.contains(&Script::Cyrillic));
        assert_eq!(scripts.len(), 2);

        assert_eq!(scripts_in("example").len(), 1);
        assert!(scripts_in("123-456").is_empty());
    }
}
