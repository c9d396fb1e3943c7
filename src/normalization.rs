use crate::config::Replacements;
use crate::error::ScanError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Elements whose content is never visible text.
const DROPPED_ELEMENTS: [&str; 6] = ["script", "style", "textarea", "option", "noscript", "head"];

const CURRENCY_SYMBOLS: &[&str] = &[
    "$", "€", "£", "¥", "¢", "₹", "₽", "₩", "₪", "₫", "₴", "₦", "₱", "฿", "₺", "₡", "₲", "₵",
    "₸", "₭", "₮", "₼", "₾", "₿", "﷼", "৳", "៛", "₨", "ƒ", "US$", "CA$", "A$", "NZ$", "HK$",
    "R$", "S$", "NT$", "zł", "Kč", "лв", "ден", "дин", "руб", "Ft", "kr", "CHF", "Lek",
];

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref DROPPED: Vec<Regex> = DROPPED_ELEMENTS
        .iter()
        .map(|name| Regex::new(&format!(r"(?is)<{name}\b[^>]*>.*?</{name}\s*>")).unwrap())
        .collect();
    static ref TAG: Regex = Regex::new(r"(?s)<\s*/?\s*([a-zA-Z][a-zA-Z0-9-]*)\b[^>]*>").unwrap();
    static ref ANY_TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref ENTITY: Regex =
        Regex::new(r"&(?:#(\d+)|#[xX]([0-9A-Fa-f]+)|([a-zA-Z][a-zA-Z0-9]*));").unwrap();
    static ref NEWLINE: Regex = Regex::new(r"\r\n|\n|\r").unwrap();
    static ref EMAIL: Regex =
        Regex::new(r"(?i)[a-z0-9._%+\-]+@(?:[\p{L}\p{N}](?:[\p{L}\p{N}\-]*[\p{L}\p{N}])?\.)+[\p{L}]{2,}").unwrap();
    static ref URL: Regex = Regex::new(concat!(
        r"(?i)(?:(?:https?|ftp)://|www\.)[^\s<>]+",
        r"|\b(?:[\p{L}\p{N}](?:[\p{L}\p{N}\-]{0,61}[\p{L}\p{N}])?\.)+",
        r"(?:com|net|org|edu|gov|mil|int|info|biz|io|co|us|uk|de|fr|ru|cn|jp|br|in|it|es|nl|eu",
        r"|ca|au|ch|se|no|pl|me|tv|cc|ly|xyz|top|online|site|app|dev|shop|club|xn--[a-z0-9\-]+)",
        r"\b(?:/[^\s<>]*)?"
    ))
    .unwrap();
    static ref NUMBER: Regex = Regex::new(r"\d[\d,.]*").unwrap();
    static ref CURRENCY: Regex = {
        let mut symbols: Vec<&str> = CURRENCY_SYMBOLS
            .iter()
            .copied()
            .filter(|s| !s.chars().all(|c| c.is_ascii_alphabetic()))
            .collect();
        symbols.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()));
        let alternation: Vec<String> = symbols.iter().map(|s| regex::escape(s)).collect();
        Regex::new(&alternation.join("|")).unwrap()
    };
    static ref HOMOGLYPHS: HashMap<char, char> = {
        let mut map = HashMap::new();

        // Cyrillic to Latin
        for (from, to) in [
            ('а', 'a'), ('в', 'b'), ('е', 'e'), ('ё', 'e'), ('к', 'k'), ('м', 'm'),
            ('н', 'h'), ('о', 'o'), ('р', 'p'), ('с', 'c'), ('т', 't'), ('у', 'y'),
            ('х', 'x'), ('і', 'i'), ('ј', 'j'), ('ѕ', 's'), ('ԁ', 'd'), ('ԛ', 'q'),
            ('ԝ', 'w'), ('һ', 'h'), ('ӏ', 'l'), ('ո', 'n'),
            ('А', 'a'), ('В', 'b'), ('Е', 'e'), ('К', 'k'), ('М', 'm'), ('Н', 'h'),
            ('О', 'o'), ('Р', 'p'), ('С', 'c'), ('Т', 't'), ('Х', 'x'), ('І', 'i'),
        ] {
            map.insert(from, to);
        }

        // Greek to Latin
        for (from, to) in [
            ('α', 'a'), ('β', 'b'), ('ε', 'e'), ('ι', 'i'), ('κ', 'k'), ('ν', 'v'),
            ('ο', 'o'), ('ρ', 'p'), ('τ', 't'), ('υ', 'u'), ('χ', 'x'), ('γ', 'y'),
            ('Α', 'a'), ('Β', 'b'), ('Ε', 'e'), ('Ι', 'i'), ('Κ', 'k'), ('Μ', 'm'),
            ('Ν', 'n'), ('Ο', 'o'), ('Ρ', 'p'), ('Τ', 't'), ('Υ', 'y'), ('Χ', 'x'),
            ('Ζ', 'z'),
        ] {
            map.insert(from, to);
        }

        // Letterlike symbols
        for (from, to) in [('ℓ', 'l'), ('ℯ', 'e'), ('ℊ', 'g'), ('ℴ', 'o'), ('ⅰ', 'i'), ('ⅼ', 'l')] {
            map.insert(from, to);
        }

        // Mathematical alphanumerics, bold and italic small letters
        for (offset, letter) in ('a'..='z').enumerate() {
            for base in [0x1D41A_u32, 0x1D44E, 0x1D482, 0x1D4EA, 0x1D5BA, 0x1D68A] {
                if let Some(glyph) = char::from_u32(base + offset as u32) {
                    map.insert(glyph, letter);
                }
            }
        }

        map
    };
}

/// Latin look-alike for a character, if it is a known homoglyph.
pub fn fold_homoglyph(c: char) -> Option<char> {
    HOMOGLYPHS.get(&c).copied()
}

/// Reduces markup to visible text and substitutes placeholders for emails,
/// URLs, numbers and currency symbols.
#[derive(Debug, Clone)]
pub struct Normalizer {
    allowed_tags: HashSet<String>,
    replacements: Replacements,
    injected: Regex,
}

impl Normalizer {
    pub fn new(allowed_tags: &[String], replacements: &Replacements) -> Result<Self, ScanError> {
        let alternation: Vec<String> = replacements.all().iter().map(|r| regex::escape(r)).collect();
        let injected = Regex::new(&format!("(?i){}", alternation.join("|")))
            .map_err(|e| ScanError::Configuration(format!("invalid replacements: {e}")))?;

        Ok(Self {
            allowed_tags: allowed_tags.iter().map(|t| t.to_lowercase()).collect(),
            replacements: replacements.clone(),
            injected,
        })
    }

    /// Drop comments and invisible elements, then unwrap any tag outside the allow-list.
    pub fn sanitize(&self, html: &str) -> String {
        let mut result = COMMENT.replace_all(html, " ").into_owned();
        for element in DROPPED.iter() {
            result = element.replace_all(&result, " ").into_owned();
        }

        TAG.replace_all(&result, |caps: &regex::Captures| {
            let name = caps[1].to_lowercase();
            if self.allowed_tags.contains(&name) {
                caps[0].to_string()
            } else {
                " ".to_string()
            }
        })
        .into_owned()
    }

    /// Markup or plain text to a single line of visible text.
    pub fn visible_text(&self, input: &str, is_markup: bool) -> String {
        let text = if is_markup {
            decode_entities(&strip_tags(&self.sanitize(input)))
        } else {
            decode_entities(&strip_tags(input))
        };

        NEWLINE.replace_all(&text, " ").into_owned()
    }

    /// Replace entities with placeholders, in a fixed order: email, url, number, currency.
    pub fn substitute(&self, text: &str) -> String {
        // Placeholders smuggled into the input would otherwise be counted as
        // genuine substitutions.
        let text = self.injected.replace_all(text, " ");

        let email = format!(" {} ", self.replacements.email);
        let url = format!(" {} ", self.replacements.url);
        let number = format!(" {} ", self.replacements.number);
        let currency = format!(" {} ", self.replacements.currency);

        let text = EMAIL.replace_all(&text, email.as_str());
        let text = URL.replace_all(&text, url.as_str());
        let text = NUMBER.replace_all(&text, number.as_str());
        CURRENCY.replace_all(&text, currency.as_str()).into_owned()
    }

    pub fn replacements(&self) -> &Replacements {
        &self.replacements
    }
}

/// Every link-like substring of `text`, brackets and parentheses trimmed.
pub fn find_urls(text: &str) -> Vec<String> {
    let text = NEWLINE.replace_all(text, " ");
    URL.find_iter(&text)
        .map(|m| {
            m.as_str()
                .trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')'))
                .to_string()
        })
        .filter(|url| !url.is_empty())
        .collect()
}

pub fn strip_tags(html: &str) -> String {
    ANY_TAG.replace_all(html, " ").into_owned()
}

pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures| {
            if let Some(decimal) = caps.get(1) {
                if let Some(ch) = decimal.as_str().parse::<u32>().ok().and_then(char::from_u32) {
                    return ch.to_string();
                }
            } else if let Some(hex) = caps.get(2) {
                if let Some(ch) = u32::from_str_radix(hex.as_str(), 16)
                    .ok()
                    .and_then(char::from_u32)
                {
                    return ch.to_string();
                }
            } else if let Some(named) = caps.get(3) {
                let decoded = match named.as_str() {
                    "amp" => "&",
                    "lt" => "<",
                    "gt" => ">",
                    "quot" => "\"",
                    "apos" => "'",
                    "nbsp" => " ",
                    "copy" => "©",
                    "reg" => "®",
                    "trade" => "™",
                    "euro" => "€",
                    "pound" => "£",
                    "yen" => "¥",
                    "cent" => "¢",
                    "hellip" => "…",
                    "mdash" => "—",
                    "ndash" => "–",
                    "lsquo" => "‘",
                    "rsquo" => "’",
                    "ldquo" => "“",
                    "rdquo" => "”",
                    _ => return caps[0].to_string(),
                };
                return decoded.to_string();
            }
            caps[0].to_string()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn normalizer() -> Normalizer {
        let config = Config::default();
        Normalizer::new(&config.sanitize_allowed_tags, &config.replacements).unwrap()
    }

    #[test]
    fn test_sanitize_drops_invisible_content() {
        let n = normalizer();
        let html = "<html><head><title>Secret</title></head><body><!-- hidden --><p>Shown</p>\
                    <script>var x = 1;</script><STYLE>p{}</STYLE><noscript>nojs</noscript></body></html>";
        let sanitized = n.sanitize(html);
        assert!(sanitized.contains("<p>Shown</p>"));
        assert!(!sanitized.contains("Secret"));
        assert!(!sanitized.contains("hidden"));
        assert!(!sanitized.contains("var x"));
        assert!(!sanitized.contains("p{}"));
        assert!(!sanitized.contains("nojs"));
        assert!(!sanitized.contains("<body>"));
    }

    #[test]
    fn test_sanitize_unwraps_disallowed_tags() {
        let n = normalizer();
        let sanitized = n.sanitize("<form action=\"x\"><b>Bold</b> <font color=red>red</font></form>");
        assert!(sanitized.contains("<b>Bold</b>"));
        assert!(sanitized.contains("red"));
        assert!(!sanitized.contains("<font"));
        assert!(!sanitized.contains("<form"));
    }

    #[test]
    fn test_visible_text() {
        let n = normalizer();
        let text = n.visible_text("<p>Fish &amp; chips</p>\n<p>&#72;&#x69;</p>", true);
        assert!(text.contains("Fish & chips"));
        assert!(text.contains("Hi"));
        assert!(!text.contains('\n'));

        assert_eq!(n.visible_text("line one\r\nline two", false), "line one line two");
    }

    #[test]
    fn test_plain_text_tags_stripped() {
        let n = normalizer();
        let text = n.visible_text("<b>Fish</b> &amp; <i>chips</i>", false);
        assert!(!text.contains('<'));
        assert!(text.contains("Fish"));
        assert!(text.contains("& "));
        assert!(text.contains("chips"));
    }

    #[test]
    fn test_decode_unknown_entity_kept() {
        assert_eq!(decode_entities("&bogus; &lt;"), "&bogus; <");
    }

    #[test]
    fn test_substitution_order() {
        let n = normalizer();
        let r = Replacements::default();
        let out = n.substitute("Mail bob@example.com or visit https://example.com/a?b=1 for 25 $");
        assert!(out.contains(&r.email));
        assert!(out.contains(&r.url));
        assert!(out.contains(&r.number));
        assert!(out.contains(&r.currency));
        assert!(!out.contains("bob"));
        assert!(!out.contains("25"));
    }

    #[test]
    fn test_bare_domain_is_url() {
        let n = normalizer();
        let out = n.substitute("go to paypal-secure.com now");
        assert!(out.contains(&Replacements::default().url));
        assert!(!out.contains("paypal"));
    }

    #[test]
    fn test_alphabetic_currency_not_replaced() {
        let n = normalizer();
        let out = n.substitute("kr CHF €");
        assert!(out.contains("kr"));
        assert!(out.contains("CHF"));
        assert!(!out.contains('€'));
    }

    #[test]
    fn test_injected_placeholders_blanked() {
        let n = normalizer();
        let r = Replacements::default();
        let out = n.substitute(&format!("free {} money", r.url.to_uppercase()));
        assert!(!out.to_lowercase().contains(&r.url));
        assert!(out.contains("free"));
        assert!(out.contains("money"));
    }

    #[test]
    fn test_find_urls() {
        let urls = find_urls("See (https://example.com/a) and\nwww.test.org or mail.example.net");
        assert_eq!(
            urls,
            vec!["https://example.com/a", "www.test.org", "mail.example.net"]
        );
    }

    #[test]
    fn test_homoglyph_folding() {
        assert_eq!(fold_homoglyph('а'), Some('a')); // Cyrillic
        assert_eq!(fold_homoglyph('ο'), Some('o')); // Greek
        assert_eq!(fold_homoglyph('𝐚'), Some('a'));
        assert_eq!(fold_homoglyph('a'), None);
    }
}
