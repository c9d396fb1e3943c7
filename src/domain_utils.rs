use url::Url;

/// Characters stripped from the end of a link path (RFC 3986 reserved set).
const RESERVED: &[char] = &[
    ':', '/', '?', '#', '[', ']', '@', '!', '$', '&', '\'', '(', ')', '*', '+', ',', ';', '=',
];

/// Top-level domains handed out free or cheaply and favoured by spammers.
pub const SUSPICIOUS_TLDS: &[&str] = &[
    "tk", "ml", "ga", "cf", "gq", "xyz", "top", "wang", "win", "bid", "loan", "click", "link",
    "work", "date", "racing", "download", "stream", "trade",
];

/// Minimal domain hierarchy utilities
pub struct DomainUtils;

impl DomainUtils {
    /// Check if domain matches any in list (with hierarchy support)
    pub fn matches_domain_list(domain: &str, domain_list: &[String]) -> bool {
        let domain_lower = domain.to_lowercase();

        domain_list.iter().any(|pattern| {
            let pattern_lower = pattern.to_lowercase();
            domain_lower == pattern_lower || domain_lower.ends_with(&format!(".{pattern_lower}"))
        })
    }

    /// Lower-cased `host/path` form of a link: protocol, query, fragment and
    /// trailing reserved characters are dropped, and the host is punycode.
    pub fn normalize_url(link: &str) -> String {
        let trimmed = link
            .trim()
            .trim_matches(|c: char| matches!(c, '[' | ']' | '(' | ')'))
            .trim_end_matches('.')
            .to_lowercase();
        let bare = strip_protocol(&trimmed);

        match Url::parse(&format!("http://{bare}")) {
            Ok(parsed) => match parsed.host_str() {
                Some(host) => {
                    let path = parsed.path().trim_end_matches(RESERVED);
                    format!("{host}{path}")
                }
                None => bare.trim_end_matches('/').to_string(),
            },
            Err(e) => {
                log::debug!("Could not parse link {link}: {e}");
                bare.trim_end_matches('/').to_string()
            }
        }
    }

    /// ASCII hostname of a link or bare host, with or without a scheme.
    pub fn hostname(link: &str) -> Option<String> {
        let link = link.trim();
        let candidate = if link.contains("://") {
            link.to_string()
        } else {
            format!("http://{link}")
        };

        let parsed = Url::parse(&candidate).ok()?;
        let host = parsed.host_str()?.trim_end_matches('.');
        if host.is_empty() {
            return None;
        }
        Some(host.to_lowercase())
    }

    /// Whether a piece of visible text is itself a link, e.g. anchor text of
    /// `www.paypal.com`.
    pub fn looks_like_url(text: &str) -> bool {
        let text = text.trim();
        if text.is_empty()
            || text.chars().any(char::is_whitespace)
            || (text.contains('@') && !text.contains("://"))
        {
            return false;
        }

        let Some(host) = Self::hostname(text) else {
            return false;
        };

        let Some((_, tld)) = host.rsplit_once('.') else {
            return false;
        };

        tld.starts_with("xn--") || (tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
    }

    /// Registrable domain, e.g. `example.co.uk` for `mail.example.co.uk`.
    pub fn organizational_domain(host: &str) -> Option<String> {
        psl::domain_str(host).map(str::to_string)
    }

    /// Public suffix of `host` when it is on the public suffix list.
    pub fn public_suffix(host: &str) -> Option<String> {
        let suffix = psl::suffix(host.as_bytes())?;
        if !suffix.is_known() {
            return None;
        }
        std::str::from_utf8(suffix.trim().as_bytes())
            .ok()
            .map(str::to_string)
    }

    /// Registrable name without its public suffix, e.g. `example` for
    /// `mail.example.co.uk`.
    pub fn registrable_label(host: &str) -> Option<String> {
        let domain = Self::organizational_domain(host)?;
        let suffix = Self::public_suffix(host)?;
        domain
            .strip_suffix(suffix.as_str())?
            .strip_suffix('.')
            .filter(|label| !label.is_empty())
            .map(str::to_string)
    }

    pub fn is_suspicious_tld(host: &str) -> bool {
        host.trim_end_matches('.')
            .rsplit('.')
            .next()
            .is_some_and(|tld| SUSPICIOUS_TLDS.contains(&tld.to_lowercase().as_str()))
    }

    pub fn has_punycode_label(host: &str) -> bool {
        host.split('.').any(|label| label.starts_with("xn--"))
    }

    pub fn to_ascii(host: &str) -> String {
        idna::domain_to_ascii(host).unwrap_or_else(|_| host.to_lowercase())
    }
}

fn strip_protocol(link: &str) -> &str {
    ["https://", "http://", "ftp://", "//"]
        .iter()
        .find_map(|prefix| link.strip_prefix(prefix))
        .unwrap_or(link)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_domain_list() {
        let domains = vec!["example.com".to_string(), "test.org".to_string()];

        assert!(DomainUtils::matches_domain_list("example.com", &domains));
        assert!(DomainUtils::matches_domain_list(
            "mail.example.com",
            &domains
        ));
        assert!(!DomainUtils::matches_domain_list("badexample.com", &domains));
        assert!(!DomainUtils::matches_domain_list("other.com", &domains));
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            DomainUtils::normalize_url("HTTPS://Example.com/Path/?q=1#frag"),
            "example.com/path"
        );
        assert_eq!(DomainUtils::normalize_url("http://example.com/"), "example.com");
        assert_eq!(DomainUtils::normalize_url("example.com."), "example.com");
        assert_eq!(
            DomainUtils::normalize_url("(https://example.com/a)"),
            "example.com/a"
        );
        assert_eq!(
            DomainUtils::normalize_url("www.example.com/login!"),
            "www.example.com/login"
        );
    }

    #[test]
    fn test_normalize_url_punycodes_host() {
        let normalized = DomainUtils::normalize_url("https://pаypal.com/login"); // Cyrillic а
        assert!(normalized.starts_with("xn--"));
        assert!(normalized.ends_with(".com/login"));
    }

    #[test]
    fn test_hostname() {
        assert_eq!(
            DomainUtils::hostname("https://Sub.Example.co.uk/x?y"),
            Some("sub.example.co.uk".to_string())
        );
        assert_eq!(
            DomainUtils::hostname("example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(DomainUtils::hostname(""), None);
    }

    #[test]
    fn test_looks_like_url() {
        assert!(DomainUtils::looks_like_url("www.paypal.com"));
        assert!(DomainUtils::looks_like_url("https://example.org/login"));
        assert!(!DomainUtils::looks_like_url("Click here"));
        assert!(!DomainUtils::looks_like_url("localhost"));
        assert!(!DomainUtils::looks_like_url("someone@example.com"));
    }

    #[test]
    fn test_organizational_domain() {
        assert_eq!(
            DomainUtils::organizational_domain("mail.example.co.uk"),
            Some("example.co.uk".to_string())
        );
        assert_eq!(
            DomainUtils::organizational_domain("www.paypal.com"),
            Some("paypal.com".to_string())
        );
    }

    #[test]
    fn test_registrable_label() {
        assert_eq!(DomainUtils::public_suffix("www.apple.co.uk").as_deref(), Some("co.uk"));
        assert_eq!(
            DomainUtils::registrable_label("www.apple.co.uk").as_deref(),
            Some("apple")
        );
        assert_eq!(DomainUtils::registrable_label("google.de").as_deref(), Some("google"));
        assert_eq!(DomainUtils::registrable_label("co.uk"), None);
    }

    #[test]
    fn test_suspicious_tld() {
        assert!(DomainUtils::is_suspicious_tld("paypal.tk"));
        assert!(DomainUtils::is_suspicious_tld("Offers.XYZ."));
        assert!(!DomainUtils::is_suspicious_tld("paypal.de"));
    }

    #[test]
    fn test_punycode_labels() {
        assert!(DomainUtils::has_punycode_label("xn--80ak6aa92e.com"));
        assert!(DomainUtils::has_punycode_label("www.xn--80ak6aa92e.com"));
        assert!(!DomainUtils::has_punycode_label("example.com"));
        assert_eq!(DomainUtils::to_ascii("Example.COM"), "example.com");
    }
}
