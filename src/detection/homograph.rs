use crate::config::Config;
use crate::domain_utils::DomainUtils;
use crate::error::ScanError;
use crate::language::{self, Script};
use crate::normalization::fold_homoglyph;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::RwLock;

/// Well-known brands with the domains they legitimately send from.
const POPULAR_BRANDS: &[(&str, &[&str])] = &[
    ("google", &["google.com", "gmail.com"]),
    ("facebook", &["facebook.com", "fb.com"]),
    ("amazon", &["amazon.com", "amazon.co.uk", "amazon.de"]),
    ("apple", &["apple.com", "icloud.com"]),
    ("microsoft", &["microsoft.com", "outlook.com", "live.com"]),
    ("twitter", &["twitter.com", "x.com"]),
    ("instagram", &["instagram.com"]),
    ("linkedin", &["linkedin.com"]),
    ("youtube", &["youtube.com", "youtu.be"]),
    ("netflix", &["netflix.com"]),
    ("paypal", &["paypal.com", "paypal.me"]),
    ("ebay", &["ebay.com"]),
    ("yahoo", &["yahoo.com"]),
    ("adobe", &["adobe.com"]),
    ("salesforce", &["salesforce.com"]),
    ("oracle", &["oracle.com"]),
    ("ibm", &["ibm.com"]),
    ("cisco", &["cisco.com"]),
    ("intel", &["intel.com"]),
    ("nvidia", &["nvidia.com"]),
    ("tesla", &["tesla.com"]),
    ("citibank", &["citibank.com", "citi.com"]),
    ("bankofamerica", &["bankofamerica.com", "bofa.com"]),
    ("wellsfargo", &["wellsfargo.com"]),
    ("chase", &["chase.com"]),
    ("americanexpress", &["americanexpress.com", "aexp.com"]),
];

/// Internationalized registries and domains known to be legitimate.
const LEGITIMATE_IDN_DOMAINS: &[&str] = &[
    "xn--fsq.xn--0zwm56d",
    "xn--fiqs8s",
    "xn--fiqz9s",
    "xn--j6w193g",
    "xn--55qx5d",
    "xn--io0a7i",
];

lazy_static! {
    static ref SUSPICIOUS_PATTERNS: Vec<(&'static str, Regex)> = [
        "urgent",
        "verify.*account",
        "suspended",
        "click.*here",
        "limited.*time",
        "act.*now",
        "confirm.*identity",
    ]
    .into_iter()
    .map(|pattern| (pattern, Regex::new(&format!("(?i){pattern}")).unwrap()))
    .collect();
    static ref COMMON_TLD: Regex = Regex::new(r"\.(com|org|net|edu|gov)$").unwrap();
    static ref WHITELIST: Vec<String> = LEGITIMATE_IDN_DOMAINS
        .iter()
        .copied()
        .chain(POPULAR_BRANDS.iter().flat_map(|(_, domains)| domains.iter().copied()))
        .map(str::to_string)
        .collect();
}

/// Signals from around the link that can raise a domain's risk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainContext {
    pub display_text: Option<String>,
    pub sender_reputation: Option<f64>,
    pub email_content: Option<String>,
}

impl DomainContext {
    fn cache_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.display_text.hash(&mut hasher);
        self.sender_reputation.map(f64::to_bits).hash(&mut hasher);
        self.email_content.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HomographAnalysis {
    pub domain: String,
    pub is_idn: bool,
    pub risk_score: f64,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<String>,
    pub confidence: f64,
}

#[derive(Debug, Default)]
struct AnalysisCache {
    entries: HashMap<String, HomographAnalysis>,
    insertion_order: VecDeque<String>,
}

#[derive(Debug, Default)]
struct Contribution {
    score: f64,
    factors: Vec<String>,
}

/// Scores domains for IDN homograph and brand impersonation risk.
#[derive(Debug)]
pub struct HomographDetector {
    similarity_threshold: f64,
    cache_limit: Option<usize>,
    cache: RwLock<AnalysisCache>,
}

impl HomographDetector {
    pub fn new(similarity_threshold: f64, cache_limit: Option<usize>) -> Self {
        Self {
            similarity_threshold,
            cache_limit,
            cache: RwLock::new(AnalysisCache::default()),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.similarity_threshold, config.homograph_cache_limit)
    }

    pub fn analyze(&self, domain: &str, context: Option<&DomainContext>) -> HomographAnalysis {
        let key = cache_key(domain, context);

        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.entries.get(&key) {
                return hit.clone();
            }
        }

        let analysis = self.analyze_uncached(domain, context);

        if let Ok(mut cache) = self.cache.write() {
            if cache.entries.insert(key.clone(), analysis.clone()).is_none() {
                cache.insertion_order.push_back(key);
            }
            if let Some(limit) = self.cache_limit {
                while cache.entries.len() > limit {
                    match cache.insertion_order.pop_front() {
                        Some(oldest) => {
                            cache.entries.remove(&oldest);
                        }
                        None => break,
                    }
                }
            }
        }

        analysis
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().map(|cache| cache.entries.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.entries.clear();
            cache.insertion_order.clear();
        }
    }

    fn analyze_uncached(&self, domain: &str, context: Option<&DomainContext>) -> HomographAnalysis {
        let is_idn = is_idn(domain);
        let mut analysis = HomographAnalysis {
            domain: domain.to_string(),
            is_idn,
            risk_score: 0.0,
            risk_factors: Vec::new(),
            recommendations: Vec::new(),
            confidence: 0.0,
        };

        if is_whitelisted(domain) {
            analysis.confidence = 1.0;
            analysis
                .recommendations
                .push("Domain is whitelisted as legitimate".to_string());
            return analysis;
        }

        let mut contributions = Vec::new();

        if is_idn {
            contributions.push(Contribution {
                score: 0.3,
                factors: vec!["Contains non-ASCII characters".to_string()],
            });
        }

        contributions.push(confusable_characters(domain));

        let decoded = match decode_punycode(domain) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::debug!("{e}");
                domain.to_lowercase()
            }
        };
        contributions.push(self.brand_similarity(&decoded));
        if DomainUtils::has_punycode_label(domain) {
            contributions.push(script_mixing(&decoded));
        } else {
            contributions.push(script_mixing(domain));
        }

        if let Some(context) = context {
            contributions.push(context_signals(domain, context));
        }

        if domain.contains("xn--") {
            contributions.push(punycode_signals(domain));
        }

        for contribution in contributions {
            analysis.risk_score += contribution.score;
            analysis.risk_factors.extend(contribution.factors);
        }

        analysis.risk_score = analysis.risk_score.min(1.0);
        analysis.confidence = analysis.risk_score.min(1.0);
        analysis.recommendations = recommendations(&analysis);
        analysis
    }

    fn brand_similarity(&self, domain: &str) -> Contribution {
        let mut contribution = Contribution::default();
        let clean = normalize_domain(domain);

        let mut candidates = vec![clean.as_str()];
        candidates.extend(clean.split(['.', '-']).filter(|segment| !segment.is_empty()));

        for (brand, _) in POPULAR_BRANDS {
            let similarity = candidates
                .iter()
                .map(|candidate| similarity(candidate, brand))
                .fold(0.0, f64::max);

            if similarity > self.similarity_threshold {
                contribution.score = contribution.score.max(similarity * 0.7);
                contribution.factors.push(format!(
                    "High similarity to brand {brand}: {:.1}%",
                    similarity * 100.0
                ));
            }
        }

        contribution
    }
}

impl Default for HomographDetector {
    fn default() -> Self {
        Self::new(0.8, None)
    }
}

fn cache_key(domain: &str, context: Option<&DomainContext>) -> String {
    let hash = context.map(DomainContext::cache_hash).unwrap_or(0);
    format!("{domain}:{hash:016x}")
}

fn is_idn(domain: &str) -> bool {
    domain.contains("xn--") || !domain.is_ascii()
}

fn is_whitelisted(domain: &str) -> bool {
    let normalized = domain.trim_end_matches('.').to_lowercase();
    DomainUtils::matches_domain_list(&normalized, &WHITELIST)
        || DomainUtils::matches_domain_list(&DomainUtils::to_ascii(&normalized), &WHITELIST)
        || is_regional_brand_domain(&normalized)
}

/// A brand's own name under another public suffix, such as `google.de` or
/// `apple.co.uk`. Free and throwaway TLDs never qualify.
fn is_regional_brand_domain(domain: &str) -> bool {
    if !domain.is_ascii()
        || DomainUtils::has_punycode_label(domain)
        || DomainUtils::is_suspicious_tld(domain)
    {
        return false;
    }
    let Some(label) = DomainUtils::registrable_label(domain) else {
        return false;
    };

    POPULAR_BRANDS
        .iter()
        .flat_map(|(_, domains)| domains.iter())
        .filter_map(|official| official.split('.').next())
        .any(|official| official == label)
}

/// Latin look-alike for a non-ASCII character, from the built-in table or the
/// Unicode confusables skeleton.
fn latin_lookalike(c: char) -> Option<String> {
    if c.is_ascii() {
        return None;
    }
    if let Some(folded) = fold_homoglyph(c) {
        return Some(folded.to_string());
    }

    let skeleton: String = unicode_security::skeleton(&c.to_string()).collect();
    (!skeleton.is_empty() && skeleton.chars().all(|s| s.is_ascii_alphanumeric()))
        .then(|| skeleton.to_lowercase())
}

fn confusable_characters(domain: &str) -> Contribution {
    let mut contribution = Contribution::default();
    let mut confusable = 0;
    let mut total = 0;
    let mut normalized = String::with_capacity(domain.len());

    for c in domain.chars() {
        total += 1;
        match latin_lookalike(c) {
            Some(lookalike) => {
                confusable += 1;
                contribution
                    .factors
                    .push(format!("Confusable character: {c} → {lookalike}"));
                normalized.push_str(&lookalike);
            }
            None => normalized.push(c),
        }
    }

    if confusable > 0 {
        let ratio = confusable as f64 / total as f64;
        contribution.score = (ratio * 0.8).min(0.6);
        contribution
            .factors
            .push(format!("{confusable}/{total} characters are confusable"));
        contribution
            .factors
            .push(format!("Normalized domain: {normalized}"));
    }

    contribution
}

fn script_mixing(domain: &str) -> Contribution {
    let mut contribution = Contribution::default();
    let scripts = language::scripts_in(domain);

    if scripts.len() > 1 {
        let names: Vec<&str> = scripts.iter().map(Script::name).collect();
        contribution
            .factors
            .push(format!("Mixed scripts detected: {}", names.join(", ")));

        if scripts.contains(&Script::Latin)
            && (scripts.contains(&Script::Cyrillic) || scripts.contains(&Script::Greek))
        {
            contribution.score = 0.4;
            contribution
                .factors
                .push("Suspicious Latin/Cyrillic or Latin/Greek mixing".to_string());
        } else {
            contribution.score = 0.2;
        }
    }

    contribution
}

fn context_signals(domain: &str, context: &DomainContext) -> Contribution {
    let mut contribution = Contribution::default();

    if let Some(display_text) = context.display_text.as_deref() {
        if !display_text.is_empty() && !display_text.eq_ignore_ascii_case(domain) {
            contribution.score += 0.3;
            contribution
                .factors
                .push("Display text differs from actual domain".to_string());
        }
    }

    if let Some(reputation) = context.sender_reputation {
        if reputation < 0.5 {
            contribution.score += 0.2;
            contribution.factors.push("Low sender reputation".to_string());
        }
    }

    if let Some(content) = context.email_content.as_deref() {
        for (source, pattern) in SUSPICIOUS_PATTERNS.iter() {
            if pattern.is_match(content) {
                contribution.score += 0.1;
                contribution
                    .factors
                    .push(format!("Suspicious email pattern: {source}"));
            }
        }
    }

    contribution
}

fn decode_punycode(domain: &str) -> Result<String, ScanError> {
    let (decoded, result) = idna::domain_to_unicode(domain);
    result
        .map(|_| decoded)
        .map_err(|e| ScanError::DomainAnalysis(format!("{domain} is not valid punycode: {e:?}")))
}

fn punycode_signals(domain: &str) -> Contribution {
    let mut contribution = Contribution::default();

    match decode_punycode(domain) {
        Ok(decoded) => {
            contribution
                .factors
                .push(format!("Punycode decoded: {decoded}"));
            let inner = confusable_characters(&decoded);
            contribution.score += inner.score * 0.8;
            contribution.factors.extend(inner.factors);
        }
        Err(e) => {
            log::warn!("{e}");
            contribution.score += 0.2;
            contribution
                .factors
                .push("Invalid punycode encoding".to_string());
        }
    }

    contribution
}

/// Lower-case, fold look-alikes to Latin and drop a generic TLD.
fn normalize_domain(domain: &str) -> String {
    let folded: String = domain
        .to_lowercase()
        .chars()
        .map(|c| latin_lookalike(c).unwrap_or_else(|| c.to_string()))
        .collect();
    COMMON_TLD.replace(&folded, "").into_owned()
}

/// Levenshtein similarity in [0, 1]; two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    (longest - previous[b.len()]) as f64 / longest as f64
}

fn recommendations(analysis: &HomographAnalysis) -> Vec<String> {
    let mut recommendations = vec![if analysis.risk_score > 0.8 {
        "HIGH RISK: Likely homograph attack - block or quarantine"
    } else if analysis.risk_score > 0.6 {
        "MEDIUM RISK: Suspicious domain - flag for review"
    } else if analysis.risk_score > 0.3 {
        "LOW RISK: Monitor domain activity"
    } else {
        "SAFE: Domain appears legitimate"
    }
    .to_string()];

    if analysis.is_idn {
        recommendations.push("Consider displaying punycode representation to users".to_string());
    }

    if analysis.risk_factors.iter().any(|f| f.contains("brand")) {
        recommendations.push("Verify domain authenticity through official channels".to_string());
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("paypal", "paypal"), 1.0);
        assert_eq!(similarity("abc", ""), 0.0);
        assert!((similarity("paypa1", "paypal") - 5.0 / 6.0).abs() < 1e-9);
        assert!((similarity("kitten", "sitting") - 4.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_plain_domain_is_safe() {
        let detector = HomographDetector::default();
        let analysis = detector.analyze("example.com", None);
        assert!(!analysis.is_idn);
        assert_eq!(analysis.risk_score, 0.0);
        assert_eq!(analysis.recommendations, vec!["SAFE: Domain appears legitimate"]);
    }

    #[test]
    fn test_brand_lookalike_segment() {
        let detector = HomographDetector::default();
        let analysis = detector.analyze("paypal-secure.com", None);
        assert!(analysis.risk_score > 0.3);
        assert!(analysis.risk_factors.iter().any(|f| f.contains("paypal")));
        assert!(analysis
            .recommendations
            .contains(&"Verify domain authenticity through official channels".to_string()));
    }

    #[test]
    fn test_typo_squat() {
        let detector = HomographDetector::default();
        let analysis = detector.analyze("paypa1.com", None);
        assert!((analysis.risk_score - 0.7 * 5.0 / 6.0).abs() < 1e-9);
        assert!(analysis.risk_factors[0].starts_with("High similarity to brand paypal: 83.3%"));
    }

    #[test]
    fn test_punycode_domain() {
        let detector = HomographDetector::default();
        let analysis = detector.analyze("xn--80ak6aa92e.com", None);
        assert!(analysis.is_idn);
        assert!(analysis
            .risk_factors
            .iter()
            .any(|f| f.starts_with("Punycode decoded: ")));
        assert!(analysis.risk_score > 0.6);
        assert!(analysis.risk_score <= 1.0);
        assert_eq!(analysis.confidence, analysis.risk_score);
        assert!(analysis
            .recommendations
            .contains(&"Consider displaying punycode representation to users".to_string()));
    }

    #[test]
    fn test_mixed_script_unicode_domain() {
        let detector = HomographDetector::default();
        let analysis = detector.analyze("pаypal.com", None); // Cyrillic а
        assert!(analysis.is_idn);
        assert!(analysis
            .risk_factors
            .contains(&"Suspicious Latin/Cyrillic or Latin/Greek mixing".to_string()));
        assert!(analysis
            .risk_factors
            .iter()
            .any(|f| f.starts_with("Confusable character: а → a")));
        assert_eq!(analysis.risk_score, 1.0);
        assert!(analysis.recommendations[0].starts_with("HIGH RISK"));
    }

    #[test]
    fn test_regional_brand_domains_are_legitimate() {
        let detector = HomographDetector::default();
        for domain in ["www.google.de", "www.paypal.de", "www.apple.co.uk", "amazon.fr"] {
            let analysis = detector.analyze(domain, None);
            assert_eq!(analysis.risk_score, 0.0, "{domain}");
            assert_eq!(
                analysis.recommendations,
                vec!["Domain is whitelisted as legitimate"]
            );
        }
    }

    #[test]
    fn test_brand_names_elsewhere_still_scored() {
        let detector = HomographDetector::default();
        for domain in ["paypal.tk", "google.de.evil-site.net", "paypal-login.de"] {
            let analysis = detector.analyze(domain, None);
            assert!(analysis.risk_score >= 0.7 - 1e-9, "{domain}");
        }
    }

    #[test]
    fn test_punycode_script_mixing_uses_decoded_form() {
        let detector = HomographDetector::default();
        let analysis = detector.analyze("xn--pypal-4ve.com", None); // pаypal.com, Cyrillic а
        assert!(analysis
            .risk_factors
            .contains(&"Suspicious Latin/Cyrillic or Latin/Greek mixing".to_string()));
        assert_eq!(analysis.risk_score, 1.0);
    }

    #[test]
    fn test_invalid_punycode() {
        let detector = HomographDetector::default();
        let analysis = detector.analyze("xn--ы.com", None);
        assert!(analysis
            .risk_factors
            .contains(&"Invalid punycode encoding".to_string()));
    }

    #[test]
    fn test_whitelist_ignores_context() {
        let detector = HomographDetector::default();
        let context = DomainContext {
            display_text: Some("evil.example".to_string()),
            sender_reputation: Some(0.0),
            email_content: Some("URGENT: verify your account now".to_string()),
        };

        for domain in ["paypal.com", "www.paypal.com", "xn--fiqs8s"] {
            let analysis = detector.analyze(domain, Some(&context));
            assert_eq!(analysis.risk_score, 0.0);
            assert_eq!(analysis.confidence, 1.0);
            assert_eq!(
                analysis.recommendations,
                vec!["Domain is whitelisted as legitimate"]
            );
        }
    }

    #[test]
    fn test_context_signals() {
        let detector = HomographDetector::default();
        let context = DomainContext {
            display_text: Some("bank.example".to_string()),
            sender_reputation: Some(0.1),
            email_content: Some("Urgent! Your account is suspended".to_string()),
        };
        let analysis = detector.analyze("login.example.net", Some(&context));
        // display text +0.3, reputation +0.2, "urgent" and "suspended" +0.1 each
        assert!((analysis.risk_score - 0.7).abs() < 1e-9);
        assert!(analysis
            .risk_factors
            .contains(&"Display text differs from actual domain".to_string()));
        assert!(analysis
            .risk_factors
            .contains(&"Suspicious email pattern: urgent".to_string()));
    }

    #[test]
    fn test_cache_keyed_by_context() {
        let detector = HomographDetector::default();
        let context = DomainContext {
            display_text: Some("other.example".to_string()),
            ..Default::default()
        };

        let first = detector.analyze("login.example.net", None);
        let second = detector.analyze("login.example.net", None);
        assert_eq!(first, second);
        assert_eq!(detector.cache_len(), 1);

        let with_context = detector.analyze("login.example.net", Some(&context));
        assert_ne!(first.risk_score, with_context.risk_score);
        assert_eq!(detector.cache_len(), 2);

        detector.clear_cache();
        assert_eq!(detector.cache_len(), 0);
    }

    #[test]
    fn test_bounded_cache_evicts_oldest() {
        let detector = HomographDetector::new(0.8, Some(2));
        detector.analyze("a.example", None);
        detector.analyze("b.example", None);
        detector.analyze("c.example", None);
        assert_eq!(detector.cache_len(), 2);

        let cache = detector.cache.read().unwrap();
        assert!(!cache.entries.contains_key(&cache_key("a.example", None)));
        assert!(cache.entries.contains_key(&cache_key("c.example", None)));
    }
}
