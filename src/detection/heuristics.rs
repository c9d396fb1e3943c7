use crate::domain_utils::DomainUtils;
use crate::message::ParsedMail;
use lazy_static::lazy_static;
use mail_parser::DateTime;
use regex::Regex;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

const HOUR: i64 = 60 * 60;
const DAY: i64 = 24 * HOUR;

/// Weighted phrases; a negative weight marks wording typical of legitimate mail.
const SPAM_KEYWORDS: &[(&str, i32)] = &[
    ("free", 1),
    ("winner", 2),
    ("prize", 2),
    ("lottery", 3),
    ("urgent", 1),
    ("act now", 2),
    ("limited time", 1),
    ("click here", 1),
    ("unsubscribe", -1),
    ("verify your account", 2),
    ("suspended", 2),
    ("inheritance", 3),
    ("million dollars", 3),
    ("wire transfer", 3),
    ("western union", 3),
    ("nigerian", 3),
    ("prince", 2),
    ("beneficiary", 2),
    ("congratulations", 1),
    ("selected", 1),
    ("viagra", 3),
    ("cialis", 3),
    ("pharmacy", 2),
    ("bitcoin", 1),
    ("crypto", 1),
    ("investment opportunity", 2),
    ("guaranteed", 1),
    ("risk free", 2),
    ("no obligation", 1),
    ("dear friend", 2),
    ("dear customer", 1),
    ("dear user", 1),
];

lazy_static! {
    static ref BLOCKED_PHRASES: Regex = Regex::new(
        r"(?im)cheecck y0ur acc0untt|recorded you|you've been hacked|account is hacked|personal data has leaked|private information has been stolen"
    )
    .unwrap();
    static ref SUBJECT_PATTERNS: Vec<Regex> = [
        r"(?i)\b(urgent|immediate|action required|act now|limited time|expires?|deadline)\b",
        r"(?i)\b(free|winner|won|prize|lottery|million|billion|cash|money|investment|profit)\b",
        r"(?i)\b(verify|confirm|update|suspend|locked|unusual activity|security alert)\b",
        r"(?i)\b(viagra|cialis|pharmacy|pills|medication|prescription)\b",
        r"(?i)\b(bitcoin|crypto|btc|eth|nft|blockchain|wallet)\b",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
    static ref BODY_PATTERNS: Vec<Regex> = [
        r"(?i)\b(nigerian?|prince|inheritance|beneficiary|next of kin|deceased|unclaimed)\b",
        r"(?i)\b(congratulations.*won|you have been selected|claim your prize)\b",
        r"(?i)\b(click here to verify|confirm your identity|update your account|suspended.*account)\b",
        r"(?i)\b(act now|limited time offer|expires in \d+|only \d+ left)\b",
        r"(?i)\b(wire transfer|western union|moneygram|bank transfer|routing number)\b",
        r"(?i)\b(enlarge|enhancement|erectile|dysfunction|weight loss|diet pills)\b",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
    static ref SENDER_PATTERNS: Vec<Regex> = [
        r"(?i)^[a-z]+\d{4,}@",
        r"^.{30,}@",
        r"(?i)@.*(\.ru|\.cn|\.tk|\.ml|\.ga|\.cf|\.gq)$",
        r"@(?:\d+\.){3}\d+",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect();
    static ref SENDER_TLD: Regex = Regex::new(r"(?i)@[^.]+\.([a-z]+)$").unwrap();
    static ref BRAND_SENDER: Regex =
        Regex::new(r"(?i)^(paypal|amazon|apple|microsoft|google|bank|security)").unwrap();
    static ref BRAND_DOMAIN: Regex =
        Regex::new(r"(?i)@(paypal|amazon|apple|microsoft|google)\.com$").unwrap();
    static ref FAKE_REPLY: Regex = Regex::new(r"(?i)^(re|fw|fwd):").unwrap();
    static ref HIDDEN_TEXT: Regex =
        Regex::new(r"(?i)color:\s*#fff|color:\s*white|font-size:\s*[01]px").unwrap();
    static ref IMG_TAG: Regex = Regex::new(r"(?i)<img").unwrap();
    static ref BASE64_IMAGE: Regex = Regex::new(r"(?i)data:image/[^;]+;base64,").unwrap();
    static ref SHORTENER: Regex =
        Regex::new(r"(?i)\b(bit\.ly|tinyurl|goo\.gl|t\.co|ow\.ly|is\.gd|buff\.ly|adf\.ly|j\.mp)\b")
            .unwrap();
    static ref BULK_MAILER: Regex = Regex::new(r"(?i)mass mail|bulk mail|email blast").unwrap();
    static ref LINK: Regex = Regex::new(r#"(?i)https?://[^\s<>"']+"#).unwrap();
    static ref IP_HOST: Regex = Regex::new(r"^(?:\d+\.){3}\d+$").unwrap();
    static ref ENCODED_PAIR: Regex = Regex::new(r"(?i)%[\da-f]{2}.*%[\da-f]{2}").unwrap();
    static ref TEXT_ANCHOR: Regex =
        Regex::new(r#"(?i)<a[^>]+href=["']([^"']+)["'][^>]*>([^<]+)</a>"#).unwrap();
}

/// Points collected by the rule-based checks, with one reason per hit.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HeuristicReport {
    pub score: i32,
    pub reasons: Vec<String>,
}

impl HeuristicReport {
    fn add(&mut self, points: i32, reason: impl Into<String>) {
        self.score += points;
        self.reasons.push(reason.into());
    }

    fn merge(&mut self, other: HeuristicReport) {
        self.score += other.score;
        self.reasons.extend(other.reasons);
    }
}

/// Rule-based checks on the subject, body, sender, headers and links.
pub struct HeuristicAnalyzer;

impl HeuristicAnalyzer {
    pub fn analyze(mail: &ParsedMail) -> HeuristicReport {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        Self::analyze_at(mail, now)
    }

    /// Same as [`HeuristicAnalyzer::analyze`] with the current time given as
    /// a Unix timestamp.
    pub fn analyze_at(mail: &ParsedMail, now: i64) -> HeuristicReport {
        let mut report = HeuristicReport::default();
        let subject = mail.subject.as_deref().unwrap_or_default();

        if BLOCKED_PHRASES.is_match(subject) {
            report.add(10, "BLOCKED_PHRASE_IN_SUBJECT");
        }
        if !subject.is_empty() {
            report.merge(Self::check_subject(subject));
        }
        report.merge(Self::check_body(
            mail.text.as_deref().unwrap_or_default(),
            mail.html.as_deref().unwrap_or_default(),
        ));
        report.merge(Self::check_sender(
            mail.address("from").as_deref().unwrap_or_default(),
            mail.address("reply-to").as_deref().unwrap_or_default(),
        ));
        report.merge(Self::check_headers(mail, now));

        let links_in = mail
            .html
            .as_deref()
            .filter(|html| !html.is_empty())
            .or(mail.text.as_deref())
            .unwrap_or_default();
        report.merge(Self::check_links(links_in));

        log::debug!(
            "Heuristic score {} from {:?}",
            report.score,
            report.reasons
        );
        report
    }

    pub fn check_subject(subject: &str) -> HeuristicReport {
        let mut report = HeuristicReport::default();

        for pattern in SUBJECT_PATTERNS.iter() {
            if let Some(hit) = pattern.find(subject) {
                report.add(1, format!("SUBJECT_SPAM_PATTERN: {}", hit.as_str()));
            }
        }

        let letters = subject.chars().filter(char::is_ascii_alphabetic).count();
        let upper = subject.chars().filter(char::is_ascii_uppercase).count();
        if letters > 10 && upper as f64 / letters as f64 > 0.7 {
            report.add(2, "SUBJECT_ALL_CAPS");
        }

        if subject.chars().filter(|c| matches!(c, '!' | '?' | '$')).count() >= 3 {
            report.add(1, "SUBJECT_EXCESSIVE_PUNCTUATION");
        }

        if FAKE_REPLY.is_match(subject) && subject.chars().count() < 20 {
            report.add(1, "SUBJECT_FAKE_REPLY");
        }

        report
    }

    pub fn check_body(text: &str, html: &str) -> HeuristicReport {
        let mut report = HeuristicReport::default();
        let content = if text.is_empty() { html } else { text };
        let lowered = content.to_lowercase();

        for pattern in BODY_PATTERNS.iter() {
            if let Some(hit) = pattern.find(content) {
                let excerpt: String = hit.as_str().chars().take(50).collect();
                report.add(1, format!("BODY_SPAM_PATTERN: {excerpt}"));
            }
        }

        for (keyword, weight) in SPAM_KEYWORDS {
            if lowered.contains(keyword) {
                report.add(*weight, format!("SPAM_KEYWORD: {keyword}"));
            }
        }

        if !html.is_empty() {
            if HIDDEN_TEXT.is_match(html) {
                report.add(3, "HIDDEN_TEXT");
            }
            if IMG_TAG.find_iter(html).count() > 5 && text.chars().count() < 100 {
                report.add(2, "IMAGE_HEAVY_LOW_TEXT");
            }
            if BASE64_IMAGE.is_match(html) {
                report.add(1, "BASE64_IMAGES");
            }
        }

        if SHORTENER.is_match(content) {
            report.add(2, "URL_SHORTENER");
        }

        report
    }

    /// `from` and `reply_to` are bare addresses; empty when absent.
    pub fn check_sender(from: &str, reply_to: &str) -> HeuristicReport {
        let mut report = HeuristicReport::default();

        if from.is_empty() {
            report.add(2, "MISSING_FROM");
            return report;
        }

        if SENDER_PATTERNS.iter().any(|pattern| pattern.is_match(from)) {
            report.add(2, "SUSPICIOUS_SENDER_PATTERN");
        }

        if let Some(tld) = SENDER_TLD.captures(from).map(|caps| caps[1].to_string()) {
            if DomainUtils::is_suspicious_tld(&tld) {
                report.add(2, format!("SUSPICIOUS_TLD: {tld}"));
            }
        }

        let from_domain = from.split_once('@').map(|(_, domain)| domain.to_lowercase());
        let reply_domain = reply_to
            .split_once('@')
            .map(|(_, domain)| domain.to_lowercase());
        if let (Some(from_domain), Some(reply_domain)) = (from_domain, reply_domain) {
            if !from_domain.is_empty() && !reply_domain.is_empty() && from_domain != reply_domain {
                report.add(2, "FROM_REPLY_TO_MISMATCH");
            }
        }

        if BRAND_SENDER.is_match(from) && !BRAND_DOMAIN.is_match(from) {
            report.add(3, "DISPLAY_NAME_SPOOFING");
        }

        report
    }

    pub fn check_headers(mail: &ParsedMail, now: i64) -> HeuristicReport {
        let mut report = HeuristicReport::default();

        if mail.header("message-id").is_none() {
            report.add(1, "MISSING_MESSAGE_ID");
        }

        match mail
            .header("date")
            .and_then(|value| DateTime::parse_rfc822(value.trim()))
        {
            Some(date) => {
                let sent = date.to_timestamp();
                if sent - now > DAY {
                    report.add(2, "FUTURE_DATE");
                }
                if now - sent > 365 * DAY {
                    report.add(1, "VERY_OLD_DATE");
                }
            }
            None => report.add(1, "MISSING_DATE"),
        }

        if mail
            .header("x-mailer")
            .is_some_and(|mailer| BULK_MAILER.is_match(mailer))
        {
            report.add(1, "SUSPICIOUS_MAILER");
        }

        if mail.header("mime-version").is_none()
            && (mail.html.is_some() || !mail.attachments.is_empty())
        {
            report.add(1, "MISSING_MIME_VERSION");
        }

        let recipients: usize = ["to", "cc"]
            .iter()
            .filter_map(|name| mail.headers.get(*name))
            .flatten()
            .map(|value| value.matches('@').count())
            .sum();
        if recipients > 50 {
            report.add(2, "EXCESSIVE_RECIPIENTS");
        }

        report
    }

    pub fn check_links(content: &str) -> HeuristicReport {
        let mut report = HeuristicReport::default();
        let links: Vec<&str> = LINK.find_iter(content).map(|m| m.as_str()).collect();
        if links.is_empty() {
            return report;
        }

        let mut findings: Vec<String> = Vec::new();
        let mut note = |finding: String| {
            if !findings.contains(&finding) {
                findings.push(finding);
            }
        };

        for link in &links {
            let Ok(url) = Url::parse(link) else {
                note("INVALID_URL".to_string());
                continue;
            };
            let host = url.host_str().unwrap_or_default().to_lowercase();

            if IP_HOST.is_match(&host) {
                note("IP_ADDRESS_URL".to_string());
            }
            if let Some(tld) = host.rsplit('.').next() {
                if DomainUtils::is_suspicious_tld(tld) {
                    note(format!("SUSPICIOUS_URL_TLD: {tld}"));
                }
            }
            if url.port().is_some_and(|port| port != 80 && port != 443) {
                note("URL_WITH_PORT".to_string());
            }
            if link.len() > 200 {
                note("VERY_LONG_URL".to_string());
            }
            if host.split('.').count() > 5 {
                note("EXCESSIVE_SUBDOMAINS".to_string());
            }
            if ENCODED_PAIR.is_match(link) {
                note("URL_OBFUSCATION".to_string());
            }
        }

        for finding in findings {
            report.add(1, finding);
        }

        for caps in TEXT_ANCHOR.captures_iter(content) {
            let text = caps[2].trim();
            let lowered = text.to_lowercase();
            if !lowered.starts_with("http://") && !lowered.starts_with("https://") {
                continue;
            }
            let (Ok(text_url), Ok(href_url)) = (Url::parse(text), Url::parse(&caps[1])) else {
                continue;
            };
            if text_url.host_str() != href_url.host_str() {
                report.add(3, "LINK_TEXT_URL_MISMATCH");
                break;
            }
        }

        report
    }
}
