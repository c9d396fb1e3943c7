use super::homograph::{DomainContext, HomographDetector};
use crate::domain_utils::DomainUtils;
use crate::normalization::{decode_entities, find_urls, strip_tags};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref ANCHOR: Regex = Regex::new(r"(?is)<a\b([^>]*)>(.*?)</a\s*>").unwrap();
    static ref HREF: Regex =
        Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap();
}

/// An `<a>` element whose visible text is itself a link.
#[derive(Debug, Clone, PartialEq)]
pub struct TextualAnchor {
    pub href: String,
    pub text: String,
    pub href_host: String,
    pub text_host: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhishingReport {
    pub messages: Vec<String>,
    pub links: Vec<String>,
}

pub struct PhishingAnalyzer {
    homograph_threshold: f64,
    whitelist_requests: String,
}

impl PhishingAnalyzer {
    pub fn new(homograph_threshold: f64, whitelist_requests: &str) -> Self {
        Self {
            homograph_threshold,
            whitelist_requests: whitelist_requests.to_string(),
        }
    }

    pub fn analyze(
        &self,
        detector: &HomographDetector,
        text: Option<&str>,
        html: Option<&str>,
    ) -> PhishingReport {
        let mut report = PhishingReport::default();
        let mut anchors = Vec::new();

        if let Some(html) = html.filter(|h| !h.trim().is_empty()) {
            for link in find_urls(&strip_tags(html)) {
                push_unique(&mut report.links, DomainUtils::normalize_url(&link));
            }

            for caps in ANCHOR.captures_iter(html) {
                let href = href_value(&caps[1]);
                let inner = decode_entities(&strip_tags(&caps[2]));
                let inner = inner.split_whitespace().collect::<Vec<_>>().join(" ");

                let Some(href) = href.filter(|h| DomainUtils::looks_like_url(h)) else {
                    continue;
                };
                push_unique(&mut report.links, DomainUtils::normalize_url(&href));

                if !DomainUtils::looks_like_url(&inner) {
                    continue;
                }
                let (Some(href_host), Some(text_host)) =
                    (DomainUtils::hostname(&href), DomainUtils::hostname(&inner))
                else {
                    log::debug!("Anchor {href} has no usable hostname");
                    continue;
                };

                let anchor = TextualAnchor {
                    href,
                    text: inner,
                    href_host,
                    text_host,
                };
                report.messages.extend(anchor_messages(&anchor));
                anchors.push(anchor);
            }
        }

        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            for link in find_urls(text) {
                push_unique(&mut report.links, DomainUtils::normalize_url(&link));
            }
        }

        let mut hosts = Vec::new();
        for link in &report.links {
            let Some(host) = DomainUtils::hostname(link) else {
                log::debug!("Link {link} has no hostname");
                continue;
            };
            if DomainUtils::has_punycode_label(&host) {
                report.messages.push(format!(
                    "Possible IDN homograph attack from link of \"{link}\" with punycode converted hostname of \"{host}\"."
                ));
            }
            push_unique(&mut hosts, host);
        }

        let email_content = text
            .map(str::to_string)
            .or_else(|| html.map(|h| decode_entities(&strip_tags(h))));

        for host in &hosts {
            let display_text = anchors
                .iter()
                .find(|anchor| &anchor.href_host == host)
                .map(|anchor| anchor.text_host.clone());
            let context = DomainContext {
                display_text,
                sender_reputation: None,
                email_content: email_content.clone(),
            };

            let analysis = detector.analyze(host, Some(&context));
            if analysis.risk_score > self.homograph_threshold {
                report.messages.push(format!(
                    "Link hostname of \"{host}\" has a homograph risk score of {:.2} ({}).",
                    analysis.risk_score,
                    analysis.risk_factors.join("; ")
                ));
            }
        }

        if !report.messages.is_empty() {
            report.messages.push(format!(
                "Phishing whitelist requests can be filed at {}.",
                self.whitelist_requests
            ));
        }

        report
    }
}

fn href_value(attributes: &str) -> Option<String> {
    let caps = HREF.captures(attributes)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| decode_entities(m.as_str().trim()))
}

fn anchor_messages(anchor: &TextualAnchor) -> Vec<String> {
    let mut messages = Vec::new();
    let prefix = format!(
        "Anchor link with href of \"{}\" and inner text value of \"{}\"",
        anchor.href, anchor.text
    );

    let href_org = DomainUtils::organizational_domain(&anchor.href_host);
    let text_org = DomainUtils::organizational_domain(&anchor.text_host);
    if let (Some(href_org), Some(text_org)) = (href_org, text_org) {
        if href_org != text_org {
            messages.push(format!(
                "{prefix} point to different organizations ({text_org} vs {href_org})."
            ));
        }
    }

    if DomainUtils::has_punycode_label(&anchor.text_host) {
        messages.push(format!(
            "{prefix} has possible IDN homograph attack from inner text hostname."
        ));
    }
    if DomainUtils::has_punycode_label(&anchor.href_host) {
        messages.push(format!(
            "{prefix} has possible IDN homograph attack from anchor hostname."
        ));
    }

    messages
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}
