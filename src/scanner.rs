use crate::classifier::{Classification, Classifier};
use crate::config::Config;
use crate::detection::arbitrary::arbitrary_messages;
use crate::detection::executables::AttachmentAnalyzer;
use crate::detection::heuristics::{HeuristicAnalyzer, HeuristicReport};
use crate::detection::homograph::HomographDetector;
use crate::detection::macros::macro_messages;
use crate::detection::phishing::PhishingAnalyzer;
use crate::error::ScanError;
use crate::message::ParsedMail;
use crate::pool::WorkerPool;
use crate::tokenizer::Tokenizer;
use serde::Serialize;

pub const CLASSIFIER_SPAM_MESSAGE: &str = "Spam detected from Naive Bayesian classifier.";
pub const NOT_SPAM_MESSAGE: &str = "Not detected as spam.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanVerdict {
    pub is_spam: bool,
    /// Probability of the spam category.
    pub score: f64,
    pub message: String,
    pub classification: Classification,
    pub phishing_messages: Vec<String>,
    pub executable_messages: Vec<String>,
    pub macro_messages: Vec<String>,
    pub arbitrary_messages: Vec<String>,
    pub heuristics: HeuristicReport,
    pub links: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<Vec<String>>,
}

/// Runs every check against a message and merges them into one verdict.
pub struct Scanner {
    config: Config,
    tokenizer: Tokenizer,
    classifier: Classifier,
    detector: HomographDetector,
    phishing: PhishingAnalyzer,
}

impl Scanner {
    pub fn new(config: Config, classifier: Classifier) -> Result<Self, ScanError> {
        let tokenizer = Tokenizer::new(&config)?;
        let detector = HomographDetector::from_config(&config);
        let phishing =
            PhishingAnalyzer::new(config.homograph_threshold, &config.whitelist_requests);

        Ok(Self {
            config,
            tokenizer,
            classifier,
            detector,
            phishing,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn detector(&self) -> &HomographDetector {
        &self.detector
    }

    /// Tokens of the subject, plain body and HTML body, in that order.
    pub fn tokenize_mail(&self, mail: &ParsedMail) -> Vec<String> {
        let locale = mail.content_language();
        let mut tokens = Vec::new();
        for (part, is_markup) in [
            (mail.subject.as_deref(), false),
            (mail.text.as_deref(), false),
            (mail.html.as_deref(), true),
        ] {
            if let Some(part) = part.filter(|p| !p.trim().is_empty()) {
                tokens.extend(self.tokenizer.tokenize(part, locale, is_markup));
            }
        }
        tokens
    }

    pub fn scan(&self, mail: &ParsedMail) -> Result<ScanVerdict, ScanError> {
        if !self.classifier.is_loaded() {
            return Err(ScanError::NotLoaded);
        }

        let tokens = self.tokenize_mail(mail);
        let classification = self.classifier.categorize(&tokens, true)?;
        Ok(self.verdict(mail, tokens, classification))
    }

    /// Same as [`Scanner::scan`], with tokenizing and classification done on
    /// the pool's workers.
    pub async fn scan_with_pool(
        &self,
        pool: &WorkerPool,
        mail: &ParsedMail,
    ) -> Result<ScanVerdict, ScanError> {
        if !self.classifier.is_loaded() {
            return Err(ScanError::NotLoaded);
        }

        let tokens = tokenize_mail_on_pool(pool, mail).await?;
        let classification = pool.categorize(tokens.clone(), true).await?;
        Ok(self.verdict(mail, tokens, classification))
    }

    fn verdict(
        &self,
        mail: &ParsedMail,
        tokens: Vec<String>,
        classification: Classification,
    ) -> ScanVerdict {
        let phishing = self
            .phishing
            .analyze(&self.detector, mail.text.as_deref(), mail.html.as_deref());
        let executables = AttachmentAnalyzer::executable_messages(
            &mail.attachments,
            &self.config.whitelist_requests,
        );
        let macros = if self.config.macro_detection {
            macro_messages(mail)
        } else {
            Vec::new()
        };
        let heuristics = HeuristicAnalyzer::analyze(mail);
        let arbitrary = arbitrary_messages(mail, &heuristics, self.config.arbitrary_threshold);

        let mut messages = Vec::new();
        if classification.category == self.config.spam_category {
            messages.push(CLASSIFIER_SPAM_MESSAGE.to_string());
        }
        messages.extend(phishing.messages.iter().cloned());
        messages.extend(executables.iter().cloned());
        messages.extend(macros.iter().cloned());
        messages.extend(arbitrary.iter().cloned());

        let score = classification
            .probability_of(&self.config.spam_category)
            .unwrap_or(0.0);
        let is_spam = !messages.is_empty();
        let message = if is_spam {
            messages.join(" ")
        } else {
            NOT_SPAM_MESSAGE.to_string()
        };

        log::debug!(
            "Scanned message: category={} score={score:.3} phishing={} executables={} macros={} arbitrary={} heuristics={}",
            classification.category,
            phishing.messages.len(),
            executables.len(),
            macros.len(),
            arbitrary.len(),
            heuristics.score
        );

        ScanVerdict {
            is_spam,
            score,
            message,
            classification,
            phishing_messages: phishing.messages,
            executable_messages: executables,
            macro_messages: macros,
            arbitrary_messages: arbitrary,
            heuristics,
            links: phishing.links,
            tokens: self.config.debug.then_some(tokens),
        }
    }
}

/// [`Scanner::tokenize_mail`] with the three parts tokenized concurrently on
/// the pool.
pub async fn tokenize_mail_on_pool(
    pool: &WorkerPool,
    mail: &ParsedMail,
) -> Result<Vec<String>, ScanError> {
    let locale = mail.content_language().map(str::to_string);
    let (subject, text, html) = tokio::join!(
        pool_tokens(pool, mail.subject.as_deref(), locale.clone(), false),
        pool_tokens(pool, mail.text.as_deref(), locale.clone(), false),
        pool_tokens(pool, mail.html.as_deref(), locale, true),
    );

    let mut tokens = subject?;
    tokens.extend(text?);
    tokens.extend(html?);
    Ok(tokens)
}

async fn pool_tokens(
    pool: &WorkerPool,
    part: Option<&str>,
    locale: Option<String>,
    is_markup: bool,
) -> Result<Vec<String>, ScanError> {
    match part.filter(|p| !p.trim().is_empty()) {
        Some(part) => pool.tokenize(part.to_string(), locale, is_markup).await,
        None => Ok(Vec::new()),
    }
}
