use mail_parser::{Message, MessageParser, MimeHeaders};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// The parts of a mail message the scanner looks at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMail {
    pub subject: Option<String>,
    pub text: Option<String>,
    pub html: Option<String>,
    /// Lower-cased header name to every value it appeared with, in order.
    pub headers: HashMap<String, Vec<String>>,
    pub attachments: Vec<Attachment>,
}

impl ParsedMail {
    /// Parse a raw RFC 5322 message. Returns `None` when nothing resembling a
    /// message could be read.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let message = MessageParser::default().parse(raw)?;

        let mut headers: HashMap<String, Vec<String>> = HashMap::new();
        for header in message.headers() {
            let value = match header.value().as_text() {
                Some(text) => text.to_string(),
                None => raw_header_value(
                    &message,
                    header.offset_start as usize,
                    header.offset_end as usize,
                ),
            };
            headers
                .entry(header.name().to_lowercase())
                .or_default()
                .push(value);
        }

        let html = message
            .html_part(0)
            .filter(|part| part.is_content_type("text", "html"))
            .and_then(|part| part.text_contents())
            .map(str::to_string);
        let text = message
            .text_part(0)
            .filter(|part| !part.is_content_type("text", "html"))
            .and_then(|part| part.text_contents())
            .map(str::to_string);

        let attachments = message
            .attachments()
            .map(|part| Attachment {
                filename: part.attachment_name().map(str::to_string),
                content_type: part.content_type().map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                }),
                content: part.contents().to_vec(),
            })
            .collect();

        Some(ParsedMail {
            subject: message.subject().map(str::to_string),
            text,
            html,
            headers,
            attachments,
        })
    }

    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every header as a `name: value` line, ordered by name.
    pub fn header_lines(&self) -> Vec<String> {
        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        names
            .into_iter()
            .flat_map(|name| {
                self.headers[name]
                    .iter()
                    .map(move |value| format!("{name}: {value}"))
            })
            .collect()
    }

    /// Bare address of an address header such as `From` or `Reply-To`.
    pub fn address(&self, name: &str) -> Option<String> {
        let value = self.header(name)?.trim();
        let address = match (value.rfind('<'), value.rfind('>')) {
            (Some(start), Some(end)) if start < end => &value[start + 1..end],
            _ => value,
        };
        let address = address.trim().trim_matches('"');
        (!address.is_empty()).then(|| address.to_lowercase())
    }

    pub fn content_language(&self) -> Option<&str> {
        self.header("content-language")
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }
}

fn raw_header_value(message: &Message<'_>, start: usize, end: usize) -> String {
    let raw = message.raw_message();
    let bytes = raw.get(start..end.min(raw.len())).unwrap_or_default();
    String::from_utf8_lossy(bytes)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
