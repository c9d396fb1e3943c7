use super::executables::AttachmentAnalyzer;
use crate::message::ParsedMail;
use lazy_static::lazy_static;
use regex::Regex;

/// Attachment extensions that carry scripts or macros.
pub const MACRO_EXTENSIONS: &[&str] = &["vbs", "vba", "ps1", "bat", "cmd", "scr", "pif"];

lazy_static! {
    static ref MACRO_PATTERNS: Vec<(&'static str, Vec<Regex>)> = [
        (
            "VBA macro detected",
            &[
                r"(?i)\bsub\s+\w+\s*\(",
                r"(?i)\bfunction\s+\w+\s*\(",
                r"(?i)\bdim\s+\w+\s+as\s+\w+",
                r"(?i)application\.run",
                r"(?i)\bshell\s*\(",
            ][..],
        ),
        (
            "PowerShell script detected",
            &[
                r"(?i)powershell",
                r"(?i)invoke-expression",
                r"(?i)\biex\s*\(",
                r"(?i)start-process",
                r"(?i)new-object\s+system\.",
            ][..],
        ),
        (
            "JavaScript macro detected",
            &[
                r"(?i)\beval\s*\(",
                r"(?i)document\.write",
                r"(?i)activexobject",
                r"(?i)wscript\.",
            ][..],
        ),
        (
            "Batch script detected",
            &[
                r"(?i)@echo\s+off",
                r"(?i)\bcmd\s*/c",
                r"(?i)\bstart\s+/b",
                r"(?i)\bfor\s+/[lrf]",
            ][..],
        ),
    ]
    .into_iter()
    .map(|(description, patterns)| {
        let patterns: Vec<Regex> = patterns
            .iter()
            .map(|pattern| Regex::new(pattern).unwrap())
            .collect();
        (description, patterns)
    })
    .collect();
}

/// Messages for script or macro code in the bodies and headers, and for
/// attachments whose file name marks them as scripts.
pub fn macro_messages(mail: &ParsedMail) -> Vec<String> {
    let mut content = String::new();
    for part in [mail.text.as_deref(), mail.html.as_deref()].into_iter().flatten() {
        content.push_str(part);
        content.push(' ');
    }
    for line in mail.header_lines() {
        content.push_str(&line);
        content.push(' ');
    }

    let mut messages: Vec<String> = MACRO_PATTERNS
        .iter()
        .filter(|(_, patterns)| patterns.iter().any(|pattern| pattern.is_match(&content)))
        .map(|(description, _)| format!("{description}."))
        .collect();

    for attachment in &mail.attachments {
        let Some(ext) = attachment
            .filename
            .as_deref()
            .and_then(AttachmentAnalyzer::file_name_extension)
        else {
            continue;
        };
        if MACRO_EXTENSIONS.contains(&ext.as_str()) {
            messages.push(format!("Macro file attachment detected: {ext}."));
        }
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Attachment;

    fn text_mail(text: &str) -> ParsedMail {
        ParsedMail {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_plain_message_has_no_macros() {
        let mail = text_mail("Please find the quarterly numbers below. Regards, Bob");
        assert!(macro_messages(&mail).is_empty());
    }

    #[test]
    fn test_script_kinds_reported_once_each() {
        let mail = text_mail(
            "Sub AutoOpen()\n Shell (\"calc\")\nEnd Sub\npowershell -nop -c \"IEX (New-Object System.Net.WebClient)\"",
        );
        assert_eq!(
            macro_messages(&mail),
            vec!["VBA macro detected.", "PowerShell script detected."]
        );
    }

    #[test]
    fn test_html_and_batch() {
        let mail = ParsedMail {
            html: Some("<script>eval(atob('x'))</script>".to_string()),
            text: Some("@echo off\r\ncmd /c del *.*".to_string()),
            ..Default::default()
        };
        assert_eq!(
            macro_messages(&mail),
            vec!["JavaScript macro detected.", "Batch script detected."]
        );
    }

    #[test]
    fn test_macro_in_header_line() {
        let mut mail = text_mail("Hello");
        mail.headers.insert(
            "x-note".to_string(),
            vec!["Invoke-Expression $payload".to_string()],
        );
        assert_eq!(macro_messages(&mail), vec!["PowerShell script detected."]);
    }

    #[test]
    fn test_macro_attachment_names() {
        let mut mail = text_mail("See attached");
        for name in ["run.VBS", "notes.txt", "setup.bat?download=1"] {
            mail.attachments.push(Attachment {
                filename: Some(name.to_string()),
                ..Default::default()
            });
        }
        assert_eq!(
            macro_messages(&mail),
            vec![
                "Macro file attachment detected: vbs.",
                "Macro file attachment detected: bat."
            ]
        );
    }
}
