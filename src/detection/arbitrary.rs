use super::heuristics::HeuristicReport;
use crate::message::ParsedMail;

/// SpamAssassin's Generic Test for Unsolicited Bulk Email.
pub const GTUBE: &str = "XJS*C4JDBQADN1.NSBN3*2IDNEN*GTUBE-STANDARD-ANTI-UBE-TEST-EMAIL*C.34X";

/// Messages for content that is spam regardless of what the classifier says:
/// the GTUBE string in a body or header, or a heuristic score at or above
/// `threshold`.
pub fn arbitrary_messages(
    mail: &ParsedMail,
    heuristics: &HeuristicReport,
    threshold: u32,
) -> Vec<String> {
    let mut messages = Vec::new();

    let gtube = [mail.html.as_deref(), mail.text.as_deref()]
        .into_iter()
        .flatten()
        .any(|body| body.contains(GTUBE))
        || mail.header_lines().iter().any(|line| line.contains(GTUBE));
    if gtube {
        messages.push(
            "Message detected to contain the GTUBE test from <https://spamassassin.apache.org/gtube/>."
                .to_string(),
        );
    }

    if heuristics.score >= threshold as i32 {
        messages.push(format!(
            "Message matched spam heuristics with a score of {} ({}).",
            heuristics.score,
            heuristics.reasons.join(", ")
        ));
    }

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail(text: Option<&str>, html: Option<&str>) -> ParsedMail {
        ParsedMail {
            text: text.map(str::to_string),
            html: html.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_gtube_in_text() {
        let text = format!("Subject: test\n\n{GTUBE}\n");
        let messages = arbitrary_messages(&mail(Some(&text), None), &HeuristicReport::default(), 5);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("GTUBE"));
    }

    #[test]
    fn test_gtube_in_html_reported_once() {
        let html = format!("<p>{GTUBE}</p>");
        let messages =
            arbitrary_messages(&mail(Some(GTUBE), Some(&html)), &HeuristicReport::default(), 5);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_gtube_in_header() {
        let mut mail = mail(Some("hello"), None);
        mail.headers
            .insert("x-spam-test".to_string(), vec![GTUBE.to_string()]);
        let messages = arbitrary_messages(&mail, &HeuristicReport::default(), 5);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("GTUBE"));
    }

    #[test]
    fn test_no_gtube() {
        let report = HeuristicReport::default();
        assert!(arbitrary_messages(&mail(Some("hello"), Some("<p>hello</p>")), &report, 5).is_empty());
        assert!(arbitrary_messages(&mail(None, None), &report, 5).is_empty());
    }

    #[test]
    fn test_heuristic_threshold() {
        let report = HeuristicReport {
            score: 5,
            reasons: vec!["SUBJECT_ALL_CAPS".to_string(), "BODY_URGENCY".to_string()],
        };
        let hello = mail(Some("hello"), None);

        assert_eq!(
            arbitrary_messages(&hello, &report, 5),
            vec!["Message matched spam heuristics with a score of 5 (SUBJECT_ALL_CAPS, BODY_URGENCY)."]
        );
        assert!(arbitrary_messages(&hello, &report, 6).is_empty());
    }
}
