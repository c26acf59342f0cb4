use regex::Regex;

use crate::model::message::SentMessage;

const RE_HTML_TAG_STR: &str = r"(?i)</?(html|body|div|p|br|table|tr|td|span|a|img|head|style)\b";
const RE_QUOTED_LINE_STR: &str = r"(?m)^\s*>.*$";
const RE_QUOTE_HEADER_STR: &str = r"(?im)^on .{0,120}?wrote:\s*$";
const RE_SIGNATURE_STR: &str = r"(?s)\n-- ?\n.*$";
const RE_WHITESPACE_STR: &str = r"[\r\t]+";
const RE_BLANK_LINES_STR: &str = r"\n{3,}";
const RE_LONG_SPACE_STR: &str = r" {2,}";

lazy_static::lazy_static!(
    static ref RE_HTML_TAG: Regex = Regex::new(RE_HTML_TAG_STR).unwrap();
    static ref RE_QUOTED_LINE: Regex = Regex::new(RE_QUOTED_LINE_STR).unwrap();
    static ref RE_QUOTE_HEADER: Regex = Regex::new(RE_QUOTE_HEADER_STR).unwrap();
    static ref RE_SIGNATURE: Regex = Regex::new(RE_SIGNATURE_STR).unwrap();
    static ref RE_WHITESPACE: Regex = Regex::new(RE_WHITESPACE_STR).unwrap();
    static ref RE_BLANK_LINES: Regex = Regex::new(RE_BLANK_LINES_STR).unwrap();
    static ref RE_LONG_SPACE: Regex = Regex::new(RE_LONG_SPACE_STR).unwrap();
);

/// Normalize a raw message body to the plain text fed to every downstream
/// stage. HTML bodies are rendered to text first; quoted history, quote
/// headers and trailing signature blocks are dropped.
pub fn clean_email_body(raw: &str) -> String {
    let text = if RE_HTML_TAG.is_match(raw) {
        html2text::from_read(raw.as_bytes(), 120)
    } else {
        raw.to_string()
    };

    let text = RE_SIGNATURE.replace(&text, "");
    let text = RE_QUOTE_HEADER.replace_all(&text, "");
    let text = RE_QUOTED_LINE.replace_all(&text, "");
    let text = RE_WHITESPACE.replace_all(&text, " ");
    let text = RE_BLANK_LINES.replace_all(&text, "\n\n");
    let text = RE_LONG_SPACE.replace_all(&text, " ");

    text.trim().to_string()
}

/// Pull the author's own words out of a previously sent reply, for use as
/// retrieval corpus text. Same pipeline as [`clean_email_body`], applied to
/// the stored raw body of the sent message.
pub fn extract_reply_text(sent: &SentMessage) -> String {
    let parsed = mail_parser::MessageParser::default().parse(sent.raw_body.as_bytes());

    let body = parsed
        .as_ref()
        .and_then(|m| m.body_text(0))
        .map(|b| b.to_string())
        .unwrap_or_else(|| sent.raw_body.clone());

    clean_email_body(&body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let body = "Hi team,\n\nThe deploy is done.\n\nThanks,\nSam";
        assert_eq!(clean_email_body(body), body);
    }

    #[test]
    fn test_html_body_is_rendered_to_text() {
        let body = "<html><body><p>Hello <b>world</b></p></body></html>";
        let cleaned = clean_email_body(body);

        assert!(cleaned.contains("Hello"));
        assert!(cleaned.contains("world"));
        assert!(!cleaned.contains('<'));
    }

    #[test]
    fn test_quoted_history_is_removed() {
        let body = "Sounds good to me.\n\nOn Tue, Mar 4, 2025 John Smith wrote:\n> Can we move the sync to 3pm?\n> It clashes with standup.";
        let cleaned = clean_email_body(body);

        assert_eq!(cleaned, "Sounds good to me.");
    }

    #[test]
    fn test_signature_block_is_removed() {
        let body = "See attached notes.\n-- \nJane Doe\nVP of Operations\n555-0100";
        let cleaned = clean_email_body(body);

        assert_eq!(cleaned, "See attached notes.");
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        let body = "Hello\t\tthere\n\n\n\n\nBye";
        let cleaned = clean_email_body(body);

        assert_eq!(cleaned, "Hello there\n\nBye");
    }

    #[test]
    fn test_extract_reply_text_from_mime() {
        let raw = concat!(
            "From: me@example.com\r\n",
            "To: you@example.com\r\n",
            "Subject: Re: Budget\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Approved, go ahead with the vendor.\r\n",
            "\r\n",
            "> Can we approve the Q3 budget?\r\n",
        );
        let sent = SentMessage {
            id: "s1".into(),
            thread_id: "t1".into(),
            subject: "Re: Budget".into(),
            recipient: "you@example.com".into(),
            date: None,
            raw_body: raw.to_string(),
        };

        assert_eq!(extract_reply_text(&sent), "Approved, go ahead with the vendor.");
    }
}
