//! Body extraction from Gmail MIME part trees.

use super::client::MessagePart;
use base64::{
    alphabet,
    engine::{general_purpose::GeneralPurpose, DecodePaddingMode, GeneralPurposeConfig},
    Engine,
};
use regex::Regex;
use std::sync::OnceLock;

/// Gmail encodes part bodies as base64url; padding may or may not be present.
const BASE64_URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// HTML and plain-text renderings of a message body.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExtractedBody {
    pub html: String,
    pub text: String,
}

/// Walks the part tree depth-first, keeping the last `text/html` and
/// `text/plain` bodies found. Text falls back to the HTML with tags stripped.
pub fn extract_body(payload: &MessagePart) -> ExtractedBody {
    let mut html = String::new();
    let mut text = String::new();
    visit(payload, &mut html, &mut text);

    if text.is_empty() {
        text = strip_tags(&html);
    }

    ExtractedBody { html, text }
}

fn visit(part: &MessagePart, html: &mut String, text: &mut String) {
    if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
        match part.mime_type.as_str() {
            "text/html" => *html = decode_part(data),
            "text/plain" => *text = decode_part(data),
            _ => {}
        }
    }

    for child in &part.parts {
        visit(child, html, text);
    }
}

/// Decodes a base64url body; undecodable data yields an empty string.
fn decode_part(data: &str) -> String {
    BASE64_URL
        .decode(data.trim())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn strip_tags(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static regex"));
    tag.replace_all(html, "").into_owned()
}
