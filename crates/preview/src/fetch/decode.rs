// ABOUTME: Decodes fetched body bytes into text.
// ABOUTME: Uses the Content-Type charset when present, otherwise chardetng detection.

/// Decode body bytes to a String using charset from content-type header or detection.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    if let Some(ct) = content_type {
        if let Some(charset) = extract_charset(ct) {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
                let (decoded, _, _) = encoding.decode(body);
                return decoded.into_owned();
            }
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let encoding = detector.guess(None, true);
    let (decoded, _, _) = encoding.decode(body);
    decoded.into_owned()
}

/// Extract charset value from Content-Type header.
fn extract_charset(content_type: &str) -> Option<String> {
    let lower = content_type.to_lowercase();
    lower.split(';').find_map(|part| {
        part.trim()
            .strip_prefix("charset=")
            .map(|charset| charset.trim_matches('"').trim_matches('\'').to_string())
    })
}
