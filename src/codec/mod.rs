//! Offline decoder for aggregator article tokens.
//!
//! A token's path segment is URL-safe base64 over a small binary record: a
//! fixed header, a varint-prefixed publisher URL, and a terminator field that
//! may carry an AMP mirror of the same article. Only layouts listed in
//! [`signature::SIGNATURES`] are accepted; anything else decodes to
//! [`Payload::Unknown`] so a wrong substring never leaves this module.

pub mod signature;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use url::Url;

use crate::domain::aggregator::is_amp_mirror;
use crate::domain::token::split_family;
use signature::{Signature, SIGNATURES};

const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Longest varint accepted for a length field.
const MAX_VARINT_BYTES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Article {
        version: &'static str,
        canonical: String,
        amp: Option<String>,
    },
    Unknown,
}

impl Payload {
    /// The publisher URL: the first embedded URL that is not an AMP mirror,
    /// falling back to the canonical slot.
    pub fn url(&self) -> Option<&str> {
        match self {
            Payload::Article { canonical, amp, .. } => {
                let candidates = std::iter::once(canonical.as_str()).chain(amp.as_deref());
                let preferred = candidates.clone().find(|url| !is_amp_mirror(url));
                preferred.or_else(|| candidates.into_iter().next())
            }
            Payload::Unknown => None,
        }
    }
}

/// Decode a token offline. Returns `None` for unknown families, story
/// clusters, malformed base64 and unrecognised payload layouts.
pub fn decode(token: &str) -> Option<String> {
    let (family, body) = split_family(token.trim())?;
    if !family.embeds_url() {
        return None;
    }

    let bytes = decode_base64(body)?;
    parse_payload(&bytes).url().map(str::to_string)
}

/// Normalise a URL-safe base64 segment and decode it to raw bytes.
pub fn decode_base64(body: &str) -> Option<Vec<u8>> {
    let mut normalised: String = body
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    // A single leftover sextet cannot encode a byte.
    if normalised.is_empty() || normalised.len() % 4 == 1 {
        return None;
    }
    while normalised.len() % 4 != 0 {
        normalised.push('=');
    }

    LENIENT_BASE64.decode(normalised).ok()
}

/// Match raw bytes against the known signatures.
pub fn parse_payload(bytes: &[u8]) -> Payload {
    SIGNATURES
        .iter()
        .find_map(|signature| parse_with(signature, bytes))
        .unwrap_or(Payload::Unknown)
}

fn parse_with(signature: &Signature, bytes: &[u8]) -> Option<Payload> {
    let rest = bytes.strip_prefix(signature.header)?;

    let (canonical_bytes, rest) = read_length_prefixed(rest)?;
    let canonical = embedded_url(canonical_bytes)?;

    let rest = rest.strip_prefix(signature.terminator_tag)?;
    let (amp_bytes, rest) = read_length_prefixed(rest)?;
    if !rest.is_empty() {
        return None;
    }

    let amp = if amp_bytes.is_empty() {
        None
    } else {
        Some(embedded_url(amp_bytes)?)
    };

    Some(Payload::Article {
        version: signature.version,
        canonical,
        amp,
    })
}

fn read_length_prefixed(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let (len, rest) = read_varint(bytes)?;
    let len = usize::try_from(len).ok()?;
    if rest.len() < len {
        return None;
    }
    Some(rest.split_at(len))
}

fn read_varint(bytes: &[u8]) -> Option<(u64, &[u8])> {
    let mut value: u64 = 0;

    for (i, byte) in bytes.iter().take(MAX_VARINT_BYTES).enumerate() {
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, &bytes[i + 1..]));
        }
    }

    None
}

fn embedded_url(bytes: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(bytes).ok()?;
    if !(text.starts_with("https://") || text.starts_with("http://")) {
        return None;
    }
    if text.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return None;
    }

    let parsed = Url::parse(text).ok()?;
    parsed.host_str()?;

    Some(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const TECHCRUNCH_TOKEN: &str = "https://news.google.com/rss/articles/CBMiSGh0dHBzOi8vdGVjaGNydW5jaC5jb20vMjAyMi8xMC8yNy9uZXcteW9yay1wb3N0LWhhY2tlZC1vZmZlbnNpdmUtdHdlZXRzL9IBAA?oc=5";
    const TECHCRUNCH_URL: &str =
        "https://techcrunch.com/2022/10/27/new-york-post-hacked-offensive-tweets/";

    fn varint(mut value: usize) -> Vec<u8> {
        let mut out = Vec::new();
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return out;
            }
            out.push(byte | 0x80);
        }
    }

    fn payload(canonical: &[u8], amp: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0x08, 0x13, 0x22];
        bytes.extend(varint(canonical.len()));
        bytes.extend_from_slice(canonical);
        bytes.extend_from_slice(&[0xd2, 0x01]);
        bytes.extend(varint(amp.len()));
        bytes.extend_from_slice(amp);
        bytes
    }

    fn token_for(bytes: &[u8]) -> String {
        format!(
            "https://news.google.com/rss/articles/{}?oc=5",
            URL_SAFE_NO_PAD.encode(bytes)
        )
    }

    #[test]
    fn test_decode_known_token() {
        assert_eq!(decode(TECHCRUNCH_TOKEN).as_deref(), Some(TECHCRUNCH_URL));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let first = decode(TECHCRUNCH_TOKEN);
        for _ in 0..5 {
            assert_eq!(decode(TECHCRUNCH_TOKEN), first);
        }
    }

    #[test]
    fn test_decode_other_article_prefixes() {
        let body = TECHCRUNCH_TOKEN
            .trim_start_matches("https://news.google.com/rss/articles/")
            .trim_end_matches("?oc=5");

        for prefix in [
            "https://news.google.com/articles/",
            "https://news.google.com/read/",
        ] {
            let token = format!("{}{}?hl=en-US&gl=US", prefix, body);
            assert_eq!(decode(&token).as_deref(), Some(TECHCRUNCH_URL), "{}", token);
        }
    }

    #[test]
    fn test_garbage_base64_is_absent() {
        assert_eq!(decode("https://news.google.com/rss/articles/!!!!?oc=5"), None);
        assert_eq!(decode("https://news.google.com/rss/articles/A?oc=5"), None);
        assert_eq!(
            decode("https://news.google.com/rss/articles/aGVsbG8gd29ybGQ?oc=5"),
            None
        );
    }

    #[test]
    fn test_extended_long_token_is_absent() {
        // Newer tokens carry an opaque id where the URL used to be.
        let mut content = b"AU_yqL".to_vec();
        content.extend(std::iter::repeat(b'x').take(407));
        let mut bytes = vec![0x08, 0x13, 0x22];
        bytes.extend(varint(content.len()));
        bytes.extend(content);

        let token = token_for(&bytes);
        assert_eq!(token.len(), 600);
        assert_eq!(decode(&token), None);
    }

    #[test]
    fn test_unknown_families_are_absent() {
        let body = URL_SAFE_NO_PAD.encode(payload(b"https://example.com/a", b""));

        assert_eq!(
            decode(&format!("https://news.google.com/stories/{}", body)),
            None
        );
        assert_eq!(decode(&format!("https://example.com/articles/{}", body)), None);
        assert_eq!(
            decode(&format!("https://news.google.com/rss/articles/{}", body)).as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn test_missing_terminator_is_absent() {
        let mut bytes = vec![0x08, 0x13, 0x22];
        bytes.extend(varint(21));
        bytes.extend_from_slice(b"https://example.com/a");

        assert_eq!(parse_payload(&bytes), Payload::Unknown);
    }

    #[test]
    fn test_trailing_bytes_are_absent() {
        let mut bytes = payload(b"https://example.com/a", b"");
        bytes.push(0x42);

        assert_eq!(parse_payload(&bytes), Payload::Unknown);
    }

    #[test]
    fn test_truncated_length_is_absent() {
        let mut bytes = vec![0x08, 0x13, 0x22];
        bytes.extend(varint(200));
        bytes.extend_from_slice(b"https://example.com/a");

        assert_eq!(parse_payload(&bytes), Payload::Unknown);
    }

    #[test]
    fn test_wrong_header_is_absent() {
        let mut bytes = payload(b"https://example.com/a", b"");
        bytes[1] = 0x14;

        assert_eq!(parse_payload(&bytes), Payload::Unknown);
    }

    #[test]
    fn test_prefers_non_amp_url() {
        let bytes = payload(
            b"https://www.google.com/amp/s/example.com/story",
            b"https://example.com/story",
        );

        match parse_payload(&bytes) {
            Payload::Article { version, amp, .. } => {
                assert_eq!(version, "v1");
                assert_eq!(amp.as_deref(), Some("https://example.com/story"));
            }
            Payload::Unknown => panic!("expected a known payload"),
        }
        assert_eq!(decode(&token_for(&bytes)).as_deref(), Some("https://example.com/story"));
    }

    #[test]
    fn test_canonical_wins_over_amp_slot() {
        let bytes = payload(
            b"https://example.com/story",
            b"https://example-com.cdn.ampproject.org/c/s/example.com/story",
        );

        assert_eq!(decode(&token_for(&bytes)).as_deref(), Some("https://example.com/story"));
    }

    #[test]
    fn test_two_byte_varint_length() {
        let long_url = format!("https://example.com/{}", "a".repeat(200));
        let bytes = payload(long_url.as_bytes(), b"");

        assert_eq!(decode(&token_for(&bytes)), Some(long_url));
    }

    #[test]
    fn test_non_url_payload_is_absent() {
        let bytes = payload(b"not a url at all", b"");
        assert_eq!(decode(&token_for(&bytes)), None);
    }

    #[test]
    fn test_decode_base64_handles_url_safe_alphabet() {
        let bytes = [0xfb, 0xff, 0xfe];
        let encoded = URL_SAFE_NO_PAD.encode(bytes);
        assert!(encoded.contains('-') || encoded.contains('_'));

        assert_eq!(decode_base64(&encoded), Some(bytes.to_vec()));
    }
}
