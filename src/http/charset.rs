//! Character-set detection and the lenient decoding chain for response bodies.

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use tracing::warn;

/// How response text is decoded when the server declares no charset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DefaultEncoding {
    /// Detect the charset from the body bytes.
    #[default]
    Autodetect,
    /// Always use the given encoding.
    Fixed(&'static Encoding),
}

impl DefaultEncoding {
    /// Fixed encoding from a WHATWG label such as `"utf-8"` or `"latin1"`.
    pub fn from_label(label: &str) -> Option<Self> {
        Encoding::for_label(label.trim().as_bytes()).map(Self::Fixed)
    }

    pub(crate) fn resolve(&self, content: &[u8]) -> &'static Encoding {
        match self {
            DefaultEncoding::Autodetect => autodetect_charset(content),
            DefaultEncoding::Fixed(encoding) => encoding,
        }
    }
}

/// Guesses the encoding of `content`.
///
/// Valid UTF-8 (including empty input) is reported as UTF-8; anything else
/// goes through statistical detection.
pub fn autodetect_charset(content: &[u8]) -> &'static Encoding {
    if std::str::from_utf8(content).is_ok() {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(content, true);
    detector.guess(None, true)
}

/// Which step of the decoding chain produced the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    Detected,
    Declared,
    Latin1,
}

/// Result of [`decode_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
    pub step: DecodeStep,
}

/// Decodes `content` with the detected encoding, then the declared one,
/// then ISO-8859-1 which accepts any byte sequence.
pub fn decode_content(content: &[u8], declared: Option<&'static Encoding>) -> DecodedText {
    decode_with(content, autodetect_charset(content), declared)
}

/// Decoding chain with an explicit detection result.
///
/// The declared encoding is only tried when it is not UTF-8.
pub fn decode_with(
    content: &[u8],
    detected: &'static Encoding,
    declared: Option<&'static Encoding>,
) -> DecodedText {
    if let Some(text) = decode_strict(detected, content) {
        return DecodedText {
            text,
            encoding: detected.name(),
            step: DecodeStep::Detected,
        };
    }
    warn!(encoding = detected.name(), "[Attempt 1/3] Failed to decode response content");

    if let Some(declared) = declared.filter(|e| *e != UTF_8) {
        warn!(encoding = declared.name(), "Retrying response content decode with declared encoding");
        if let Some(text) = decode_strict(declared, content) {
            return DecodedText {
                text,
                encoding: declared.name(),
                step: DecodeStep::Declared,
            };
        }
        warn!(encoding = declared.name(), "[Attempt 2/3] Failed to decode response content");
    }

    warn!("Retrying response content decode with ISO-8859-1");
    DecodedText {
        text: content.iter().map(|&b| char::from(b)).collect(),
        encoding: "ISO-8859-1",
        step: DecodeStep::Latin1,
    }
}

fn decode_strict(encoding: &'static Encoding, content: &[u8]) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(content)
        .map(|text| text.into_owned())
}

/// Extracts the `charset` parameter of a `Content-Type` value.
pub(crate) fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        Encoding::for_label(value.as_bytes())
    })
}
