//! Location token codec.
//!
//! A location range emitted by the rendering engine is an arbitrary string
//! (usually an EPUB CFI such as `epubcfi(/6/4!/4/2,/1:0,/1:12)`). Those
//! contain characters that break host link syntax, so links carry the
//! base64url form instead. The format is the only wire-visible artifact of
//! the reader and must stay stable for existing notes to keep resolving.

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use thiserror::Error;

/// URL-safe alphabet, no padding on encode, padding optional on decode.
///
/// Trailing bits are tolerated because tokens may have been produced by
/// browser `btoa`-based encoders which do not canonicalize them.
const LOCATION_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid character {0:?} in location token")]
    InvalidCharacter(char),
    #[error("malformed base64 in location token: {0}")]
    InvalidBase64(String),
    #[error("location token is not valid UTF-8")]
    InvalidUtf8,
}

/// Encode a location range into a link-safe token.
pub fn encode_location(text: &str) -> String {
    LOCATION_ENGINE.encode(text.as_bytes())
}

/// Decode a token produced by [`encode_location`].
///
/// Callers treat an error as "ignore this link"; it is never fatal.
pub fn decode_location(token: &str) -> Result<String, DecodeError> {
    let body = token.trim_end_matches('=');
    if let Some(bad) = body.chars().find(|ch| !is_token_char(*ch)) {
        return Err(DecodeError::InvalidCharacter(bad));
    }
    // More than two pad characters can never be valid.
    if token.len() - body.len() > 2 {
        return Err(DecodeError::InvalidCharacter('='));
    }

    let bytes = LOCATION_ENGINE
        .decode(body)
        .map_err(|err| DecodeError::InvalidBase64(err.to_string()))?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)
}

/// True when `value` is a non-empty run of url-safe base64 characters.
pub fn is_token(value: &str) -> bool {
    !value.is_empty() && value.chars().all(is_token_char)
}

fn is_token_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}
