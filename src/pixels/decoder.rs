//! Lenient pixel-array decoder.
//!
//! Grammar accepted inside a request body:
//!
//! ```text
//! document := ... '"pixels":' ... '[' tokens ']' ...
//! tokens   := token (',' token)* ','?
//! token    := ws* sign? digit+ ws*
//! sign     := '+' | '-'
//! ws       := ' ' | '\t' | '\r' | '\n'
//! ```
//!
//! This is a scanner, not a JSON parser. The array starts at the first `[`
//! after the key and ends at the first `]` after that, so a document with
//! brackets inside strings or nested arrays near the key will be misread.
//! Values outside 0..=255 are clamped rather than rejected.

use thiserror::Error;

use crate::pixels::image::{PixelImage, IMAGE_PIXELS};

const PIXELS_KEY: &str = "\"pixels\":";

/// Reasons a body could not be turned into a [`PixelImage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Field 'pixels' not found")]
    MissingKey,

    #[error("Pixel array start '[' not found")]
    MissingArrayStart,

    #[error("Pixel array end ']' not found")]
    MissingArrayEnd,

    #[error("Invalid value at index {index}: '{token}'")]
    InvalidToken { index: usize, token: String },

    #[error("Array must have exactly {expected} pixels (28x28), received: {count}")]
    WrongCount { expected: usize, count: usize },
}

/// Iterates the comma-separated tokens of the `"pixels"` array.
///
/// Each item is the clamped value of one token. After the first invalid
/// token the scanner yields that error and then stops.
#[derive(Debug, Clone)]
pub struct PixelScanner<'a> {
    rest: &'a str,
    index: usize,
    done: bool,
}

impl<'a> PixelScanner<'a> {
    /// Find the `"pixels"` array in `document` and position on its first token.
    pub fn locate(document: &'a str) -> Result<Self, DecodeError> {
        let key = document.find(PIXELS_KEY).ok_or(DecodeError::MissingKey)?;
        let after_key = &document[key + PIXELS_KEY.len()..];

        let open = after_key.find('[').ok_or(DecodeError::MissingArrayStart)?;
        let after_open = &after_key[open + 1..];

        let close = after_open.find(']').ok_or(DecodeError::MissingArrayEnd)?;

        Ok(Self {
            rest: trim_ws(&after_open[..close]),
            index: 0,
            done: false,
        })
    }

    /// Number of tokens yielded so far.
    pub fn position(&self) -> usize {
        self.index
    }
}

impl Iterator for PixelScanner<'_> {
    type Item = Result<u8, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let rest = self.rest.trim_start_matches(is_ws);
        if rest.is_empty() {
            self.done = true;
            return None;
        }

        let (raw, remainder) = match rest.find(',') {
            Some(comma) => (&rest[..comma], Some(&rest[comma + 1..])),
            None => (rest, None),
        };
        match remainder {
            Some(r) => self.rest = r,
            None => {
                self.rest = "";
                self.done = true;
            }
        }

        let token = trim_ws(raw);
        let index = self.index;
        self.index += 1;

        match parse_token(token) {
            Some(value) => Some(Ok(value)),
            None => {
                self.done = true;
                Some(Err(DecodeError::InvalidToken {
                    index,
                    token: token.to_string(),
                }))
            }
        }
    }
}

/// Decode a request body into a full image.
///
/// Either all [`IMAGE_PIXELS`] values are present and valid, or an error is
/// returned and no image exists.
pub fn decode_pixels(document: &str) -> Result<PixelImage, DecodeError> {
    let mut pixels = [0u8; IMAGE_PIXELS];
    let mut count = 0;

    for value in PixelScanner::locate(document)? {
        let value = value?;
        if count < IMAGE_PIXELS {
            pixels[count] = value;
        }
        count += 1;
    }

    if count != IMAGE_PIXELS {
        return Err(DecodeError::WrongCount {
            expected: IMAGE_PIXELS,
            count,
        });
    }

    Ok(PixelImage::new(pixels))
}

/// Parse one trimmed token, clamping into `0..=255`.
fn parse_token(token: &str) -> Option<u8> {
    let (negative, digits) = match token.as_bytes().first() {
        Some(b'-') => (true, &token[1..]),
        Some(b'+') => (false, &token[1..]),
        _ => (false, token),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if negative {
        return Some(0);
    }

    let value = digits.bytes().fold(0u32, |acc, b| {
        acc.saturating_mul(10).saturating_add(u32::from(b - b'0'))
    });
    Some(value.min(u32::from(u8::MAX)) as u8)
}

fn is_ws(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

fn trim_ws(s: &str) -> &str {
    s.trim_matches(is_ws)
}
