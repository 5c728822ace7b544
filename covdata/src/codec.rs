// SPDX-License-Identifier: GPL-3.0-or-later

//! Compact textual form of execution arcs.
//!
//! Each arc is written as a token of two or three characters. A character
//! stands for a line number: `.` is the entry/exit sentinel (-1), `1`-`9`
//! are themselves, `A`-`Z` are 10 through 35. A three character token
//! carries an explicit minus sign, either in front (negating the first
//! endpoint) or in the middle (negating the second endpoint).
//!
//! ```text
//! ".1 12 2."   -> [(-1, 1), (1, 2), (2, -1)]
//! "-11 12 2-5" -> [(-1, 1), (1, 2), (2, -5)]
//! ```
//!
//! The form is used by test fixtures and debugging dumps. It is not the
//! persisted data format.

use crate::data::{Arc, LineNumber, SENTINEL};
use thiserror::Error;

/// The largest magnitude a single character can express.
pub const MAX_MAGNITUDE: LineNumber = 35;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    #[error("Token '{0}' must be two or three characters long")]
    TokenLength(String),
    #[error("Token '{0}' has a sign in an invalid position")]
    SignPosition(String),
    #[error("Token '{0}' negates the sentinel")]
    NegatedSentinel(String),
    #[error("Character '{character}' in token '{token}' is not a line number")]
    UnknownCharacter { token: String, character: char },
    #[error("Line number {0} can't be encoded")]
    Unrepresentable(LineNumber),
    #[error("Arc ({0}, {1}) has two signed endpoints")]
    DoubleSign(LineNumber, LineNumber),
}

/// Decodes whitespace separated tokens into a sorted list of arcs.
pub fn decode(text: &str) -> Result<Vec<Arc>, FormatError> {
    let mut arcs = text.split_whitespace().map(decode_token).collect::<Result<Vec<_>, _>>()?;
    arcs.sort();
    Ok(arcs)
}

/// Encodes arcs into tokens, in sorted order.
pub fn encode(arcs: &[Arc]) -> Result<String, FormatError> {
    let mut sorted = arcs.to_vec();
    sorted.sort();

    let tokens = sorted.iter().map(encode_arc).collect::<Result<Vec<_>, _>>()?;
    Ok(tokens.join(" "))
}

/// Renders arcs one per line with their token as a trailing comment.
///
/// Endpoints without a textual form are shown as `?`. Never fails, so it is
/// safe to call while building an assertion message.
pub fn describe(arcs: &[Arc]) -> String {
    let mut result = String::new();
    for arc in arcs {
        let from = encode_endpoint(arc.from).unwrap_or_else(|_| String::from("?"));
        let to = encode_endpoint(arc.to).unwrap_or_else(|_| String::from("?"));
        result.push_str(&format!("({}, {}) # {}{}\n", arc.from, arc.to, from, to));
    }
    result
}

fn decode_token(token: &str) -> Result<Arc, FormatError> {
    let characters: Vec<char> = token.chars().collect();
    match characters.as_slice() {
        [a, b] => Ok(Arc::new(magnitude(token, *a)?, magnitude(token, *b)?)),
        ['-', a, b] => Ok(Arc::new(negate(token, *a)?, magnitude(token, *b)?)),
        [a, '-', b] => Ok(Arc::new(magnitude(token, *a)?, negate(token, *b)?)),
        [_, _, _] => Err(FormatError::SignPosition(token.to_string())),
        _ => Err(FormatError::TokenLength(token.to_string())),
    }
}

fn magnitude(token: &str, character: char) -> Result<LineNumber, FormatError> {
    match character {
        '.' => Ok(SENTINEL),
        '1'..='9' => Ok(character as LineNumber - '0' as LineNumber),
        'A'..='Z' => Ok(10 + character as LineNumber - 'A' as LineNumber),
        _ => Err(FormatError::UnknownCharacter { token: token.to_string(), character }),
    }
}

fn negate(token: &str, character: char) -> Result<LineNumber, FormatError> {
    if character == '.' {
        return Err(FormatError::NegatedSentinel(token.to_string()));
    }
    magnitude(token, character).map(|value| -value)
}

fn encode_arc(arc: &Arc) -> Result<String, FormatError> {
    let signed = |value: LineNumber| value < 0 && value != SENTINEL;
    if signed(arc.from) && signed(arc.to) {
        return Err(FormatError::DoubleSign(arc.from, arc.to));
    }
    let from = encode_endpoint(arc.from)?;
    let to = encode_endpoint(arc.to)?;
    Ok(format!("{from}{to}"))
}

fn encode_endpoint(value: LineNumber) -> Result<String, FormatError> {
    if value == SENTINEL {
        return Ok(String::from("."));
    }
    let sign = if value < 0 { "-" } else { "" };
    let digit = match value.unsigned_abs() {
        magnitude @ 1..=9 => char::from(b'0' + magnitude as u8),
        magnitude @ 10..=35 => char::from(b'A' + (magnitude - 10) as u8),
        _ => return Err(FormatError::Unrepresentable(value)),
    };
    Ok(format!("{sign}{digit}"))
}
