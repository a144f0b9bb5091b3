//! Pure AT line utilities (spec.md §4.1).
//!
//! Every function here is a single-pass, allocation-light transform over a
//! byte string; none of them hold state and none of them panic. Mirrors the
//! reference driver's preference for small, independently testable parsing
//! primitives (see `command::error` in the reference driver for the same
//! "never panic, always return a typed result" discipline).

use crate::error::{AtError, AtResult};

const WHITESPACE: &[u8] = b"\t\r\n \0";

/// Removes leading whitespace (`\t \r \n space \0`) in place and returns the
/// trimmed slice.
pub fn remove_leading_whitespace(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && WHITESPACE.contains(&s[i]) {
        i += 1;
    }
    &s[i..]
}

/// Removes trailing whitespace in place and returns the trimmed slice.
pub fn remove_trailing_whitespace(s: &[u8]) -> &[u8] {
    let mut end = s.len();
    while end > 0 && WHITESPACE.contains(&s[end - 1]) {
        end -= 1;
    }
    &s[..end]
}

/// Removes both leading and trailing whitespace.
pub fn remove_whitespace(s: &[u8]) -> &[u8] {
    remove_trailing_whitespace(remove_leading_whitespace(s))
}

/// Removes every whitespace byte anywhere in the string, not just at the
/// ends. Idempotent: applying it twice yields the same result as once.
pub fn remove_all_whitespace(s: &[u8]) -> Vec<u8> {
    s.iter().copied().filter(|b| !WHITESPACE.contains(b)).collect()
}

/// Removes the outermost pair of double quotes, if present. Fails with
/// [`AtError::BadParameter`] if there is exactly one unpaired quote.
pub fn remove_outermost_quotes(s: &[u8]) -> AtResult<&[u8]> {
    let trimmed = remove_whitespace(s);
    match (trimmed.first(), trimmed.last()) {
        (Some(b'"'), Some(b'"')) if trimmed.len() >= 2 => {
            Ok(&trimmed[1..trimmed.len() - 1])
        }
        (Some(b'"'), _) | (_, Some(b'"')) => Err(AtError::BadParameter),
        _ => Ok(trimmed),
    }
}

/// Removes every double quote character anywhere in the string.
pub fn remove_all_quotes(s: &[u8]) -> Vec<u8> {
    s.iter().copied().filter(|&b| b != b'"').collect()
}

/// True iff the first non-space character is a letter or `+`, a `+`
/// appears at or before the first `:`, and that `:` is actually present
/// before end-of-line (a bare `+CREG` with no colon is not a prefix yet).
pub fn is_prefix_present(line: &[u8]) -> bool {
    let trimmed = remove_leading_whitespace(line);
    let mut seen_plus = match trimmed.first() {
        Some(b'+') => true,
        Some(c) if c.is_ascii_alphabetic() => false,
        _ => return false,
    };
    for &b in trimmed.iter().skip(1) {
        match b {
            b'+' => seen_plus = true,
            b':' => return seen_plus,
            b'\r' | b'\n' | b'\0' => return false,
            _ => {}
        }
    }
    false
}

/// Case-sensitive prefix test.
pub fn starts_with(s: &[u8], prefix: &[u8]) -> bool {
    s.len() >= prefix.len() && &s[..prefix.len()] == prefix
}

/// Destructive tokenizer: splits `s` on the first occurrence of `sep`,
/// returning `(token, rest)`. `rest` is `None` once the string is
/// exhausted. A caller may re-tokenize the same line with a different
/// separator because this never mutates `s`; it only narrows the slice.
pub fn get_specific_next_token<'a>(s: &'a [u8], sep: u8) -> (&'a [u8], Option<&'a [u8]>) {
    match s.iter().position(|&b| b == sep) {
        Some(i) => (&s[..i], Some(&s[i + 1..])),
        None => (s, None),
    }
}

/// [`get_specific_next_token`] with `,` as the separator, the common case
/// for 3GPP response parsing.
pub fn get_next_token(s: &[u8]) -> (&[u8], Option<&[u8]>) {
    get_specific_next_token(s, b',')
}

/// Splits `s` into all comma-separated tokens, preserving empty fields
/// (`a,,c` yields `["a", "", "c"]`).
pub fn split_all(s: &[u8], sep: u8) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut rest = Some(s);
    while let Some(cur) = rest {
        let (tok, next) = get_specific_next_token(cur, sep);
        out.push(tok);
        rest = next;
    }
    out
}

/// Parses an integer in the given radix (2, 10 or 16 only). Fails on any
/// non-digit character or unsupported radix.
pub fn strtoi(s: &[u8], radix: u32) -> AtResult<i64> {
    if !matches!(radix, 2 | 10 | 16) {
        return Err(AtError::BadParameter);
    }
    let s = remove_whitespace(s);
    if s.is_empty() {
        return Err(AtError::BadParameter);
    }
    let (neg, digits) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() {
        return Err(AtError::BadParameter);
    }
    let text = core::str::from_utf8(digits).map_err(|_| AtError::BadParameter)?;
    let value = i64::from_str_radix(text, radix).map_err(|_| AtError::BadParameter)?;
    Ok(if neg { -value } else { value })
}
