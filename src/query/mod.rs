//! 3GPP query-response parsers (spec.md §4.7). Each submodule parses the
//! already-accumulated payload of one `AT+Cxxx?` response into a typed
//! result; none of them touch the broker or the transport.

pub mod clock;
pub mod cops;
pub mod modem_info;
pub mod psm;
pub mod sim;

use crate::at::lexer::{remove_leading_whitespace, starts_with};
use crate::error::{AtError, AtResult};

/// Strips a known `+Cxxx` prefix (and the following `:` and whitespace)
/// from an already-classified solicited line, yielding the comma-separated
/// argument list the parsers above expect.
pub(crate) fn payload<'a>(line: &'a [u8], prefix: &[u8]) -> AtResult<&'a [u8]> {
    if !starts_with(line, prefix) {
        return Err(AtError::InvalidData);
    }
    let mut rest = &line[prefix.len()..];
    if rest.first() == Some(&b':') {
        rest = &rest[1..];
    }
    Ok(remove_leading_whitespace(rest))
}
