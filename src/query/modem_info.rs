//! `AT+CGMR`/`AT+CGSN`/`AT+CGMM`/`AT+CGMI`/`AT+CGPADDR` response parsing
//! (spec.md §4.7).

use crate::at::lexer::{remove_outermost_quotes, remove_whitespace, split_all};
use crate::error::{AtError, AtResult};

pub const MAX_CGMR_LEN: usize = 16;
pub const MAX_CGSN_LEN: usize = 20;
pub const MAX_CGMM_LEN: usize = 16;
pub const MAX_CGMI_LEN: usize = 16;

fn trimmed_copy(payload: &[u8], max_len: usize) -> AtResult<String> {
    let trimmed = remove_whitespace(payload);
    if trimmed.is_empty() || trimmed.len() > max_len {
        return Err(AtError::BadParameter);
    }
    Ok(String::from_utf8_lossy(trimmed).into_owned())
}

/// Firmware revision (`AT+CGMR`).
pub fn parse_cgmr(payload: &[u8]) -> AtResult<String> {
    trimmed_copy(payload, MAX_CGMR_LEN)
}

/// Serial number / IMEI (`AT+CGSN`).
pub fn parse_cgsn(payload: &[u8]) -> AtResult<String> {
    trimmed_copy(payload, MAX_CGSN_LEN)
}

/// Model identification (`AT+CGMM`).
pub fn parse_cgmm(payload: &[u8]) -> AtResult<String> {
    trimmed_copy(payload, MAX_CGMM_LEN)
}

/// Manufacturer identification (`AT+CGMI`).
pub fn parse_cgmi(payload: &[u8]) -> AtResult<String> {
    trimmed_copy(payload, MAX_CGMI_LEN)
}

/// The sentinel emitted when a `+CGPADDR` response carries only the PDP
/// context id, with no address (spec.md §4.7 "CGPADDR"). spec.md's own
/// Open Question flags a mismatch here between a comma-separated form and
/// a dotted-quad form; this crate deliberately keeps the comma-separated
/// `"0,0,0,0"`, not a typo for `"0.0.0.0"` — see DESIGN.md's Open Question
/// decisions.
pub const CGPADDR_NO_ADDRESS: &str = "0,0,0,0";

/// Parses a `+CGPADDR: <cid>[,<addr>]` payload.
pub fn parse_cgpaddr(payload: &[u8]) -> AtResult<String> {
    let tokens = split_all(payload, b',');
    if tokens.is_empty() {
        return Err(AtError::InvalidData);
    }
    match tokens.get(1) {
        Some(addr) if !addr.is_empty() => Ok(String::from_utf8_lossy(remove_outermost_quotes(addr)?).into_owned()),
        _ => Ok(CGPADDR_NO_ADDRESS.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cgmr_rejects_oversize() {
        assert!(parse_cgmr(b"L0.0.00.00.01").is_ok());
        assert_eq!(parse_cgmr(b"this firmware string is far too long").unwrap_err(), AtError::BadParameter);
    }

    #[test]
    fn cgpaddr_with_address_returns_it_verbatim() {
        assert_eq!(parse_cgpaddr(b"1,\"10.45.0.2\"").unwrap(), "10.45.0.2");
    }

    #[test]
    fn cgpaddr_context_only_emits_sentinel() {
        assert_eq!(parse_cgpaddr(b"1").unwrap(), CGPADDR_NO_ADDRESS);
        assert_eq!(parse_cgpaddr(b"1,").unwrap(), CGPADDR_NO_ADDRESS);
    }
}
