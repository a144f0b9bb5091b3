//! `AT+CRSM` (HPLMN), `AT+CCID`, `AT+CIMI` and `AT+CPIN?` response parsing
//! (spec.md §4.7).

use crate::at::lexer::{remove_outermost_quotes, remove_whitespace, split_all, strtoi};
use crate::error::{AtError, AtResult};
use crate::hex::from_hex;

/// ICCID is at most 20 decimal digits.
pub const MAX_CCID_LEN: usize = 20;
/// IMSI is at most 15 decimal digits.
pub const MAX_CIMI_LEN: usize = 15;

fn bounded_digit_copy(payload: &[u8], max_len: usize) -> AtResult<String> {
    let trimmed = remove_outermost_quotes(payload)?;
    let trimmed = remove_whitespace(trimmed);
    if trimmed.is_empty() || trimmed.len() > max_len || !trimmed.iter().all(u8::is_ascii_digit) {
        return Err(AtError::BadParameter);
    }
    Ok(String::from_utf8_lossy(trimmed).into_owned())
}

/// `+CCID: <iccid>`.
pub fn parse_ccid(payload: &[u8]) -> AtResult<String> {
    bounded_digit_copy(payload, MAX_CCID_LEN)
}

/// `+CIMI: <imsi>`.
pub fn parse_cimi(payload: &[u8]) -> AtResult<String> {
    bounded_digit_copy(payload, MAX_CIMI_LEN)
}

/// SW1 values that mean "command processed normally" for a `CRSM` READ
/// BINARY (TS 51.011 §9.4).
const CRSM_SUCCESS_SW1: [i64; 3] = [144, 145, 146];
const CRSM_MEMORY_ERROR_SW2: i64 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrsmResult {
    pub sw1: i64,
    pub sw2: i64,
    pub success: bool,
    pub memory_error: bool,
    pub mcc: Option<String>,
    pub mnc: Option<String>,
}

/// Nibble-swapped PLMN decode (3GPP TS 51.011 §10.3.37). A high nibble of
/// `0xF` in the MNC-digit-3 position means the MNC has only two digits.
/// An unprovisioned SIM's HPLMN EF reads back as all `0xFF`; every nibble
/// there is `0xF`, which is not a decimal digit, so this is rejected rather
/// than formatted as garbage digits.
fn decode_plmn(bytes: &[u8; 3]) -> AtResult<(String, String)> {
    let mcc1 = bytes[0] & 0x0F;
    let mcc2 = (bytes[0] >> 4) & 0x0F;
    let mcc3 = bytes[1] & 0x0F;
    let mnc3 = (bytes[1] >> 4) & 0x0F;
    let mnc1 = bytes[2] & 0x0F;
    let mnc2 = (bytes[2] >> 4) & 0x0F;

    if ![mcc1, mcc2, mcc3, mnc1, mnc2].iter().all(|n| *n <= 9) {
        return Err(AtError::InvalidData);
    }
    if mnc3 != 0xF && mnc3 > 9 {
        return Err(AtError::InvalidData);
    }

    let mcc = format!("{mcc1}{mcc2}{mcc3}");
    let mnc = if mnc3 == 0xF { format!("{mnc1}{mnc2}") } else { format!("{mnc1}{mnc2}{mnc3}") };
    Ok((mcc, mnc))
}

/// Parses a `+CRSM: <sw1>,<sw2>,<response>` payload for the HPLMN READ
/// BINARY on EF 6F62 (spec.md §4.7 "CRSM/HPLMN").
pub fn parse_crsm_hplmn(payload: &[u8]) -> AtResult<CrsmResult> {
    let tokens = split_all(payload, b',');
    let sw1 = strtoi(tokens.first().ok_or(AtError::InvalidData)?, 10)?;
    let sw2 = strtoi(tokens.get(1).ok_or(AtError::InvalidData)?, 10)?;
    let success = CRSM_SUCCESS_SW1.contains(&sw1);
    let memory_error = sw2 == CRSM_MEMORY_ERROR_SW2;

    let (mcc, mnc) = if success {
        let hex_tok = remove_outermost_quotes(tokens.get(2).ok_or(AtError::InvalidData)?)?;
        if hex_tok.len() < 18 {
            return Err(AtError::InvalidData);
        }
        let mut hex_buf = hex_tok.to_vec();
        let bytes = from_hex(&mut hex_buf).map_err(|_| AtError::InvalidData)?;
        let plmn: [u8; 3] = bytes[..3].try_into().map_err(|_| AtError::InvalidData)?;
        let (mcc, mnc) = decode_plmn(&plmn)?;
        (Some(mcc), Some(mnc))
    } else {
        (None, None)
    };

    Ok(CrsmResult { sw1, sw2, success, memory_error, mcc, mnc })
}

/// SIM lock state as mapped from a `+CPIN?` status word (spec.md §4.7
/// "CPIN").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimLockState {
    Ready,
    SimPin,
    SimPuk,
    SimPin2,
    SimPuk2,
    PhNetPin,
    PhNetPuk,
    PhNetSubPin,
    PhNetSubPuk,
    PhSpPin,
    PhSpPuk,
    PhCorpPin,
    PhCorpPuk,
    Unknown,
}

/// Parses a `+CPIN: <status>` payload.
pub fn parse_cpin(payload: &[u8]) -> AtResult<SimLockState> {
    let status = remove_outermost_quotes(payload)?;
    Ok(match status {
        b"READY" => SimLockState::Ready,
        b"SIM PIN" => SimLockState::SimPin,
        b"SIM PUK" => SimLockState::SimPuk,
        b"SIM PIN2" => SimLockState::SimPin2,
        b"SIM PUK2" => SimLockState::SimPuk2,
        b"PH-NET PIN" => SimLockState::PhNetPin,
        b"PH-NET PUK" => SimLockState::PhNetPuk,
        b"PH-NETSUB PIN" => SimLockState::PhNetSubPin,
        b"PH-NETSUB PUK" => SimLockState::PhNetSubPuk,
        b"PH-SP PIN" => SimLockState::PhSpPin,
        b"PH-SP PUK" => SimLockState::PhSpPuk,
        b"PH-CORP PIN" => SimLockState::PhCorpPin,
        b"PH-CORP PUK" => SimLockState::PhCorpPuk,
        _ => SimLockState::Unknown,
    })
}
