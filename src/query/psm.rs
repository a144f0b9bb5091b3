//! `AT+CEDRXS?` and `AT+CPSMS?` response parsing (spec.md §4.7 "CEDRXS",
//! "CPSMS").

use crate::at::lexer::{remove_outermost_quotes, split_all, strtoi};
use crate::error::{AtError, AtResult};

/// Upper bound on the number of `(AcT, eDRX value)` entries accepted from a
/// single `+CEDRXS?` response.
pub const EDRX_LIST_MAX: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdrxEntry {
    pub act: i64,
    /// The requested eDRX cycle length, as its raw 4-bit code.
    pub value: u8,
}

/// Parses one `+CEDRXS: <AcT>,"<eDRX value>"` line.
pub fn parse_cedrxs_entry(payload: &[u8]) -> AtResult<EdrxEntry> {
    let tokens = split_all(payload, b',');
    let act = strtoi(tokens.first().ok_or(AtError::InvalidData)?, 10)?;
    let value_tok = remove_outermost_quotes(tokens.get(1).ok_or(AtError::InvalidData)?)?;
    let value = strtoi(value_tok, 2)?;
    if !(0..16).contains(&value) {
        return Err(AtError::InvalidData);
    }
    Ok(EdrxEntry { act, value: value as u8 })
}

/// Parses every `+CEDRXS:` line of a multiline response, capping at
/// [`EDRX_LIST_MAX`] entries (spec.md §4.7 "up to EDRX_LIST_MAX").
pub fn parse_cedrxs_list<'a>(lines: impl IntoIterator<Item = &'a [u8]>) -> AtResult<Vec<EdrxEntry>> {
    let mut out = Vec::new();
    for line in lines {
        if out.len() >= EDRX_LIST_MAX {
            return Err(AtError::NoMemory);
        }
        out.push(parse_cedrxs_entry(line)?);
    }
    Ok(out)
}

/// Sentinel returned for a "deactivated" T3412/T3324 timer.
pub const TIMER_DEACTIVATED: u32 = 0xFFFF_FFFF;

fn decode_octet(field: &[u8]) -> AtResult<(u8, u8)> {
    let unquoted = remove_outermost_quotes(field)?;
    let v = strtoi(unquoted, 2)?;
    if !(0..=0xFF).contains(&v) {
        return Err(AtError::InvalidData);
    }
    let v = v as u8;
    Ok(((v >> 5) & 0b111, v & 0b11111))
}

/// Decodes a T3412 (RAU/TAU) timer octet (spec.md §4.7 "CPSMS").
pub fn decode_t3412(field: &[u8]) -> AtResult<u32> {
    let (unit, value) = decode_octet(field)?;
    let seconds_per_unit: u32 = match unit {
        0b000 => 600,
        0b001 => 3600,
        0b010 => 36_000,
        0b011 => 2,
        0b100 => 30,
        0b101 => 60,
        0b111 => return Ok(TIMER_DEACTIVATED),
        _ => return Err(AtError::InvalidData),
    };
    Ok(seconds_per_unit * value as u32)
}

/// Decodes a T3324 (ready-timer/active-time) timer octet.
pub fn decode_t3324(field: &[u8]) -> AtResult<u32> {
    let (unit, value) = decode_octet(field)?;
    let seconds_per_unit: u32 = match unit {
        0b000 => 2,
        0b001 => 60,
        0b010 => 360,
        0b111 => return Ok(TIMER_DEACTIVATED),
        _ => return Err(AtError::InvalidData),
    };
    Ok(seconds_per_unit * value as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpsmsResult {
    pub mode: i64,
    pub rau_seconds: Option<u32>,
    pub ready_timer_seconds: Option<u32>,
    pub tau_seconds: Option<u32>,
    pub active_time_seconds: Option<u32>,
}

/// Parses a `+CPSMS: <mode>[,<RAU>,<ready_timer>,<TAU>,<active_time>]`
/// payload.
pub fn parse_cpsms(payload: &[u8]) -> AtResult<CpsmsResult> {
    let tokens = split_all(payload, b',');
    let mode = strtoi(tokens.first().ok_or(AtError::InvalidData)?, 10)?;

    let field = |idx: usize, decode: fn(&[u8]) -> AtResult<u32>| -> AtResult<Option<u32>> {
        match tokens.get(idx) {
            Some(t) if !t.is_empty() => decode(t).map(Some),
            _ => Ok(None),
        }
    };

    Ok(CpsmsResult {
        mode,
        rau_seconds: field(1, decode_t3412)?,
        ready_timer_seconds: field(2, decode_t3324)?,
        tau_seconds: field(3, decode_t3412)?,
        active_time_seconds: field(4, decode_t3324)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cedrxs_entry_parses_decimal_act_and_binary_value() {
        let e = parse_cedrxs_entry(b"4,\"0011\"").unwrap();
        assert_eq!(e.act, 4);
        assert_eq!(e.value, 0b0011);
    }

    #[test]
    fn cedrxs_list_caps_at_max() {
        let lines: Vec<&[u8]> = (0..=EDRX_LIST_MAX).map(|_| &b"4,\"0011\""[..]).collect();
        assert_eq!(parse_cedrxs_list(lines).unwrap_err(), AtError::NoMemory);
    }

    #[test]
    fn t3412_table_values() {
        // unit=000 (10min) * value=1
        assert_eq!(decode_t3412(b"\"00000001\"").unwrap(), 600);
        // unit=111 -> deactivated
        assert_eq!(decode_t3412(b"\"11100000\"").unwrap(), TIMER_DEACTIVATED);
    }

    #[test]
    fn t3324_table_values() {
        // unit=000 (2s) * value=15
        assert_eq!(decode_t3324(b"\"00001111\"").unwrap(), 30);
    }

    #[test]
    fn cpsms_leaves_blank_fields_as_none() {
        let r = parse_cpsms(b"1,,,\"01000011\",\"00001111\"").unwrap();
        assert_eq!(r.mode, 1);
        assert_eq!(r.rau_seconds, None);
        assert_eq!(r.ready_timer_seconds, None);
        // unit bits 010 -> 10h per the §4.7 table, value bits 00011 -> 3
        assert_eq!(r.tau_seconds, Some(36_000 * 3));
        assert_eq!(r.active_time_seconds, Some(30));
    }
}
